//! CLAP entry-point probe
//!
//! Loads a plugin binary, finds its entry descriptor and walks the entry
//! lifecycle (`init`, `get_factory`, `deinit`) without ever creating a plugin
//! instance. Every step is recorded in a [`ProbeReport`], including the ones
//! that were skipped because an earlier step failed.

use super::bundle::{self, BundleEntry};
use super::clap_sys::*;
use crate::error::{ProbeError, Result};
use chrono::{DateTime, Utc};
use libloading::Library;
use serde::Serialize;
use std::ffi::{c_void, CStr, CString};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Factory every plugin binary is expected to provide
pub const DEFAULT_FACTORY_ID: &str = "clap.plugin-factory";

/// Plugin counts above this are treated as a corrupt factory
pub const MAX_PLUGIN_COUNT: u32 = 4096;

/// What to probe and how far to go
#[derive(Debug, Clone)]
pub struct ProbeOptions {
    /// `.clap` bundle or shared object, passed to `init` as given
    pub plugin_path: PathBuf,
    pub factory_id: String,
    /// Read plugin descriptors from the plugin factory
    pub enumerate_descriptors: bool,
    /// Attach a listing of the bundle contents to the report
    pub list_bundle: bool,
}

impl ProbeOptions {
    pub fn new(plugin_path: impl Into<PathBuf>) -> Self {
        Self {
            plugin_path: plugin_path.into(),
            factory_id: DEFAULT_FACTORY_ID.to_string(),
            enumerate_descriptors: true,
            list_bundle: false,
        }
    }
}

/// Probe steps, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStep {
    Resolve,
    Load,
    LocateEntry,
    CheckVersion,
    Init,
    GetFactory,
    EnumerateDescriptors,
    Deinit,
}

impl ProbeStep {
    pub const ALL: [ProbeStep; 8] = [
        ProbeStep::Resolve,
        ProbeStep::Load,
        ProbeStep::LocateEntry,
        ProbeStep::CheckVersion,
        ProbeStep::Init,
        ProbeStep::GetFactory,
        ProbeStep::EnumerateDescriptors,
        ProbeStep::Deinit,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ProbeStep::Resolve => "resolve binary",
            ProbeStep::Load => "load library",
            ProbeStep::LocateEntry => "locate entry",
            ProbeStep::CheckVersion => "check version",
            ProbeStep::Init => "init",
            ProbeStep::GetFactory => "get_factory",
            ProbeStep::EnumerateDescriptors => "enumerate plugins",
            ProbeStep::Deinit => "deinit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub step: ProbeStep,
    pub status: StepStatus,
    pub message: Option<String>,
}

/// Where the entry descriptor came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
    /// The `clap_entry` data symbol
    StaticSymbol,
    /// The `get_clap_entry` accessor function
    AccessorFunction,
}

/// Snapshot of the entry descriptor
#[derive(Debug, Clone, Serialize)]
pub struct EntryInfo {
    pub clap_version: String,
    pub compatible: bool,
    /// Function addresses, `None` for empty slots
    pub init: Option<String>,
    pub deinit: Option<String>,
    pub get_factory: Option<String>,
}

impl EntryInfo {
    fn from_entry(entry: &ClapPluginEntry) -> Self {
        Self {
            clap_version: entry.clap_version.to_string(),
            compatible: entry.clap_version.is_compatible(),
            init: entry.init.map(|f| format!("{:p}", f as *const ())),
            deinit: entry.deinit.map(|f| format!("{:p}", f as *const ())),
            get_factory: entry.get_factory.map(|f| format!("{:p}", f as *const ())),
        }
    }
}

/// One plugin advertised by the plugin factory
#[derive(Debug, Clone, Serialize)]
pub struct DescriptorInfo {
    pub index: u32,
    pub clap_version: String,
    pub id: String,
    pub name: String,
    pub vendor: String,
    pub version: String,
    pub description: String,
    pub url: String,
    pub features: Vec<String>,
}

/// Everything one probe run observed
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub plugin_path: PathBuf,
    pub binary_path: Option<PathBuf>,
    pub factory_id: String,
    pub entry_source: Option<EntrySource>,
    pub entry: Option<EntryInfo>,
    pub factory: Option<String>,
    pub descriptors: Vec<DescriptorInfo>,
    pub bundle: Vec<BundleEntry>,
    pub steps: Vec<StepRecord>,
    pub error: Option<String>,
    pub exit_code: i32,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ProbeReport {
    pub fn new(options: &ProbeOptions) -> Self {
        Self {
            plugin_path: options.plugin_path.clone(),
            binary_path: None,
            factory_id: options.factory_id.clone(),
            entry_source: None,
            entry: None,
            factory: None,
            descriptors: Vec::new(),
            bundle: Vec::new(),
            steps: Vec::new(),
            error: None,
            exit_code: crate::EXIT_OK,
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    pub fn passed(&self) -> bool {
        self.error.is_none()
    }

    pub fn step(&self, step: ProbeStep) -> Option<&StepRecord> {
        self.steps.iter().find(|record| record.step == step)
    }

    pub fn status(&self, step: ProbeStep) -> Option<StepStatus> {
        self.step(step).map(|record| record.status)
    }

    fn record(&mut self, step: ProbeStep, status: StepStatus, message: Option<String>) {
        self.steps.push(StepRecord {
            step,
            status,
            message,
        });
    }

    fn pass(&mut self, step: ProbeStep, message: impl Into<String>) {
        let message = message.into();
        log::info!("✓ {}: {}", step.label(), message);
        self.record(step, StepStatus::Passed, Some(message));
    }

    fn skip(&mut self, step: ProbeStep, reason: impl Into<String>) {
        let reason = reason.into();
        log::info!("- {}: {}", step.label(), reason);
        self.record(step, StepStatus::Skipped, Some(reason));
    }

    /// Record a failed step and hand the error back for `?`
    fn fail_step(&mut self, step: ProbeStep, error: ProbeError) -> ProbeError {
        log::error!("✗ {}: {}", step.label(), error);
        self.record(step, StepStatus::Failed, Some(error.to_string()));
        if self.error.is_none() {
            self.error = Some(error.to_string());
            self.exit_code = error.exit_code();
        }
        error
    }

    /// Mark steps that never ran as skipped and put steps in execution order
    pub fn finish(&mut self, elapsed: Duration) {
        for step in ProbeStep::ALL {
            if self.step(step).is_none() {
                self.record(step, StepStatus::Skipped, None);
            }
        }
        self.steps.sort_by_key(|record| record.step);
        self.duration_ms = elapsed.as_millis() as u64;
    }
}

/// Run the full probe against a plugin on disk
pub fn probe(options: &ProbeOptions) -> ProbeReport {
    let started = Instant::now();
    let mut report = ProbeReport::new(options);
    log::info!("Testing CLAP plugin: {:?}", options.plugin_path);

    if options.list_bundle && options.plugin_path.exists() {
        report.bundle = bundle::bundle_tree(&options.plugin_path);
    }

    if let Err(e) = run(options, &mut report) {
        log::debug!("Probe stopped early: {}", e);
    }

    report.finish(started.elapsed());
    report
}

fn run(options: &ProbeOptions, report: &mut ProbeReport) -> Result<()> {
    let binary = bundle::resolve_binary(&options.plugin_path)
        .map_err(|e| report.fail_step(ProbeStep::Resolve, e))?;
    let plugin_path =
        path_to_cstring(&options.plugin_path).map_err(|e| report.fail_step(ProbeStep::Resolve, e))?;
    report.pass(ProbeStep::Resolve, binary.display().to_string());
    report.binary_path = Some(binary.clone());

    // Declared before anything borrowing from it, so it is dropped last
    let library = load_library(&binary).map_err(|e| report.fail_step(ProbeStep::Load, e))?;
    report.pass(ProbeStep::Load, "library loaded");

    let entry = unsafe {
        locate_step(report, &plugin_path, |symbol| {
            library.get::<*const c_void>(symbol).ok().map(|address| *address)
        })?
    };

    // The entry lives in the library's data segment and `library` outlives this call
    let result = unsafe { exercise_entry(&*entry, &plugin_path, options, report) };

    drop(library);
    log::info!("Library unloaded");
    result
}

/// Open the shared object, resolving all symbols up front on unix
#[cfg(unix)]
fn load_library(path: &Path) -> Result<Library> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_LOCAL, RTLD_NOW};

    let library = unsafe { UnixLibrary::open(Some(path), RTLD_NOW | RTLD_LOCAL)? };
    Ok(library.into())
}

#[cfg(not(unix))]
fn load_library(path: &Path) -> Result<Library> {
    Ok(unsafe { Library::new(path)? })
}

/// Plugin path as a C string, byte-exact on unix
fn path_to_cstring(path: &Path) -> Result<CString> {
    #[cfg(unix)]
    let bytes = {
        use std::os::unix::ffi::OsStrExt;
        path.as_os_str().as_bytes().to_vec()
    };
    #[cfg(not(unix))]
    let bytes = path.to_string_lossy().into_owned().into_bytes();

    CString::new(bytes).map_err(|e| ProbeError::InvalidPath(e.to_string()))
}

/// Run the entry lookup and record it as the `LocateEntry` step
///
/// `lookup` maps a NUL-terminated symbol name to its address, `None` when the
/// symbol is not exported.
unsafe fn locate_step<F>(
    report: &mut ProbeReport,
    plugin_path: &CStr,
    lookup: F,
) -> Result<*const ClapPluginEntry>
where
    F: FnMut(&[u8]) -> Option<*const c_void>,
{
    let (entry, source) = locate_entry(plugin_path, lookup)
        .map_err(|e| report.fail_step(ProbeStep::LocateEntry, e))?;
    report.entry_source = Some(source);
    report.pass(
        ProbeStep::LocateEntry,
        match source {
            EntrySource::StaticSymbol => "clap_entry static found",
            EntrySource::AccessorFunction => "get_clap_entry function found",
        },
    );
    Ok(entry)
}

/// Find the entry descriptor, preferring the standard data symbol
unsafe fn locate_entry<F>(plugin_path: &CStr, mut lookup: F) -> Result<(*const ClapPluginEntry, EntrySource)>
where
    F: FnMut(&[u8]) -> Option<*const c_void>,
{
    // A data symbol: the symbol's address is the descriptor itself
    if let Some(address) = lookup(CLAP_ENTRY_SYMBOL) {
        if address.is_null() {
            return Err(ProbeError::NullEntry("clap_entry"));
        }
        return Ok((address as *const ClapPluginEntry, EntrySource::StaticSymbol));
    }
    log::debug!("No clap_entry symbol");

    let address = lookup(CLAP_ENTRY_FN_SYMBOL).ok_or_else(|| {
        log::debug!("No get_clap_entry symbol");
        ProbeError::MissingEntry
    })?;
    if address.is_null() {
        return Err(ProbeError::NullEntry("get_clap_entry"));
    }
    let accessor = std::mem::transmute::<*const c_void, ClapEntryFn>(address);

    log::info!("Calling get_clap_entry()...");
    let entry = accessor(plugin_path.as_ptr());
    if entry.is_null() {
        return Err(ProbeError::NullEntry("get_clap_entry() result"));
    }
    Ok((entry, EntrySource::AccessorFunction))
}

/// Walk the entry lifecycle against an already-located descriptor
///
/// Runs the version check, `init`, `get_factory`, descriptor enumeration and
/// `deinit`. `deinit` is called exactly once if and only if `init` returned
/// true, whatever happens in between.
///
/// # Safety
/// The function pointers in `entry` must be callable with CLAP semantics.
pub unsafe fn exercise_entry(
    entry: &ClapPluginEntry,
    plugin_path: &CStr,
    options: &ProbeOptions,
    report: &mut ProbeReport,
) -> Result<()> {
    let info = EntryInfo::from_entry(entry);
    log::info!(
        "CLAP version {}, init: {:?}, deinit: {:?}, get_factory: {:?}",
        info.clap_version,
        info.init,
        info.deinit,
        info.get_factory
    );
    report.entry = Some(info);

    let version = entry.clap_version;
    if !version.is_compatible() {
        return Err(report.fail_step(
            ProbeStep::CheckVersion,
            ProbeError::IncompatibleVersion(version.to_string()),
        ));
    }
    report.pass(ProbeStep::CheckVersion, format!("CLAP version {}", version));

    let init = entry
        .init
        .ok_or(ProbeError::MissingFunction("init"))
        .map_err(|e| report.fail_step(ProbeStep::Init, e))?;
    log::info!("Calling init()...");
    if !init(plugin_path.as_ptr()) {
        // CLAP forbids deinit after a failed init
        return Err(report.fail_step(ProbeStep::Init, ProbeError::InitFailed));
    }
    report.pass(ProbeStep::Init, "init() returned true");

    let result = query_factory(entry, options, report);

    match entry.deinit {
        Some(deinit) => {
            log::info!("Calling deinit()...");
            deinit();
            report.pass(ProbeStep::Deinit, "deinit() called");
        }
        None => {
            log::warn!("Plugin has no deinit function");
            report.skip(ProbeStep::Deinit, "plugin has no deinit function");
        }
    }

    result
}

unsafe fn query_factory(
    entry: &ClapPluginEntry,
    options: &ProbeOptions,
    report: &mut ProbeReport,
) -> Result<()> {
    let get_factory = entry
        .get_factory
        .ok_or(ProbeError::MissingFunction("get_factory"))
        .map_err(|e| report.fail_step(ProbeStep::GetFactory, e))?;
    let factory_id = CString::new(options.factory_id.as_bytes()).map_err(|_| {
        report.fail_step(
            ProbeStep::GetFactory,
            ProbeError::InvalidFactoryId(options.factory_id.clone()),
        )
    })?;

    log::info!("Calling get_factory({:?})...", options.factory_id);
    let factory = get_factory(factory_id.as_ptr());
    if factory.is_null() {
        return Err(report.fail_step(
            ProbeStep::GetFactory,
            ProbeError::NullFactory(options.factory_id.clone()),
        ));
    }
    report.factory = Some(format!("{:p}", factory));
    report.pass(
        ProbeStep::GetFactory,
        format!("get_factory(\"{}\") returned {:p}", options.factory_id, factory),
    );

    if !options.enumerate_descriptors {
        report.skip(ProbeStep::EnumerateDescriptors, "disabled");
        return Ok(());
    }
    if factory_id.as_bytes_with_nul() != CLAP_PLUGIN_FACTORY_ID {
        report.skip(ProbeStep::EnumerateDescriptors, "not a plugin factory");
        return Ok(());
    }

    let descriptors = read_descriptors(factory as *const ClapPluginFactory)
        .map_err(|e| report.fail_step(ProbeStep::EnumerateDescriptors, e))?;
    report.pass(
        ProbeStep::EnumerateDescriptors,
        format!("{} plugin(s) in factory", descriptors.len()),
    );
    report.descriptors = descriptors;
    Ok(())
}

unsafe fn read_descriptors(factory: *const ClapPluginFactory) -> Result<Vec<DescriptorInfo>> {
    let factory_ref = &*factory;

    let get_count_fn = factory_ref
        .get_plugin_count
        .ok_or(ProbeError::MissingFunction("get_plugin_count"))?;
    let get_descriptor_fn = factory_ref
        .get_plugin_descriptor
        .ok_or(ProbeError::MissingFunction("get_plugin_descriptor"))?;

    let plugin_count = get_count_fn(factory);
    if plugin_count == 0 {
        return Err(ProbeError::Descriptor {
            message: "factory reports no plugins".to_string(),
        });
    }
    if plugin_count > MAX_PLUGIN_COUNT {
        return Err(ProbeError::Descriptor {
            message: format!(
                "factory reports {} plugins (limit {})",
                plugin_count, MAX_PLUGIN_COUNT
            ),
        });
    }
    log::info!("Found {} plugin(s) in factory", plugin_count);

    let mut descriptors = Vec::new();
    for index in 0..plugin_count {
        let descriptor = get_descriptor_fn(factory, index);
        if descriptor.is_null() {
            return Err(ProbeError::Descriptor {
                message: format!("descriptor {} of {} is null", index, plugin_count),
            });
        }
        let desc_ref = &*descriptor;

        let info = DescriptorInfo {
            index,
            clap_version: desc_ref.clap_version.to_string(),
            id: c_str_to_string(desc_ref.id, "unknown"),
            name: c_str_to_string(desc_ref.name, "Unknown Plugin"),
            vendor: c_str_to_string(desc_ref.vendor, "Unknown"),
            version: c_str_to_string(desc_ref.version, "0.0.0"),
            description: c_str_to_string(desc_ref.description, ""),
            url: c_str_to_string(desc_ref.url, ""),
            features: c_str_array(desc_ref.features),
        };
        log::info!(
            "Plugin {}: {} by {} (id: {}, version: {})",
            index,
            info.name,
            info.vendor,
            info.id,
            info.version
        );
        descriptors.push(info);
    }

    Ok(descriptors)
}
