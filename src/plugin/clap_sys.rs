//! CLAP (CLever Audio Plugin) FFI structures
//!
//! Only the slice of the CLAP C API a probe touches: the entry descriptor,
//! the plugin factory and plugin descriptors.
//! Reference: https://github.com/free-audio/clap

use std::ffi::{c_void, CStr};
use std::fmt;
use std::os::raw::c_char;

// =============================================================================
// Version
// =============================================================================

pub const CLAP_VERSION_MAJOR: u32 = 1;
pub const CLAP_VERSION_MINOR: u32 = 2;
pub const CLAP_VERSION_REVISION: u32 = 0;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClapVersion {
    pub major: u32,
    pub minor: u32,
    pub revision: u32,
}

impl ClapVersion {
    pub const fn new() -> Self {
        Self {
            major: CLAP_VERSION_MAJOR,
            minor: CLAP_VERSION_MINOR,
            revision: CLAP_VERSION_REVISION,
        }
    }

    /// Versions 0.x were pre-release and are not ABI compatible with 1.x
    pub const fn is_compatible(&self) -> bool {
        self.major >= 1
    }
}

impl Default for ClapVersion {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClapVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.revision)
    }
}

// =============================================================================
// Plugin Entry
// =============================================================================

/// Data symbol every CLAP binary must export
pub const CLAP_ENTRY_SYMBOL: &[u8] = b"clap_entry\0";

/// Non-standard accessor some toolchains export instead of the static symbol
pub const CLAP_ENTRY_FN_SYMBOL: &[u8] = b"get_clap_entry\0";

pub const CLAP_PLUGIN_FACTORY_ID: &[u8] = b"clap.plugin-factory\0";

#[repr(C)]
pub struct ClapPluginEntry {
    pub clap_version: ClapVersion,
    pub init: Option<unsafe extern "C" fn(plugin_path: *const c_char) -> bool>,
    pub deinit: Option<unsafe extern "C" fn()>,
    pub get_factory:
        Option<unsafe extern "C" fn(factory_id: *const c_char) -> *const c_void>,
}

/// Signature of the `get_clap_entry` accessor
pub type ClapEntryFn = unsafe extern "C" fn(plugin_path: *const c_char) -> *const ClapPluginEntry;

// =============================================================================
// Plugin Factory
// =============================================================================

#[repr(C)]
pub struct ClapPluginFactory {
    pub get_plugin_count: Option<unsafe extern "C" fn(factory: *const ClapPluginFactory) -> u32>,
    pub get_plugin_descriptor: Option<
        unsafe extern "C" fn(
            factory: *const ClapPluginFactory,
            index: u32,
        ) -> *const ClapPluginDescriptor,
    >,
    /// Never called by the probe; the host argument is left opaque.
    pub create_plugin: Option<
        unsafe extern "C" fn(
            factory: *const ClapPluginFactory,
            host: *const c_void,
            plugin_id: *const c_char,
        ) -> *const c_void,
    >,
}

// =============================================================================
// Plugin Descriptor
// =============================================================================

#[repr(C)]
pub struct ClapPluginDescriptor {
    pub clap_version: ClapVersion,
    pub id: *const c_char,
    pub name: *const c_char,
    pub vendor: *const c_char,
    pub url: *const c_char,
    pub manual_url: *const c_char,
    pub support_url: *const c_char,
    pub version: *const c_char,
    pub description: *const c_char,
    pub features: *const *const c_char,
}

// =============================================================================
// C string helpers
// =============================================================================

/// Copy a nullable C string, substituting `fallback` for null
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string.
pub unsafe fn c_str_to_string(ptr: *const c_char, fallback: &str) -> String {
    if ptr.is_null() {
        fallback.to_string()
    } else {
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

/// Copy a NULL-terminated array of C strings (CLAP feature lists)
///
/// # Safety
/// `ptr` must be null or point to an array terminated by a null entry.
pub unsafe fn c_str_array(ptr: *const *const c_char) -> Vec<String> {
    let mut out = Vec::new();
    if ptr.is_null() {
        return out;
    }
    let mut cursor = ptr;
    while !(*cursor).is_null() {
        out.push(CStr::from_ptr(*cursor).to_string_lossy().into_owned());
        cursor = cursor.add(1);
    }
    out
}
