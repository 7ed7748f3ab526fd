//! Command-line configuration

use crate::error::{ProbeError, Result};
use crate::logging;
use crate::plugin::bundle;
use crate::plugin::probe::{ProbeOptions, DEFAULT_FACTORY_ID};
use clap::{ArgGroup, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "clap-probe", version)]
#[command(about = "Check that a CLAP plugin binary loads and runs its entry lifecycle")]
#[command(group(ArgGroup::new("target").required(true).args(["plugin", "name"])))]
pub struct Cli {
    /// Path to a .clap bundle or plugin binary
    pub plugin: Option<PathBuf>,

    /// Look the plugin up by name in the standard CLAP directories
    #[arg(long, env = "CLAP_PROBE_NAME")]
    pub name: Option<String>,

    /// Factory id passed to get_factory
    #[arg(long, env = "CLAP_PROBE_FACTORY_ID", default_value = DEFAULT_FACTORY_ID)]
    pub factory_id: String,

    /// Skip reading plugin descriptors from the factory
    #[arg(long)]
    pub no_descriptors: bool,

    /// List the bundle contents
    #[arg(long)]
    pub show_bundle: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Write logs to a file instead of stderr (`--log-file=PATH`, default location if no path)
    #[arg(long, value_name = "PATH", require_equals = true)]
    pub log_file: Option<Option<PathBuf>>,
}

impl Cli {
    /// Where logs go, if not stderr
    pub fn log_file_path(&self) -> Option<PathBuf> {
        self.log_file
            .as_ref()
            .map(|path| path.clone().unwrap_or_else(logging::default_log_path))
    }

    /// Resolve the target plugin and build probe options
    pub fn probe_options(&self) -> Result<ProbeOptions> {
        let plugin_path = match (&self.plugin, &self.name) {
            (Some(path), _) => path.clone(),
            (None, Some(name)) => bundle::find_installed(name)?,
            (None, None) => {
                return Err(ProbeError::InvalidPath("no plugin path or name given".to_string()))
            }
        };

        let mut options = ProbeOptions::new(plugin_path);
        options.factory_id = self.factory_id.clone();
        options.enumerate_descriptors = !self.no_descriptors;
        options.list_bundle = self.show_bundle;
        Ok(options)
    }
}
