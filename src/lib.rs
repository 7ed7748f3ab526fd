//! Smoke test for CLAP plugin binaries
//!
//! Loads a `.clap` binary, locates `clap_entry` and calls `init`,
//! `get_factory` and `deinit` in order, reporting each step.

pub mod config;
pub mod error;
pub mod logging;
pub mod plugin;
pub mod report;

pub use error::{ProbeError, Result};
pub use plugin::probe::{probe, ProbeOptions, ProbeReport, ProbeStep, StepStatus};

/// Every step passed
pub const EXIT_OK: i32 = 0;
/// The binary was found but a probe step failed
pub const EXIT_FAILED: i32 = 1;
/// Bad arguments or no binary to probe
pub const EXIT_USAGE: i32 = 2;
