//! CLAP plugin binaries: ABI types, bundle layout and the entry probe

pub mod bundle;
pub mod clap_sys;
pub mod probe;
