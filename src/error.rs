use std::path::PathBuf;
use thiserror::Error;

/// Why a probe could not run or did not pass
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Plugin not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Could not find plugin binary in bundle: {}", .0.display())]
    BinaryNotFound(PathBuf),

    #[error("No '{name}.clap' in any CLAP directory (searched: {searched})")]
    NotInstalled { name: String, searched: String },

    #[error("Invalid plugin path: {0}")]
    InvalidPath(String),

    #[error("Failed to load library: {0}")]
    Load(#[from] libloading::Error),

    #[error("No clap_entry or get_clap_entry symbol found")]
    MissingEntry,

    #[error("{0} is null")]
    NullEntry(&'static str),

    #[error("Invalid factory id: {0:?}")]
    InvalidFactoryId(String),

    #[error("Incompatible CLAP version {0}")]
    IncompatibleVersion(String),

    #[error("Plugin has no {0} function")]
    MissingFunction(&'static str),

    #[error("Plugin init() returned false")]
    InitFailed,

    #[error("get_factory(\"{0}\") returned null")]
    NullFactory(String),

    #[error("Descriptor error: {message}")]
    Descriptor { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProbeError {
    /// Process exit status for this failure
    ///
    /// 2 means the probe never reached a binary (bad path, nothing installed),
    /// 1 means the binary was found but did not pass.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound(_)
            | Self::BinaryNotFound(_)
            | Self::NotInstalled { .. }
            | Self::InvalidPath(_)
            | Self::Io(_) => crate::EXIT_USAGE,
            _ => crate::EXIT_FAILED,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProbeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ProbeError::NotFound(PathBuf::from("/nope")).exit_code(), 2);
        assert_eq!(ProbeError::MissingEntry.exit_code(), 1);
        assert_eq!(ProbeError::InitFailed.exit_code(), 1);
        assert_eq!(
            ProbeError::NullFactory("clap.plugin-factory".into()).to_string(),
            "get_factory(\"clap.plugin-factory\") returned null"
        );
    }
}
