//! Error types for the cnnkit CLI.

use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

/// Result type alias for CLI operations
pub(crate) type Result<T> = std::result::Result<T, CliError>;

/// CLI error types
#[derive(Error, Debug)]
pub(crate) enum CliError {
    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Configuration unusable for the requested command
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON output failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Library error (training, compression, persistence)
    #[error("cnnkit error: {0}")]
    Model(#[from] cnnkit::CnnError),
}

impl CliError {
    /// Get exit code for this error
    pub(crate) fn exit_code(&self) -> ExitCode {
        match self {
            Self::FileNotFound(_) => ExitCode::from(3),
            Self::InvalidConfig(_) => ExitCode::from(5),
            Self::Io(_) => ExitCode::from(7),
            Self::Json(_) => ExitCode::from(4),
            Self::Model(_) => ExitCode::from(1),
        }
    }
}

/// Fails with [`CliError::FileNotFound`] unless `path` exists.
pub(crate) fn require_file(path: &std::path::Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(CliError::FileNotFound(path.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let codes: Vec<String> = [
            CliError::FileNotFound(PathBuf::from("x")),
            CliError::InvalidConfig(String::new()),
            CliError::Io(std::io::Error::other("x")),
        ]
        .iter()
        .map(|e| format!("{:?}", e.exit_code()))
        .collect();
        assert_ne!(codes[0], codes[1]);
        assert_ne!(codes[1], codes[2]);
    }

    #[test]
    fn test_require_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        assert!(matches!(
            require_file(&dir.path().join("missing.bin")),
            Err(CliError::FileNotFound(_))
        ));
        assert!(require_file(dir.path()).is_err());
    }
}
