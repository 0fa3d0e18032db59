//! Error kinds for the merge/remove/backup/orchestrator core.
//!
//! One variant per failure kind the core can produce; every variant
//! carries enough context to explain itself without the caller needing
//! to inspect a wrapped source error.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RouterConfigError>;

#[derive(Debug, Error, Diagnostic)]
pub enum RouterConfigError {
    #[error("syntax error in {path}: {message}")]
    Syntax { path: PathBuf, message: String },

    #[error("type conflict for option '{option}' in section '{section}' of config '{config}'")]
    TypeConflict {
        config: String,
        section: String,
        option: String,
    },

    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("network safety guard tripped in config '{config}': {message}")]
    NetworkSafety { config: String, message: String },

    #[error("{failed} of {attempted} service restarts failed")]
    ServiceFailed { failed: usize, attempted: usize },

    #[error("could not acquire lock on {path} within {timeout_ms}ms")]
    Busy { path: PathBuf, timeout_ms: u64 },

    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("operation cancelled")]
    Cancelled,
}

impl RouterConfigError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The driver-facing process exit code for this error kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Syntax { .. } => 1,
            Self::TypeConflict { .. } => 1,
            Self::FileNotFound { .. } => 3,
            Self::Io { source, .. } if source.kind() == std::io::ErrorKind::PermissionDenied => 4,
            Self::Io { .. } => 1,
            Self::NetworkSafety { .. } => 5,
            Self::ServiceFailed { .. } => 6,
            Self::Busy { .. } => 1,
            Self::Validation { .. } => 7,
            Self::Cancelled => 1,
        }
    }
}
