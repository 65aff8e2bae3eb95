//! Error types for rebuild-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type for rebuild-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the storage and caching layer
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid hash hex string: {0:?}")]
    InvalidHex(String),

    #[error("dependency path too long to record: {0:?}")]
    DepPathTooLong(String),

    #[error("no trace recorded for key {0}")]
    TraceNotFound(String),

    #[error("corrupt trace at {path}: {reason}")]
    TraceCorrupt { path: PathBuf, reason: String },

    #[error("neither XDG_DATA_HOME nor HOME is set; cannot locate the store")]
    NoDataDir,
}
