//! Error types for rebuild-engine

use std::path::PathBuf;
use thiserror::Error;

/// Result type for rebuild-engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while loading build files or running a build
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] rebuild_core::Error),

    #[error("script error: {0}")]
    Script(#[from] mlua::Error),

    #[error("failed to load build file {path}: {source}")]
    ScriptLoad {
        path: PathBuf,
        #[source]
        source: mlua::Error,
    },

    #[error("no BUILD.lua found in {0} or any parent directory")]
    BuildFileNotFound(PathBuf),

    #[error("target not found: {0}")]
    TargetNotFound(String),

    #[error("target {target}: recipe function {function:?} is not defined in the build file")]
    FunctionNotFound { target: String, function: String },

    #[error("tool {0:?} not found in any search directory")]
    ToolNotFound(String),

    #[error("build failed: {target}")]
    BuildFailed { target: String },

    #[error("dependency cycle detected; still waiting: {}", targets.join(", "))]
    DependencyCycle { targets: Vec<String> },

    #[error("invalid define {0:?} (expected KEY=VALUE)")]
    InvalidDefine(String),
}
