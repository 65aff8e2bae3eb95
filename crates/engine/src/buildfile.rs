//! Build file discovery
//!
//! The build definition lives in a `BUILD.lua` file, located by walking
//! upward from the invocation directory; its directory becomes the project
//! root that relative paths, `outputs/`, and `tools/` resolve against.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{EngineError, Result};

/// Conventional name of the build definition file.
pub const BUILD_FILE_NAME: &str = "BUILD.lua";

/// Walk upward from `start` until a build file is found.
pub fn find_build_file(start: &Path) -> Result<PathBuf> {
    let start = if start.is_absolute() {
        start.to_path_buf()
    } else {
        start.canonicalize()?
    };

    for dir in start.ancestors() {
        let candidate = dir.join(BUILD_FILE_NAME);
        if candidate.is_file() {
            info!(path = %candidate.display(), "found build file");
            return Ok(candidate);
        }
    }

    Err(EngineError::BuildFileNotFound(start))
}
