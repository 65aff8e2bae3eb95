//! Tool registry
//!
//! A tool is an external executable a recipe shells out to, plus an optional
//! script-side API module `tools/<name>.lua` next to the build file. Both
//! the binary and the module are hashed when the tool is first loaded; those
//! hashes feed cache invalidation, so upgrading a compiler invalidates every
//! recipe that used it.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rebuild_core::{hash_file, Hash};
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};

/// An external executable with its content hashes.
#[derive(Debug, Clone)]
pub struct Tool {
    pub name: String,
    pub binary_path: PathBuf,
    pub binary_hash: Hash,
    /// `tools/<name>.lua` under the project root, whether or not it exists.
    pub module_path: PathBuf,
    /// Zero when the tool has no script-side module.
    pub module_hash: Hash,
}

/// Lazily populated registry of loaded tools.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    search_paths: Vec<PathBuf>,
    tools: HashMap<String, Tool>,
}

impl ToolRegistry {
    /// A registry that searches the directories of the `PATH` environment
    /// variable, read once at construction.
    pub fn from_path_env() -> ToolRegistry {
        let search_paths = env::var_os("PATH")
            .map(|path| env::split_paths(&path).collect())
            .unwrap_or_default();
        ToolRegistry {
            search_paths,
            tools: HashMap::new(),
        }
    }

    /// A registry with an explicit list of search directories.
    pub fn with_search_paths(search_paths: Vec<PathBuf>) -> ToolRegistry {
        ToolRegistry {
            search_paths,
            tools: HashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.get(name)
    }

    /// Load a tool by name, memoized.
    ///
    /// On first load: locate the binary, hash it, and hash the sibling
    /// script module if one exists under `<project_root>/tools/`.
    pub fn load(&mut self, name: &str, project_root: &Path) -> Result<Tool> {
        if let Some(tool) = self.tools.get(name) {
            debug!(tool = %name, "tool already loaded");
            return Ok(tool.clone());
        }

        let binary_path = self
            .find_binary(name)
            .ok_or_else(|| EngineError::ToolNotFound(name.to_string()))?;
        let binary_hash = hash_file(&binary_path)?;

        let module_path = project_root.join("tools").join(format!("{}.lua", name));
        let module_hash = if module_path.is_file() {
            match hash_file(&module_path) {
                Ok(hash) => hash,
                Err(err) => {
                    warn!(module = %module_path.display(), error = %err, "failed to hash tool module");
                    Hash::ZERO
                }
            }
        } else {
            debug!(tool = %name, module = %module_path.display(), "tool has no script module");
            Hash::ZERO
        };

        let tool = Tool {
            name: name.to_string(),
            binary_path: binary_path.clone(),
            binary_hash,
            module_path,
            module_hash,
        };
        self.tools.insert(name.to_string(), tool.clone());

        info!(tool = %name, binary = %binary_path.display(), "loaded tool");
        Ok(tool)
    }

    /// Insert an already-built tool entry (test support).
    pub(crate) fn insert(&mut self, tool: Tool) {
        self.tools.insert(tool.name.clone(), tool);
    }

    /// Locate a tool binary. Names containing a path separator are treated
    /// as direct paths; bare names are searched in the configured
    /// directories.
    fn find_binary(&self, name: &str) -> Option<PathBuf> {
        if name.contains('/') {
            let path = PathBuf::from(name);
            return is_executable(&path).then_some(path);
        }

        for dir in &self.search_paths {
            let candidate = dir.join(name);
            if is_executable(&candidate) {
                debug!(tool = %name, path = %candidate.display(), "found tool binary");
                return Some(candidate);
            }
        }

        warn!(tool = %name, "tool not found in search path");
        None
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
