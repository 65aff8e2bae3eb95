//! Target registry
//!
//! Maps target names to the Lua function that builds them. The registry is
//! populated while the build file executes, via the `rebuild.register_target`
//! host primitive. Names are opaque strings; the engine attaches no meaning
//! to colons or slashes.

use std::collections::HashMap;

use tracing::{debug, warn};

/// A named buildable unit declared in a build file.
#[derive(Debug, Clone)]
pub struct Target {
    pub name: String,
    /// Name of the global Lua function that implements this target.
    pub function_name: String,
}

/// Registry of all targets declared by the loaded build file.
#[derive(Debug, Default)]
pub struct TargetRegistry {
    targets: HashMap<String, Target>,
}

impl TargetRegistry {
    pub fn new() -> TargetRegistry {
        TargetRegistry::default()
    }

    /// Register a target. Re-registration replaces the prior entry.
    pub fn register(&mut self, name: impl Into<String>, function_name: impl Into<String>) {
        let name = name.into();
        let function_name = function_name.into();
        if self.targets.contains_key(&name) {
            warn!(target = %name, "target already registered, replacing");
        }
        debug!(target = %name, function = %function_name, "registered target");
        self.targets.insert(
            name.clone(),
            Target {
                name,
                function_name,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&Target> {
        self.targets.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.targets.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// All registered target names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.targets.keys().cloned().collect();
        names.sort();
        names
    }
}
