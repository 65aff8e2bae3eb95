//! Recipe: the scheduler's runtime state for one target during one build.

use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use std::time::Instant;

use mlua::Thread;
use rebuild_core::{hash_bytes, Hash};
use tracing::debug;

use crate::config::BuildConfig;
use crate::tool::ToolRegistry;

/// Lifecycle state of a recipe.
///
/// ```text
/// Pending ──queued→ Running ──completes→ Complete
///                   │
///                   ├─requests dep→ Suspended ──dep ready→ Pending
///                   │
///                   └─script error→ Failed
/// ```
///
/// `Complete` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeState {
    Pending,
    Running,
    Suspended,
    Complete,
    Failed,
}

impl RecipeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RecipeState::Complete | RecipeState::Failed)
    }
}

/// Runtime state of one target being built.
pub struct Recipe {
    pub target_name: String,
    state: RecipeState,
    /// Set at the first cache probe, never mutated afterward.
    pub request_key: Option<Hash>,
    /// Dependency paths in the order they were first observed. Grows
    /// monotonically; never shrinks.
    declared_deps: Vec<String>,
    declared_set: HashSet<String>,
    /// Declared dependencies not yet satisfied. Always a subset of
    /// `declared_deps`.
    pub pending_deps: HashSet<String>,
    /// Names of tools this recipe has loaded so far.
    pub loaded_tools: BTreeSet<String>,
    pub output_dir: PathBuf,
    /// Per-build scratch directory; assigned on first run.
    pub temp_dir: Option<PathBuf>,
    /// Fiber handle; non-null exactly while Running or Suspended.
    pub fiber: Option<Thread>,
    /// Wall-clock start of the most recent Running transition.
    pub start_time: Option<Instant>,
}

impl Recipe {
    pub fn new(target_name: impl Into<String>, output_dir: PathBuf) -> Recipe {
        let target_name = target_name.into();
        debug!(target = %target_name, "created recipe");
        Recipe {
            target_name,
            state: RecipeState::Pending,
            request_key: None,
            declared_deps: Vec::new(),
            declared_set: HashSet::new(),
            pending_deps: HashSet::new(),
            loaded_tools: BTreeSet::new(),
            output_dir,
            temp_dir: None,
            fiber: None,
            start_time: None,
        }
    }

    pub fn state(&self) -> RecipeState {
        self.state
    }

    /// Transition to a new state. Terminal states are sticky: once a recipe
    /// is Complete or Failed it never transitions again.
    pub fn set_state(&mut self, next: RecipeState) {
        if self.state.is_terminal() {
            debug!(
                target = %self.target_name,
                from = ?self.state,
                to = ?next,
                "ignoring transition out of terminal state"
            );
            return;
        }
        self.state = next;
    }

    /// Record a dependency path. Returns true if it was not already known.
    pub fn add_declared_dep(&mut self, path: &str) -> bool {
        if self.declared_set.contains(path) {
            return false;
        }
        self.declared_set.insert(path.to_string());
        self.declared_deps.push(path.to_string());
        debug!(target = %self.target_name, dep = %path, "declared dependency");
        true
    }

    /// Dependency paths in first-observed order.
    pub fn declared_deps(&self) -> &[String] {
        &self.declared_deps
    }

    pub fn has_declared_dep(&self, path: &str) -> bool {
        self.declared_set.contains(path)
    }

    /// Compose the request key for this recipe.
    ///
    /// Starts from the hash of the code defining the target's function, then
    /// folds in the target name, every declared dependency path (sorted),
    /// every loaded tool's binary and module hashes (sorted by tool name),
    /// and the configuration hash when a configuration is set. Sorting makes
    /// the key independent of discovery order.
    pub fn compute_request_key(
        &self,
        recipe_code_hash: &Hash,
        tools: &ToolRegistry,
        config: &BuildConfig,
    ) -> Hash {
        let mut key = *recipe_code_hash;
        key.combine(&hash_bytes(self.target_name.as_bytes()));

        let mut deps: Vec<&String> = self.declared_deps.iter().collect();
        deps.sort();
        for dep in deps {
            key.combine(&hash_bytes(dep.as_bytes()));
        }

        // BTreeSet iterates in sorted order.
        for tool_name in &self.loaded_tools {
            if let Some(tool) = tools.get(tool_name) {
                key.combine(&tool.binary_hash);
                key.combine(&tool.module_hash);
            }
        }

        if !config.is_empty() {
            key.combine(&config.hash());
        }

        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::Tool;

    fn recipe(name: &str) -> Recipe {
        Recipe::new(name, PathBuf::from(format!("outputs/{}", name)))
    }

    #[test]
    fn new_recipe_is_pending() {
        let r = recipe("app");
        assert_eq!(r.state(), RecipeState::Pending);
        assert!(r.request_key.is_none());
        assert!(r.declared_deps().is_empty());
        assert!(r.fiber.is_none());
    }

    #[test]
    fn terminal_states_are_sticky() {
        let mut r = recipe("app");
        r.set_state(RecipeState::Running);
        r.set_state(RecipeState::Complete);
        r.set_state(RecipeState::Pending);
        assert_eq!(r.state(), RecipeState::Complete);

        let mut f = recipe("other");
        f.set_state(RecipeState::Failed);
        f.set_state(RecipeState::Running);
        assert_eq!(f.state(), RecipeState::Failed);
    }

    #[test]
    fn declared_deps_deduplicate_but_keep_order() {
        let mut r = recipe("app");
        assert!(r.add_declared_dep("src/b.c"));
        assert!(r.add_declared_dep("src/a.c"));
        assert!(!r.add_declared_dep("src/b.c"));
        assert_eq!(r.declared_deps(), ["src/b.c", "src/a.c"]);
        assert!(r.has_declared_dep("src/a.c"));
    }

    #[test]
    fn request_key_is_stable_under_registration_order() {
        let code = hash_bytes(b"fn bytecode");
        let tools = ToolRegistry::default();
        let config = BuildConfig::new();

        let mut a = recipe("app");
        a.add_declared_dep("src/one.c");
        a.add_declared_dep("src/two.c");

        let mut b = recipe("app");
        b.add_declared_dep("src/two.c");
        b.add_declared_dep("src/one.c");

        assert_eq!(
            a.compute_request_key(&code, &tools, &config),
            b.compute_request_key(&code, &tools, &config)
        );
    }

    #[test]
    fn request_key_depends_on_inputs() {
        let code = hash_bytes(b"fn bytecode");
        let tools = ToolRegistry::default();
        let config = BuildConfig::new();

        let base = recipe("app").compute_request_key(&code, &tools, &config);

        // Different target name.
        assert_ne!(
            recipe("other").compute_request_key(&code, &tools, &config),
            base
        );

        // Different code hash.
        assert_ne!(
            recipe("app").compute_request_key(&hash_bytes(b"edited"), &tools, &config),
            base
        );

        // Extra dependency.
        let mut with_dep = recipe("app");
        with_dep.add_declared_dep("src/extra.c");
        assert_ne!(with_dep.compute_request_key(&code, &tools, &config), base);

        // Non-empty configuration.
        let mut cfg = BuildConfig::new();
        cfg.set("opt", "3");
        assert_ne!(recipe("app").compute_request_key(&code, &tools, &cfg), base);
    }

    #[test]
    fn request_key_mixes_loaded_tools() {
        let code = hash_bytes(b"fn bytecode");
        let config = BuildConfig::new();

        let mut tools = ToolRegistry::default();
        tools.insert(Tool {
            name: "cc".to_string(),
            binary_path: PathBuf::from("/usr/bin/cc"),
            binary_hash: hash_bytes(b"cc v1"),
            module_path: PathBuf::from("tools/cc.lua"),
            module_hash: Hash::ZERO,
        });

        let bare = recipe("app").compute_request_key(&code, &tools, &config);

        let mut with_tool = recipe("app");
        with_tool.loaded_tools.insert("cc".to_string());
        let keyed = with_tool.compute_request_key(&code, &tools, &config);
        assert_ne!(keyed, bare);

        // Upgrading the tool changes the key.
        tools.insert(Tool {
            name: "cc".to_string(),
            binary_path: PathBuf::from("/usr/bin/cc"),
            binary_hash: hash_bytes(b"cc v2"),
            module_path: PathBuf::from("tools/cc.lua"),
            module_hash: Hash::ZERO,
        });
        assert_ne!(with_tool.compute_request_key(&code, &tools, &config), keyed);
    }
}
