//! Recipe scheduler
//!
//! The scheduler orchestrates build recipes with support for:
//! - dynamic dependency discovery (recipes request dependencies while they
//!   run, through the `depend_on` host primitives)
//! - suspension (a recipe's fiber yields while a dependency is in flight and
//!   is resumed when it completes)
//! - constructive-trace caching (a recipe whose recorded dependencies still
//!   hash to their recorded values is served from cache without running)
//!
//! Recipes are tracked in a map keyed by target name; the ready queue and
//! the waiters map hold target names, never owning references. Execution is
//! single-threaded and cooperative: the only suspension points are the
//! dependency primitives.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;

use mlua::{Function, Lua, ThreadStatus};
use rebuild_core::{hash_bytes, hash_file, hash_tree, Hash, Store, Trace};
use tracing::{debug, error, info, warn};

use crate::config::BuildConfig;
use crate::error::{EngineError, Result};
use crate::lua;
use crate::recipe::{Recipe, RecipeState};
use crate::target::TargetRegistry;
use crate::tool::{Tool, ToolRegistry};

/// Shared mutable state of one build.
///
/// Host primitives reach this through the `Rc<RefCell<_>>` captured in their
/// closures; the scheduler borrows it in short scopes and never holds a
/// borrow across a fiber resume.
pub(crate) struct EngineState {
    pub(crate) recipes: HashMap<String, Recipe>,
    pub(crate) completed: HashMap<String, PathBuf>,
    /// Target name → names of recipes suspended on it.
    pub(crate) waiting: HashMap<String, Vec<String>>,
    pub(crate) ready: VecDeque<String>,
    pub(crate) targets: TargetRegistry,
    pub(crate) tools: ToolRegistry,
    pub(crate) store: Store,
    pub(crate) config: BuildConfig,
    /// Hash of the raw build file bytes; fallback for recipe code hashing.
    pub(crate) code_hash: Hash,
    pub(crate) project_root: PathBuf,
    /// The recipe whose fiber is currently running, if any. This is the
    /// per-fiber context the host primitives consult.
    pub(crate) current: Option<String>,
    /// First failed target, set once.
    pub(crate) failed: Option<String>,
}

impl EngineState {
    pub(crate) fn new(store: Store, config: BuildConfig, project_root: PathBuf) -> EngineState {
        EngineState {
            recipes: HashMap::new(),
            completed: HashMap::new(),
            waiting: HashMap::new(),
            ready: VecDeque::new(),
            targets: TargetRegistry::new(),
            tools: ToolRegistry::from_path_env(),
            store,
            config,
            code_hash: Hash::ZERO,
            project_root,
            current: None,
            failed: None,
        }
    }

    pub(crate) fn get_or_create_recipe(&mut self, name: &str) -> &mut Recipe {
        let output_dir = self.project_root.join("outputs").join(name);
        self.recipes
            .entry(name.to_string())
            .or_insert_with(|| Recipe::new(name, output_dir))
    }

    pub(crate) fn current_recipe(&self) -> Option<&Recipe> {
        self.current.as_ref().and_then(|name| self.recipes.get(name))
    }

    /// Resolve a script-supplied path against the project root.
    pub(crate) fn resolve_path(&self, path: &str) -> String {
        let p = Path::new(path);
        if p.is_absolute() {
            path.to_string()
        } else {
            self.project_root.join(p).to_string_lossy().into_owned()
        }
    }

    /// Record a file dependency of the current recipe. Never suspends.
    pub(crate) fn register_dep(&mut self, path: &str) -> mlua::Result<()> {
        let Some(current) = self.current.clone() else {
            return Err(mlua::Error::RuntimeError(
                "register_dep is only available inside a recipe".into(),
            ));
        };
        let resolved = self.resolve_path(path);
        if let Some(recipe) = self.recipes.get_mut(&current) {
            recipe.add_declared_dep(&resolved);
        }
        Ok(())
    }

    /// One step of the dynamic-dependency protocol.
    ///
    /// Returns the dependency's output path when it is already complete.
    /// Otherwise records the current recipe as a waiter, queues the
    /// dependency if it has never run, and returns `None` — the prelude then
    /// yields the fiber.
    pub(crate) fn poll_dependency(&mut self, dep_target: &str) -> mlua::Result<Option<String>> {
        let requester = self.current.clone().ok_or_else(|| {
            mlua::Error::RuntimeError("depend_on is only available inside a recipe".into())
        })?;

        if !self.targets.contains(dep_target) {
            return Err(mlua::Error::RuntimeError(format!(
                "target not found: {}",
                dep_target
            )));
        }

        let dep_out = self
            .get_or_create_recipe(dep_target)
            .output_dir
            .to_string_lossy()
            .into_owned();

        if let Some(recipe) = self.recipes.get_mut(&requester) {
            recipe.add_declared_dep(&dep_out);
        }

        if self.completed.contains_key(dep_target) {
            if let Some(recipe) = self.recipes.get_mut(&requester) {
                recipe.pending_deps.remove(&dep_out);
            }
            debug!(recipe = %requester, dep = %dep_target, "dependency already complete");
            return Ok(Some(dep_out));
        }

        let dep_state = self
            .recipes
            .get(dep_target)
            .map(|recipe| recipe.state())
            .unwrap_or(RecipeState::Pending);

        if let Some(recipe) = self.recipes.get_mut(&requester) {
            recipe.set_state(RecipeState::Suspended);
            recipe.pending_deps.insert(dep_out);
        }

        let waiters = self.waiting.entry(dep_target.to_string()).or_default();
        if !waiters.contains(&requester) {
            waiters.push(requester.clone());
        }

        // A dependency that is Running or Suspended is already in flight;
        // only a never-started one gets queued.
        if dep_state == RecipeState::Pending {
            self.ready.push_back(dep_target.to_string());
            debug!(dep = %dep_target, "queued dependency");
        }

        debug!(recipe = %requester, dep = %dep_target, "suspending on dependency");
        Ok(None)
    }

    /// Batched variant of [`EngineState::poll_dependency`]: registers every
    /// dependency up front (so trace order reflects the call), returns all
    /// output paths once every target is complete, and `None` otherwise.
    pub(crate) fn poll_dependencies(
        &mut self,
        dep_targets: &[String],
    ) -> mlua::Result<Option<Vec<String>>> {
        let requester = self.current.clone().ok_or_else(|| {
            mlua::Error::RuntimeError("depend_on_all is only available inside a recipe".into())
        })?;

        for dep_target in dep_targets {
            if !self.targets.contains(dep_target) {
                return Err(mlua::Error::RuntimeError(format!(
                    "target not found: {}",
                    dep_target
                )));
            }
        }

        let mut outs = Vec::with_capacity(dep_targets.len());
        for dep_target in dep_targets {
            let out = self
                .get_or_create_recipe(dep_target)
                .output_dir
                .to_string_lossy()
                .into_owned();
            if let Some(recipe) = self.recipes.get_mut(&requester) {
                recipe.add_declared_dep(&out);
            }
            outs.push(out);
        }

        let all_complete = dep_targets
            .iter()
            .all(|dep_target| self.completed.contains_key(dep_target));
        if all_complete {
            if let Some(recipe) = self.recipes.get_mut(&requester) {
                for out in &outs {
                    recipe.pending_deps.remove(out);
                }
            }
            return Ok(Some(outs));
        }

        for (dep_target, out) in dep_targets.iter().zip(outs.iter()) {
            if self.completed.contains_key(dep_target) {
                continue;
            }
            let dep_state = self
                .recipes
                .get(dep_target)
                .map(|recipe| recipe.state())
                .unwrap_or(RecipeState::Pending);

            if let Some(recipe) = self.recipes.get_mut(&requester) {
                recipe.pending_deps.insert(out.clone());
            }
            let waiters = self.waiting.entry(dep_target.clone()).or_default();
            if !waiters.contains(&requester) {
                waiters.push(requester.clone());
            }
            if dep_state == RecipeState::Pending {
                self.ready.push_back(dep_target.clone());
            }
        }

        if let Some(recipe) = self.recipes.get_mut(&requester) {
            recipe.set_state(RecipeState::Suspended);
        }
        debug!(recipe = %requester, count = dep_targets.len(), "suspending on dependency set");
        Ok(None)
    }

    /// Load a tool for the current recipe: memoized lookup plus dependency
    /// registration, so a changed tool binary invalidates the recipe's trace
    /// on the next build.
    pub(crate) fn load_tool_for_current(&mut self, name: &str) -> Result<Tool> {
        let Some(current) = self.current.clone() else {
            return Err(EngineError::Script(mlua::Error::RuntimeError(
                "deptool is only available inside a recipe".into(),
            )));
        };

        let project_root = self.project_root.clone();
        let tool = self.tools.load(name, &project_root)?;

        if let Some(recipe) = self.recipes.get_mut(&current) {
            recipe.loaded_tools.insert(name.to_string());
            recipe.add_declared_dep(&tool.binary_path.to_string_lossy());
            if !tool.module_hash.is_zero() {
                recipe.add_declared_dep(&tool.module_path.to_string_lossy());
            }
        }
        Ok(tool)
    }

    /// If `path` is the canonical output directory of a registered target,
    /// return that target's name.
    pub(crate) fn target_for_output(&self, path: &str) -> Option<String> {
        let outputs_root = self.project_root.join("outputs");
        let rel = Path::new(path).strip_prefix(&outputs_root).ok()?;
        let mut components = rel.components();
        let name = match components.next()? {
            std::path::Component::Normal(os) => os.to_str()?,
            _ => return None,
        };
        if components.next().is_some() {
            return None;
        }
        self.targets.contains(name).then(|| name.to_string())
    }
}

/// The build scheduler: owns the script runtime and the engine state, and
/// drives recipes from `Pending` to `Complete` or `Failed`.
pub struct Scheduler {
    lua: Lua,
    state: Rc<RefCell<EngineState>>,
}

impl Scheduler {
    pub fn new(
        store: Store,
        config: BuildConfig,
        project_root: impl Into<PathBuf>,
    ) -> Result<Scheduler> {
        let state = Rc::new(RefCell::new(EngineState::new(
            store,
            config,
            project_root.into(),
        )));
        let lua = lua::create_runtime(state.clone())?;
        Ok(Scheduler { lua, state })
    }

    /// Execute a build file, populating the target registry.
    pub fn load_build_file(&self, path: &Path) -> Result<()> {
        let source = fs::read(path)?;
        self.state.borrow_mut().code_hash = hash_bytes(&source);

        self.lua
            .load(source.as_slice())
            .set_name(format!("@{}", path.display()))
            .exec()
            .map_err(|err| EngineError::ScriptLoad {
                path: path.to_path_buf(),
                source: err,
            })?;

        let count = self.state.borrow().targets.len();
        info!(path = %path.display(), targets = count, "build file loaded");
        Ok(())
    }

    /// All registered target names, sorted.
    pub fn targets(&self) -> Vec<String> {
        self.state.borrow().targets.names()
    }

    /// Lifecycle state of a target's recipe, if one was materialized during
    /// this build.
    pub fn recipe_state(&self, target: &str) -> Option<RecipeState> {
        self.state
            .borrow()
            .recipes
            .get(target)
            .map(|recipe| recipe.state())
    }

    /// Build one target, returning the path to its output directory.
    pub fn build(&self, target: &str) -> Result<PathBuf> {
        {
            let st = self.state.borrow();
            if !st.targets.contains(target) {
                return Err(EngineError::TargetNotFound(target.to_string()));
            }
            if let Some(path) = st.completed.get(target) {
                return Ok(path.clone());
            }
        }

        info!(target = %target, "building");

        let mut visited = HashSet::new();
        if self.probe_recipe(target, &mut visited) {
            info!(target = %target, "served from cache");
            let st = self.state.borrow();
            if let Some(path) = st.completed.get(target) {
                return Ok(path.clone());
            }
        }

        {
            let mut st = self.state.borrow_mut();
            st.get_or_create_recipe(target);
            st.ready.push_back(target.to_string());
        }
        self.run()?;

        let st = self.state.borrow();
        if let Some(failed) = st.failed.clone() {
            return Err(EngineError::BuildFailed { target: failed });
        }
        st.completed
            .get(target)
            .cloned()
            .ok_or_else(|| EngineError::BuildFailed {
                target: target.to_string(),
            })
    }

    /// Drain the ready queue until it is empty or a failure is recorded.
    fn run(&self) -> Result<()> {
        loop {
            let next = {
                let mut st = self.state.borrow_mut();
                if st.failed.is_some() {
                    // First failure wins; drain without executing.
                    st.ready.clear();
                    None
                } else {
                    st.ready.pop_front()
                }
            };
            let Some(name) = next else { break };
            self.execute(&name)?;
        }

        // An empty queue with recipes still suspended means nothing can make
        // progress: every waiter transitively waits on a member of a cycle.
        let st = self.state.borrow();
        if st.failed.is_none() {
            let mut suspended: Vec<String> = st
                .recipes
                .values()
                .filter(|recipe| recipe.state() == RecipeState::Suspended)
                .map(|recipe| recipe.target_name.clone())
                .collect();
            if !suspended.is_empty() {
                suspended.sort();
                return Err(EngineError::DependencyCycle { targets: suspended });
            }
        }
        Ok(())
    }

    /// Run one recipe until its fiber completes, suspends, or errors.
    fn execute(&self, name: &str) -> Result<()> {
        {
            let st = self.state.borrow();
            match st.recipes.get(name).map(|recipe| recipe.state()) {
                None => return Ok(()),
                // Idempotent drain: duplicate queue entries for settled
                // recipes are skipped. Pending recipes start their fiber;
                // Suspended ones resume it. A spurious resume (a stale
                // queue entry for a recipe still waiting on something) is
                // harmless: its next poll comes back empty and it yields
                // again.
                Some(RecipeState::Complete)
                | Some(RecipeState::Failed)
                | Some(RecipeState::Running) => return Ok(()),
                Some(RecipeState::Pending) | Some(RecipeState::Suspended) => {}
            }
        }

        // First sight of this recipe in the drain loop: probe the cache.
        let needs_probe = {
            let st = self.state.borrow();
            st.recipes
                .get(name)
                .map(|recipe| recipe.request_key.is_none())
                .unwrap_or(false)
        };
        if needs_probe {
            let mut visited = HashSet::new();
            if self.probe_recipe(name, &mut visited) {
                info!(target = %name, "served from cache");
                return Ok(());
            }
        }

        if let Err(err) = self.prepare_dirs(name) {
            self.fail_recipe(name, &format!("failed to prepare directories: {}", err));
            return Ok(());
        }

        // Create the fiber on first run; later pops resume the existing one.
        let create_fiber = {
            let st = self.state.borrow();
            st.recipes
                .get(name)
                .map(|recipe| recipe.fiber.is_none())
                .unwrap_or(false)
        };
        if create_fiber {
            let function_name = {
                let st = self.state.borrow();
                match st.targets.get(name) {
                    Some(target) => target.function_name.clone(),
                    None => {
                        drop(st);
                        self.fail_recipe(name, "target is not registered");
                        return Ok(());
                    }
                }
            };
            let func: Function = match self.lua.globals().get(function_name.as_str()) {
                Ok(func) => func,
                Err(_) => {
                    self.fail_recipe(
                        name,
                        &format!(
                            "recipe function {:?} is not defined in the build file",
                            function_name
                        ),
                    );
                    return Ok(());
                }
            };
            match self.lua.create_thread(func) {
                Ok(thread) => {
                    let mut st = self.state.borrow_mut();
                    if let Some(recipe) = st.recipes.get_mut(name) {
                        recipe.fiber = Some(thread);
                    }
                }
                Err(err) => {
                    self.fail_recipe(name, &format!("failed to create fiber: {}", err));
                    return Ok(());
                }
            }
        }

        let thread = {
            let mut st = self.state.borrow_mut();
            let state = &mut *st;
            let Some(recipe) = state.recipes.get_mut(name) else {
                return Ok(());
            };
            recipe.set_state(RecipeState::Running);
            recipe.start_time = Some(Instant::now());
            let Some(thread) = recipe.fiber.clone() else {
                return Ok(());
            };
            state.current = Some(name.to_string());
            thread
        };

        debug!(target = %name, "resuming recipe fiber");
        let resumed: mlua::Result<mlua::MultiValue> = thread.resume(());
        self.state.borrow_mut().current = None;

        match resumed {
            Err(err) => self.on_complete(name, Err(err)),
            Ok(_) => match thread.status() {
                ThreadStatus::Resumable => {
                    // The fiber yielded. A well-behaved recipe only yields
                    // through the dependency primitives, which left it
                    // Suspended with its waiter registered.
                    let suspended = {
                        let st = self.state.borrow();
                        st.recipes
                            .get(name)
                            .map(|recipe| recipe.state() == RecipeState::Suspended)
                            .unwrap_or(false)
                    };
                    if !suspended {
                        self.fail_recipe(name, "recipe yielded outside of a dependency request");
                    }
                }
                _ => self.on_complete(name, Ok(())),
            },
        }
        Ok(())
    }

    /// Ensure the recipe's output directory and scratch directory exist.
    fn prepare_dirs(&self, name: &str) -> Result<()> {
        let mut st = self.state.borrow_mut();
        let state = &mut *st;
        let Some(recipe) = state.recipes.get_mut(name) else {
            return Ok(());
        };
        fs::create_dir_all(&recipe.output_dir)?;
        if recipe.temp_dir.is_none() {
            recipe.temp_dir = Some(state.store.tmp_dir(name)?);
        }
        Ok(())
    }

    fn fail_recipe(&self, name: &str, message: &str) {
        self.on_complete(name, Err(mlua::Error::RuntimeError(message.to_string())));
    }

    /// Settle a recipe whose fiber finished or errored.
    ///
    /// On success: hash the output tree, record a trace over the declared
    /// dependencies in first-observed order, publish the output path, and
    /// re-queue every waiter. On failure: mark the recipe Failed and set the
    /// build-wide failure flag; waiters stay parked and the failure
    /// propagates when the queue drains.
    fn on_complete(&self, name: &str, result: std::result::Result<(), mlua::Error>) {
        match result {
            Ok(()) => {
                let (key, declared, out_dir, started) = {
                    let st = self.state.borrow();
                    let Some(recipe) = st.recipes.get(name) else {
                        return;
                    };
                    (
                        recipe.request_key,
                        recipe.declared_deps().to_vec(),
                        recipe.output_dir.clone(),
                        recipe.start_time,
                    )
                };
                let wall_ms = started
                    .map(|start| start.elapsed().as_millis() as u64)
                    .unwrap_or(0);

                let output_tree_hash = match hash_tree(&out_dir) {
                    Ok(hash) => hash,
                    Err(err) => {
                        warn!(target = %name, error = %err, "failed to hash output tree");
                        Hash::ZERO
                    }
                };

                // Trace recording is best-effort: a dependency that can no
                // longer be hashed downgrades this completion to uncached
                // rather than failing the build.
                if let Some(key) = key.or_else(|| self.request_key_for(name).ok()) {
                    let mut trace = Trace::new(key);
                    let mut recordable = true;
                    for dep in &declared {
                        match hash_dep_path(dep) {
                            Ok(hash) => trace.add_dependency(dep.clone(), hash),
                            Err(err) => {
                                warn!(
                                    target = %name,
                                    dep = %dep,
                                    error = %err,
                                    "cannot hash dependency; trace not recorded"
                                );
                                recordable = false;
                                break;
                            }
                        }
                    }
                    if recordable {
                        trace.set_output_tree_hash(output_tree_hash);
                        trace.set_timings(wall_ms, wall_ms);
                        let st = self.state.borrow();
                        if let Err(err) = trace.save(&st.store) {
                            warn!(target = %name, error = %err, "failed to save trace");
                        }
                    }
                }

                self.publish_complete(name, out_dir);
                info!(target = %name, wall_ms, "recipe complete");
            }
            Err(err) => {
                let mut st = self.state.borrow_mut();
                if let Some(recipe) = st.recipes.get_mut(name) {
                    recipe.set_state(RecipeState::Failed);
                    recipe.fiber = None;
                }
                if st.failed.is_none() {
                    st.failed = Some(name.to_string());
                }
                error!(target = %name, error = %err, "recipe failed");
            }
        }
    }

    /// Mark a recipe Complete, publish its output path, and re-queue every
    /// waiter.
    fn publish_complete(&self, name: &str, out_dir: PathBuf) {
        let waiters = {
            let mut st = self.state.borrow_mut();
            let state = &mut *st;
            if let Some(recipe) = state.recipes.get_mut(name) {
                recipe.set_state(RecipeState::Complete);
                recipe.fiber = None;
                recipe.pending_deps.clear();
            }
            state.completed.insert(name.to_string(), out_dir);
            state.waiting.remove(name).unwrap_or_default()
        };

        if !waiters.is_empty() {
            let mut st = self.state.borrow_mut();
            for waiter in waiters {
                // Waiters stay Suspended until the drain loop pops them and
                // resumes their fiber.
                debug!(recipe = %waiter, dep = %name, "re-queueing waiter");
                st.ready.push_back(waiter);
            }
        }
    }

    /// Try to serve `name` from the trace cache without executing anything.
    ///
    /// Walks the recorded dependencies in order. A dependency that is itself
    /// a target's output directory must be cache-clean too (recursively);
    /// if it is not, this recipe is conservatively stale and will
    /// re-execute, re-discovering its dependencies through the normal
    /// dynamic protocol. Validation stops at the first mismatch.
    fn probe_recipe(&self, name: &str, visited: &mut HashSet<String>) -> bool {
        {
            let st = self.state.borrow();
            if st.completed.contains_key(name) {
                return true;
            }
        }
        if !visited.insert(name.to_string()) {
            debug!(target = %name, "probe revisited; treating as stale");
            return false;
        }

        let key = match self.request_key_for(name) {
            Ok(key) => key,
            Err(err) => {
                debug!(target = %name, error = %err, "cannot compute request key");
                return false;
            }
        };

        let trace = {
            let st = self.state.borrow();
            match Trace::load(&key, &st.store) {
                Ok(trace) => trace,
                Err(rebuild_core::Error::TraceNotFound(_)) => {
                    debug!(target = %name, "no cached trace");
                    return false;
                }
                Err(err) => {
                    warn!(target = %name, error = %err, "unreadable trace; treating as cache miss");
                    return false;
                }
            }
        };

        for (dep_path, expected) in trace.deps() {
            let dep_target = self.state.borrow().target_for_output(dep_path);
            if let Some(dep_target) = dep_target {
                if !self.probe_recipe(&dep_target, visited) {
                    debug!(target = %name, dep = %dep_target, "dependency is stale");
                    return false;
                }
            }
            match hash_dep_path(dep_path) {
                Ok(actual) if actual == *expected => {}
                _ => {
                    debug!(target = %name, dep = %dep_path, "dependency changed");
                    return false;
                }
            }
        }

        let out_dir = {
            let mut st = self.state.borrow_mut();
            st.get_or_create_recipe(name).output_dir.clone()
        };
        if !out_dir.exists() {
            debug!(target = %name, "cached outputs missing; stale");
            return false;
        }

        debug!(target = %name, "trace valid; cache hit");
        self.publish_complete(name, out_dir);
        true
    }

    /// The request key for `name`, computed and cached on first use.
    ///
    /// Starts from the hash of the target function's own bytecode, stripped
    /// of debug info so editing one recipe does not shift every other
    /// recipe's key; falls back to the whole build file's hash when the
    /// bytecode is unavailable.
    fn request_key_for(&self, name: &str) -> Result<Hash> {
        {
            let st = self.state.borrow();
            if let Some(recipe) = st.recipes.get(name) {
                if let Some(key) = recipe.request_key {
                    return Ok(key);
                }
            }
        }

        let (function_name, file_hash) = {
            let st = self.state.borrow();
            let target = st
                .targets
                .get(name)
                .ok_or_else(|| EngineError::TargetNotFound(name.to_string()))?;
            (target.function_name.clone(), st.code_hash)
        };

        let func: Function = self
            .lua
            .globals()
            .get(function_name.as_str())
            .map_err(|_| EngineError::FunctionNotFound {
                target: name.to_string(),
                function: function_name.clone(),
            })?;
        let bytecode = func.dump(true);
        let code_hash = if bytecode.is_empty() {
            file_hash
        } else {
            hash_bytes(&bytecode)
        };

        let mut st = self.state.borrow_mut();
        let state = &mut *st;
        state.get_or_create_recipe(name);
        let Some(recipe) = state.recipes.get_mut(name) else {
            return Err(EngineError::TargetNotFound(name.to_string()));
        };
        let key = recipe.compute_request_key(&code_hash, &state.tools, &state.config);
        recipe.request_key = Some(key);
        debug!(target = %name, key = %key, "computed request key");
        Ok(key)
    }
}

/// Hash a recorded dependency path the way the trace model expects: files
/// by content, directories by tree.
fn hash_dep_path(path: &str) -> rebuild_core::Result<Hash> {
    let p = Path::new(path);
    let meta = fs::metadata(p)?;
    if meta.is_dir() {
        hash_tree(p)
    } else {
        hash_file(p)
    }
}
