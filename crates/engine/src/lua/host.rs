//! Host primitives exposed to build scripts.
//!
//! Everything a script can ask of the engine lives on the global `rebuild`
//! table:
//!
//! | primitive           | may suspend | effect                                     |
//! |---------------------|-------------|--------------------------------------------|
//! | `depend_on`         | yes         | ensure a target is built, return its path  |
//! | `depend_on_all`     | yes         | same for a sequence of targets             |
//! | `sys`               | no          | spawn a subprocess, capture its output     |
//! | `register_dep`      | no          | record a file dependency                   |
//! | `glob`              | no          | expand a pattern against the project root  |
//! | `hash_file`         | no          | content-hash a file, hex string            |
//! | `deptool`           | no          | load a tool, return its handle             |
//! | `register_target`   | no          | declare a target while the build file runs |
//! | `output_dir`        | no          | the current recipe's output directory      |
//! | `temp_dir`          | no          | the current recipe's scratch directory     |
//! | `log_info`/`log_debug` | no       | emit to the host log                       |
//!
//! The suspending pair is assembled in the prelude from `_poll_dep` /
//! `_poll_deps`. Every closure captures the shared engine state and consults
//! the per-fiber context (the scheduler's notion of the current recipe)
//! through it; nothing here reads global mutable state.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use globset::Glob;
use mlua::prelude::*;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::process;
use crate::scheduler::EngineState;

pub(crate) fn register_host_api(lua: &Lua, state: Rc<RefCell<EngineState>>) -> LuaResult<()> {
    let rebuild = lua.create_table()?;

    // The opaque key/value configuration, exposed as a plain table.
    let config = lua.create_table()?;
    for (key, value) in state.borrow().config.iter() {
        config.set(key.as_str(), value.as_str())?;
    }
    rebuild.set("config", config)?;

    {
        let state = state.clone();
        rebuild.set(
            "register_target",
            lua.create_function(move |_, (name, function_name): (String, String)| {
                state.borrow_mut().targets.register(name, function_name);
                Ok(())
            })?,
        )?;
    }

    {
        let state = state.clone();
        rebuild.set(
            "register_dep",
            lua.create_function(move |_, path: String| state.borrow_mut().register_dep(&path))?,
        )?;
    }

    {
        let state = state.clone();
        rebuild.set(
            "_poll_dep",
            lua.create_function(move |_, target: String| {
                state.borrow_mut().poll_dependency(&target)
            })?,
        )?;
    }

    {
        let state = state.clone();
        rebuild.set(
            "_poll_deps",
            lua.create_function(move |_, targets: Vec<String>| {
                state.borrow_mut().poll_dependencies(&targets)
            })?,
        )?;
    }

    {
        let state = state.clone();
        rebuild.set(
            "sys",
            lua.create_function(move |lua, (argv, opts): (Vec<String>, Option<LuaTable>)| {
                if argv.is_empty() {
                    return Err(LuaError::RuntimeError(
                        "sys requires a non-empty argument vector".into(),
                    ));
                }

                let (mut cwd, project_root) = {
                    let st = state.borrow();
                    let recipe = st.current_recipe().ok_or_else(|| {
                        LuaError::RuntimeError("sys is only available inside a recipe".into())
                    })?;
                    let cwd = recipe
                        .temp_dir
                        .clone()
                        .unwrap_or_else(|| st.project_root.clone());
                    (cwd, st.project_root.clone())
                };

                let mut env = BTreeMap::new();
                if let Some(opts) = opts {
                    let dir: Option<String> = opts.get("cwd")?;
                    if let Some(dir) = dir {
                        let dir = PathBuf::from(dir);
                        cwd = if dir.is_absolute() { dir } else { project_root.join(dir) };
                    }
                    let env_table: Option<LuaTable> = opts.get("env")?;
                    if let Some(env_table) = env_table {
                        for pair in env_table.pairs::<String, String>() {
                            let (key, value) = pair?;
                            env.insert(key, value);
                        }
                    }
                }

                // No engine state is borrowed while the child runs.
                let outcome = process::run_command(&argv, &cwd, &env).map_err(|err| {
                    LuaError::RuntimeError(format!("sys failed to spawn {:?}: {}", argv[0], err))
                })?;

                let result = lua.create_table()?;
                result.set("exit_code", outcome.exit_code)?;
                result.set("stdout", outcome.stdout)?;
                result.set("stderr", outcome.stderr)?;
                Ok(result)
            })?,
        )?;
    }

    {
        let state = state.clone();
        rebuild.set(
            "glob",
            lua.create_function(move |_, pattern: String| {
                let root = state.borrow().project_root.clone();
                glob_paths(&root, &pattern)
            })?,
        )?;
    }

    {
        let state = state.clone();
        rebuild.set(
            "hash_file",
            lua.create_function(move |_, path: String| {
                let resolved = state.borrow().resolve_path(&path);
                rebuild_core::hash_file(Path::new(&resolved))
                    .map(|hash| hash.to_hex())
                    .map_err(|err| {
                        LuaError::RuntimeError(format!("hash_file {:?}: {}", path, err))
                    })
            })?,
        )?;
    }

    {
        let state = state.clone();
        rebuild.set(
            "deptool",
            lua.create_function(move |lua, name: String| {
                let tool = state
                    .borrow_mut()
                    .load_tool_for_current(&name)
                    .map_err(|err| LuaError::RuntimeError(err.to_string()))?;

                let result = lua.create_table()?;
                result.set("name", tool.name)?;
                result.set("binary_path", tool.binary_path.to_string_lossy().into_owned())?;
                result.set("binary_hash", tool.binary_hash.to_hex())?;
                result.set("module_path", tool.module_path.to_string_lossy().into_owned())?;
                result.set("module_hash", tool.module_hash.to_hex())?;
                Ok(result)
            })?,
        )?;
    }

    {
        let state = state.clone();
        rebuild.set(
            "output_dir",
            lua.create_function(move |_, ()| {
                let st = state.borrow();
                let recipe = st.current_recipe().ok_or_else(|| {
                    LuaError::RuntimeError("output_dir is only available inside a recipe".into())
                })?;
                Ok(recipe.output_dir.to_string_lossy().into_owned())
            })?,
        )?;
    }

    {
        let state = state.clone();
        rebuild.set(
            "temp_dir",
            lua.create_function(move |_, ()| {
                let st = state.borrow();
                let recipe = st.current_recipe().ok_or_else(|| {
                    LuaError::RuntimeError("temp_dir is only available inside a recipe".into())
                })?;
                recipe
                    .temp_dir
                    .as_ref()
                    .map(|dir| dir.to_string_lossy().into_owned())
                    .ok_or_else(|| {
                        LuaError::RuntimeError("recipe has no scratch directory yet".into())
                    })
            })?,
        )?;
    }

    rebuild.set(
        "log_info",
        lua.create_function(|_, message: String| {
            info!(target: "script", "{}", message);
            Ok(())
        })?,
    )?;
    rebuild.set(
        "log_debug",
        lua.create_function(|_, message: String| {
            debug!(target: "script", "{}", message);
            Ok(())
        })?,
    )?;

    lua.globals().set("rebuild", rebuild)?;
    Ok(())
}

/// Expand a shell-style pattern against the project root. Matches are
/// returned as sorted root-relative paths.
fn glob_paths(root: &Path, pattern: &str) -> LuaResult<Vec<String>> {
    let matcher = Glob::new(pattern)
        .map_err(|err| LuaError::RuntimeError(format!("invalid glob pattern {:?}: {}", pattern, err)))?
        .compile_matcher();

    let mut matches = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_map(|entry| entry.ok()) {
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        if rel.as_os_str().is_empty() {
            continue;
        }
        if matcher.is_match(rel) {
            matches.push(rel.to_string_lossy().into_owned());
        }
    }
    matches.sort();
    Ok(matches)
}
