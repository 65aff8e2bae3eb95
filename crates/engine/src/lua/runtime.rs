use std::cell::RefCell;
use std::rc::Rc;

use mlua::prelude::*;

use super::host;
use crate::scheduler::EngineState;

/// Lua source installed at runtime creation; wraps the raw dependency
/// primitives in coroutine-yielding loops.
const PRELUDE: &str = include_str!("prelude.lua");

pub(crate) fn create_runtime(state: Rc<RefCell<EngineState>>) -> LuaResult<Lua> {
    let lua = Lua::new();

    host::register_host_api(&lua, state)?;
    lua.load(PRELUDE).set_name("@[rebuild prelude]").exec()?;

    Ok(lua)
}
