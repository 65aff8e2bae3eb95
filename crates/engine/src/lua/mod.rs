//! The script bridge: an embedded Lua runtime exposing the rebuild host API.
//!
//! Recipes are ordinary Lua functions run as coroutines. The host registers
//! the `rebuild` global table ([`host`]) and a small Lua prelude
//! ([`runtime`]) that turns the raw polling primitives into suspending
//! `depend_on` / `depend_on_all` calls.

mod host;
mod runtime;

pub(crate) use runtime::create_runtime;
