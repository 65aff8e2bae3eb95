//! rebuild-engine: the part of rebuild that runs recipes.
//!
//! A build is orchestrated by the [`Scheduler`]: it materializes a
//! [`recipe::Recipe`] per requested target, probes the constructive-trace
//! cache, and runs cache misses as suspendable Lua fibers. Recipes discover
//! dependencies imperatively through the host primitives exposed by
//! [`lua`]; the scheduler suspends the requesting fiber, builds the
//! dependency, and resumes every waiter when it completes.

pub mod buildfile;
pub mod config;
pub mod error;
pub mod lua;
pub mod process;
pub mod recipe;
pub mod scheduler;
pub mod target;
pub mod tool;

pub use config::BuildConfig;
pub use error::{EngineError, Result};
pub use scheduler::Scheduler;
