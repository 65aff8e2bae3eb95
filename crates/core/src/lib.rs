//! rebuild-core: the storage and caching layer of the rebuild build engine.
//!
//! This crate holds the pieces that know nothing about recipes or scripts:
//! - [`hash`]: 256-bit content hashing over bytes, files, and directory trees
//! - [`store`]: the content-addressed on-disk store (`traces/`, `objects/`,
//!   `tmp/`)
//! - [`trace`]: constructive traces — the persisted proof that a prior build
//!   for a request key read exactly these dependencies with these hashes

pub mod error;
pub mod hash;
pub mod store;
pub mod trace;

pub use error::{Error, Result};
pub use hash::{hash_bytes, hash_file, hash_tree, Hash};
pub use store::Store;
pub use trace::Trace;
