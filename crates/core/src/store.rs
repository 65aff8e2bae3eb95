//! Content-addressed store for rebuild
//!
//! The store backs the trace cache and build outputs. Layout:
//! ```text
//! <root>/
//! ├── traces/<hex[0:2]>/<hex[2:]>   # one trace per request key
//! ├── objects/<hex[0:2]>/<hex[2:]>  # content-addressed blobs
//! └── tmp/<target>_<secs>_<pid>/    # per-build scratch directories
//! ```
//!
//! The root is `$XDG_DATA_HOME/rebuild` when `XDG_DATA_HOME` is set to an
//! absolute path, otherwise `$HOME/.local/share/rebuild`. Shard directories
//! are created lazily; both path construction and shard creation are
//! idempotent and tolerate concurrent creation.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::hash::Hash;
use crate::{Error, Result};

/// Directory name under the XDG data home.
pub const APP_DIR: &str = "rebuild";

/// The rebuild store
pub struct Store {
    root: PathBuf,
    traces: PathBuf,
    objects: PathBuf,
    tmp: PathBuf,
}

impl Store {
    /// Open (creating if needed) the store at the XDG-derived default root.
    pub fn from_env() -> Result<Store> {
        Self::open(default_root()?)
    }

    /// Open (creating if needed) a store at an explicit root.
    pub fn open(root: impl Into<PathBuf>) -> Result<Store> {
        let root = root.into();
        let store = Store {
            traces: root.join("traces"),
            objects: root.join("objects"),
            tmp: root.join("tmp"),
            root,
        };

        fs::create_dir_all(&store.root)?;
        fs::create_dir_all(&store.traces)?;
        fs::create_dir_all(&store.objects)?;
        fs::create_dir_all(&store.tmp)?;

        debug!(root = %store.root.display(), "store opened");
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the trace for a request key, creating its shard directory.
    pub fn trace_path(&self, key: &Hash) -> Result<PathBuf> {
        sharded_path(&self.traces, key, true)
    }

    /// Path of the object for a content hash, creating its shard directory.
    pub fn object_path(&self, key: &Hash) -> Result<PathBuf> {
        sharded_path(&self.objects, key, true)
    }

    /// Whether a trace exists for this request key. Purely `stat`-based;
    /// never reads or creates anything.
    pub fn trace_exists(&self, key: &Hash) -> bool {
        sharded_path(&self.traces, key, false)
            .map(|p| p.is_file())
            .unwrap_or(false)
    }

    /// Whether an object exists for this content hash.
    pub fn object_exists(&self, key: &Hash) -> bool {
        sharded_path(&self.objects, key, false)
            .map(|p| p.exists())
            .unwrap_or(false)
    }

    /// Create a fresh scratch directory for one build of `target`.
    ///
    /// Named `<target>_<unix_secs>_<pid>` so directories are never reused
    /// across processes.
    pub fn tmp_dir(&self, target: &str) -> Result<PathBuf> {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let dir = self
            .tmp
            .join(format!("{}_{}_{}", target, secs, std::process::id()));
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

/// `<base>/<hex[0:2]>/<hex[2:]>`, optionally creating the shard directory.
fn sharded_path(base: &Path, key: &Hash, create_shard: bool) -> Result<PathBuf> {
    let hex = key.to_hex();
    let shard = base.join(&hex[..2]);
    if create_shard {
        // create_dir_all is a no-op when the shard already exists, so
        // concurrent creation of the same shard cannot fail with EEXIST.
        fs::create_dir_all(&shard)?;
    }
    Ok(shard.join(&hex[2..]))
}

/// `$XDG_DATA_HOME/rebuild` when absolute, else `$HOME/.local/share/rebuild`.
fn default_root() -> Result<PathBuf> {
    if let Ok(xdg) = env::var("XDG_DATA_HOME") {
        let xdg = PathBuf::from(xdg);
        if xdg.is_absolute() {
            return Ok(xdg.join(APP_DIR));
        }
    }
    let home = env::var("HOME").map_err(|_| Error::NoDataDir)?;
    Ok(PathBuf::from(home).join(".local/share").join(APP_DIR))
}
