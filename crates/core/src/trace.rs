//! Constructive traces
//!
//! A trace is the record written after a recipe completes successfully: the
//! request key it answered, every dependency path the recipe read together
//! with that dependency's content hash at completion time, the hash of the
//! produced output tree, and timings. A later build for the same request key
//! is served from cache exactly when every recorded dependency still hashes
//! to its recorded value.
//!
//! On-disk format (all integers little-endian):
//! ```text
//! magic   "RBTR" (4 bytes)
//! version u32 = 1
//! key     32 bytes
//! count   u64
//! per dep: len u32 (≤ 4096), path bytes, hash 32 bytes
//! output tree hash 32 bytes
//! cpu_ms  u64
//! wall_ms u64
//! ```

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::debug;

use crate::hash::{hash_file, hash_tree, Hash, HASH_LEN};
use crate::store::Store;
use crate::{Error, Result};

const TRACE_MAGIC: &[u8; 4] = b"RBTR";
const TRACE_VERSION: u32 = 1;

/// Longest dependency path a trace will record or accept.
pub const MAX_DEP_PATH_LEN: usize = 4096;

/// A constructive trace for one request key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    request_key: Hash,
    deps: Vec<(String, Hash)>,
    output_tree_hash: Hash,
    cpu_ms: u64,
    wall_ms: u64,
}

impl Trace {
    /// An empty trace with zero timings.
    pub fn new(request_key: Hash) -> Trace {
        Trace {
            request_key,
            deps: Vec::new(),
            output_tree_hash: Hash::ZERO,
            cpu_ms: 0,
            wall_ms: 0,
        }
    }

    pub fn request_key(&self) -> &Hash {
        &self.request_key
    }

    /// Dependencies in the order they were first observed by the recipe.
    pub fn deps(&self) -> &[(String, Hash)] {
        &self.deps
    }

    pub fn output_tree_hash(&self) -> &Hash {
        &self.output_tree_hash
    }

    pub fn set_output_tree_hash(&mut self, hash: Hash) {
        self.output_tree_hash = hash;
    }

    pub fn cpu_ms(&self) -> u64 {
        self.cpu_ms
    }

    pub fn wall_ms(&self) -> u64 {
        self.wall_ms
    }

    pub fn set_timings(&mut self, cpu_ms: u64, wall_ms: u64) {
        self.cpu_ms = cpu_ms;
        self.wall_ms = wall_ms;
    }

    /// Append a dependency. Order is significant: validation walks the list
    /// front to back and stops at the first mismatch.
    pub fn add_dependency(&mut self, path: impl Into<String>, hash: Hash) {
        self.deps.push((path.into(), hash));
    }

    /// Check every recorded dependency against the filesystem.
    ///
    /// Returns true only if each dependency still exists and hashes to its
    /// recorded value. Stops at the first mismatch (early cutoff), so a
    /// fully cached no-op build pays for hashing only up to the first
    /// change.
    pub fn validate(&self) -> bool {
        self.first_stale_dependency().is_none()
    }

    /// The index and path of the first dependency that no longer matches,
    /// or `None` when the whole trace is still valid.
    ///
    /// A dependency that is missing or cannot be hashed counts as stale.
    pub fn first_stale_dependency(&self) -> Option<(usize, &str)> {
        for (i, (path, expected)) in self.deps.iter().enumerate() {
            let p = Path::new(path);
            let meta = match fs::metadata(p) {
                Ok(meta) => meta,
                Err(_) => {
                    debug!(path = %path, "trace dependency missing");
                    return Some((i, path));
                }
            };

            let actual = if meta.is_dir() { hash_tree(p) } else { hash_file(p) };
            match actual {
                Ok(h) if h == *expected => {}
                _ => {
                    debug!(path = %path, "trace dependency changed");
                    return Some((i, path));
                }
            }
        }
        None
    }

    /// Persist this trace under its request key.
    pub fn save(&self, store: &Store) -> Result<()> {
        let path = store.trace_path(&self.request_key)?;
        let mut w = BufWriter::new(File::create(&path)?);

        w.write_all(TRACE_MAGIC)?;
        w.write_all(&TRACE_VERSION.to_le_bytes())?;
        w.write_all(&self.request_key.0)?;
        w.write_all(&(self.deps.len() as u64).to_le_bytes())?;
        for (dep_path, dep_hash) in &self.deps {
            if dep_path.len() > MAX_DEP_PATH_LEN {
                return Err(Error::DepPathTooLong(dep_path.clone()));
            }
            w.write_all(&(dep_path.len() as u32).to_le_bytes())?;
            w.write_all(dep_path.as_bytes())?;
            w.write_all(&dep_hash.0)?;
        }
        w.write_all(&self.output_tree_hash.0)?;
        w.write_all(&self.cpu_ms.to_le_bytes())?;
        w.write_all(&self.wall_ms.to_le_bytes())?;
        w.flush()?;

        debug!(key = %self.request_key, deps = self.deps.len(), "trace saved");
        Ok(())
    }

    /// Load the trace for a request key.
    ///
    /// Returns [`Error::TraceNotFound`] when no trace exists, and
    /// [`Error::TraceCorrupt`] for bad magic, an unsupported version, an
    /// oversized path length, truncation, or a stored key that does not
    /// match the lookup key.
    pub fn load(request_key: &Hash, store: &Store) -> Result<Trace> {
        if !store.trace_exists(request_key) {
            return Err(Error::TraceNotFound(request_key.to_hex()));
        }
        let path = store.trace_path(request_key)?;
        let mut r = BufReader::new(File::open(&path)?);

        let corrupt = |reason: &str| Error::TraceCorrupt {
            path: path.clone(),
            reason: reason.to_string(),
        };

        let mut magic = [0u8; 4];
        read_exact(&mut r, &mut magic).map_err(|_| corrupt("truncated header"))?;
        if &magic != TRACE_MAGIC {
            return Err(corrupt("bad magic"));
        }

        let version = read_u32(&mut r).map_err(|_| corrupt("truncated header"))?;
        if version != TRACE_VERSION {
            return Err(corrupt(&format!("unsupported version {}", version)));
        }

        let mut key_bytes = [0u8; HASH_LEN];
        read_exact(&mut r, &mut key_bytes).map_err(|_| corrupt("truncated key"))?;
        if Hash(key_bytes) != *request_key {
            return Err(corrupt("request key mismatch"));
        }

        let mut trace = Trace::new(*request_key);

        let count = read_u64(&mut r).map_err(|_| corrupt("truncated dependency count"))?;
        for _ in 0..count {
            let len = read_u32(&mut r).map_err(|_| corrupt("truncated dependency"))? as usize;
            if len > MAX_DEP_PATH_LEN {
                return Err(corrupt(&format!("dependency path length {} too large", len)));
            }
            let mut path_bytes = vec![0u8; len];
            read_exact(&mut r, &mut path_bytes).map_err(|_| corrupt("truncated dependency path"))?;
            let dep_path = String::from_utf8(path_bytes)
                .map_err(|_| corrupt("dependency path is not valid UTF-8"))?;

            let mut hash_bytes = [0u8; HASH_LEN];
            read_exact(&mut r, &mut hash_bytes).map_err(|_| corrupt("truncated dependency hash"))?;
            trace.add_dependency(dep_path, Hash(hash_bytes));
        }

        let mut out_bytes = [0u8; HASH_LEN];
        read_exact(&mut r, &mut out_bytes).map_err(|_| corrupt("truncated output hash"))?;
        trace.output_tree_hash = Hash(out_bytes);
        trace.cpu_ms = read_u64(&mut r).map_err(|_| corrupt("truncated timings"))?;
        trace.wall_ms = read_u64(&mut r).map_err(|_| corrupt("truncated timings"))?;

        debug!(key = %request_key, deps = trace.deps.len(), "trace loaded");
        Ok(trace)
    }
}

fn read_exact(r: &mut impl Read, buf: &mut [u8]) -> std::io::Result<()> {
    r.read_exact(buf)
}

fn read_u32(r: &mut impl Read) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(r: &mut impl Read) -> std::io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}
