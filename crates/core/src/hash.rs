//! Content hashing for the trace cache and object store.
//!
//! Everything the engine identifies — files, directory trees, recipe code,
//! tools, request keys — is a 32-byte SHA-256 value. Directory trees hash
//! deterministically: entries are sorted by name and each entry contributes
//! its name hash and its recursive content hash, folded together with XOR.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::warn;

use crate::{Error, Result};

/// Size of a hash in bytes.
pub const HASH_LEN: usize = 32;

/// A 256-bit content hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash(pub [u8; HASH_LEN]);

impl Hash {
    /// The all-zero hash, used as the XOR-fold accumulator seed and as the
    /// "no module" marker for tools.
    pub const ZERO: Hash = Hash([0u8; HASH_LEN]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_LEN]
    }

    /// Encode as a fixed 64-character lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Decode from a 64-character hex string.
    ///
    /// Rejects non-hex characters and any other length.
    pub fn from_hex(s: &str) -> Result<Hash> {
        if s.len() != 2 * HASH_LEN {
            return Err(Error::InvalidHex(s.to_string()));
        }
        let bytes = hex::decode(s).map_err(|_| Error::InvalidHex(s.to_string()))?;
        let mut out = [0u8; HASH_LEN];
        out.copy_from_slice(&bytes);
        Ok(Hash(out))
    }

    /// Fold another hash into this one with XOR.
    ///
    /// XOR is commutative and associative, so a set of hashes folds to the
    /// same value regardless of the order they are combined in.
    pub fn combine(&mut self, other: &Hash) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a ^= b;
        }
    }

    /// Consuming variant of [`Hash::combine`].
    pub fn combined(mut self, other: &Hash) -> Hash {
        self.combine(other);
        self
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", &self.to_hex()[..12])
    }
}

/// Hash an in-memory byte slice.
pub fn hash_bytes(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    Hash(hasher.finalize().into())
}

/// Hash a file's contents, streaming in 8 KiB chunks.
pub fn hash_file(path: &Path) -> Result<Hash> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();

    let mut buffer = [0u8; 8192];
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(Hash(hasher.finalize().into()))
}

/// Hash a file or directory tree.
///
/// A regular file hashes identically to [`hash_file`]. A directory hashes
/// its children in sorted-name order, folding `hash_bytes(name)` and the
/// child's recursive tree hash into an all-zero accumulator with XOR, so two
/// directories with the same name-to-content mapping hash equal no matter
/// what order their entries were created in.
///
/// A child that cannot be read is skipped with a warning rather than
/// aborting the whole tree; partially readable trees still hash.
pub fn hash_tree(path: &Path) -> Result<Hash> {
    let meta = fs::metadata(path)?;
    if !meta.is_dir() {
        return hash_file(path);
    }

    let mut names: Vec<String> = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();

    let mut acc = Hash::ZERO;
    for name in &names {
        let child = path.join(name);
        match hash_tree(&child) {
            Ok(child_hash) => {
                acc.combine(&hash_bytes(name.as_bytes()));
                acc.combine(&child_hash);
            }
            Err(err) => {
                warn!(path = %child.display(), error = %err, "skipping unreadable tree entry");
            }
        }
    }

    Ok(acc)
}
