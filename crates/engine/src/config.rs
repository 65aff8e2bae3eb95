//! Build configuration
//!
//! An opaque key/value map, typically populated from `-D KEY=VALUE` flags.
//! The engine never interprets the values; it exposes them to scripts as
//! `rebuild.config` and mixes a hash of the whole map into every request
//! key, so changing a define invalidates cached results.

use std::collections::BTreeMap;

use rebuild_core::{hash_bytes, Hash};
use serde::Serialize;

use crate::error::{EngineError, Result};

/// An opaque key/value build configuration.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildConfig(BTreeMap<String, String>);

impl BuildConfig {
    pub fn new() -> BuildConfig {
        BuildConfig::default()
    }

    /// Parse `KEY=VALUE` pairs, as passed on the command line.
    pub fn from_defines<I, S>(defines: I) -> Result<BuildConfig>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut config = BuildConfig::new();
        for define in defines {
            let define = define.as_ref();
            match define.split_once('=') {
                Some((key, value)) if !key.is_empty() => {
                    config.set(key, value);
                }
                _ => return Err(EngineError::InvalidDefine(define.to_string())),
            }
        }
        Ok(config)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    /// Hash of the whole map. BTreeMap serializes in key order, so the hash
    /// does not depend on insertion order.
    pub fn hash(&self) -> Hash {
        let bytes = serde_json::to_vec(&self.0).unwrap_or_default();
        hash_bytes(&bytes)
    }
}
