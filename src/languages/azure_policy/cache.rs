// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Compiled rule cache keyed by document content.

use alloc::string::{String, ToString as _};
use alloc::sync::Arc;
use core::fmt;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use sha2::{Digest, Sha256};

use crate::languages::azure_policy::ast::RuleDocument;
use crate::languages::azure_policy::compiler::{CompileError, Compiler};
use crate::value::Value;

/// SHA-256 of a rule document's canonical JSON form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash of `document`. Object key order and whitespace do not matter.
    pub fn of(document: &Value) -> Result<Self, CompileError> {
        let canonical = document
            .to_canonical_json()
            .map_err(|e| CompileError::InvalidJson(e.to_string()))?;
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let digest = hasher.finalize();

        let mut bytes = [0_u8; 32];
        bytes.copy_from_slice(digest.as_slice());
        Ok(Self(bytes))
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Thread-safe cache of compiled rules.
///
/// Two documents that differ only in key order or formatting share one
/// entry. The cache is an ordinary value; callers decide its lifetime.
#[derive(Debug, Default)]
pub struct RuleCache {
    compiler: Compiler,
    entries: DashMap<ContentHash, Arc<RuleDocument>>,
}

impl RuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache that compiles misses with `compiler`.
    pub fn with_compiler(compiler: Compiler) -> Self {
        Self {
            compiler,
            entries: DashMap::new(),
        }
    }

    /// Compile `text`, or return the cached rule for the same content.
    pub fn get_or_compile_str(&self, text: &str) -> Result<Arc<RuleDocument>, CompileError> {
        let document: Value = serde_json::from_str(text)?;
        self.get_or_compile(&document)
    }

    /// Compile `document`, or return the cached rule for the same content.
    ///
    /// Compile errors are not cached.
    pub fn get_or_compile(&self, document: &Value) -> Result<Arc<RuleDocument>, CompileError> {
        let hash = ContentHash::of(document)?;
        if let Some(rule) = self.get(&hash) {
            tracing::trace!(%hash, "rule cache hit");
            return Ok(rule);
        }

        tracing::debug!(%hash, "rule cache miss");
        let compiled = Arc::new(self.compiler.compile(document)?);
        // Another thread may have compiled the same document meanwhile; keep the first.
        match self.entries.entry(hash) {
            Entry::Occupied(e) => Ok(Arc::clone(e.get())),
            Entry::Vacant(e) => {
                e.insert(Arc::clone(&compiled));
                Ok(compiled)
            }
        }
    }

    pub fn get(&self, hash: &ContentHash) -> Option<Arc<RuleDocument>> {
        self.entries.get(hash).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.entries.contains_key(hash)
    }

    pub fn remove(&self, hash: &ContentHash) -> Option<Arc<RuleDocument>> {
        self.entries.remove(hash).map(|(_, rule)| rule)
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
