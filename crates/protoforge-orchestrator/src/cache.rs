// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Durable artifact cache.
//!
//! Maps cache keys to complete compilation results. Consulted before any
//! sandbox work; populated after every successful compile. Entries never
//! expire implicitly: invalidation happens through the toolchain-version
//! namespace in key derivation.
//!
//! All reads are fail-safe: a missing, unreadable, or corrupt entry is a
//! cache miss, never an error. `put` for a given key is idempotent --
//! two compiles racing on the same content-derived key write identical
//! documents.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use crate::error::OrchestratorError;
use crate::types::CompilationResult;

/// Key -> artifact-set store consulted around the sandbox executor.
pub trait ArtifactCache: Send + Sync {
    /// Look up a result by cache key. `None` on any miss, including
    /// corrupt entries.
    fn get(&self, key: &str) -> Option<CompilationResult>;

    /// Store a result under a cache key.
    fn put(&self, key: &str, result: &CompilationResult) -> Result<(), OrchestratorError>;
}

// ---------------------------------------------------------------------------
// FsArtifactCache
// ---------------------------------------------------------------------------

/// Filesystem-backed cache: one JSON document per key at
/// `{dir}/{key}.json`. Survives process restarts, which matters because
/// compiles are expensive.
pub struct FsArtifactCache {
    dir: PathBuf,
}

impl FsArtifactCache {
    /// Create a cache rooted at the given directory (created lazily).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FsArtifactCache { dir: dir.into() }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl ArtifactCache for FsArtifactCache {
    fn get(&self, key: &str) -> Option<CompilationResult> {
        let raw = std::fs::read(self.entry_path(key)).ok()?;
        match serde_json::from_slice(&raw) {
            Ok(result) => Some(result),
            Err(e) => {
                tracing::warn!(key, error = %e, "corrupt cache entry treated as miss");
                None
            }
        }
    }

    fn put(&self, key: &str, result: &CompilationResult) -> Result<(), OrchestratorError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| OrchestratorError::Cache(format!("create cache dir: {e}")))?;

        let json = serde_json::to_vec(result)
            .map_err(|e| OrchestratorError::Cache(format!("serialize entry: {e}")))?;

        // Write-then-rename so a concurrent reader never observes a
        // half-written entry.
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        std::fs::write(&tmp, &json)
            .map_err(|e| OrchestratorError::Cache(format!("write entry: {e}")))?;
        std::fs::rename(&tmp, self.entry_path(key))
            .map_err(|e| OrchestratorError::Cache(format!("commit entry: {e}")))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryArtifactCache
// ---------------------------------------------------------------------------

/// In-memory cache for tests.
#[derive(Default)]
pub struct MemoryArtifactCache {
    entries: RwLock<HashMap<String, CompilationResult>>,
}

impl MemoryArtifactCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.read().expect("cache lock poisoned").len()
    }

    /// True if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArtifactCache for MemoryArtifactCache {
    fn get(&self, key: &str) -> Option<CompilationResult> {
        self.entries
            .read()
            .expect("cache lock poisoned")
            .get(key)
            .cloned()
    }

    fn put(&self, key: &str, result: &CompilationResult) -> Result<(), OrchestratorError> {
        self.entries
            .write()
            .expect("cache lock poisoned")
            .insert(key.to_string(), result.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
