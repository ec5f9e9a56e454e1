// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::collections::HashMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

// ---------------------------------------------------------------------------
// ProtoFile
// ---------------------------------------------------------------------------

/// A single protobuf source file: relative path plus raw content.
///
/// Immutable once published into a version or assembled into a compile
/// request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtoFile {
    /// Path relative to the module root (e.g. "api/user.proto").
    pub path: String,
    /// Raw file content.
    pub content: Vec<u8>,
}

impl ProtoFile {
    /// Convenience constructor from string content.
    pub fn new(path: impl Into<String>, content: impl AsRef<[u8]>) -> Self {
        ProtoFile {
            path: path.into(),
            content: content.as_ref().to_vec(),
        }
    }
}

// ---------------------------------------------------------------------------
// VersionEntry
// ---------------------------------------------------------------------------

/// A single published version of a module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionEntry {
    /// Module name (e.g. "user-service").
    pub module_name: String,
    /// Version label (e.g. "v1.0.0"). Opaque to the registry.
    pub version: String,
    /// The module's own proto files.
    pub proto_files: Vec<ProtoFile>,
    /// Declared dependencies as "module@version" identifiers.
    pub dependencies: Vec<String>,
    /// SHA-256 hex digest over the sorted file set, for fast equality checks.
    pub content_hash: String,
    /// Timestamp of publication.
    pub published_at: SystemTime,
}

// ---------------------------------------------------------------------------
// RegistryError
// ---------------------------------------------------------------------------

/// Errors produced by the module registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A version with no proto files was submitted.
    #[error("module version has no proto files")]
    EmptyVersion,

    /// The (module, version) pair is already published.
    #[error("version already published: {module}@{version}")]
    DuplicateVersion { module: String, version: String },

    /// Module or version not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Generic I/O or persistence error.
    #[error("I/O error: {0}")]
    Io(String),
}

// ---------------------------------------------------------------------------
// ModuleRegistry
// ---------------------------------------------------------------------------

/// In-memory store of versioned modules keyed by module name.
///
/// Versions are kept in publication order; listings are sorted for
/// deterministic output.
pub struct ModuleRegistry {
    /// Map from module name to published versions (in publish order).
    modules: HashMap<String, Vec<VersionEntry>>,
}

impl ModuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        ModuleRegistry {
            modules: HashMap::new(),
        }
    }

    /// Reconstruct a registry from a raw map (used by persistence layer).
    pub(crate) fn from_raw(modules: HashMap<String, Vec<VersionEntry>>) -> Self {
        ModuleRegistry { modules }
    }

    /// Expose the inner map (used by persistence layer).
    pub(crate) fn inner(&self) -> &HashMap<String, Vec<VersionEntry>> {
        &self.modules
    }

    /// Publish a new module version.
    ///
    /// Rejects empty file sets and duplicate (module, version) pairs.
    pub fn publish(
        &mut self,
        module_name: &str,
        version: &str,
        proto_files: Vec<ProtoFile>,
        dependencies: Vec<String>,
    ) -> Result<(), RegistryError> {
        if proto_files.is_empty() {
            return Err(RegistryError::EmptyVersion);
        }

        if let Some(versions) = self.modules.get(module_name) {
            if versions.iter().any(|v| v.version == version) {
                return Err(RegistryError::DuplicateVersion {
                    module: module_name.to_string(),
                    version: version.to_string(),
                });
            }
        }

        let content_hash = Self::hash_files(&proto_files);
        let entry = VersionEntry {
            module_name: module_name.to_string(),
            version: version.to_string(),
            proto_files,
            dependencies,
            content_hash,
            published_at: SystemTime::now(),
        };

        self.modules
            .entry(module_name.to_string())
            .or_default()
            .push(entry);
        Ok(())
    }

    /// Return a specific version of a module, or `None` if not found.
    pub fn get(&self, module_name: &str, version: &str) -> Option<&VersionEntry> {
        self.modules
            .get(module_name)
            .and_then(|v| v.iter().find(|e| e.version == version))
    }

    /// Return the most recently published version of a module.
    pub fn latest(&self, module_name: &str) -> Option<&VersionEntry> {
        self.modules.get(module_name).and_then(|v| v.last())
    }

    /// List all module names (sorted for determinism).
    pub fn list_modules(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.keys().cloned().collect();
        names.sort();
        names
    }

    /// List all version labels for a module, in publish order.
    pub fn list_versions(&self, module_name: &str) -> Vec<String> {
        match self.modules.get(module_name) {
            Some(versions) => versions.iter().map(|e| e.version.clone()).collect(),
            None => Vec::new(),
        }
    }

    /// Total number of distinct module names.
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Compute a deterministic digest over a file set.
    ///
    /// Files are sorted by path so submission order does not affect the
    /// hash.
    pub(crate) fn hash_files(files: &[ProtoFile]) -> String {
        let mut sorted: Vec<&ProtoFile> = files.iter().collect();
        sorted.sort_by(|a, b| a.path.cmp(&b.path));

        let mut hasher = Sha256::new();
        for file in sorted {
            hasher.update(file.path.as_bytes());
            hasher.update([0u8]);
            hasher.update(&file.content);
            hasher.update([0u8]);
        }
        format!("{:x}", hasher.finalize())
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
