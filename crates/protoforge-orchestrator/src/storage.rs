// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! External storage interfaces.
//!
//! The orchestrator consumes version storage (dependency lookup) and
//! object storage (artifact persistence) through narrow traits so it can
//! run against the in-process module registry, a filesystem bucket, or
//! in-memory doubles in tests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use protoforge_registry::ModuleRegistryApi;

use crate::error::OrchestratorError;
use crate::types::ProtoFile;

// ---------------------------------------------------------------------------
// VersionStorage
// ---------------------------------------------------------------------------

/// One stored module version as seen by the resolver.
#[derive(Debug, Clone)]
pub struct VersionRecord {
    /// The version's proto files.
    pub files: Vec<ProtoFile>,
    /// Declared dependencies as "module@version" identifiers.
    pub dependencies: Vec<String>,
}

/// Lookup interface over the module/version store.
pub trait VersionStorage: Send + Sync {
    /// Fetch one module version. A miss is `DependencyNotFound`.
    fn get_version(
        &self,
        module_name: &str,
        version: &str,
    ) -> Result<VersionRecord, OrchestratorError>;
}

/// Durable blob sink for compiled artifacts.
pub trait ObjectStorage: Send + Sync {
    /// Store one object. Overwrites are allowed; for content-derived keys
    /// both writers carry identical bytes.
    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<(), OrchestratorError>;
}

// ---------------------------------------------------------------------------
// RegistryVersionStorage
// ---------------------------------------------------------------------------

/// `VersionStorage` backed by the in-process module registry.
pub struct RegistryVersionStorage {
    api: ModuleRegistryApi,
}

impl RegistryVersionStorage {
    /// Wrap a registry API facade.
    pub fn new(api: ModuleRegistryApi) -> Self {
        RegistryVersionStorage { api }
    }
}

impl VersionStorage for RegistryVersionStorage {
    fn get_version(
        &self,
        module_name: &str,
        version: &str,
    ) -> Result<VersionRecord, OrchestratorError> {
        match self.api.get_version(module_name, version) {
            Some(entry) => Ok(VersionRecord {
                files: entry.proto_files,
                dependencies: entry.dependencies,
            }),
            None => Err(OrchestratorError::DependencyNotFound {
                module: module_name.to_string(),
                version: version.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// FsObjectStorage
// ---------------------------------------------------------------------------

/// Filesystem-backed object storage: `{root}/{bucket}/{key}`.
pub struct FsObjectStorage {
    root: PathBuf,
}

impl FsObjectStorage {
    /// Create a store rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsObjectStorage { root: root.into() }
    }
}

impl ObjectStorage for FsObjectStorage {
    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<(), OrchestratorError> {
        let path = self.root.join(bucket).join(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                OrchestratorError::Storage(format!(
                    "failed to create {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        std::fs::write(&path, bytes).map_err(|e| {
            OrchestratorError::Storage(format!("failed to write {}: {}", path.display(), e))
        })
    }
}

// ---------------------------------------------------------------------------
// In-memory doubles
// ---------------------------------------------------------------------------

/// In-memory `VersionStorage` for tests and local runs.
#[derive(Default)]
pub struct MemoryVersionStorage {
    versions: RwLock<HashMap<(String, String), VersionRecord>>,
}

impl MemoryVersionStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one module version.
    pub fn insert(&self, module_name: &str, version: &str, record: VersionRecord) {
        let mut versions = self.versions.write().expect("version store lock poisoned");
        versions.insert((module_name.to_string(), version.to_string()), record);
    }
}

impl VersionStorage for MemoryVersionStorage {
    fn get_version(
        &self,
        module_name: &str,
        version: &str,
    ) -> Result<VersionRecord, OrchestratorError> {
        let versions = self.versions.read().expect("version store lock poisoned");
        versions
            .get(&(module_name.to_string(), version.to_string()))
            .cloned()
            .ok_or_else(|| OrchestratorError::DependencyNotFound {
                module: module_name.to_string(),
                version: version.to_string(),
            })
    }
}

/// In-memory `ObjectStorage` for tests.
#[derive(Default)]
pub struct MemoryObjectStorage {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read an object back (test assertions).
    pub fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        let objects = self.objects.read().expect("object store lock poisoned");
        objects.get(&format!("{bucket}/{key}")).cloned()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().expect("object store lock poisoned").len()
    }

    /// True if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectStorage for MemoryObjectStorage {
    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<(), OrchestratorError> {
        let mut objects = self.objects.write().expect("object store lock poisoned");
        objects.insert(format!("{bucket}/{key}"), bytes.to_vec());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_adapter_hit_and_miss() {
        let api = ModuleRegistryApi::empty();
        api.publish(
            "user-service",
            "v1.0.0",
            vec![ProtoFile::new("user.proto", "message User {}")],
            vec!["common@v1".to_string()],
        )
        .unwrap();

        let storage = RegistryVersionStorage::new(api);

        let record = storage.get_version("user-service", "v1.0.0").unwrap();
        assert_eq!(record.files.len(), 1);
        assert_eq!(record.dependencies, vec!["common@v1"]);

        let err = storage.get_version("user-service", "v9.9.9").unwrap_err();
        assert!(matches!(err, OrchestratorError::DependencyNotFound { .. }));
    }

    #[test]
    fn fs_object_storage_writes_under_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsObjectStorage::new(dir.path());

        storage
            .put("artifacts", "user-service/v1/go/user.pb.go", b"package user")
            .unwrap();

        let written = dir
            .path()
            .join("artifacts")
            .join("user-service/v1/go/user.pb.go");
        assert_eq!(std::fs::read(written).unwrap(), b"package user");
    }

    #[test]
    fn memory_version_storage_roundtrip() {
        let storage = MemoryVersionStorage::new();
        storage.insert(
            "m",
            "v1",
            VersionRecord {
                files: vec![ProtoFile::new("m.proto", "message M {}")],
                dependencies: vec![],
            },
        );

        assert!(storage.get_version("m", "v1").is_ok());
        assert!(storage.get_version("m", "v2").is_err());
    }

    #[test]
    fn memory_object_storage_roundtrip() {
        let storage = MemoryObjectStorage::new();
        assert!(storage.is_empty());
        storage.put("b", "k", b"bytes").unwrap();
        assert_eq!(storage.get("b", "k").unwrap(), b"bytes");
        assert!(storage.get("b", "missing").is_none());
    }
}
