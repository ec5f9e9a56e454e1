// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Artifact persistence.
//!
//! Uploads a compile's full output (generated sources plus synthesized
//! manifests) to object storage under a `{module}/{version}/{language}`
//! prefix. Upload failure is distinct from compile failure: the compile
//! already succeeded, so the error text says so.

use std::sync::Arc;

use crate::error::OrchestratorError;
use crate::storage::ObjectStorage;
use crate::types::GeneratedFile;

/// Writes compiled artifact sets to object storage.
pub struct ArtifactPersister {
    storage: Arc<dyn ObjectStorage>,
    bucket: String,
}

impl ArtifactPersister {
    /// Create a persister over the given object storage and bucket.
    pub fn new(storage: Arc<dyn ObjectStorage>, bucket: impl Into<String>) -> Self {
        ArtifactPersister {
            storage,
            bucket: bucket.into(),
        }
    }

    /// Storage key prefix for one compile's artifact set.
    pub fn storage_key(module_name: &str, version: &str, language: &str) -> String {
        format!("{module_name}/{version}/{language}")
    }

    /// Upload every file of an artifact set.
    ///
    /// Returns `(storage_key, bucket)` on success. Any single upload
    /// failure aborts and surfaces as `Persistence`.
    pub fn persist(
        &self,
        module_name: &str,
        version: &str,
        language: &str,
        generated_files: &[GeneratedFile],
        package_files: &[GeneratedFile],
    ) -> Result<(String, String), OrchestratorError> {
        let prefix = Self::storage_key(module_name, version, language);

        for file in generated_files.iter().chain(package_files) {
            let key = format!("{prefix}/{}", file.path);
            self.storage
                .put(&self.bucket, &key, &file.content)
                .map_err(|e| OrchestratorError::Persistence(e.to_string()))?;
        }

        tracing::debug!(
            bucket = %self.bucket,
            key = %prefix,
            files = generated_files.len() + package_files.len(),
            "artifact set persisted"
        );
        Ok((prefix, self.bucket.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryObjectStorage;

    fn outputs() -> (Vec<GeneratedFile>, Vec<GeneratedFile>) {
        (
            vec![GeneratedFile::new("user.pb.go", "package userservice")],
            vec![GeneratedFile::new("go.mod", "module user-service\n")],
        )
    }

    #[test]
    fn persists_under_module_version_language_prefix() {
        let storage = Arc::new(MemoryObjectStorage::new());
        let persister = ArtifactPersister::new(storage.clone(), "artifacts");
        let (generated, packages) = outputs();

        let (key, bucket) = persister
            .persist("user-service", "v1.0.0", "go", &generated, &packages)
            .unwrap();

        assert_eq!(key, "user-service/v1.0.0/go");
        assert_eq!(bucket, "artifacts");
        assert_eq!(
            storage.get("artifacts", "user-service/v1.0.0/go/user.pb.go"),
            Some(b"package userservice".to_vec())
        );
        assert_eq!(
            storage.get("artifacts", "user-service/v1.0.0/go/go.mod"),
            Some(b"module user-service\n".to_vec())
        );
    }

    #[test]
    fn upload_failure_is_persistence_error() {
        struct FailingStorage;
        impl ObjectStorage for FailingStorage {
            fn put(&self, _: &str, _: &str, _: &[u8]) -> Result<(), OrchestratorError> {
                Err(OrchestratorError::Storage("bucket unavailable".into()))
            }
        }

        let persister = ArtifactPersister::new(Arc::new(FailingStorage), "artifacts");
        let (generated, packages) = outputs();

        let err = persister
            .persist("user-service", "v1.0.0", "go", &generated, &packages)
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Persistence(_)));
        assert!(err.to_string().contains("compile succeeded"));
    }

    #[test]
    fn empty_artifact_set_is_a_no_op() {
        let storage = Arc::new(MemoryObjectStorage::new());
        let persister = ArtifactPersister::new(storage.clone(), "artifacts");

        persister.persist("m", "v1", "go", &[], &[]).unwrap();
        assert!(storage.is_empty());
    }
}
