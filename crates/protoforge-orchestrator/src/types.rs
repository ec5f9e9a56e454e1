// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Core data model for the compile orchestrator.
//!
//! All records are plain serde structs. A `CompileRequest` is owned by the
//! invocation that created it and never mutated after dispatch; a
//! `CompilationResult` is immutable once returned.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use protoforge_registry::ProtoFile;

/// A file emitted by a compile: either compiler-generated source or a
/// synthesized package manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    /// Path relative to the package root.
    pub path: String,
    /// File content.
    pub content: Vec<u8>,
}

impl GeneratedFile {
    /// Convenience constructor from string content.
    pub fn new(path: impl Into<String>, content: impl AsRef<[u8]>) -> Self {
        GeneratedFile {
            path: path.into(),
            content: content.as_ref().to_vec(),
        }
    }
}

/// One resolved dependency of a compile request.
///
/// Resolved one level deep: each entry carries its own flattened file set
/// as provided by the caller or the version storage layer. The resolver
/// does not recurse into a dependency's own dependency list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    /// Dependency module name.
    pub module_name: String,
    /// Dependency version label.
    pub version: String,
    /// The dependency's proto files. May be empty, in which case the
    /// resolver fetches them from version storage.
    pub proto_files: Vec<ProtoFile>,
}

impl Dependency {
    /// A dependency reference with no files attached (resolver will fetch).
    pub fn unresolved(module_name: impl Into<String>, version: impl Into<String>) -> Self {
        Dependency {
            module_name: module_name.into(),
            version: version.into(),
            proto_files: Vec::new(),
        }
    }

    /// Canonical "module@version" identifier.
    pub fn id(&self) -> String {
        format!("{}@{}", self.module_name, self.version)
    }
}

/// One compile attempt for one (module, version, language) triple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileRequest {
    /// Module being compiled.
    pub module_name: String,
    /// Version label of the module.
    pub version: String,
    /// The module's own proto files.
    pub proto_files: Vec<ProtoFile>,
    /// Direct dependencies (one level, pre-flattened per entry).
    pub dependencies: Vec<Dependency>,
    /// Target language identifier (e.g. "go", "python").
    pub language: String,
    /// Whether to emit gRPC service stubs alongside message types.
    pub include_grpc: bool,
    /// Free-form generation options forwarded to the toolchain.
    pub options: HashMap<String, String>,
}

impl CompileRequest {
    /// Create a request with no dependencies or options.
    pub fn new(
        module_name: impl Into<String>,
        version: impl Into<String>,
        proto_files: Vec<ProtoFile>,
        language: impl Into<String>,
    ) -> Self {
        CompileRequest {
            module_name: module_name.into(),
            version: version.into(),
            proto_files,
            dependencies: Vec::new(),
            language: language.into(),
            include_grpc: false,
            options: HashMap::new(),
        }
    }

    /// Clone this request retargeted at a different language.
    pub fn for_language(&self, language: &str) -> Self {
        let mut req = self.clone();
        req.language = language.to_string();
        req
    }
}

/// Outcome of one completed (or failed) compile attempt.
///
/// Either fully successful (`success == true`, empty `error`) or fully
/// failed (`success == false`, `error` populated). There is no
/// partial-file success within a single language.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationResult {
    /// Target language.
    pub language: String,
    /// Package name (the module name).
    pub package_name: String,
    /// Module version label.
    pub version: String,
    /// Compiler-emitted source files.
    pub generated_files: Vec<GeneratedFile>,
    /// Synthesized package manifests (go.mod, setup.py, ...).
    pub package_files: Vec<GeneratedFile>,
    /// Wall-clock time spent compiling (near zero on cache hits).
    pub duration: Duration,
    /// Whether this result was served from the artifact cache.
    pub cache_hit: bool,
    /// Whether the compile succeeded.
    pub success: bool,
    /// Diagnostic text when `success == false`, empty otherwise.
    pub error: String,
    /// Object-storage key prefix of the persisted artifact set.
    pub storage_key: String,
    /// Object-storage bucket of the persisted artifact set.
    pub storage_bucket: String,
}

impl CompilationResult {
    /// A failed result carrying only the diagnostic.
    pub fn failed(
        language: impl Into<String>,
        package_name: impl Into<String>,
        version: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        CompilationResult {
            language: language.into(),
            package_name: package_name.into(),
            version: version.into(),
            generated_files: Vec::new(),
            package_files: Vec::new(),
            duration: Duration::ZERO,
            cache_hit: false,
            success: false,
            error: error.into(),
            storage_key: String::new(),
            storage_bucket: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_id_format() {
        let dep = Dependency::unresolved("user-service", "v1.0.0");
        assert_eq!(dep.id(), "user-service@v1.0.0");
        assert!(dep.proto_files.is_empty());
    }

    #[test]
    fn request_for_language_retargets_only_language() {
        let req = CompileRequest::new(
            "user-service",
            "v1.0.0",
            vec![ProtoFile::new("user.proto", "message User {}")],
            "go",
        );
        let py = req.for_language("python");
        assert_eq!(py.language, "python");
        assert_eq!(py.module_name, req.module_name);
        assert_eq!(py.proto_files, req.proto_files);
    }

    #[test]
    fn failed_result_shape() {
        let r = CompilationResult::failed("go", "m", "v1", "boom");
        assert!(!r.success);
        assert_eq!(r.error, "boom");
        assert!(r.generated_files.is_empty());
        assert!(!r.cache_hit);
    }

    #[test]
    fn result_serialization_roundtrip() {
        let r = CompilationResult {
            language: "go".into(),
            package_name: "user-service".into(),
            version: "v1.0.0".into(),
            generated_files: vec![GeneratedFile::new("user.pb.go", "package userservice")],
            package_files: vec![GeneratedFile::new("go.mod", "module user-service")],
            duration: Duration::from_millis(420),
            cache_hit: false,
            success: true,
            error: String::new(),
            storage_key: "user-service/v1.0.0/go".into(),
            storage_bucket: "artifacts".into(),
        };

        let json = serde_json::to_string(&r).unwrap();
        let back: CompilationResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.generated_files, r.generated_files);
        assert_eq!(back.duration, r.duration);
        assert!(back.success);
    }
}
