// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dependency resolution and compile-input assembly.
//!
//! Produces one flattened proto file set: the request's own files plus
//! every dependency's files, each dependency namespaced under its module
//! path so files from different modules cannot collide.
//!
//! Failure asymmetry, kept as-is from the original service pending
//! product confirmation: a malformed dependency identifier (no '@'
//! separator) is skipped with a warning, while a well-formed identifier
//! that is missing from version storage aborts the whole request --
//! generated code would otherwise reference types that do not exist.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::OrchestratorError;
use crate::storage::VersionStorage;
use crate::types::{CompileRequest, Dependency, ProtoFile};

/// Parse a "module@version" identifier. `None` when the separator is
/// missing or either side is empty.
pub fn parse_dependency_id(id: &str) -> Option<(String, String)> {
    let (module, version) = id.split_once('@')?;
    if module.is_empty() || version.is_empty() {
        return None;
    }
    Some((module.to_string(), version.to_string()))
}

/// Convert raw identifier strings into unresolved `Dependency` entries,
/// silently skipping malformed identifiers.
pub fn dependencies_from_ids(ids: &[String]) -> Vec<Dependency> {
    ids.iter()
        .filter_map(|id| match parse_dependency_id(id) {
            Some((module, version)) => Some(Dependency::unresolved(module, version)),
            None => {
                tracing::warn!(id = %id, "skipping malformed dependency identifier");
                None
            }
        })
        .collect()
}

/// Assembles compile inputs from a request and version storage.
pub struct DependencyResolver {
    storage: Arc<dyn VersionStorage>,
}

impl DependencyResolver {
    /// Create a resolver over the given version storage.
    pub fn new(storage: Arc<dyn VersionStorage>) -> Self {
        DependencyResolver { storage }
    }

    /// Assemble the full proto file set for a request.
    ///
    /// Dependency entries that already carry files are used as-is;
    /// entries without files are fetched by `(module, version)`. A
    /// storage miss is fatal for the whole request. Duplicate
    /// `module@version` entries are resolved once.
    pub fn resolve(&self, request: &CompileRequest) -> Result<Vec<ProtoFile>, OrchestratorError> {
        let mut assembled = request.proto_files.clone();
        let mut seen: HashSet<String> = HashSet::new();

        for dep in &request.dependencies {
            if !seen.insert(dep.id()) {
                continue;
            }

            let files = if dep.proto_files.is_empty() {
                self.storage
                    .get_version(&dep.module_name, &dep.version)?
                    .files
            } else {
                dep.proto_files.clone()
            };

            for file in files {
                assembled.push(ProtoFile {
                    path: format!("{}/{}", dep.module_name, file.path),
                    content: file.content,
                });
            }
        }

        Ok(assembled)
    }
}
