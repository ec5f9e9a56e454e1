// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::sync::{Arc, RwLock};

use crate::registry::{ModuleRegistry, ProtoFile, RegistryError, VersionEntry};

// ---------------------------------------------------------------------------
// ModuleRegistryApi
// ---------------------------------------------------------------------------

/// Thread-safe API facade for the module registry.
///
/// Wraps `ModuleRegistry` behind an `Arc<RwLock<>>` so the compile
/// orchestrator and an HTTP layer can share one registry safely. The
/// facade exposes a plain Rust API with no HTTP dependencies.
///
/// Intended REST mapping:
///   GET  /modules                         -> `list_modules()`
///   GET  /modules/{name}/versions         -> `list_versions(name)`
///   GET  /modules/{name}/versions/{ver}   -> `get_version(name, ver)`
///   POST /modules/{name}/versions         -> `publish(name, ver, files, deps)`
#[derive(Clone)]
pub struct ModuleRegistryApi {
    registry: Arc<RwLock<ModuleRegistry>>,
}

impl ModuleRegistryApi {
    /// Create a new API facade wrapping the given shared registry.
    pub fn new(registry: Arc<RwLock<ModuleRegistry>>) -> Self {
        ModuleRegistryApi { registry }
    }

    /// Create a facade over a fresh, empty registry.
    pub fn empty() -> Self {
        Self::new(Arc::new(RwLock::new(ModuleRegistry::new())))
    }

    /// POST /modules/{name}/versions -- publish a new module version.
    pub fn publish(
        &self,
        module_name: &str,
        version: &str,
        proto_files: Vec<ProtoFile>,
        dependencies: Vec<String>,
    ) -> Result<(), RegistryError> {
        let mut reg = self.registry.write().expect("registry lock poisoned");
        reg.publish(module_name, version, proto_files, dependencies)
    }

    /// GET /modules/{name}/versions/{ver} -- return one version.
    pub fn get_version(&self, module_name: &str, version: &str) -> Option<VersionEntry> {
        let reg = self.registry.read().expect("registry lock poisoned");
        reg.get(module_name, version).cloned()
    }

    /// Return the most recently published version of a module.
    pub fn latest_version(&self, module_name: &str) -> Option<VersionEntry> {
        let reg = self.registry.read().expect("registry lock poisoned");
        reg.latest(module_name).cloned()
    }

    /// GET /modules -- list all module names.
    pub fn list_modules(&self) -> Vec<String> {
        let reg = self.registry.read().expect("registry lock poisoned");
        reg.list_modules()
    }

    /// GET /modules/{name}/versions -- list all version labels.
    pub fn list_versions(&self, module_name: &str) -> Vec<String> {
        let reg = self.registry.read().expect("registry lock poisoned");
        reg.list_versions(module_name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
