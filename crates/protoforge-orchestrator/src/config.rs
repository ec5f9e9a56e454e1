// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Orchestrator configuration.
//!
//! The compile backend is an explicit configuration value injected at
//! construction time. There is no environment-variable switch consulted
//! at call time.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which compile implementation serves requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompileBackend {
    /// The orchestrator pipeline: cache, sandbox, fan-out, jobs.
    Orchestrator,
    /// Legacy direct-protoc path, kept for backward compatibility only.
    LegacyProtoc,
}

/// Compile orchestrator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum number of concurrent per-language sandbox compiles.
    pub max_parallelism: usize,

    /// Wall-clock budget for one sandbox compile, in seconds.
    pub sandbox_timeout_secs: u64,

    /// Toolchain version string mixed into cache-key derivation.
    /// Bumping it namespaces the artifact cache, forcing recompiles.
    pub toolchain_version: String,

    /// Root directory for the durable artifact cache.
    pub cache_dir: PathBuf,

    /// Object-storage bucket artifacts are persisted into.
    pub artifact_bucket: String,

    /// Compile implementation to use.
    pub backend: CompileBackend,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_parallelism: 4,
            sandbox_timeout_secs: 120,
            toolchain_version: "protoc-25".to_string(),
            cache_dir: PathBuf::from(".protoforge-cache"),
            artifact_bucket: "protoforge-artifacts".to_string(),
            backend: CompileBackend::Orchestrator,
        }
    }
}

impl OrchestratorConfig {
    /// Create a new config builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Sandbox timeout as a `Duration`.
    pub fn sandbox_timeout(&self) -> Duration {
        Duration::from_secs(self.sandbox_timeout_secs)
    }
}

/// Config builder for fluent API.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    max_parallelism: Option<usize>,
    sandbox_timeout_secs: Option<u64>,
    toolchain_version: Option<String>,
    cache_dir: Option<PathBuf>,
    artifact_bucket: Option<String>,
    backend: Option<CompileBackend>,
}

impl ConfigBuilder {
    /// Set the maximum number of concurrent sandbox compiles.
    pub fn max_parallelism(mut self, n: usize) -> Self {
        self.max_parallelism = Some(n.max(1));
        self
    }

    /// Set the per-compile wall-clock budget in seconds.
    pub fn sandbox_timeout_secs(mut self, secs: u64) -> Self {
        self.sandbox_timeout_secs = Some(secs);
        self
    }

    /// Set the toolchain version used as a cache-key namespace.
    pub fn toolchain_version(mut self, version: impl Into<String>) -> Self {
        self.toolchain_version = Some(version.into());
        self
    }

    /// Set the artifact cache directory.
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Set the object-storage bucket for persisted artifacts.
    pub fn artifact_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.artifact_bucket = Some(bucket.into());
        self
    }

    /// Select the compile backend.
    pub fn backend(mut self, backend: CompileBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> OrchestratorConfig {
        let defaults = OrchestratorConfig::default();

        OrchestratorConfig {
            max_parallelism: self.max_parallelism.unwrap_or(defaults.max_parallelism),
            sandbox_timeout_secs: self
                .sandbox_timeout_secs
                .unwrap_or(defaults.sandbox_timeout_secs),
            toolchain_version: self.toolchain_version.unwrap_or(defaults.toolchain_version),
            cache_dir: self.cache_dir.unwrap_or(defaults.cache_dir),
            artifact_bucket: self.artifact_bucket.unwrap_or(defaults.artifact_bucket),
            backend: self.backend.unwrap_or(defaults.backend),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = OrchestratorConfig::builder()
            .max_parallelism(8)
            .sandbox_timeout_secs(30)
            .toolchain_version("protoc-26")
            .cache_dir("/tmp/forge-cache")
            .artifact_bucket("test-artifacts")
            .backend(CompileBackend::LegacyProtoc)
            .build();

        assert_eq!(config.max_parallelism, 8);
        assert_eq!(config.sandbox_timeout_secs, 30);
        assert_eq!(config.toolchain_version, "protoc-26");
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/forge-cache"));
        assert_eq!(config.backend, CompileBackend::LegacyProtoc);
    }

    #[test]
    fn test_config_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.max_parallelism, 4);
        assert_eq!(config.sandbox_timeout_secs, 120);
        assert_eq!(config.backend, CompileBackend::Orchestrator);
    }

    #[test]
    fn zero_parallelism_clamped_to_one() {
        let config = OrchestratorConfig::builder().max_parallelism(0).build();
        assert_eq!(config.max_parallelism, 1);
    }

    #[test]
    fn backend_serializes_kebab_case() {
        let json = serde_json::to_string(&CompileBackend::LegacyProtoc).unwrap();
        assert_eq!(json, "\"legacy-protoc\"");
    }
}
