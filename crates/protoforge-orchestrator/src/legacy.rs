// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Legacy v1 compile path.
//!
//! Kept for rollback while the orchestrator pipeline beds in. Invokes
//! the toolchain directly per request: no artifact cache, no job
//! tracking, no fan-out, no persistence. Selected only through the
//! explicit `CompileBackend` configuration value.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::coordinator::CompileOrchestrator;
use crate::error::OrchestratorError;
use crate::generators::{synthesize_manifests, GeneratorRegistry};
use crate::resolver::DependencyResolver;
use crate::sandbox::SandboxRunner;
use crate::storage::VersionStorage;
use crate::types::{CompilationResult, CompileRequest};

/// Backend-independent compile interface. Both the orchestrator and the
/// legacy path serve requests through it.
#[async_trait]
pub trait Compiler: Send + Sync {
    /// Compile one request for its target language.
    ///
    /// `Err` is reserved for errors that preempt the compile (unsupported
    /// language, missing dependency); toolchain failures come back as a
    /// result with `success == false`.
    async fn compile(
        &self,
        request: &CompileRequest,
    ) -> Result<CompilationResult, OrchestratorError>;
}

#[async_trait]
impl Compiler for CompileOrchestrator {
    async fn compile(
        &self,
        request: &CompileRequest,
    ) -> Result<CompilationResult, OrchestratorError> {
        self.compile_single(request).await
    }
}

/// Direct per-request toolchain invocation, v1 semantics.
pub struct LegacyProtocCompiler {
    resolver: DependencyResolver,
    generators: GeneratorRegistry,
    sandbox: Arc<dyn SandboxRunner>,
    timeout: Duration,
}

impl LegacyProtocCompiler {
    /// Create a legacy compiler over version storage and a sandbox.
    pub fn new(
        versions: Arc<dyn VersionStorage>,
        sandbox: Arc<dyn SandboxRunner>,
        timeout: Duration,
    ) -> Self {
        LegacyProtocCompiler {
            resolver: DependencyResolver::new(versions),
            generators: GeneratorRegistry::builtin(),
            sandbox,
            timeout,
        }
    }
}

#[async_trait]
impl Compiler for LegacyProtocCompiler {
    async fn compile(
        &self,
        request: &CompileRequest,
    ) -> Result<CompilationResult, OrchestratorError> {
        let spec = self.generators.lookup(&request.language)?;
        let resolved = self.resolver.resolve(request)?;

        let started = Instant::now();
        let generated = match self
            .sandbox
            .execute(
                spec,
                &resolved,
                request.include_grpc,
                &request.options,
                self.timeout,
            )
            .await
        {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!(language = %request.language, error = %e, "legacy compile failed");
                return Ok(CompilationResult::failed(
                    request.language.clone(),
                    request.module_name.clone(),
                    request.version.clone(),
                    e.to_string(),
                ));
            }
        };

        let package_files =
            synthesize_manifests(spec.language, &request.module_name, &request.version);

        Ok(CompilationResult {
            language: request.language.clone(),
            package_name: request.module_name.clone(),
            version: request.version.clone(),
            generated_files: generated,
            package_files,
            duration: started.elapsed(),
            cache_hit: false,
            success: true,
            error: String::new(),
            storage_key: String::new(),
            storage_bucket: String::new(),
        })
    }
}
