// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The compile pipeline and per-language fan-out.
//!
//! `compile_single` runs one language through the full pipeline:
//! resolve dependencies, derive the cache key, consult the cache, run
//! the sandbox, persist artifacts, update the job record. `compile_all`
//! fans a request out across languages as independent tasks under a
//! shared parallelism bound; one language's failure never aborts its
//! siblings.
//!
//! Identical concurrent requests are coalesced per cache key: the first
//! becomes the leader and runs the sandbox, later arrivals await the
//! leader's broadcast result instead of compiling again.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

use crate::cache::ArtifactCache;
use crate::cache_key::derive_cache_key;
use crate::config::OrchestratorConfig;
use crate::error::OrchestratorError;
use crate::generators::{synthesize_manifests, GeneratorRegistry, ToolchainSpec};
use crate::jobs::{Job, JobStatus, JobStore};
use crate::persist::ArtifactPersister;
use crate::resolver::DependencyResolver;
use crate::sandbox::SandboxRunner;
use crate::storage::{ObjectStorage, VersionStorage};
use crate::types::{CompilationResult, CompileRequest, ProtoFile};

type InFlightMap = Mutex<HashMap<String, watch::Receiver<Option<CompilationResult>>>>;

struct Inner {
    config: OrchestratorConfig,
    resolver: DependencyResolver,
    generators: GeneratorRegistry,
    sandbox: Arc<dyn SandboxRunner>,
    cache: Arc<dyn ArtifactCache>,
    persister: ArtifactPersister,
    jobs: JobStore,
    semaphore: Semaphore,
    in_flight: InFlightMap,
}

/// Compile orchestrator. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct CompileOrchestrator {
    inner: Arc<Inner>,
}

impl CompileOrchestrator {
    /// Wire up an orchestrator from its collaborators.
    pub fn new(
        config: OrchestratorConfig,
        versions: Arc<dyn VersionStorage>,
        objects: Arc<dyn ObjectStorage>,
        sandbox: Arc<dyn SandboxRunner>,
        cache: Arc<dyn ArtifactCache>,
        generators: GeneratorRegistry,
    ) -> Self {
        let persister = ArtifactPersister::new(objects, config.artifact_bucket.clone());
        let semaphore = Semaphore::new(config.max_parallelism);
        CompileOrchestrator {
            inner: Arc::new(Inner {
                resolver: DependencyResolver::new(versions),
                generators,
                sandbox,
                cache,
                persister,
                jobs: JobStore::new(),
                semaphore,
                in_flight: Mutex::new(HashMap::new()),
                config,
            }),
        }
    }

    /// Sorted wire identifiers of every compilable language.
    pub fn supported_languages(&self) -> Vec<String> {
        self.inner.generators.supported_languages()
    }

    /// Look up a compile job by id.
    pub fn get_status(&self, job_id: &str) -> Result<Job, OrchestratorError> {
        self.inner.jobs.get(job_id)
    }

    /// All tracked jobs, sorted by id.
    pub fn list_jobs(&self) -> Vec<Job> {
        self.inner.jobs.list()
    }

    /// Compile one request for its single target language.
    ///
    /// Returns `Err` only for errors that preempt the compile itself: an
    /// unsupported language or a missing dependency. Toolchain failures,
    /// timeouts, and persistence failures come back as a result with
    /// `success == false` and the job marked `Failed`.
    pub async fn compile_single(
        &self,
        request: &CompileRequest,
    ) -> Result<CompilationResult, OrchestratorError> {
        let spec = self.inner.generators.lookup(&request.language)?;
        let job = self
            .inner
            .jobs
            .create(&request.module_name, &request.version, &request.language);

        let resolved = match self.inner.resolver.resolve(request) {
            Ok(files) => files,
            Err(e) => {
                self.inner.jobs.fail(&job.id, e.to_string())?;
                return Err(e);
            }
        };

        let key = derive_cache_key(
            &resolved,
            &request.language,
            request.include_grpc,
            &request.options,
            &self.inner.config.toolchain_version,
        );

        if let Some(mut hit) = self.inner.cache.get(&key) {
            tracing::info!(job_id = %job.id, key = %key, "cache hit");
            hit.cache_hit = true;
            hit.duration = std::time::Duration::ZERO;
            self.inner.jobs.complete(&job.id)?;
            return Ok(hit);
        }

        loop {
            // Decide follower vs. leader entirely inside the lock scope so
            // the guard is gone before any await.
            let role = {
                let mut in_flight = self
                    .inner
                    .in_flight
                    .lock()
                    .expect("in-flight map lock poisoned");
                match in_flight.get(&key).cloned() {
                    Some(rx) => Err(rx),
                    None => {
                        let (tx, rx) = watch::channel(None);
                        in_flight.insert(key.clone(), rx);
                        Ok(tx)
                    }
                }
            };

            let leader_tx = match role {
                Err(mut rx) => {
                    // Someone is already compiling this exact input.
                    tracing::debug!(job_id = %job.id, key = %key, "awaiting in-flight compile");
                    match await_leader(&mut rx).await {
                        Some(mut result) => {
                            result.cache_hit = true;
                            result.duration = std::time::Duration::ZERO;
                            if result.success {
                                self.inner.jobs.complete(&job.id)?;
                            } else {
                                self.inner.jobs.fail(&job.id, result.error.clone())?;
                            }
                            return Ok(result);
                        }
                        None => {
                            // Leader was cancelled before publishing.
                            // Drop the stale entry and take over.
                            self.inner
                                .in_flight
                                .lock()
                                .expect("in-flight map lock poisoned")
                                .remove(&key);
                            continue;
                        }
                    }
                }
                Ok(tx) => tx,
            };

            let result = self.run_compile(request, spec, &resolved, &key, &job.id).await;

            self.inner
                .in_flight
                .lock()
                .expect("in-flight map lock poisoned")
                .remove(&key);
            let _ = leader_tx.send(Some(result.clone()));
            return Ok(result);
        }
    }

    /// Fan one request out across a list of target languages.
    ///
    /// Every language yields a result; failures are reported per language
    /// and never cancel siblings. Dropping the returned future aborts all
    /// outstanding per-language tasks (and their sandboxes with them).
    pub async fn compile_all(
        &self,
        request: &CompileRequest,
        languages: &[String],
    ) -> Result<BatchOutcome, OrchestratorError> {
        if languages.is_empty() {
            return Err(OrchestratorError::EmptyLanguageList);
        }

        tracing::info!(
            module = %request.module_name,
            version = %request.version,
            languages = languages.len(),
            "batch compile dispatched"
        );

        let mut tasks = JoinSet::new();
        for (index, language) in languages.iter().enumerate() {
            let orchestrator = self.clone();
            let per_language = request.for_language(language);
            tasks.spawn(async move {
                let result = match orchestrator.compile_single(&per_language).await {
                    Ok(result) => result,
                    Err(e) => CompilationResult::failed(
                        per_language.language.clone(),
                        per_language.module_name.clone(),
                        per_language.version.clone(),
                        e.to_string(),
                    ),
                };
                (index, result)
            });
        }

        let mut slots: Vec<Option<CompilationResult>> = vec![None; languages.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => {
                    // A panicked task still must not sink the batch.
                    tracing::error!(error = %e, "compile task panicked");
                }
            }
        }

        let results: Vec<CompilationResult> = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    CompilationResult::failed(
                        languages[index].clone(),
                        request.module_name.clone(),
                        request.version.clone(),
                        "compile task aborted",
                    )
                })
            })
            .collect();

        Ok(BatchOutcome { results })
    }

    /// One full pipeline run past the cache: sandbox, manifests,
    /// persistence, cache write, job bookkeeping. Compile-stage failures
    /// are folded into the result, not raised.
    async fn run_compile(
        &self,
        request: &CompileRequest,
        spec: &ToolchainSpec,
        resolved: &[ProtoFile],
        key: &str,
        job_id: &str,
    ) -> CompilationResult {
        let permit = self
            .inner
            .semaphore
            .acquire()
            .await
            .expect("compile semaphore closed");
        if let Err(e) = self.inner.jobs.transition(job_id, JobStatus::Running) {
            tracing::warn!(job_id, error = %e, "job transition failed");
        }

        let started = Instant::now();
        let generated = match self
            .inner
            .sandbox
            .execute(
                spec,
                resolved,
                request.include_grpc,
                &request.options,
                self.inner.config.sandbox_timeout(),
            )
            .await
        {
            Ok(files) => files,
            Err(e) => {
                drop(permit);
                tracing::warn!(job_id, language = %request.language, error = %e, "compile failed");
                let _ = self.inner.jobs.fail(job_id, e.to_string());
                return CompilationResult::failed(
                    request.language.clone(),
                    request.module_name.clone(),
                    request.version.clone(),
                    e.to_string(),
                );
            }
        };
        let duration = started.elapsed();
        drop(permit);

        let package_files =
            synthesize_manifests(spec.language, &request.module_name, &request.version);

        let (storage_key, storage_bucket) = match self.inner.persister.persist(
            &request.module_name,
            &request.version,
            &request.language,
            &generated,
            &package_files,
        ) {
            Ok(location) => location,
            Err(e) => {
                tracing::warn!(job_id, error = %e, "artifact persistence failed");
                let _ = self.inner.jobs.fail(job_id, e.to_string());
                return CompilationResult::failed(
                    request.language.clone(),
                    request.module_name.clone(),
                    request.version.clone(),
                    e.to_string(),
                );
            }
        };

        let result = CompilationResult {
            language: request.language.clone(),
            package_name: request.module_name.clone(),
            version: request.version.clone(),
            generated_files: generated,
            package_files,
            duration,
            cache_hit: false,
            success: true,
            error: String::new(),
            storage_key,
            storage_bucket,
        };

        // A lost cache write only costs a future recompile.
        if let Err(e) = self.inner.cache.put(key, &result) {
            tracing::warn!(job_id, key, error = %e, "cache write failed");
        }
        if let Err(e) = self.inner.jobs.complete(job_id) {
            tracing::warn!(job_id, error = %e, "job completion failed");
        }

        tracing::info!(
            job_id,
            language = %request.language,
            files = result.generated_files.len(),
            duration_ms = duration.as_millis() as u64,
            "compile succeeded"
        );
        result
    }
}

/// Wait for an in-flight leader to publish its result. `None` when the
/// leader was dropped before publishing.
async fn await_leader(
    rx: &mut watch::Receiver<Option<CompilationResult>>,
) -> Option<CompilationResult> {
    loop {
        let published = rx.borrow().clone();
        if published.is_some() {
            return published;
        }
        if rx.changed().await.is_err() {
            return None;
        }
    }
}

/// Outcome of one batch compile: a result per requested language, in
/// request order.
#[derive(Debug)]
pub struct BatchOutcome {
    pub results: Vec<CompilationResult>,
}

impl BatchOutcome {
    /// Number of failed languages.
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }

    /// `PartialFailure` when at least one language failed, else `None`.
    pub fn error(&self) -> Option<OrchestratorError> {
        let failed = self.failed_count();
        if failed == 0 {
            None
        } else {
            Some(OrchestratorError::PartialFailure {
                failed,
                total: self.results.len(),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryArtifactCache;
    use crate::generators::Language;
    use crate::sandbox::MockSandbox;
    use crate::storage::{MemoryObjectStorage, MemoryVersionStorage, VersionRecord};
    use crate::types::Dependency;
    use std::time::Duration;

    struct Fixture {
        orchestrator: CompileOrchestrator,
        sandbox: Arc<MockSandbox>,
        objects: Arc<MemoryObjectStorage>,
        cache: Arc<MemoryArtifactCache>,
        versions: Arc<MemoryVersionStorage>,
    }

    fn fixture_with(sandbox: MockSandbox, config: OrchestratorConfig) -> Fixture {
        let sandbox = Arc::new(sandbox);
        let objects = Arc::new(MemoryObjectStorage::new());
        let cache = Arc::new(MemoryArtifactCache::new());
        let versions = Arc::new(MemoryVersionStorage::new());
        let orchestrator = CompileOrchestrator::new(
            config,
            versions.clone(),
            objects.clone(),
            sandbox.clone(),
            cache.clone(),
            GeneratorRegistry::builtin(),
        );
        Fixture {
            orchestrator,
            sandbox,
            objects,
            cache,
            versions,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(MockSandbox::new(), OrchestratorConfig::default())
    }

    fn request(language: &str) -> CompileRequest {
        CompileRequest::new(
            "user-service",
            "v1.0.0",
            vec![ProtoFile::new("user.proto", "message User { string id = 1; }")],
            language,
        )
    }

    #[tokio::test]
    async fn successful_compile_produces_and_persists() {
        let fx = fixture();
        let result = fx.orchestrator.compile_single(&request("go")).await.unwrap();

        assert!(result.success);
        assert!(!result.cache_hit);
        assert_eq!(result.generated_files[0].path, "user.pb.go");
        assert_eq!(result.package_files[0].path, "go.mod");
        assert_eq!(result.storage_key, "user-service/v1.0.0/go");

        // Artifacts actually landed in object storage.
        assert!(fx
            .objects
            .get("protoforge-artifacts", "user-service/v1.0.0/go/user.pb.go")
            .is_some());
        assert!(fx
            .objects
            .get("protoforge-artifacts", "user-service/v1.0.0/go/go.mod")
            .is_some());

        let job = fx.orchestrator.get_status("user-service-v1.0.0-go").unwrap();
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn second_compile_is_cache_hit_with_identical_files() {
        let fx = fixture();
        let first = fx.orchestrator.compile_single(&request("go")).await.unwrap();
        let second = fx.orchestrator.compile_single(&request("go")).await.unwrap();

        assert!(!first.cache_hit);
        assert!(second.cache_hit);
        assert_eq!(second.generated_files, first.generated_files);
        assert_eq!(second.package_files, first.package_files);
        assert_eq!(fx.sandbox.execution_count(), 1);
    }

    #[tokio::test]
    async fn unsupported_language_is_client_error() {
        let fx = fixture();
        let err = fx
            .orchestrator
            .compile_single(&request("cobol"))
            .await
            .unwrap_err();
        assert!(err.is_client_error());
        assert_eq!(fx.sandbox.execution_count(), 0);
    }

    #[tokio::test]
    async fn missing_dependency_fails_before_sandbox() {
        let fx = fixture();
        let mut req = request("go");
        req.dependencies.push(Dependency::unresolved("ghost", "v1"));

        let err = fx.orchestrator.compile_single(&req).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::DependencyNotFound { .. }));
        assert_eq!(fx.sandbox.execution_count(), 0);

        let job = fx.orchestrator.get_status("user-service-v1.0.0-go").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn dependency_files_feed_the_cache_key() {
        let fx = fixture();
        fx.versions.insert(
            "common",
            "v1",
            VersionRecord {
                files: vec![ProtoFile::new("types.proto", "message Id {}")],
                dependencies: vec![],
            },
        );

        let plain = fx.orchestrator.compile_single(&request("go")).await.unwrap();
        assert!(!plain.cache_hit);

        // Same module files but an added dependency must not hit the
        // plain request's cache entry.
        let mut with_dep = request("go");
        with_dep.dependencies.push(Dependency::unresolved("common", "v1"));
        let result = fx.orchestrator.compile_single(&with_dep).await.unwrap();
        assert!(!result.cache_hit);
        assert_eq!(fx.sandbox.execution_count(), 2);
    }

    #[tokio::test]
    async fn toolchain_failure_is_reported_not_raised() {
        let fx = fixture_with(
            MockSandbox::failing([Language::Go]),
            OrchestratorConfig::default(),
        );

        let result = fx.orchestrator.compile_single(&request("go")).await.unwrap();
        assert!(!result.success);
        assert!(result.error.contains("mock go toolchain failure"));
        assert!(result.generated_files.is_empty());

        assert!(fx.objects.is_empty());
        assert!(fx.cache.is_empty());
        let job = fx.orchestrator.get_status("user-service-v1.0.0-go").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn sandbox_timeout_fails_the_job() {
        let config = OrchestratorConfig::builder().sandbox_timeout_secs(1).build();
        let fx = fixture_with(MockSandbox::new().with_delay(Duration::from_secs(60)), config);

        let result = fx.orchestrator.compile_single(&request("go")).await.unwrap();
        assert!(!result.success);
        assert!(result.error.contains("timed out"));

        let job = fx.orchestrator.get_status("user-service-v1.0.0-go").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn persistence_failure_downgrades_success() {
        struct FailingStorage;
        impl ObjectStorage for FailingStorage {
            fn put(&self, _: &str, _: &str, _: &[u8]) -> Result<(), OrchestratorError> {
                Err(OrchestratorError::Storage("bucket unavailable".into()))
            }
        }

        let sandbox = Arc::new(MockSandbox::new());
        let cache = Arc::new(MemoryArtifactCache::new());
        let orchestrator = CompileOrchestrator::new(
            OrchestratorConfig::default(),
            Arc::new(MemoryVersionStorage::new()),
            Arc::new(FailingStorage),
            sandbox,
            cache.clone(),
            GeneratorRegistry::builtin(),
        );

        let result = orchestrator.compile_single(&request("go")).await.unwrap();
        assert!(!result.success);
        assert!(result.error.contains("compile succeeded"));
        // An unpersisted result must not be served from cache later.
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn batch_failure_does_not_abort_siblings() {
        let fx = fixture();
        let languages = vec!["go".to_string(), "python".to_string(), "cobol".to_string()];

        let outcome = fx
            .orchestrator
            .compile_all(&request("go"), &languages)
            .await
            .unwrap();

        assert_eq!(outcome.results.len(), 3);
        assert!(outcome.results[0].success);
        assert!(outcome.results[1].success);
        assert!(!outcome.results[2].success);
        assert_eq!(outcome.results[2].language, "cobol");
        assert_eq!(outcome.failed_count(), 1);
        assert!(matches!(
            outcome.error(),
            Some(OrchestratorError::PartialFailure { failed: 1, total: 3 })
        ));
    }

    #[tokio::test]
    async fn batch_success_has_no_error() {
        let fx = fixture();
        let languages = vec!["go".to_string(), "rust".to_string()];
        let outcome = fx
            .orchestrator
            .compile_all(&request("go"), &languages)
            .await
            .unwrap();
        assert_eq!(outcome.failed_count(), 0);
        assert!(outcome.error().is_none());
    }

    #[tokio::test]
    async fn empty_language_list_is_rejected() {
        let fx = fixture();
        let err = fx
            .orchestrator
            .compile_all(&request("go"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::EmptyLanguageList));
    }

    #[tokio::test]
    async fn identical_concurrent_compiles_coalesce() {
        let fx = fixture_with(
            MockSandbox::new().with_delay(Duration::from_millis(50)),
            OrchestratorConfig::default(),
        );

        let a = fx.orchestrator.clone();
        let b = fx.orchestrator.clone();
        let req_a = request("go");
        let req_b = request("go");
        let (ra, rb) = tokio::join!(a.compile_single(&req_a), b.compile_single(&req_b));
        let (ra, rb) = (ra.unwrap(), rb.unwrap());

        assert!(ra.success && rb.success);
        assert_eq!(ra.generated_files, rb.generated_files);
        // Exactly one sandbox run; the other request rode along.
        assert_eq!(fx.sandbox.execution_count(), 1);
        assert!(ra.cache_hit || rb.cache_hit);
    }

    #[tokio::test]
    async fn different_languages_do_not_coalesce() {
        let fx = fixture_with(
            MockSandbox::new().with_delay(Duration::from_millis(10)),
            OrchestratorConfig::default(),
        );

        let a = fx.orchestrator.clone();
        let b = fx.orchestrator.clone();
        let req_a = request("go");
        let req_b = request("python");
        let (ra, rb) = tokio::join!(a.compile_single(&req_a), b.compile_single(&req_b));
        assert!(ra.unwrap().success);
        assert!(rb.unwrap().success);
        assert_eq!(fx.sandbox.execution_count(), 2);
    }

    #[tokio::test]
    async fn supported_languages_cover_the_builtin_table() {
        let fx = fixture();
        let languages = fx.orchestrator.supported_languages();
        assert_eq!(languages.len(), 16);
        assert!(languages.contains(&"go".to_string()));
        assert!(languages.contains(&"typescript".to_string()));
    }

    #[tokio::test]
    async fn unknown_job_status_is_not_found() {
        let fx = fixture();
        assert!(matches!(
            fx.orchestrator.get_status("nope"),
            Err(OrchestratorError::JobNotFound(_))
        ));
    }
}
