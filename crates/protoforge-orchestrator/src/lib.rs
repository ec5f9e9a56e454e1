// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! protoforge-orchestrator: compile orchestration for the protoforge
//! schema registry.
//!
//! Takes a module version's protobuf files plus their resolved
//! dependencies and produces generated source packages for every
//! supported target language, using sandboxed toolchain runs behind a
//! content-addressed artifact cache.
//!
//! # Features
//!
//! - Dependency assembly with per-module path namespacing
//! - Deterministic SHA-256 cache keys over every compile input
//! - Durable artifact cache with fail-safe reads
//! - Sandboxed toolchain execution with wall-clock budgets
//! - Concurrent per-language fan-out with bounded parallelism
//! - Single-flight coalescing of identical concurrent compiles
//! - Job lifecycle tracking with first-wins terminal transitions
//! - Artifact persistence to object storage
//! - Legacy direct-protoc path behind explicit configuration
//!
//! # Architecture
//!
//! `CompileOrchestrator` wires the pipeline together: the resolver
//! flattens dependencies into one proto set, the cache-key deriver
//! fingerprints it, the artifact cache short-circuits repeat work, the
//! sandbox runs the language toolchain, and the persister uploads the
//! artifact set. External stores are reached through the narrow
//! `VersionStorage` and `ObjectStorage` traits so the whole pipeline
//! runs against in-memory doubles in tests.

pub mod cache;
pub mod cache_key;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod generators;
pub mod jobs;
pub mod legacy;
pub mod persist;
pub mod resolver;
pub mod sandbox;
pub mod storage;
pub mod types;

pub use cache::{ArtifactCache, FsArtifactCache, MemoryArtifactCache};
pub use cache_key::derive_cache_key;
pub use config::{CompileBackend, OrchestratorConfig};
pub use coordinator::{BatchOutcome, CompileOrchestrator};
pub use error::OrchestratorError;
pub use generators::{GeneratorRegistry, Language, ToolchainSpec};
pub use jobs::{Job, JobStatus, JobStore};
pub use legacy::{Compiler, LegacyProtocCompiler};
pub use persist::ArtifactPersister;
pub use resolver::DependencyResolver;
pub use sandbox::{MockSandbox, ProcessSandbox, SandboxRunner};
pub use storage::{
    FsObjectStorage, MemoryObjectStorage, MemoryVersionStorage, ObjectStorage,
    RegistryVersionStorage, VersionRecord, VersionStorage,
};
pub use types::{
    CompilationResult, CompileRequest, Dependency, GeneratedFile, ProtoFile,
};
