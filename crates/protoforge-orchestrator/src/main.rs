// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! protoforge compile orchestrator CLI
//!
//! Compiles published schema modules into per-language source packages.
//! The module registry is seeded from a directory of JSON version files
//! (the registry's file-persistence layout).
//!
//! # Usage
//!
//! ```bash
//! # Compile one module for one language
//! protoforge-orchestrator --registry-dir ./registry compile \
//!     --module user-service --version v1.0.0 --language go
//!
//! # Fan out across languages
//! protoforge-orchestrator --registry-dir ./registry compile-all \
//!     --module user-service --version v1.0.0 --languages go,python,java
//!
//! # List supported languages
//! protoforge-orchestrator languages
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use protoforge_orchestrator::{
    CompileBackend, CompileOrchestrator, CompileRequest, Compiler, FsArtifactCache,
    FsObjectStorage, GeneratorRegistry, LegacyProtocCompiler, OrchestratorConfig, ProcessSandbox,
    RegistryVersionStorage,
};
use protoforge_registry::{FilePersistence, ModuleRegistryApi, VersionEntry};

/// protoforge compile orchestrator
#[derive(Parser, Debug)]
#[command(name = "protoforge-orchestrator")]
#[command(about = "Compile schema modules into per-language packages")]
#[command(version)]
struct Args {
    /// Directory holding published module versions (registry layout)
    #[arg(long, default_value = "./registry")]
    registry_dir: PathBuf,

    /// Root directory for persisted artifacts
    #[arg(long, default_value = "./artifacts")]
    artifacts_dir: PathBuf,

    /// Artifact cache directory
    #[arg(long, default_value = ".protoforge-cache")]
    cache_dir: PathBuf,

    /// Compile backend: orchestrator or legacy-protoc
    #[arg(long, default_value = "orchestrator")]
    backend: String,

    /// Maximum concurrent per-language compiles
    #[arg(long, default_value = "4")]
    parallelism: usize,

    /// Per-compile wall-clock budget in seconds
    #[arg(long, default_value = "120")]
    timeout: u64,

    /// Log filter (e.g. "info", "protoforge_orchestrator=debug")
    #[arg(long, default_value = "info")]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile one module version for one language
    Compile {
        /// Module name
        #[arg(short, long)]
        module: String,

        /// Version label (defaults to the latest published)
        #[arg(short, long)]
        version: Option<String>,

        /// Target language
        #[arg(short, long)]
        language: String,

        /// Also generate gRPC service stubs
        #[arg(long)]
        grpc: bool,
    },

    /// Compile one module version for several languages concurrently
    CompileAll {
        /// Module name
        #[arg(short, long)]
        module: String,

        /// Version label (defaults to the latest published)
        #[arg(short, long)]
        version: Option<String>,

        /// Comma-separated target languages
        #[arg(short, long)]
        languages: String,

        /// Also generate gRPC service stubs
        #[arg(long)]
        grpc: bool,
    },

    /// Show the status of a compile job
    Status {
        /// Job id ({module}-{version}-{language})
        job_id: String,
    },

    /// List supported target languages
    Languages,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(args.log.clone())),
        )
        .with_target(false)
        .init();

    let config = OrchestratorConfig::builder()
        .max_parallelism(args.parallelism)
        .sandbox_timeout_secs(args.timeout)
        .cache_dir(args.cache_dir.clone())
        .backend(parse_backend(&args.backend)?)
        .build();

    match &args.command {
        Commands::Languages => {
            for language in GeneratorRegistry::builtin().supported_languages() {
                println!("{language}");
            }
            Ok(())
        }
        Commands::Status { job_id } => {
            // Jobs live in the orchestrator process; a fresh CLI run has
            // an empty store. Useful when pointed at a long-lived service
            // via the library API; here it reports honestly.
            let orchestrator = build_orchestrator(&args, &config)?;
            match orchestrator.get_status(job_id) {
                Ok(job) => {
                    println!("{}: {} ({})", job.id, job.status, job.language);
                    Ok(())
                }
                Err(e) => bail!("{e}"),
            }
        }
        Commands::Compile {
            module,
            version,
            language,
            grpc,
        } => {
            let registry = load_registry(&args.registry_dir)?;
            let entry = lookup_entry(&registry, module, version.as_deref())?;
            let request = request_from_entry(&entry, language, *grpc);

            let result = match config.backend {
                CompileBackend::Orchestrator => {
                    let orchestrator = build_orchestrator_over(&args, &config, registry);
                    orchestrator.compile(&request).await?
                }
                CompileBackend::LegacyProtoc => {
                    let compiler = LegacyProtocCompiler::new(
                        Arc::new(RegistryVersionStorage::new(registry)),
                        Arc::new(ProcessSandbox::new()),
                        config.sandbox_timeout(),
                    );
                    compiler.compile(&request).await?
                }
            };

            print_result(&result);
            if !result.success {
                bail!("compile failed");
            }
            Ok(())
        }
        Commands::CompileAll {
            module,
            version,
            languages,
            grpc,
        } => {
            let registry = load_registry(&args.registry_dir)?;
            let entry = lookup_entry(&registry, module, version.as_deref())?;

            let language_list: Vec<String> = languages
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();

            let base = request_from_entry(&entry, "", *grpc);
            let orchestrator = build_orchestrator_over(&args, &config, registry);
            let outcome = orchestrator.compile_all(&base, &language_list).await?;

            for result in &outcome.results {
                print_result(result);
            }
            println!(
                "{} succeeded, {} failed",
                outcome.results.len() - outcome.failed_count(),
                outcome.failed_count()
            );

            if let Some(e) = outcome.error() {
                bail!("{e}");
            }
            Ok(())
        }
    }
}

fn parse_backend(s: &str) -> Result<CompileBackend> {
    match s {
        "orchestrator" => Ok(CompileBackend::Orchestrator),
        "legacy-protoc" => Ok(CompileBackend::LegacyProtoc),
        other => bail!("unknown backend: {other} (use orchestrator or legacy-protoc)"),
    }
}

fn load_registry(dir: &PathBuf) -> Result<ModuleRegistryApi> {
    let persistence = FilePersistence::new(dir.clone())
        .with_context(|| format!("open registry dir {}", dir.display()))?;
    let registry = persistence.load().context("load registry")?;
    tracing::info!(modules = registry.module_count(), dir = %dir.display(), "registry loaded");
    Ok(ModuleRegistryApi::new(Arc::new(std::sync::RwLock::new(
        registry,
    ))))
}

fn lookup_entry(
    registry: &ModuleRegistryApi,
    module: &str,
    version: Option<&str>,
) -> Result<VersionEntry> {
    let entry = match version {
        Some(v) => registry.get_version(module, v),
        None => registry.latest_version(module),
    };
    entry.with_context(|| match version {
        Some(v) => format!("module {module}@{v} not found in registry"),
        None => format!("module {module} has no published versions"),
    })
}

fn request_from_entry(entry: &VersionEntry, language: &str, grpc: bool) -> CompileRequest {
    let mut request = CompileRequest::new(
        entry.module_name.clone(),
        entry.version.clone(),
        entry.proto_files.clone(),
        language,
    );
    request.dependencies =
        protoforge_orchestrator::resolver::dependencies_from_ids(&entry.dependencies);
    request.include_grpc = grpc;
    request
}

fn build_orchestrator(args: &Args, config: &OrchestratorConfig) -> Result<CompileOrchestrator> {
    let registry = load_registry(&args.registry_dir)?;
    Ok(build_orchestrator_over(args, config, registry))
}

fn build_orchestrator_over(
    args: &Args,
    config: &OrchestratorConfig,
    registry: ModuleRegistryApi,
) -> CompileOrchestrator {
    CompileOrchestrator::new(
        config.clone(),
        Arc::new(RegistryVersionStorage::new(registry)),
        Arc::new(FsObjectStorage::new(args.artifacts_dir.clone())),
        Arc::new(ProcessSandbox::new()),
        Arc::new(FsArtifactCache::new(config.cache_dir.clone())),
        GeneratorRegistry::builtin(),
    )
}

fn print_result(result: &protoforge_orchestrator::CompilationResult) {
    if result.success {
        println!(
            "{:<12} ok   {} generated, {} manifests, {}ms{}{}",
            result.language,
            result.generated_files.len(),
            result.package_files.len(),
            result.duration.as_millis(),
            if result.cache_hit { " (cached)" } else { "" },
            if result.storage_key.is_empty() {
                String::new()
            } else {
                format!(" -> {}/{}", result.storage_bucket, result.storage_key)
            },
        );
    } else {
        println!("{:<12} FAIL {}", result.language, result.error);
    }
}
