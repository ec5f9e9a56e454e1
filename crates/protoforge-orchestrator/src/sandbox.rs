// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sandboxed toolchain execution.
//!
//! Each compile runs the target language's toolchain in a fresh,
//! disposable working directory with a cleared environment and a
//! wall-clock budget. The sandbox is torn down unconditionally on every
//! exit path; a timed-out child process is killed, never abandoned.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::OrchestratorError;
use crate::generators::{Language, ToolchainSpec};
use crate::types::{GeneratedFile, ProtoFile};

/// Runs one language's toolchain over an assembled proto set.
#[async_trait]
pub trait SandboxRunner: Send + Sync {
    /// Execute the toolchain and collect every emitted file.
    ///
    /// On non-zero exit the toolchain's diagnostic output is returned
    /// verbatim; on timeout the child is forcibly terminated.
    async fn execute(
        &self,
        spec: &ToolchainSpec,
        proto_files: &[ProtoFile],
        include_grpc: bool,
        options: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<Vec<GeneratedFile>, OrchestratorError>;
}

// ---------------------------------------------------------------------------
// ProcessSandbox
// ---------------------------------------------------------------------------

/// Sandbox backed by a local toolchain process in a throwaway temp dir.
pub struct ProcessSandbox {
    protoc_binary: String,
}

impl ProcessSandbox {
    /// Use the default `protoc` from PATH.
    pub fn new() -> Self {
        Self::with_binary("protoc")
    }

    /// Use an explicit compiler binary.
    pub fn with_binary(binary: impl Into<String>) -> Self {
        ProcessSandbox {
            protoc_binary: binary.into(),
        }
    }
}

impl Default for ProcessSandbox {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SandboxRunner for ProcessSandbox {
    async fn execute(
        &self,
        spec: &ToolchainSpec,
        proto_files: &[ProtoFile],
        include_grpc: bool,
        options: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<Vec<GeneratedFile>, OrchestratorError> {
        // Fresh namespace per compile; dropped on every exit path.
        let sandbox = tempfile::tempdir()
            .map_err(|e| OrchestratorError::SandboxSetup(format!("create sandbox dir: {e}")))?;

        let input_dir = sandbox.path().join("input");
        let output_dir = sandbox.path().join("out");
        for dir in [&input_dir, &output_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| OrchestratorError::SandboxSetup(format!("create sandbox dir: {e}")))?;
        }

        let mut proto_paths = Vec::with_capacity(proto_files.len());
        for file in proto_files {
            if file.path.split('/').any(|c| c == "..") || file.path.starts_with('/') {
                return Err(OrchestratorError::SandboxSetup(format!(
                    "refusing path outside sandbox: {}",
                    file.path
                )));
            }
            let dest = input_dir.join(&file.path);
            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    OrchestratorError::SandboxSetup(format!("materialize {}: {e}", file.path))
                })?;
            }
            tokio::fs::write(&dest, &file.content).await.map_err(|e| {
                OrchestratorError::SandboxSetup(format!("materialize {}: {e}", file.path))
            })?;
            proto_paths.push(file.path.clone());
        }
        proto_paths.sort();

        let args = spec.protoc_args(
            &input_dir.display().to_string(),
            &output_dir.display().to_string(),
            include_grpc,
            options,
            &proto_paths,
        );

        let mut cmd = Command::new(&self.protoc_binary);
        cmd.args(&args)
            .current_dir(&input_dir)
            .env_clear()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the output future (timeout, caller cancellation)
            // SIGKILLs the child rather than abandoning it.
            .kill_on_drop(true);
        if let Ok(path) = std::env::var("PATH") {
            cmd.env("PATH", path);
        }

        tracing::debug!(language = %spec.language, binary = %self.protoc_binary, "invoking toolchain");

        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Err(_) => {
                return Err(OrchestratorError::Timeout {
                    language: spec.language.as_str().to_string(),
                    secs: timeout.as_secs(),
                });
            }
            Ok(Err(e)) => {
                return Err(OrchestratorError::SandboxSetup(format!(
                    "spawn {}: {e}",
                    self.protoc_binary
                )));
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let mut diagnostics = String::from_utf8_lossy(&output.stderr).into_owned();
            if diagnostics.trim().is_empty() {
                diagnostics = String::from_utf8_lossy(&output.stdout).into_owned();
            }
            return Err(OrchestratorError::ToolchainFailed {
                language: spec.language.as_str().to_string(),
                diagnostics,
            });
        }

        collect_generated(&output_dir)
    }
}

/// Read back every file under the sandbox output directory, with paths
/// relative to it, sorted for deterministic results.
fn collect_generated(output_dir: &Path) -> Result<Vec<GeneratedFile>, OrchestratorError> {
    let mut files = Vec::new();
    let mut stack = vec![output_dir.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = std::fs::read_dir(&dir).map_err(|e| {
            OrchestratorError::SandboxSetup(format!("read output dir {}: {e}", dir.display()))
        })?;
        for entry in entries {
            let entry = entry.map_err(|e| {
                OrchestratorError::SandboxSetup(format!("read output dir {}: {e}", dir.display()))
            })?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            let rel = path
                .strip_prefix(output_dir)
                .map_err(|e| OrchestratorError::SandboxSetup(format!("relativize output: {e}")))?
                .to_string_lossy()
                .replace('\\', "/");
            let content = std::fs::read(&path).map_err(|e| {
                OrchestratorError::SandboxSetup(format!("read output {}: {e}", path.display()))
            })?;
            files.push(GeneratedFile { path: rel, content });
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

// ---------------------------------------------------------------------------
// MockSandbox
// ---------------------------------------------------------------------------

/// Deterministic in-process sandbox for tests and local dry runs.
///
/// Emits one stub source file per proto file using the toolchain spec's
/// generated-file suffix, so outputs look like the real toolchain's
/// (e.g. `user.proto` -> `user.pb.go`).
#[derive(Default)]
pub struct MockSandbox {
    fail_languages: HashSet<Language>,
    delay: Duration,
    executions: AtomicUsize,
}

impl MockSandbox {
    /// A sandbox that succeeds for every language.
    pub fn new() -> Self {
        Self::default()
    }

    /// A sandbox that fails compiles for the given languages.
    pub fn failing(languages: impl IntoIterator<Item = Language>) -> Self {
        MockSandbox {
            fail_languages: languages.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Add an artificial per-compile delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// How many compiles actually executed (cache hits and coalesced
    /// requests do not count).
    pub fn execution_count(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SandboxRunner for MockSandbox {
    async fn execute(
        &self,
        spec: &ToolchainSpec,
        proto_files: &[ProtoFile],
        include_grpc: bool,
        _options: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<Vec<GeneratedFile>, OrchestratorError> {
        self.executions.fetch_add(1, Ordering::SeqCst);

        if !self.delay.is_zero() {
            if self.delay >= timeout {
                tokio::time::sleep(timeout).await;
                return Err(OrchestratorError::Timeout {
                    language: spec.language.as_str().to_string(),
                    secs: timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.delay).await;
        }

        if self.fail_languages.contains(&spec.language) {
            return Err(OrchestratorError::ToolchainFailed {
                language: spec.language.as_str().to_string(),
                diagnostics: format!("mock {} toolchain failure", spec.language),
            });
        }

        let mut generated = Vec::new();
        for file in proto_files {
            let stem = file.path.strip_suffix(".proto").unwrap_or(&file.path);
            generated.push(GeneratedFile::new(
                format!("{stem}{}", spec.generated_suffix),
                format!(
                    "// generated by {} for {} ({} bytes of schema)\n",
                    spec.language,
                    file.path,
                    file.content.len()
                ),
            ));
            if include_grpc && spec.grpc_out_flag.is_some() {
                generated.push(GeneratedFile::new(
                    format!("{stem}_grpc{}", spec.generated_suffix),
                    format!("// grpc stubs generated by {} for {}\n", spec.language, file.path),
                ));
            }
        }
        generated.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(generated)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
