// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error taxonomy for the compile orchestrator.
//!
//! Client errors (caller's fault) surface immediately and are never
//! retried. Compile errors terminate their own per-language task, never
//! the batch. Persistence errors downgrade an otherwise successful
//! compile, with a diagnostic that distinguishes the two cases.

use thiserror::Error;

/// Errors produced by the compile orchestrator.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The requested language has no registered toolchain. Client error.
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// A batch compile was requested with no languages. Client error.
    #[error("empty language list")]
    EmptyLanguageList,

    /// A named dependency is missing from version storage. Fatal for the
    /// whole request: generated code would reference types that do not
    /// exist.
    #[error("dependency not found: {module}@{version}")]
    DependencyNotFound { module: String, version: String },

    /// The sandbox environment could not be prepared (temp dir, file
    /// materialization, toolchain spawn).
    #[error("sandbox setup failed: {0}")]
    SandboxSetup(String),

    /// The toolchain exited non-zero. Carries the compiler's diagnostic
    /// output verbatim.
    #[error("{language} toolchain failed: {diagnostics}")]
    ToolchainFailed {
        language: String,
        diagnostics: String,
    },

    /// The sandbox exceeded its wall-clock budget and was terminated.
    #[error("{language} compile timed out after {secs}s")]
    Timeout { language: String, secs: u64 },

    /// Artifact upload failed after a successful compile.
    #[error("compile succeeded but artifacts could not be stored: {0}")]
    Persistence(String),

    /// At least one language in a batch failed.
    #[error("partial failure: {failed} of {total} languages failed")]
    PartialFailure { failed: usize, total: usize },

    /// No job record exists for the given id.
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// Artifact cache read/write error.
    #[error("cache error: {0}")]
    Cache(String),

    /// Version or object storage error.
    #[error("storage error: {0}")]
    Storage(String),
}

impl OrchestratorError {
    /// True for errors that are the caller's fault and not worth retrying.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            OrchestratorError::UnsupportedLanguage(_) | OrchestratorError::EmptyLanguageList
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = OrchestratorError::UnsupportedLanguage("cobol".into());
        assert_eq!(err.to_string(), "unsupported language: cobol");

        let err = OrchestratorError::DependencyNotFound {
            module: "user-service".into(),
            version: "v1.0.0".into(),
        };
        assert_eq!(err.to_string(), "dependency not found: user-service@v1.0.0");

        let err = OrchestratorError::PartialFailure { failed: 1, total: 3 };
        assert_eq!(err.to_string(), "partial failure: 1 of 3 languages failed");
    }

    #[test]
    fn client_error_classification() {
        assert!(OrchestratorError::UnsupportedLanguage("x".into()).is_client_error());
        assert!(OrchestratorError::EmptyLanguageList.is_client_error());
        assert!(!OrchestratorError::Timeout {
            language: "go".into(),
            secs: 30
        }
        .is_client_error());
    }

    #[test]
    fn toolchain_error_preserves_diagnostics() {
        let err = OrchestratorError::ToolchainFailed {
            language: "go".into(),
            diagnostics: "user.proto:3:1: expected \";\"".into(),
        };
        assert!(err.to_string().contains("expected \";\""));
    }
}
