// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Compile job lifecycle tracking.
//!
//! One job per `(module, version, language)` compile. The state machine
//! is `Queued -> Running -> {Completed | Failed}`; terminal states are
//! absorbing. Two workers racing to finish the same job settle by
//! first-wins: the transition is checked and applied under one lock, so
//! the loser's update is a no-op.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;

/// Lifecycle state of one compile job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Completed and Failed are absorbing.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One tracked compile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub module_name: String,
    pub version: String,
    pub language: String,
    pub status: JobStatus,
    /// Diagnostic text, set on failure only.
    pub error: String,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

/// Deterministic job id for a compile.
pub fn job_id(module_name: &str, version: &str, language: &str) -> String {
    format!("{module_name}-{version}-{language}")
}

/// In-memory job table shared across workers.
#[derive(Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl JobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a job in `Queued`, or return the existing record when the
    /// same compile was already dispatched.
    pub fn create(&self, module_name: &str, version: &str, language: &str) -> Job {
        let id = job_id(module_name, version, language);
        let mut jobs = self.jobs.write().expect("job store lock poisoned");

        if let Some(existing) = jobs.get(&id) {
            if !existing.status.is_terminal() {
                tracing::debug!(job_id = %id, status = %existing.status, "re-dispatch joins live job");
                return existing.clone();
            }
        }

        let now = SystemTime::now();
        let job = Job {
            id: id.clone(),
            module_name: module_name.to_string(),
            version: version.to_string(),
            language: language.to_string(),
            status: JobStatus::Queued,
            error: String::new(),
            created_at: now,
            updated_at: now,
        };
        jobs.insert(id, job.clone());
        job
    }

    /// Move a job to a new status. Transitions out of a terminal state
    /// are silent no-ops; the first terminal writer wins.
    pub fn transition(&self, id: &str, status: JobStatus) -> Result<Job, OrchestratorError> {
        self.update(id, status, None)
    }

    /// Mark a job completed.
    pub fn complete(&self, id: &str) -> Result<Job, OrchestratorError> {
        self.update(id, JobStatus::Completed, None)
    }

    /// Mark a job failed with a diagnostic.
    pub fn fail(&self, id: &str, error: impl Into<String>) -> Result<Job, OrchestratorError> {
        self.update(id, JobStatus::Failed, Some(error.into()))
    }

    /// Look up a job by id.
    pub fn get(&self, id: &str) -> Result<Job, OrchestratorError> {
        self.jobs
            .read()
            .expect("job store lock poisoned")
            .get(id)
            .cloned()
            .ok_or(OrchestratorError::JobNotFound(id.to_string()))
    }

    /// All jobs, sorted by id for stable listings.
    pub fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .jobs
            .read()
            .expect("job store lock poisoned")
            .values()
            .cloned()
            .collect();
        jobs.sort_by(|a, b| a.id.cmp(&b.id));
        jobs
    }

    fn update(
        &self,
        id: &str,
        status: JobStatus,
        error: Option<String>,
    ) -> Result<Job, OrchestratorError> {
        let mut jobs = self.jobs.write().expect("job store lock poisoned");
        let job = jobs
            .get_mut(id)
            .ok_or(OrchestratorError::JobNotFound(id.to_string()))?;

        if job.status.is_terminal() {
            tracing::debug!(job_id = %id, current = %job.status, attempted = %status,
                "ignoring transition out of terminal state");
            return Ok(job.clone());
        }

        job.status = status;
        job.updated_at = SystemTime::now();
        if let Some(error) = error {
            job.error = error;
        }
        tracing::info!(job_id = %id, status = %status, "job transition");
        Ok(job.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_is_deterministic() {
        assert_eq!(job_id("user-service", "v1.0.0", "go"), "user-service-v1.0.0-go");
    }

    #[test]
    fn create_starts_queued() {
        let store = JobStore::new();
        let job = store.create("user-service", "v1.0.0", "go");
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.id, "user-service-v1.0.0-go");
        assert!(job.error.is_empty());
    }

    #[test]
    fn normal_lifecycle() {
        let store = JobStore::new();
        let job = store.create("user-service", "v1.0.0", "go");

        let running = store.transition(&job.id, JobStatus::Running).unwrap();
        assert_eq!(running.status, JobStatus::Running);

        let done = store.complete(&job.id).unwrap();
        assert_eq!(done.status, JobStatus::Completed);
    }

    #[test]
    fn first_terminal_transition_wins() {
        let store = JobStore::new();
        let job = store.create("user-service", "v1.0.0", "go");
        store.transition(&job.id, JobStatus::Running).unwrap();

        let failed = store.fail(&job.id, "toolchain exploded").unwrap();
        assert_eq!(failed.status, JobStatus::Failed);

        // A racing worker's success arrives second and is ignored.
        let after = store.complete(&job.id).unwrap();
        assert_eq!(after.status, JobStatus::Failed);
        assert_eq!(after.error, "toolchain exploded");
    }

    #[test]
    fn redispatch_of_live_job_returns_existing() {
        let store = JobStore::new();
        let first = store.create("user-service", "v1.0.0", "go");
        store.transition(&first.id, JobStatus::Running).unwrap();

        let second = store.create("user-service", "v1.0.0", "go");
        assert_eq!(second.status, JobStatus::Running);
        assert_eq!(second.created_at, first.created_at);
    }

    #[test]
    fn redispatch_after_terminal_creates_fresh_job() {
        let store = JobStore::new();
        let first = store.create("user-service", "v1.0.0", "go");
        store.fail(&first.id, "boom").unwrap();

        let second = store.create("user-service", "v1.0.0", "go");
        assert_eq!(second.status, JobStatus::Queued);
        assert!(second.error.is_empty());
    }

    #[test]
    fn unknown_job_is_not_found() {
        let store = JobStore::new();
        assert!(matches!(
            store.get("nope"),
            Err(OrchestratorError::JobNotFound(_))
        ));
        assert!(matches!(
            store.complete("nope"),
            Err(OrchestratorError::JobNotFound(_))
        ));
    }

    #[test]
    fn list_is_sorted_by_id() {
        let store = JobStore::new();
        store.create("zeta", "v1", "go");
        store.create("alpha", "v1", "go");
        let ids: Vec<String> = store.list().into_iter().map(|j| j.id).collect();
        assert_eq!(ids, vec!["alpha-v1-go", "zeta-v1-go"]);
    }
}
