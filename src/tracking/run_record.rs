//! Run Record - lifecycle of one pipeline run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StageName;

/// Status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Created, no stage started yet.
    Pending,
    /// Stages are executing.
    Running,
    /// Every stage that was due ran to completion.
    Success,
    /// A stage returned an error.
    Failed,
}

/// One execution of the training pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunRecord {
    run_id: String,
    status: RunStatus,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    completed_stages: Vec<StageName>,
    failed_stage: Option<StageName>,
    error: Option<String>,
}

impl RunRecord {
    /// Create a new run record in Pending status.
    #[must_use]
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            status: RunStatus::Pending,
            started_at: None,
            ended_at: None,
            completed_stages: Vec::new(),
            failed_stage: None,
            error: None,
        }
    }

    /// Get the run ID (the run directory's timestamp).
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the current run status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Get the start timestamp, if the run has started.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Get the end timestamp, if the run has finished.
    #[must_use]
    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Stages that finished, in execution order.
    #[must_use]
    pub fn completed_stages(&self) -> &[StageName] {
        &self.completed_stages
    }

    /// Stage that aborted the run, if any.
    #[must_use]
    pub const fn failed_stage(&self) -> Option<StageName> {
        self.failed_stage
    }

    /// Error message that aborted the run, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Transition from Pending to Running and stamp `started_at`.
    pub fn start(&mut self) {
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Mark a stage as finished.
    pub fn stage_completed(&mut self, stage: StageName) {
        self.completed_stages.push(stage);
    }

    /// Finish with the given status and stamp `ended_at`.
    pub fn complete(&mut self, status: RunStatus) {
        self.status = status;
        self.ended_at = Some(Utc::now());
    }

    /// Finish as Failed, recording the stage and message.
    pub fn fail(&mut self, stage: Option<StageName>, error: impl Into<String>) {
        self.failed_stage = stage;
        self.error = Some(error.into());
        self.complete(RunStatus::Failed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_default() {
        let run = RunRecord::new("run-1");
        assert_eq!(run.status(), RunStatus::Pending);
        assert!(run.started_at().is_none());
    }

    #[test]
    fn test_run_lifecycle() {
        let mut run = RunRecord::new("run-1");
        run.start();
        assert_eq!(run.status(), RunStatus::Running);
        run.stage_completed(StageName::Ingestion);
        run.complete(RunStatus::Success);
        assert_eq!(run.status(), RunStatus::Success);
        assert_eq!(run.completed_stages(), &[StageName::Ingestion]);
        assert!(run.ended_at().is_some());
    }

    #[test]
    fn test_run_failure_records_stage() {
        let mut run = RunRecord::new("run-1");
        run.start();
        run.fail(Some(StageName::Training), "no candidates");
        assert_eq!(run.status(), RunStatus::Failed);
        assert_eq!(run.failed_stage(), Some(StageName::Training));
        assert_eq!(run.error(), Some("no candidates"));
    }
}
