//! Run Ledger - everything recorded for one run, persisted as JSON

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{ArtifactRecord, MetricRecord, RunRecord};
use crate::artifact::EvaluationResult;
use crate::Result;

/// Collected run, metric and artifact records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLedger {
    run: RunRecord,
    metrics: Vec<MetricRecord>,
    artifacts: Vec<ArtifactRecord>,
    evaluation: Option<EvaluationResult>,
    model_accepted: Option<bool>,
}

impl RunLedger {
    /// Create an empty ledger for `run_id`.
    #[must_use]
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run: RunRecord::new(run_id),
            metrics: Vec::new(),
            artifacts: Vec::new(),
            evaluation: None,
            model_accepted: None,
        }
    }

    /// Run lifecycle record.
    #[must_use]
    pub const fn run(&self) -> &RunRecord {
        &self.run
    }

    /// Mutable run lifecycle record.
    pub fn run_mut(&mut self) -> &mut RunRecord {
        &mut self.run
    }

    /// Metrics in recording order.
    #[must_use]
    pub fn metrics(&self) -> &[MetricRecord] {
        &self.metrics
    }

    /// First metric with `key`, if any.
    #[must_use]
    pub fn metric(&self, key: &str) -> Option<&MetricRecord> {
        self.metrics.iter().find(|m| m.key() == key)
    }

    /// Artifacts in recording order.
    #[must_use]
    pub fn artifacts(&self) -> &[ArtifactRecord] {
        &self.artifacts
    }

    /// Evaluation scores, once evaluation has run.
    #[must_use]
    pub const fn evaluation(&self) -> Option<&EvaluationResult> {
        self.evaluation.as_ref()
    }

    /// Acceptance decision, once evaluation has run.
    #[must_use]
    pub const fn model_accepted(&self) -> Option<bool> {
        self.model_accepted
    }

    /// Append a metric.
    pub fn record_metric(&mut self, metric: MetricRecord) {
        self.metrics.push(metric);
    }

    /// Append an artifact.
    pub fn record_artifact(&mut self, artifact: ArtifactRecord) {
        self.artifacts.push(artifact);
    }

    /// Store the evaluation outcome.
    pub fn record_evaluation(&mut self, result: EvaluationResult) {
        self.model_accepted = Some(result.accepted());
        self.evaluation = Some(result);
    }

    /// Write the ledger as pretty JSON, creating parent directories.
    ///
    /// # Errors
    /// Returns error if the file cannot be written
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path.as_ref(), serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    /// Read a ledger written by [`Self::write_json`].
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn read_json(path: impl AsRef<Path>) -> Result<Self> {
        Ok(serde_json::from_slice(&fs::read(path.as_ref())?)?)
    }
}
