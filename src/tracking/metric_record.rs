//! Metric Record - scalar results produced during a run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StageName;

/// One named score or statistic, tagged with the stage that produced it.
///
/// `step` orders values sharing a key; for candidate scores it is the
/// candidate's position in `model.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricRecord {
    stage: StageName,
    key: String,
    step: u64,
    value: f64,
    recorded_at: DateTime<Utc>,
}

impl MetricRecord {
    /// Record `value` for `key` now.
    #[must_use]
    pub fn new(stage: StageName, key: impl Into<String>, step: u64, value: f64) -> Self {
        Self {
            stage,
            key: key.into(),
            step,
            value,
            recorded_at: Utc::now(),
        }
    }

    /// Score of a searched candidate (`<candidate>.<score>`).
    #[must_use]
    pub fn candidate(name: &str, score: &str, step: u64, value: f64) -> Self {
        Self::new(StageName::Training, format!("{name}.{score}"), step, value)
    }

    /// Stage that produced the value.
    #[must_use]
    pub const fn stage(&self) -> StageName {
        self.stage
    }

    /// Metric key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Ordering step.
    #[must_use]
    pub const fn step(&self) -> u64 {
        self.step
    }

    /// Recorded value.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// When the value was recorded.
    #[must_use]
    pub const fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }
}
