//! Run tracking
//!
//! A [`RunLedger`] collects what happened during one pipeline run and is
//! written as `run_manifest.json` at the run root.
//!
//! ```text
//! RunRecord (1) ──┬──< MetricRecord (N)   [candidate scores, evaluation, drift]
//!                 └──< ArtifactRecord (N) [one per persisted stage output]
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use shipment_cost::tracking::{MetricRecord, RunLedger, RunStatus};
//!
//! let mut ledger = RunLedger::new("10_17_2026_09_30_00");
//! ledger.run_mut().start();
//! ledger.record_metric(MetricRecord::candidate("k_neighbors", "test_r2", 0, 0.71));
//! ledger.run_mut().complete(RunStatus::Success);
//! assert_eq!(ledger.metrics().len(), 1);
//! ```

mod artifact_record;
mod ledger;
mod metric_record;
mod run_record;

pub use artifact_record::ArtifactRecord;
pub use ledger::RunLedger;
pub use metric_record::MetricRecord;
pub use run_record::{RunRecord, RunStatus};
