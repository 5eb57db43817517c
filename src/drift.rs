//! Dataset drift report between a reference frame and a current frame
//!
//! Per feature:
//! - numeric with more than [`NUMERIC_UNIQUE_CUTOFF`] distinct values:
//!   two-sample Kolmogorov–Smirnov test
//! - everything else: chi-square goodness of fit of current category counts
//!   against reference proportions
//!
//! A feature drifts when its p-value is below the threshold (0.05). The
//! dataset drifts when the drifted share reaches 0.5.
//!
//! The serialized layout keeps the `data_drift.data.metrics` nesting of the
//! reports this pipeline has always written, so existing readers keep working.

use std::collections::{BTreeMap, BTreeSet};

use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};

use crate::frame;
use crate::Result;

/// Numeric columns with at most this many distinct values are tested as categories
pub const NUMERIC_UNIQUE_CUTOFF: usize = 5;

/// How a feature was tested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    /// Continuous numeric feature
    Numerical,
    /// Categorical or low-cardinality feature
    Categorical,
}

/// Drift verdict for one feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDrift {
    /// Feature kind
    pub feature_type: FeatureKind,
    /// Test name (`ks` or `chisquare`)
    pub stattest: String,
    /// Test statistic
    pub statistic: f64,
    /// p-value
    pub p_value: f64,
    /// Threshold the p-value was compared against
    pub threshold: f64,
    /// `p_value < threshold`
    pub drift_detected: bool,
}

/// Dataset-level metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftMetrics {
    /// Number of features tested
    pub n_features: usize,
    /// Number of drifted features
    pub n_drifted_features: usize,
    /// `n_drifted_features / n_features`
    pub share_drifted_features: f64,
    /// `share_drifted_features >= drift_share`
    pub dataset_drift: bool,
    /// Per-feature verdicts
    pub features: BTreeMap<String, FeatureDrift>,
}

/// Report payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftData {
    /// Metrics
    pub metrics: DriftMetrics,
}

/// Report section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftSection {
    /// Section payload
    pub data: DriftData,
}

/// Complete drift report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    /// Data drift section
    pub data_drift: DriftSection,
}

impl DriftReport {
    /// Dataset-level drift flag
    #[must_use]
    pub const fn dataset_drift(&self) -> bool {
        self.data_drift.data.metrics.dataset_drift
    }

    /// Fraction of drifted features (0 when no features were tested)
    #[must_use]
    pub fn drift_ratio(&self) -> f64 {
        let m = &self.data_drift.data.metrics;
        if m.n_features == 0 {
            0.0
        } else {
            m.n_drifted_features as f64 / m.n_features as f64
        }
    }

    /// Per-feature verdicts
    #[must_use]
    pub const fn features(&self) -> &BTreeMap<String, FeatureDrift> {
        &self.data_drift.data.metrics.features
    }
}

/// Drift report generator
#[derive(Debug, Clone, Copy)]
pub struct DriftDetector {
    threshold: f64,
    drift_share: f64,
}

impl Default for DriftDetector {
    fn default() -> Self {
        Self {
            threshold: 0.05,
            drift_share: 0.5,
        }
    }
}

impl DriftDetector {
    /// Detector with the default thresholds (p < 0.05, share >= 0.5)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-feature p-value threshold
    #[must_use]
    pub const fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the drifted share at which the dataset counts as drifted
    #[must_use]
    pub const fn with_drift_share(mut self, share: f64) -> Self {
        self.drift_share = share;
        self
    }

    /// Compare every column present in both frames
    ///
    /// # Errors
    /// Returns error if a column cannot be read
    pub fn report(&self, reference: &RecordBatch, current: &RecordBatch) -> Result<DriftReport> {
        let mut features = BTreeMap::new();

        for name in frame::column_names(reference) {
            if !frame::has_column(current, &name) {
                continue;
            }
            let verdict = self.test_feature(reference, current, &name)?;
            features.insert(name, verdict);
        }

        let n_features = features.len();
        let n_drifted_features = features.values().filter(|f| f.drift_detected).count();
        let share_drifted_features = if n_features == 0 {
            0.0
        } else {
            n_drifted_features as f64 / n_features as f64
        };

        Ok(DriftReport {
            data_drift: DriftSection {
                data: DriftData {
                    metrics: DriftMetrics {
                        n_features,
                        n_drifted_features,
                        share_drifted_features,
                        dataset_drift: n_features > 0 && share_drifted_features >= self.drift_share,
                        features,
                    },
                },
            },
        })
    }

    fn test_feature(
        &self,
        reference: &RecordBatch,
        current: &RecordBatch,
        name: &str,
    ) -> Result<FeatureDrift> {
        let numeric =
            frame::is_numeric_column(reference, name)? && frame::is_numeric_column(current, name)?;

        if numeric {
            let ref_values = finite(frame::numeric_column(reference, name)?);
            let cur_values = finite(frame::numeric_column(current, name)?);
            if distinct_count(&ref_values) > NUMERIC_UNIQUE_CUTOFF {
                let (statistic, p_value) = ks_two_sample(&ref_values, &cur_values);
                return Ok(self.verdict(FeatureKind::Numerical, "ks", statistic, p_value));
            }
        }

        let ref_values = frame::string_column(reference, name)?;
        let cur_values = frame::string_column(current, name)?;
        let (statistic, p_value) = chi_square(&ref_values, &cur_values);
        Ok(self.verdict(FeatureKind::Categorical, "chisquare", statistic, p_value))
    }

    fn verdict(&self, kind: FeatureKind, test: &str, statistic: f64, p_value: f64) -> FeatureDrift {
        FeatureDrift {
            feature_type: kind,
            stattest: test.to_string(),
            statistic,
            p_value,
            threshold: self.threshold,
            drift_detected: p_value < self.threshold,
        }
    }
}

fn finite(values: Vec<f64>) -> Vec<f64> {
    values.into_iter().filter(|v| v.is_finite()).collect()
}

fn distinct_count(values: &[f64]) -> usize {
    values
        .iter()
        .map(|v| v.to_bits())
        .collect::<BTreeSet<_>>()
        .len()
}

/// Two-sample Kolmogorov–Smirnov test: `(D, p-value)`
///
/// Uses the asymptotic Kolmogorov distribution with the Stephens
/// small-sample correction. Empty samples yield `(0, 1)`.
#[must_use]
pub fn ks_two_sample(a: &[f64], b: &[f64]) -> (f64, f64) {
    if a.is_empty() || b.is_empty() {
        return (0.0, 1.0);
    }
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort_by(f64::total_cmp);
    b.sort_by(f64::total_cmp);

    let (n, m) = (a.len(), b.len());
    let (mut i, mut j) = (0, 0);
    let mut d: f64 = 0.0;
    while i < n && j < m {
        let x = a[i].min(b[j]);
        while i < n && a[i] <= x {
            i += 1;
        }
        while j < m && b[j] <= x {
            j += 1;
        }
        let diff = (i as f64 / n as f64 - j as f64 / m as f64).abs();
        d = d.max(diff);
    }

    let en = ((n * m) as f64 / (n + m) as f64).sqrt();
    let p = kolmogorov_q((en + 0.12 + 0.11 / en) * d);
    (d, p)
}

/// Survival function of the Kolmogorov distribution
fn kolmogorov_q(lambda: f64) -> f64 {
    if lambda < 1e-3 {
        return 1.0;
    }
    let a2 = -2.0 * lambda * lambda;
    let mut sum = 0.0;
    let mut sign = 1.0;
    let mut prev_term = 0.0_f64;
    for j in 1..=100 {
        let jf = f64::from(j);
        let term = sign * 2.0 * (a2 * jf * jf).exp();
        sum += term;
        if term.abs() <= 1e-10 * prev_term.abs() || term.abs() <= 1e-12 * sum.abs() {
            return sum.clamp(0.0, 1.0);
        }
        sign = -sign;
        prev_term = term;
    }
    // Series failed to converge: lambda is tiny, distributions are identical
    1.0
}

/// Chi-square test of current category counts against reference proportions:
/// `(statistic, p-value)`
///
/// A category seen in `current` but never in `reference` makes the statistic
/// infinite (p = 0). Fewer than two categories yields `(0, 1)`.
#[must_use]
pub fn chi_square(reference: &[String], current: &[String]) -> (f64, f64) {
    if reference.is_empty() || current.is_empty() {
        return (0.0, 1.0);
    }
    let mut ref_counts: BTreeMap<&str, f64> = BTreeMap::new();
    let mut cur_counts: BTreeMap<&str, f64> = BTreeMap::new();
    for v in reference {
        *ref_counts.entry(v.as_str()).or_default() += 1.0;
        cur_counts.entry(v.as_str()).or_default();
    }
    for v in current {
        *cur_counts.entry(v.as_str()).or_default() += 1.0;
        ref_counts.entry(v.as_str()).or_default();
    }

    let k = ref_counts.len();
    if k < 2 {
        return (0.0, 1.0);
    }

    let n_ref = reference.len() as f64;
    let n_cur = current.len() as f64;
    let mut statistic = 0.0;
    for (category, &ref_count) in &ref_counts {
        let observed = cur_counts[category];
        let expected = ref_count / n_ref * n_cur;
        if expected == 0.0 {
            if observed > 0.0 {
                return (f64::INFINITY, 0.0);
            }
            continue;
        }
        statistic += (observed - expected).powi(2) / expected;
    }

    let dof = (k - 1) as f64;
    (statistic, gamma_q(dof / 2.0, statistic / 2.0))
}

/// Natural log of the gamma function (Lanczos approximation)
fn ln_gamma(x: f64) -> f64 {
    const COEF: [f64; 6] = [
        76.180_091_729_471_46,
        -86.505_320_329_416_77,
        24.014_098_240_830_91,
        -1.231_739_572_450_155,
        0.001_208_650_973_866_179,
        -0.000_005_395_239_384_953,
    ];
    let mut y = x;
    let tmp = x + 5.5;
    let tmp = tmp - (x + 0.5) * tmp.ln();
    let mut ser = 1.000_000_000_190_015;
    for c in COEF {
        y += 1.0;
        ser += c / y;
    }
    -tmp + (2.506_628_274_631_000_5 * ser / x).ln()
}

/// Regularized upper incomplete gamma function `Q(a, x)`
fn gamma_q(a: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    if !x.is_finite() {
        return 0.0;
    }
    if x < a + 1.0 {
        1.0 - gamma_p_series(a, x)
    } else {
        gamma_q_continued_fraction(a, x)
    }
}

fn gamma_p_series(a: f64, x: f64) -> f64 {
    let mut ap = a;
    let mut del = 1.0 / a;
    let mut sum = del;
    for _ in 0..500 {
        ap += 1.0;
        del *= x / ap;
        sum += del;
        if del.abs() < sum.abs() * 1e-14 {
            break;
        }
    }
    (sum.ln() - x + a * x.ln() - ln_gamma(a)).exp()
}

fn gamma_q_continued_fraction(a: f64, x: f64) -> f64 {
    const TINY: f64 = 1e-300;
    let mut b = x + 1.0 - a;
    let mut c = 1.0 / TINY;
    let mut d = 1.0 / b;
    let mut h = d;
    for i in 1..500 {
        let an = -f64::from(i) * (f64::from(i) - a);
        b += 2.0;
        d = an * d + b;
        if d.abs() < TINY {
            d = TINY;
        }
        c = b + an / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;
        if (del - 1.0).abs() < 1e-14 {
            break;
        }
    }
    (-x + a * x.ln() - ln_gamma(a)).exp() * h
}
