//! IQR outlier capping
//!
//! Bounds are `q1 - 1.5 * iqr` and `q3 + 1.5 * iqr`, with quartiles computed
//! by linear interpolation between closest ranks. Values outside the bounds
//! are clamped to them; everything else is left untouched.

use std::collections::BTreeSet;

use arrow::record_batch::RecordBatch;
use tracing::debug;

use crate::frame;
use crate::Result;

/// Numeric columns need at least this many distinct values to be capped
pub const CONTINUOUS_MIN_UNIQUE: usize = 25;

/// IQR multiplier for the capping bounds
pub const IQR_FACTOR: f64 = 1.5;

/// Quantile of `values` with linear interpolation (`q` in `[0, 1]`)
///
/// NaN values are ignored. Returns NaN for an empty input.
#[must_use]
pub fn quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(f64::total_cmp);

    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Lower and upper capping bounds for `values`
#[must_use]
pub fn iqr_bounds(values: &[f64]) -> (f64, f64) {
    let q1 = quantile(values, 0.25);
    let q3 = quantile(values, 0.75);
    let iqr = q3 - q1;
    (q1 - IQR_FACTOR * iqr, q3 + IQR_FACTOR * iqr)
}

/// Clamp values into their own IQR bounds
#[must_use]
pub fn cap_values(values: &[f64]) -> Vec<f64> {
    let (lower, upper) = iqr_bounds(values);
    values
        .iter()
        .map(|&v| {
            if v > upper {
                upper
            } else if v < lower {
                lower
            } else {
                v
            }
        })
        .collect()
}

/// Declared numeric columns with at least [`CONTINUOUS_MIN_UNIQUE`] distinct values
///
/// # Errors
/// Returns error if a declared column is missing or not numeric
pub fn continuous_columns(batch: &RecordBatch, numerical: &[String]) -> Result<Vec<String>> {
    let mut continuous = Vec::new();
    for name in numerical {
        let distinct = frame::numeric_column(batch, name)?
            .into_iter()
            .map(f64::to_bits)
            .collect::<BTreeSet<_>>()
            .len();
        if distinct >= CONTINUOUS_MIN_UNIQUE {
            continuous.push(name.clone());
        }
    }
    Ok(continuous)
}

/// Cap every listed column of `batch` using that batch's own quartiles
///
/// # Errors
/// Returns error if a column is missing or not numeric
pub fn cap_outliers(batch: &RecordBatch, columns: &[String]) -> Result<RecordBatch> {
    let mut out = batch.clone();
    for name in columns {
        let values = frame::numeric_column(&out, name)?;
        let (lower, upper) = iqr_bounds(&values);
        debug!(column = %name, lower, upper, "capping outliers");
        out = frame::replace_numeric_column(&out, name, cap_values(&values))?;
    }
    Ok(out)
}
