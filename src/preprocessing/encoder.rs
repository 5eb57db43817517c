//! Column encoders and the composite column transformer
//!
//! Output layout is fixed: one-hot blocks, then binary blocks, then scaled
//! numeric columns. Columns not named in any group are dropped.

use std::collections::HashMap;

use arrow::record_batch::RecordBatch;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::frame;
use crate::{Error, Result};

/// What to do with a category that was not seen during fitting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandleUnknown {
    /// Fail the transform
    Error,
    /// Encode as all zeros
    #[default]
    Ignore,
}

/// Fitted one-hot encoder for a single column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    column: String,
    categories: Vec<String>,
}

impl OneHotEncoder {
    /// Learn the sorted distinct categories of `values`
    #[must_use]
    pub fn fit(column: impl Into<String>, values: &[String]) -> Self {
        let mut categories = values.to_vec();
        categories.sort();
        categories.dedup();
        Self {
            column: column.into(),
            categories,
        }
    }

    /// Sorted categories
    #[must_use]
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Output column names (`<column>_<category>`)
    #[must_use]
    pub fn feature_names(&self) -> Vec<String> {
        self.categories
            .iter()
            .map(|c| format!("{}_{c}", self.column))
            .collect()
    }

    /// Encode into one output column per category
    ///
    /// # Errors
    /// Returns [`Error::Schema`] for an unseen category under [`HandleUnknown::Error`]
    pub fn transform(&self, values: &[String], unknown: HandleUnknown) -> Result<Vec<Vec<f64>>> {
        let mut out = vec![vec![0.0; values.len()]; self.categories.len()];
        for (row, value) in values.iter().enumerate() {
            match self.categories.binary_search(value) {
                Ok(idx) => out[idx][row] = 1.0,
                Err(_) => unknown_category(&self.column, value, unknown)?,
            }
        }
        Ok(out)
    }
}

/// Fitted binary encoder for a single column
///
/// Categories get ordinal codes `1..=n` in order of first appearance; each
/// code is written most-significant bit first over `bit_length(n)` columns.
/// Code 0 (all zeros) is reserved for unknown categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryEncoder {
    column: String,
    categories: Vec<String>,
    n_bits: usize,
}

impl BinaryEncoder {
    /// Learn categories of `values` in order of first appearance
    #[must_use]
    pub fn fit(column: impl Into<String>, values: &[String]) -> Self {
        let mut categories: Vec<String> = Vec::new();
        for v in values {
            if !categories.contains(v) {
                categories.push(v.clone());
            }
        }
        let n_bits = bit_length(categories.len());
        Self {
            column: column.into(),
            categories,
            n_bits,
        }
    }

    /// Categories in code order (code = index + 1)
    #[must_use]
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Number of output columns
    #[must_use]
    pub const fn n_bits(&self) -> usize {
        self.n_bits
    }

    /// Output column names (`<column>_<bit>`)
    #[must_use]
    pub fn feature_names(&self) -> Vec<String> {
        (0..self.n_bits)
            .map(|i| format!("{}_{i}", self.column))
            .collect()
    }

    /// Encode into `n_bits` output columns
    ///
    /// # Errors
    /// Returns [`Error::Schema`] for an unseen category under [`HandleUnknown::Error`]
    pub fn transform(&self, values: &[String], unknown: HandleUnknown) -> Result<Vec<Vec<f64>>> {
        let codes: HashMap<&str, usize> = self
            .categories
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i + 1))
            .collect();

        let mut out = vec![vec![0.0; values.len()]; self.n_bits];
        for (row, value) in values.iter().enumerate() {
            let Some(&code) = codes.get(value.as_str()) else {
                unknown_category(&self.column, value, unknown)?;
                continue;
            };
            for (bit, column) in out.iter_mut().enumerate() {
                let shift = self.n_bits - 1 - bit;
                column[row] = ((code >> shift) & 1) as f64;
            }
        }
        Ok(out)
    }
}

/// Number of bits needed to write `n` in base 2 (`bit_length(0) == 0`)
#[must_use]
pub const fn bit_length(n: usize) -> usize {
    (usize::BITS - n.leading_zeros()) as usize
}

fn unknown_category(column: &str, value: &str, unknown: HandleUnknown) -> Result<()> {
    match unknown {
        HandleUnknown::Ignore => Ok(()),
        HandleUnknown::Error => Err(Error::Schema(format!(
            "unknown category {value:?} in column {column}"
        ))),
    }
}

/// Fitted standard scaler for a single column (population std, zero std -> 1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    column: String,
    mean: f64,
    std: f64,
}

impl StandardScaler {
    /// Learn mean and population standard deviation of `values`
    ///
    /// # Errors
    /// Returns [`Error::EmptyData`] for no values
    pub fn fit(column: impl Into<String>, values: &[f64]) -> Result<Self> {
        let column = column.into();
        if values.is_empty() {
            return Err(Error::EmptyData(format!("cannot scale empty column {column}")));
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = if var.sqrt() > f64::EPSILON { var.sqrt() } else { 1.0 };
        Ok(Self { column, mean, std })
    }

    /// Learned mean
    #[must_use]
    pub const fn mean(&self) -> f64 {
        self.mean
    }

    /// Learned standard deviation
    #[must_use]
    pub const fn std(&self) -> f64 {
        self.std
    }

    /// `(x - mean) / std`
    #[must_use]
    pub fn transform(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|v| (v - self.mean) / self.std).collect()
    }
}

/// Unfitted composite transformer: which columns go through which encoder
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnTransformer {
    onehot_columns: Vec<String>,
    binary_columns: Vec<String>,
    numerical_columns: Vec<String>,
    handle_unknown: HandleUnknown,
}

impl ColumnTransformer {
    /// Create a transformer over the three column groups
    #[must_use]
    pub fn new(
        onehot_columns: Vec<String>,
        binary_columns: Vec<String>,
        numerical_columns: Vec<String>,
    ) -> Self {
        Self {
            onehot_columns,
            binary_columns,
            numerical_columns,
            handle_unknown: HandleUnknown::default(),
        }
    }

    /// Set the unknown-category policy
    #[must_use]
    pub const fn with_handle_unknown(mut self, handle_unknown: HandleUnknown) -> Self {
        self.handle_unknown = handle_unknown;
        self
    }

    /// Learn every encoder from `batch`
    ///
    /// # Errors
    /// Returns error if `batch` is empty or a named column is missing
    pub fn fit(&self, batch: &RecordBatch) -> Result<FittedColumnTransformer> {
        if batch.num_rows() == 0 {
            return Err(Error::EmptyData("cannot fit transformer on zero rows".to_string()));
        }

        let onehot = self
            .onehot_columns
            .iter()
            .map(|c| Ok(OneHotEncoder::fit(c, &frame::string_column(batch, c)?)))
            .collect::<Result<Vec<_>>>()?;
        let binary = self
            .binary_columns
            .iter()
            .map(|c| Ok(BinaryEncoder::fit(c, &frame::string_column(batch, c)?)))
            .collect::<Result<Vec<_>>>()?;
        let scalers = self
            .numerical_columns
            .iter()
            .map(|c| StandardScaler::fit(c, &frame::numeric_column(batch, c)?))
            .collect::<Result<Vec<_>>>()?;

        let fitted = FittedColumnTransformer {
            onehot,
            binary,
            scalers,
            handle_unknown: self.handle_unknown,
        };
        debug!(n_features_out = fitted.n_features_out(), "fitted column transformer");
        Ok(fitted)
    }

    /// Fit on `batch` and transform it
    ///
    /// # Errors
    /// Returns error if fitting or transforming fails
    pub fn fit_transform(&self, batch: &RecordBatch) -> Result<(FittedColumnTransformer, Array2<f64>)> {
        let fitted = self.fit(batch)?;
        let out = fitted.transform(batch)?;
        Ok((fitted, out))
    }
}

/// Fitted composite transformer, serializable as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedColumnTransformer {
    onehot: Vec<OneHotEncoder>,
    binary: Vec<BinaryEncoder>,
    scalers: Vec<StandardScaler>,
    handle_unknown: HandleUnknown,
}

impl FittedColumnTransformer {
    /// Number of output columns
    #[must_use]
    pub fn n_features_out(&self) -> usize {
        self.onehot.iter().map(|e| e.categories().len()).sum::<usize>()
            + self.binary.iter().map(BinaryEncoder::n_bits).sum::<usize>()
            + self.scalers.len()
    }

    /// Output column names in output order
    #[must_use]
    pub fn feature_names(&self) -> Vec<String> {
        self.onehot
            .iter()
            .flat_map(OneHotEncoder::feature_names)
            .chain(self.binary.iter().flat_map(BinaryEncoder::feature_names))
            .chain(self.scalers.iter().map(|s| s.column.clone()))
            .collect()
    }

    /// Encode `batch` into a dense matrix (rows x [`Self::n_features_out`])
    ///
    /// # Errors
    /// Returns error if a fitted column is missing from `batch`, is not
    /// numeric where scaling is required, or holds an unknown category under
    /// [`HandleUnknown::Error`]
    pub fn transform(&self, batch: &RecordBatch) -> Result<Array2<f64>> {
        let mut columns: Vec<Vec<f64>> = Vec::with_capacity(self.n_features_out());
        for enc in &self.onehot {
            columns.extend(enc.transform(&frame::string_column(batch, &enc.column)?, self.handle_unknown)?);
        }
        for enc in &self.binary {
            columns.extend(enc.transform(&frame::string_column(batch, &enc.column)?, self.handle_unknown)?);
        }
        for scaler in &self.scalers {
            columns.push(scaler.transform(&frame::numeric_column(batch, &scaler.column)?));
        }

        let rows = batch.num_rows();
        let mut out = Array2::<f64>::zeros((rows, columns.len()));
        for (j, col) in columns.iter().enumerate() {
            for (i, v) in col.iter().enumerate() {
                out[[i, j]] = *v;
            }
        }
        Ok(out)
    }
}
