//! Tabular frames (Arrow `RecordBatch`) and their on-disk formats
//!
//! - Ingestion partitions: CSV with a header row (schema inferred on read)
//! - Transformed arrays: Parquet, every column `Float64`, target last
//!
//! Frames are treated as values: every helper returns a new batch and never
//! mutates its input.

use std::fs::{self, File};
use std::io::Seek;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, BooleanArray, Float64Array, UInt32Array};
use arrow::compute::{cast, concat_batches, filter_record_batch, take};
use arrow::datatypes::{DataType, Field, Float64Type, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use ndarray::Array2;

use crate::{Error, Result};

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Load a CSV file with a header row into a single batch
///
/// Column types are inferred from the whole file.
///
/// # Errors
/// Returns error if file cannot be read or parsed
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<RecordBatch> {
    use arrow::csv::reader::Format;
    use arrow::csv::ReaderBuilder;

    let mut file = File::open(path.as_ref()).map_err(|e| {
        Error::StorageError(format!(
            "Failed to open CSV file {}: {e}",
            path.as_ref().display()
        ))
    })?;

    let format = Format::default().with_header(true);
    let (schema, _) = format.infer_schema(&mut file, None)?;
    file.rewind()?;

    let schema: SchemaRef = Arc::new(schema);
    let reader = ReaderBuilder::new(schema.clone())
        .with_format(format)
        .build(file)?;

    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }

    Ok(concat_batches(&schema, &batches)?)
}

/// Write a batch as CSV with a header row, creating parent directories
///
/// # Errors
/// Returns error if the file cannot be created or written
pub fn save_csv<P: AsRef<Path>>(path: P, batch: &RecordBatch) -> Result<()> {
    ensure_parent(path.as_ref())?;
    let file = File::create(path.as_ref())?;
    let mut writer = arrow::csv::WriterBuilder::new()
        .with_header(true)
        .build(file);
    writer.write(batch)?;
    Ok(())
}

/// Load a Parquet file into a single batch
///
/// # Errors
/// Returns error if file cannot be read or parsed
pub fn load_parquet<P: AsRef<Path>>(path: P) -> Result<RecordBatch> {
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    let file = File::open(path.as_ref())
        .map_err(|e| Error::StorageError(format!("Failed to open Parquet file: {e}")))?;

    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| Error::StorageError(format!("Failed to parse Parquet file: {e}")))?;
    let schema = builder.schema().clone();

    let reader = builder
        .build()
        .map_err(|e| Error::StorageError(format!("Failed to create Parquet reader: {e}")))?;

    let mut batches = Vec::new();
    for batch in reader {
        let batch = batch
            .map_err(|e| Error::StorageError(format!("Failed to read record batch: {e}")))?;
        batches.push(batch);
    }

    Ok(concat_batches(&schema, &batches)?)
}

/// Write a batch as Parquet, creating parent directories
///
/// # Errors
/// Returns error if the file cannot be created or written
pub fn save_parquet<P: AsRef<Path>>(path: P, batch: &RecordBatch) -> Result<()> {
    use parquet::arrow::ArrowWriter;

    ensure_parent(path.as_ref())?;
    let file = File::create(path.as_ref())?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

/// Column names in schema order
#[must_use]
pub fn column_names(batch: &RecordBatch) -> Vec<String> {
    batch
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect()
}

/// True if the batch has a column with this name
#[must_use]
pub fn has_column(batch: &RecordBatch, name: &str) -> bool {
    batch.schema().index_of(name).is_ok()
}

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| Error::MissingColumn(name.to_string()))
}

/// Remove the named columns; every name must exist
///
/// # Errors
/// Returns [`Error::MissingColumn`] for an unknown name
pub fn drop_columns(batch: &RecordBatch, names: &[String]) -> Result<RecordBatch> {
    for name in names {
        column(batch, name)?;
    }
    let keep: Vec<usize> = batch
        .schema()
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, f)| !names.iter().any(|n| n == f.name()))
        .map(|(i, _)| i)
        .collect();
    Ok(batch.project(&keep)?)
}

/// Remove rows where any column is null
///
/// # Errors
/// Returns error if the filter kernel fails
pub fn drop_null_rows(batch: &RecordBatch) -> Result<RecordBatch> {
    let mask: BooleanArray = (0..batch.num_rows())
        .map(|row| {
            Some(
                batch
                    .columns()
                    .iter()
                    .all(|col| col.is_valid(row) && !is_nan_at(col, row)),
            )
        })
        .collect();
    Ok(filter_record_batch(batch, &mask)?)
}

fn is_nan_at(col: &ArrayRef, row: usize) -> bool {
    match col.data_type() {
        DataType::Float64 => col.as_primitive::<Float64Type>().value(row).is_nan(),
        _ => false,
    }
}

/// Select rows by index, in the given order
///
/// # Errors
/// Returns error if an index is out of bounds
pub fn take_rows(batch: &RecordBatch, indices: &[usize]) -> Result<RecordBatch> {
    let idx = indices
        .iter()
        .map(|&i| {
            u32::try_from(i).map_err(|_| Error::Schema(format!("row index {i} exceeds u32")))
        })
        .collect::<Result<Vec<u32>>>()?;
    let idx = UInt32Array::from(idx);
    let columns = batch
        .columns()
        .iter()
        .map(|c| take(c.as_ref(), &idx, None))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(RecordBatch::try_new(batch.schema(), columns)?)
}

/// True when the column holds a numeric Arrow type
///
/// # Errors
/// Returns [`Error::MissingColumn`] for an unknown name
pub fn is_numeric_column(batch: &RecordBatch, name: &str) -> Result<bool> {
    Ok(column(batch, name)?.data_type().is_numeric())
}

/// Column values as `f64` (nulls become NaN)
///
/// # Errors
/// Returns error if the column is missing or cannot be cast to `Float64`
pub fn numeric_column(batch: &RecordBatch, name: &str) -> Result<Vec<f64>> {
    let col = column(batch, name)?;
    let casted = cast(col.as_ref(), &DataType::Float64).map_err(|e| {
        Error::Schema(format!("column {name} is not numeric: {e}"))
    })?;
    let values = casted.as_primitive::<Float64Type>();
    Ok((0..values.len())
        .map(|i| {
            if values.is_null(i) {
                f64::NAN
            } else {
                values.value(i)
            }
        })
        .collect())
}

/// Column values rendered as strings (nulls become empty strings)
///
/// # Errors
/// Returns error if the column is missing or cannot be cast to `Utf8`
pub fn string_column(batch: &RecordBatch, name: &str) -> Result<Vec<String>> {
    let col = column(batch, name)?;
    let casted = cast(col.as_ref(), &DataType::Utf8)?;
    let values = casted.as_string::<i32>();
    Ok((0..values.len())
        .map(|i| {
            if values.is_null(i) {
                String::new()
            } else {
                values.value(i).to_string()
            }
        })
        .collect())
}

/// Return a new batch where `name` is replaced by the given `Float64` values
///
/// # Errors
/// Returns error if the column is missing or the length differs
pub fn replace_numeric_column(
    batch: &RecordBatch,
    name: &str,
    values: Vec<f64>,
) -> Result<RecordBatch> {
    let schema = batch.schema();
    let index = schema
        .index_of(name)
        .map_err(|_| Error::MissingColumn(name.to_string()))?;

    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .enumerate()
        .map(|(i, f)| {
            if i == index {
                Field::new(name, DataType::Float64, f.is_nullable())
            } else {
                f.as_ref().clone()
            }
        })
        .collect();

    let mut columns = batch.columns().to_vec();
    columns[index] = Arc::new(Float64Array::from(values));

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

/// Build an all-`Float64` batch from named columns
///
/// # Errors
/// Returns error if the columns have different lengths
pub fn float_batch(names: &[String], columns: Vec<Vec<f64>>) -> Result<RecordBatch> {
    let fields: Vec<Field> = names
        .iter()
        .map(|n| Field::new(n, DataType::Float64, false))
        .collect();
    let arrays: Vec<ArrayRef> = columns
        .into_iter()
        .map(|c| Arc::new(Float64Array::from(c)) as ArrayRef)
        .collect();
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

/// Convert an all-numeric batch into a row-major matrix
///
/// # Errors
/// Returns error if any column cannot be cast to `Float64`
pub fn to_matrix(batch: &RecordBatch) -> Result<Array2<f64>> {
    let rows = batch.num_rows();
    let cols = batch.num_columns();
    let mut matrix = Array2::<f64>::zeros((rows, cols));
    for (j, name) in column_names(batch).iter().enumerate() {
        let values = numeric_column(batch, name)?;
        for (i, v) in values.into_iter().enumerate() {
            matrix[[i, j]] = v;
        }
    }
    Ok(matrix)
}

/// Split a matrix whose last column is the target into `(features, target)`
///
/// # Errors
/// Returns [`Error::Schema`] when the matrix has no columns
pub fn split_target(matrix: &Array2<f64>) -> Result<(Array2<f64>, Vec<f64>)> {
    let cols = matrix.ncols();
    if cols == 0 {
        return Err(Error::Schema("array has no target column".to_string()));
    }
    let features = matrix.slice(ndarray::s![.., ..cols - 1]).to_owned();
    let target = matrix.column(cols - 1).to_vec();
    Ok((features, target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, StringArray};

    fn create_test_batch() -> RecordBatch {
        let schema = Schema::new(vec![
            Field::new("Height", DataType::Int64, true),
            Field::new("Material", DataType::Utf8, true),
            Field::new("Cost", DataType::Float64, true),
        ]);
        RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(Int64Array::from(vec![Some(1), None, Some(3), Some(4)])),
                Arc::new(StringArray::from(vec![
                    Some("Brass"),
                    Some("Stone"),
                    None,
                    Some("Wood"),
                ])),
                Arc::new(Float64Array::from(vec![10.0, 20.0, 30.0, 40.0])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_drop_null_rows() {
        let batch = drop_null_rows(&create_test_batch()).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(numeric_column(&batch, "Cost").unwrap(), vec![10.0, 40.0]);
    }

    #[test]
    fn test_drop_columns_requires_existing_names() {
        let batch = create_test_batch();
        let dropped = drop_columns(&batch, &["Material".to_string()]).unwrap();
        assert_eq!(column_names(&dropped), vec!["Height", "Cost"]);

        let err = drop_columns(&batch, &["Nope".to_string()]).unwrap_err();
        assert!(matches!(err, Error::MissingColumn(_)));
    }

    #[test]
    fn test_take_rows_preserves_order() {
        let batch = take_rows(&create_test_batch(), &[3, 0]).unwrap();
        assert_eq!(numeric_column(&batch, "Cost").unwrap(), vec![40.0, 10.0]);
    }

    #[test]
    fn test_numeric_column_casts_integers() {
        let values = numeric_column(&create_test_batch(), "Height").unwrap();
        assert_eq!(values[0], 1.0);
        assert!(values[1].is_nan());
    }

    #[test]
    fn test_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data.csv");
        let batch = drop_null_rows(&create_test_batch()).unwrap();

        save_csv(&path, &batch).unwrap();
        let loaded = load_csv(&path).unwrap();

        assert_eq!(loaded.num_rows(), 2);
        assert_eq!(column_names(&loaded), vec!["Height", "Material", "Cost"]);
        assert_eq!(
            string_column(&loaded, "Material").unwrap(),
            vec!["Brass", "Wood"]
        );
    }

    #[test]
    fn test_parquet_round_trip_to_matrix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arr.parquet");
        let names = vec!["f0".to_string(), "Cost".to_string()];
        let batch = float_batch(&names, vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();

        save_parquet(&path, &batch).unwrap();
        let matrix = to_matrix(&load_parquet(&path).unwrap()).unwrap();
        let (x, y) = split_target(&matrix).unwrap();

        assert_eq!(x.dim(), (2, 1));
        assert_eq!(y, vec![3.0, 4.0]);
    }
}
