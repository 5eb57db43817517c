//! Document source - where raw shipment records come from
//!
//! The pipeline only needs one read: "all documents of a collection in a
//! database", returned as a frame with the internal `_id` field stripped.
//!
//! # Example
//!
//! ```rust
//! use shipment_cost::source::{DocumentSource, MemorySource};
//! use serde_json::json;
//!
//! let source = MemorySource::new().with_collection(
//!     "shipping",
//!     "shipping_data",
//!     vec![json!({"_id": "a1", "Height": 3.0, "Cost": 120.5})],
//! );
//! let batch = source.fetch_collection("shipping", "shipping_data")?;
//! assert_eq!(batch.num_columns(), 2);
//! # Ok::<(), shipment_cost::Error>(())
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use serde_json::Value;
use tracing::{debug, info};

use crate::{Error, Result};

/// Internal identifier field removed from every document
pub const ID_FIELD: &str = "_id";

/// Read access to a document database
pub trait DocumentSource {
    /// Fetch every document of `collection` in `database` as one frame
    ///
    /// # Errors
    /// Returns error if the collection cannot be read or is empty
    fn fetch_collection(&self, database: &str, collection: &str) -> Result<RecordBatch>;
}

/// Convert JSON documents into a frame, dropping `_id`
///
/// # Errors
/// Returns [`Error::EmptyData`] for no documents, or an Arrow error if the
/// documents cannot be decoded with a common schema
pub fn documents_to_batch(documents: &[Value]) -> Result<RecordBatch> {
    if documents.is_empty() {
        return Err(Error::EmptyData("collection has no documents".to_string()));
    }

    let rows: Vec<Value> = documents
        .iter()
        .map(|doc| match doc {
            Value::Object(map) => {
                let mut map = map.clone();
                map.remove(ID_FIELD);
                Ok(Value::Object(map))
            }
            other => Err(Error::Source(format!("document is not an object: {other}"))),
        })
        .collect::<Result<_>>()?;

    let schema = arrow::json::reader::infer_json_schema_from_iterator(
        rows.iter().map(Ok::<&Value, ArrowError>),
    )?;

    let mut decoder = arrow::json::ReaderBuilder::new(Arc::new(schema))
        .with_batch_size(rows.len())
        .build_decoder()?;
    decoder.serialize(&rows)?;

    decoder
        .flush()?
        .ok_or_else(|| Error::EmptyData("decoder produced no rows".to_string()))
}

/// Directory-backed source: `<root>/<database>/<collection>.json`
///
/// The file holds either a JSON array of documents or one document per line.
#[derive(Debug, Clone)]
pub struct JsonDirSource {
    root: PathBuf,
}

impl JsonDirSource {
    /// Create a source rooted at `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn collection_path(&self, database: &str, collection: &str) -> PathBuf {
        self.root.join(database).join(format!("{collection}.json"))
    }

    fn parse_documents(text: &str) -> Result<Vec<Value>> {
        if text.trim_start().starts_with('[') {
            return Ok(serde_json::from_str(text)?);
        }
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(Error::from))
            .collect()
    }
}

impl DocumentSource for JsonDirSource {
    fn fetch_collection(&self, database: &str, collection: &str) -> Result<RecordBatch> {
        let path = self.collection_path(database, collection);
        debug!(path = %path.display(), "reading collection");
        let text = fs::read_to_string(&path).map_err(|e| {
            Error::Source(format!("cannot read {}: {e}", path.display()))
        })?;
        let documents = Self::parse_documents(&text)?;
        let batch = documents_to_batch(&documents)?;
        info!(
            database,
            collection,
            rows = batch.num_rows(),
            columns = batch.num_columns(),
            "fetched collection"
        );
        Ok(batch)
    }
}

/// In-memory source, keyed by `(database, collection)`
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    collections: HashMap<(String, String), Vec<Value>>,
}

impl MemorySource {
    /// Create an empty source
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collection
    #[must_use]
    pub fn with_collection(
        mut self,
        database: impl Into<String>,
        collection: impl Into<String>,
        documents: Vec<Value>,
    ) -> Self {
        self.collections
            .insert((database.into(), collection.into()), documents);
        self
    }
}

impl DocumentSource for MemorySource {
    fn fetch_collection(&self, database: &str, collection: &str) -> Result<RecordBatch> {
        let documents = self
            .collections
            .get(&(database.to_string(), collection.to_string()))
            .ok_or_else(|| Error::Source(format!("unknown collection {database}.{collection}")))?;
        documents_to_batch(documents)
    }
}
