//! Document store abstraction for pulling raw records.
//!
//! The pipeline driver constructs one store per process and passes it into the
//! ingestion stage; nothing here is global.

use crate::data::batch::DataBatch;
use crate::error::PipelineError;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{Bson, Document, doc};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Internal key the document store assigns to every record.
pub const STORE_ID_FIELD: &str = "_id";

/// Literal the source data uses for a missing value.
const NA_MARKER: &str = "na";

/// Read-only access to named collections of documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Return every document in `collection` as a JSON object.
    async fn find_all(&self, collection: &str) -> Result<Vec<Value>, PipelineError>;

    /// Short label for logs.
    fn kind(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// MongoStore
// ---------------------------------------------------------------------------

/// MongoDB-backed document store bound to one database.
pub struct MongoStore {
    client: mongodb::Client,
    database: String,
}

impl MongoStore {
    /// Create the client for `url`. Call once per process and share the store.
    pub async fn connect(url: &str, database: &str) -> Result<Self, PipelineError> {
        let client = mongodb::Client::with_uri_str(url).await?;
        tracing::info!(database, "MongoDB client created");
        Ok(Self {
            client,
            database: database.to_string(),
        })
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn find_all(&self, collection: &str) -> Result<Vec<Value>, PipelineError> {
        let coll = self
            .client
            .database(&self.database)
            .collection::<Document>(collection);

        let mut cursor = coll.find(doc! {}).await?;
        let mut documents = Vec::new();
        while let Some(document) = cursor.try_next().await? {
            documents.push(bson_to_json(Bson::Document(document)));
        }

        tracing::info!(
            database = %self.database,
            collection,
            documents = documents.len(),
            "Fetched collection"
        );
        Ok(documents)
    }

    fn kind(&self) -> &'static str {
        "mongodb"
    }
}

// ---------------------------------------------------------------------------
// InMemoryStore
// ---------------------------------------------------------------------------

/// Store backed by in-process collections, for tests and offline runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    collections: HashMap<String, Vec<Value>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(mut self, name: &str, documents: Vec<Value>) -> Self {
        self.collections.insert(name.to_string(), documents);
        self
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn find_all(&self, collection: &str) -> Result<Vec<Value>, PipelineError> {
        // Like MongoDB, an unknown collection reads as empty.
        Ok(self.collections.get(collection).cloned().unwrap_or_default())
    }

    fn kind(&self) -> &'static str {
        "in-memory"
    }
}

/// Convert a stored value to JSON.
///
/// Non-finite doubles become null and dates become RFC 3339 strings, so
/// neither reaches the table as an extended-JSON object.
fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::Double(f) if !f.is_finite() => Value::Null,
        Bson::DateTime(dt) => dt
            .try_to_rfc3339_string()
            .map(Value::String)
            .unwrap_or(Value::Null),
        Bson::Document(document) => Value::Object(
            document
                .into_iter()
                .map(|(key, value)| (key, bson_to_json(value)))
                .collect(),
        ),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
        other => other.into_relaxed_extjson(),
    }
}

/// Flatten documents into a batch.
///
/// Columns appear in first-seen order. The store's `_id` key is not part of the
/// dataset and is skipped; absent keys and the literal `"na"` become null.
pub fn documents_to_batch(documents: &[Value]) -> Result<DataBatch, PipelineError> {
    let mut columns: Vec<String> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for (i, document) in documents.iter().enumerate() {
        let map = document.as_object().ok_or_else(|| {
            PipelineError::dataset(format!("document {i} is not an object: {document}"))
        })?;
        for key in map.keys() {
            if key != STORE_ID_FIELD && seen.insert(key.as_str()) {
                columns.push(key.clone());
            }
        }
    }

    let rows = documents
        .iter()
        .map(|document| {
            columns
                .iter()
                .map(|col| match document.get(col) {
                    None | Some(Value::Null) => Value::Null,
                    Some(Value::String(s)) if s == NA_MARKER => Value::Null,
                    Some(other) => other.clone(),
                })
                .collect()
        })
        .collect();

    DataBatch::new(columns, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_documents_to_batch_drops_store_id() {
        let docs = vec![
            json!({"_id": {"$oid": "65f0c0ffee"}, "id": 1, "Gender": "Male", "Age": 44}),
            json!({"_id": {"$oid": "65f0c0ffef"}, "id": 2, "Gender": "Female", "Age": 76}),
        ];
        let batch = documents_to_batch(&docs).unwrap();
        assert!(!batch.has_column("_id"));
        assert!(batch.has_column("id"));
        assert_eq!(batch.shape(), (2, 3));
        assert_eq!(batch.rows[1][batch.require_column("Gender").unwrap()], json!("Female"));
    }

    #[test]
    fn test_documents_to_batch_fills_missing_and_na() {
        let docs = vec![
            json!({"Age": 44, "Region_Code": "na"}),
            json!({"Age": 21, "Region_Code": 28.0, "Vintage": 217}),
        ];
        let batch = documents_to_batch(&docs).unwrap();
        let region = batch.require_column("Region_Code").unwrap();
        let vintage = batch.require_column("Vintage").unwrap();
        assert_eq!(batch.rows[0][region], Value::Null);
        assert_eq!(batch.rows[0][vintage], Value::Null);
        assert_eq!(batch.rows[1][vintage], json!(217));
    }

    #[test]
    fn test_documents_to_batch_rejects_scalars() {
        let err = documents_to_batch(&[json!(5)]).unwrap_err();
        assert!(err.to_string().contains("not an object"));
    }

    #[test]
    fn test_bson_to_json_normalizes_special_values() {
        let document = doc! {
            "Age": 44_i32,
            "Annual_Premium": 2630.5,
            "Region_Code": f64::NAN,
            "Vintage": f64::INFINITY,
            "Policy_Start": mongodb::bson::DateTime::from_millis(0),
        };
        let value = bson_to_json(Bson::Document(document));

        assert_eq!(value["Age"], json!(44));
        assert_eq!(value["Annual_Premium"], json!(2630.5));
        assert_eq!(value["Region_Code"], Value::Null);
        assert_eq!(value["Vintage"], Value::Null);
        assert!(
            value["Policy_Start"]
                .as_str()
                .is_some_and(|s| s.starts_with("1970-01-01T00:00:00"))
        );

        let batch = documents_to_batch(&[value]).unwrap();
        let region = batch.require_column("Region_Code").unwrap();
        assert_eq!(batch.rows[0][region], Value::Null);
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryStore::new().with_collection("policies", vec![json!({"a": 1})]);
        assert_eq!(store.find_all("policies").await.unwrap().len(), 1);
        assert!(store.find_all("missing").await.unwrap().is_empty());
        assert_eq!(store.kind(), "in-memory");
    }
}
