//! Document store abstraction
//!
//! The persistence gateway only needs two things from the hosted database:
//! append a document to a collection, and read a collection ordered by one
//! field with an optional inclusive lower bound and limit.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Errors returned by document store implementations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store request failed: {0}")]
    Request(String),

    #[error("Store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode store data: {0}")]
    Decode(String),

    #[error("Unsupported document value: {0}")]
    Unsupported(String),
}

/// Sort direction of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Ordered query over one collection
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentQuery {
    pub collection: String,
    pub order_by: String,
    pub direction: SortDirection,
    /// Inclusive lower bound on the `order_by` field
    pub start_at: Option<Value>,
    pub limit: Option<usize>,
}

impl DocumentQuery {
    pub fn new(collection: impl Into<String>, order_by: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            order_by: order_by.into(),
            direction: SortDirection::Ascending,
            start_at: None,
            limit: None,
        }
    }

    pub fn descending(mut self) -> Self {
        self.direction = SortDirection::Descending;
        self
    }

    pub fn start_at(mut self, value: impl Into<Value>) -> Self {
        self.start_at = Some(value.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Append/query access to a hosted document database
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Append a document and return its generated id
    async fn add(&self, collection: &str, document: Value) -> Result<String, StoreError>;

    /// Run an ordered query; documents missing the order field are skipped
    async fn query(&self, query: &DocumentQuery) -> Result<Vec<Value>, StoreError>;

    /// Short name used in health reports
    fn backend_name(&self) -> &'static str;
}

/// Compare two JSON field values the way the hosted store orders them.
///
/// Only values of the same kind are comparable.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// In-process store for local development and tests
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<String, Vec<Value>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a collection in insertion order
    #[cfg(test)]
    pub fn documents(&self, collection: &str) -> Vec<Value> {
        self.collections
            .read()
            .map(|c| c.get(collection).cloned().unwrap_or_default())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn add(&self, collection: &str, document: Value) -> Result<String, StoreError> {
        if !document.is_object() {
            return Err(StoreError::Unsupported(
                "documents must be JSON objects".to_string(),
            ));
        }

        let id = Uuid::new_v4().to_string();
        let mut collections = self
            .collections
            .write()
            .map_err(|_| StoreError::Request("memory store lock poisoned".to_string()))?;
        collections
            .entry(collection.to_string())
            .or_default()
            .push(document);
        Ok(id)
    }

    async fn query(&self, query: &DocumentQuery) -> Result<Vec<Value>, StoreError> {
        let collections = self
            .collections
            .read()
            .map_err(|_| StoreError::Request("memory store lock poisoned".to_string()))?;

        let mut matches: Vec<Value> = collections
            .get(&query.collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| match (doc.get(&query.order_by), &query.start_at) {
                        (None, _) => false,
                        (Some(_), None) => true,
                        (Some(field), Some(bound)) => matches!(
                            compare_values(field, bound),
                            Some(Ordering::Greater | Ordering::Equal)
                        ),
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        // stable sort keeps insertion order for equal keys
        matches.sort_by(|a, b| {
            let ordering = match (a.get(&query.order_by), b.get(&query.order_by)) {
                (Some(a), Some(b)) => compare_values(a, b).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            };
            match query.direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        });

        if let Some(limit) = query.limit {
            matches.truncate(limit);
        }
        Ok(matches)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
