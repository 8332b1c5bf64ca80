//! Document store: keyed JSON records grouped into named collections
//!
//! Provides a `DocumentStore` trait with implementations for:
//! - **Postgres**: a single JSONB `documents` table (`PgDocumentStore`)
//! - **Memory**: a process-local map for development and tests (`MemoryStore`)
//!
//! Stores expose get/set/update/query/delete only. There are no transactions:
//! every higher-level operation is a read-then-write sequence and may
//! interleave with concurrent requests.

mod memory;
mod postgres;

use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub use memory::MemoryStore;
pub use postgres::PgDocumentStore;

// ============================================================================
// DocumentStore trait
// ============================================================================

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>, StoreError>;

    /// Create or fully overwrite a record.
    async fn set(&self, collection: Collection, id: &str, record: Value) -> Result<(), StoreError>;

    /// Merge fields into, or append to an array field of, an existing record.
    async fn update(&self, collection: Collection, id: &str, update: Update) -> Result<(), StoreError>;

    async fn query(&self, collection: Collection, query: &Query) -> Result<Vec<Value>, StoreError>;

    /// Returns `true` if a record was removed.
    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError>;

    /// Backend description for health reporting.
    async fn health(&self) -> Result<String, StoreError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("No {collection} record with id {id}")]
    Missing { collection: &'static str, id: String },
}

// ============================================================================
// Collections, updates and queries
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Sessions,
    SessionSummaries,
    UserSummaries,
    Goals,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Sessions => "sessions",
            Collection::SessionSummaries => "session_summaries",
            Collection::UserSummaries => "user_summaries",
            Collection::Goals => "goals",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Update {
    Merge(Map<String, Value>),
    Append { field: String, value: Value },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    In(String, Vec<Value>),
}

impl Filter {
    fn matches(&self, record: &Value) -> bool {
        match self {
            Filter::Eq(field, expected) => record.get(field) == Some(expected),
            Filter::In(field, allowed) => record
                .get(field)
                .map(|v| allowed.contains(v))
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

/// Filter, order and limit over top-level record fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owned_by(owner_id: &str) -> Self {
        Self::new().where_eq("owner_id", owner_id)
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(field.to_string(), value.into()));
        self
    }

    pub fn where_in<V: Into<Value>>(mut self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.filters.push(Filter::In(
            field.to_string(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn order_by_asc(mut self, field: &str) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            descending: false,
        });
        self
    }

    pub fn order_by_desc(mut self, field: &str) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            descending: true,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, record: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(record))
    }

    /// Equality filters as a JSON object, for containment pushdown.
    pub fn equality_object(&self) -> Value {
        let mut map = Map::new();
        for filter in &self.filters {
            if let Filter::Eq(field, value) = filter {
                map.insert(field.clone(), value.clone());
            }
        }
        Value::Object(map)
    }

    /// Filter, sort and truncate an unordered candidate set.
    pub fn apply(&self, records: impl IntoIterator<Item = Value>) -> Vec<Value> {
        let mut matched: Vec<Value> = records.into_iter().filter(|r| self.matches(r)).collect();

        if let Some(order) = &self.order_by {
            matched.sort_by(|a, b| {
                let ord = compare_fields(a.get(&order.field), b.get(&order.field));
                if order.descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }

        if let Some(limit) = self.limit {
            matched.truncate(limit);
        }
        matched
    }
}

/// Timestamps compare chronologically, numbers numerically, strings
/// lexicographically. Missing values sort first.
fn compare_fields(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => match (parse_timestamp(x), parse_timestamp(y)) {
            (Some(tx), Some(ty)) => tx.cmp(&ty),
            _ => x.cmp(y),
        },
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

// ============================================================================
// Typed helpers
// ============================================================================

pub async fn get_record<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
    id: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(collection, id).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

pub async fn set_record<T: Serialize + Sync>(
    store: &dyn DocumentStore,
    collection: Collection,
    id: &str,
    record: &T,
) -> Result<(), StoreError> {
    let value = serde_json::to_value(record)?;
    store.set(collection, id, value).await
}

pub async fn query_records<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: Collection,
    query: &Query,
) -> Result<Vec<T>, StoreError> {
    store
        .query(collection, query)
        .await?
        .into_iter()
        .map(|v| serde_json::from_value(v).map_err(StoreError::from))
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records() -> Vec<Value> {
        vec![
            json!({"id": "a", "owner_id": "u1", "status": "started", "at": "2026-03-01T10:00:00Z"}),
            json!({"id": "b", "owner_id": "u1", "status": "done", "at": "2026-03-01T10:00:00.500Z"}),
            json!({"id": "c", "owner_id": "u2", "status": "imagined", "at": "2026-03-02T09:00:00Z"}),
            json!({"id": "d", "owner_id": "u1", "status": "imagined", "at": "2026-02-28T23:59:59Z"}),
        ]
    }

    fn ids(values: &[Value]) -> Vec<&str> {
        values.iter().map(|v| v["id"].as_str().unwrap()).collect()
    }

    #[test]
    fn test_eq_and_in_filters() {
        let q = Query::owned_by("u1").where_in("status", ["started", "imagined"]);
        let out = q.apply(records());
        assert_eq!(ids(&out), vec!["a", "d"]);
    }

    #[test]
    fn test_timestamps_order_chronologically() {
        // Lexicographically "…00.500Z" sorts before "…00Z"; chronologically it is later.
        let q = Query::owned_by("u1").order_by_desc("at");
        let out = q.apply(records());
        assert_eq!(ids(&out), vec!["b", "a", "d"]);
    }

    #[test]
    fn test_limit_applies_after_ordering() {
        let q = Query::new().order_by_asc("at").limit(2);
        let out = q.apply(records());
        assert_eq!(ids(&out), vec!["d", "a"]);
    }

    #[test]
    fn test_numbers_order_numerically() {
        let q = Query::new().order_by_desc("n");
        let out = q.apply(vec![json!({"id": "x", "n": 9}), json!({"id": "y", "n": 10.5})]);
        assert_eq!(ids(&out), vec!["y", "x"]);
    }

    #[test]
    fn test_equality_object_ignores_in_filters() {
        let q = Query::owned_by("u1").where_in("status", ["done"]);
        assert_eq!(q.equality_object(), json!({"owner_id": "u1"}));
    }

    #[test]
    fn test_collection_names() {
        assert_eq!(Collection::Sessions.as_str(), "sessions");
        assert_eq!(Collection::SessionSummaries.as_str(), "session_summaries");
        assert_eq!(Collection::UserSummaries.as_str(), "user_summaries");
        assert_eq!(Collection::Goals.as_str(), "goals");
    }
}
