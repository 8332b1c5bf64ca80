use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{Collection, DocumentStore, Query, StoreError, Update};

/// Process-local store. Records are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<(Collection, String), Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in a collection.
    pub async fn count(&self, collection: Collection) -> usize {
        self.records
            .read()
            .await
            .keys()
            .filter(|(c, _)| *c == collection)
            .count()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>, StoreError> {
        let records = self.records.read().await;
        Ok(records.get(&(collection, id.to_string())).cloned())
    }

    async fn set(&self, collection: Collection, id: &str, record: Value) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert((collection, id.to_string()), record);
        Ok(())
    }

    async fn update(&self, collection: Collection, id: &str, update: Update) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&(collection, id.to_string()))
            .and_then(Value::as_object_mut)
            .ok_or_else(|| StoreError::Missing {
                collection: collection.as_str(),
                id: id.to_string(),
            })?;

        match update {
            Update::Merge(fields) => {
                for (key, value) in fields {
                    record.insert(key, value);
                }
            }
            Update::Append { field, value } => {
                let slot = record
                    .entry(field)
                    .or_insert_with(|| Value::Array(Vec::new()));
                match slot {
                    Value::Array(items) => items.push(value),
                    other => *other = Value::Array(vec![value]),
                }
            }
        }
        Ok(())
    }

    async fn query(&self, collection: Collection, query: &Query) -> Result<Vec<Value>, StoreError> {
        let records = self.records.read().await;
        let candidates = records
            .iter()
            .filter(|((c, _), _)| *c == collection)
            .map(|(_, v)| v.clone());
        Ok(query.apply(candidates))
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        Ok(self
            .records
            .write()
            .await
            .remove(&(collection, id.to_string()))
            .is_some())
    }

    async fn health(&self) -> Result<String, StoreError> {
        let records = self.records.read().await;
        Ok(format!("memory ({} records)", records.len()))
    }

    fn name(&self) -> &str {
        "memory"
    }
}
