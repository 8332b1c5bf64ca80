use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;

use super::{Collection, DocumentStore, Query, StoreError, Update};

/// Postgres-backed store over a single JSONB `documents` table
/// (see [`crate::db::ensure_schema`]).
#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>, StoreError> {
        let row: Option<Value> =
            sqlx::query_scalar("SELECT data FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection.as_str())
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row)
    }

    async fn set(&self, collection: Collection, id: &str, record: Value) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id)
            DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()
            "#,
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(&record)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, collection: Collection, id: &str, update: Update) -> Result<(), StoreError> {
        let result = match update {
            Update::Merge(fields) => {
                sqlx::query(
                    r#"
                    UPDATE documents
                    SET data = data || $3::jsonb, updated_at = NOW()
                    WHERE collection = $1 AND id = $2
                    "#,
                )
                .bind(collection.as_str())
                .bind(id)
                .bind(Value::Object(fields))
                .execute(&self.pool)
                .await?
            }
            Update::Append { field, value } => {
                sqlx::query(
                    r#"
                    UPDATE documents
                    SET data = jsonb_set(
                            data,
                            ARRAY[$3::text],
                            COALESCE(data->$3, '[]'::jsonb) || jsonb_build_array($4::jsonb),
                            true
                        ),
                        updated_at = NOW()
                    WHERE collection = $1 AND id = $2
                    "#,
                )
                .bind(collection.as_str())
                .bind(id)
                .bind(&field)
                .bind(&value)
                .execute(&self.pool)
                .await?
            }
        };

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing {
                collection: collection.as_str(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn query(&self, collection: Collection, query: &Query) -> Result<Vec<Value>, StoreError> {
        // Equality filters narrow the scan in SQL; the shared evaluator
        // applies the rest so ordering matches the memory backend.
        let rows: Vec<Value> = sqlx::query_scalar(
            "SELECT data FROM documents WHERE collection = $1 AND data @> $2::jsonb",
        )
        .bind(collection.as_str())
        .bind(query.equality_object())
        .fetch_all(&self.pool)
        .await?;

        Ok(query.apply(rows))
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn health(&self) -> Result<String, StoreError> {
        Ok(crate::db::health_check(&self.pool).await?)
    }

    fn name(&self) -> &str {
        "postgres"
    }
}
