use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{doc_id, Collection, Filter, Store, StoreError};

/// Document store over Postgres: one `(id uuid, doc jsonb)` table per
/// collection, containment filters, merge-patch updates. The migrations
/// provision the unique index on `users (doc->>'email')`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(anyhow::Error::new(e))
}

fn map_unique_err(collection: Collection, e: sqlx::Error) -> StoreError {
    if let Some(db) = e.as_database_error() {
        if db.code().as_deref() == Some("23505") {
            return StoreError::UniqueViolation {
                collection: collection.name(),
                field: "email",
            };
        }
    }
    backend(e)
}

#[async_trait]
impl Store for PgStore {
    async fn insert(&self, collection: Collection, doc: Value) -> Result<Uuid, StoreError> {
        let id = doc_id(&doc)?;
        let sql = format!("INSERT INTO {} (id, doc) VALUES ($1, $2)", collection.name());
        sqlx::query(&sql)
            .bind(id)
            .bind(&doc)
            .execute(&self.pool)
            .await
            .map_err(|e| map_unique_err(collection, e))?;
        Ok(id)
    }

    async fn find_by_id(
        &self,
        collection: Collection,
        id: Uuid,
    ) -> Result<Option<Value>, StoreError> {
        let sql = format!("SELECT doc FROM {} WHERE id = $1", collection.name());
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(|r| r.try_get::<Value, _>("doc").map_err(backend))
            .transpose()
    }

    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Option<Value>, StoreError> {
        let sql = format!(
            "SELECT doc FROM {} WHERE doc @> $1 LIMIT 1",
            collection.name()
        );
        let row = sqlx::query(&sql)
            .bind(filter.as_value())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(|r| r.try_get::<Value, _>("doc").map_err(backend))
            .transpose()
    }

    async fn find_many(
        &self,
        collection: Collection,
        filter: &Filter,
        skip: u64,
        limit: u64,
    ) -> Result<(Vec<Value>, u64), StoreError> {
        let sql = format!(
            "SELECT doc FROM {} WHERE doc @> $1 \
             ORDER BY doc->>'created_at', id OFFSET $2 LIMIT $3",
            collection.name()
        );
        let rows = sqlx::query(&sql)
            .bind(filter.as_value())
            .bind(skip as i64)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        let docs = rows
            .into_iter()
            .map(|r| r.try_get::<Value, _>("doc").map_err(backend))
            .collect::<Result<Vec<_>, _>>()?;

        let count_sql = format!("SELECT COUNT(*) FROM {} WHERE doc @> $1", collection.name());
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(filter.as_value())
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;

        Ok((docs, total as u64))
    }

    async fn update_by_id(
        &self,
        collection: Collection,
        id: Uuid,
        partial_fields: Value,
    ) -> Result<(), StoreError> {
        // jsonb || merges top-level fields; absent ids are a silent no-op.
        let sql = format!("UPDATE {} SET doc = doc || $2 WHERE id = $1", collection.name());
        sqlx::query(&sql)
            .bind(id)
            .bind(&partial_fields)
            .execute(&self.pool)
            .await
            .map_err(|e| map_unique_err(collection, e))?;
        Ok(())
    }

    async fn delete_by_id(&self, collection: Collection, id: Uuid) -> Result<(), StoreError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", collection.name());
        sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }
}
