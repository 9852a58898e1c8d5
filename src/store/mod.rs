use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::MemStore;
pub use postgres::PgStore;

/// The two document collections this service persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Items,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Items => "items",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique value already present for {collection}.{field}")]
    UniqueViolation {
        collection: &'static str,
        field: &'static str,
    },
    #[error("store backend error: {0}")]
    Backend(#[source] anyhow::Error),
}

/// Field-equality filter over documents. An empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct Filter(Map<String, Value>);

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        let mut map = Map::new();
        map.insert(field.to_string(), value.into());
        Self(map)
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// True when every filter field is present in `doc` with an equal value.
    pub fn matches(&self, doc: &Value) -> bool {
        self.0
            .iter()
            .all(|(k, v)| doc.get(k).map(|d| d == v).unwrap_or(false))
    }
}

/// CRUD contract over the document store. The only component touching
/// persistence; lifecycle managers consume it behind `Arc<dyn Store>`.
///
/// Documents are JSON objects carrying their own `id` field; `update_by_id`
/// and `delete_by_id` are silent no-ops when the id is absent, so callers
/// that need a 404 must check existence first.
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert(&self, collection: Collection, doc: Value) -> Result<Uuid, StoreError>;

    async fn find_by_id(&self, collection: Collection, id: Uuid)
        -> Result<Option<Value>, StoreError>;

    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Option<Value>, StoreError>;

    /// Returns the requested page plus the total number of matching documents
    /// (ignoring skip/limit), ordered by `created_at` then id.
    async fn find_many(
        &self,
        collection: Collection,
        filter: &Filter,
        skip: u64,
        limit: u64,
    ) -> Result<(Vec<Value>, u64), StoreError>;

    async fn update_by_id(
        &self,
        collection: Collection,
        id: Uuid,
        partial_fields: Value,
    ) -> Result<(), StoreError>;

    async fn delete_by_id(&self, collection: Collection, id: Uuid) -> Result<(), StoreError>;
}

pub(crate) fn doc_id(doc: &Value) -> Result<Uuid, StoreError> {
    doc.get("id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| StoreError::Backend(anyhow::anyhow!("document missing uuid 'id' field")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_matches_on_equal_fields() {
        let doc = json!({"id": "x", "owner_id": "abc", "title": "Book"});
        assert!(Filter::all().matches(&doc));
        assert!(Filter::eq("owner_id", "abc").matches(&doc));
        assert!(!Filter::eq("owner_id", "def").matches(&doc));
        assert!(!Filter::eq("missing", "abc").matches(&doc));
    }

    #[test]
    fn doc_id_requires_uuid_string() {
        let id = Uuid::new_v4();
        assert_eq!(doc_id(&json!({"id": id.to_string()})).unwrap(), id);
        assert!(doc_id(&json!({"id": 42})).is_err());
        assert!(doc_id(&json!({})).is_err());
    }
}
