use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use super::{doc_id, Collection, Filter, Store, StoreError};

/// In-process document store. Backs `AppState::fake()` in tests and the
/// ephemeral dev mode when no `DATABASE_URL` is configured. Mirrors the
/// Postgres contract, including the unique index on users email.
#[derive(Default)]
pub struct MemStore {
    collections: RwLock<HashMap<Collection, HashMap<Uuid, Value>>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn email_taken(docs: &HashMap<Uuid, Value>, email: &Value, except: Option<Uuid>) -> bool {
        docs.iter().any(|(id, doc)| {
            Some(*id) != except && doc.get("email").map(|e| e == email).unwrap_or(false)
        })
    }

    fn sort_key(doc: &Value) -> (String, String) {
        let created = doc
            .get("created_at")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let id = doc
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        (created, id)
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend(anyhow::anyhow!("store lock poisoned"))
}

#[async_trait]
impl Store for MemStore {
    async fn insert(&self, collection: Collection, doc: Value) -> Result<Uuid, StoreError> {
        let id = doc_id(&doc)?;
        let mut guard = self.collections.write().map_err(|_| poisoned())?;
        let docs = guard.entry(collection).or_default();
        if collection == Collection::Users {
            if let Some(email) = doc.get("email") {
                if Self::email_taken(docs, email, None) {
                    return Err(StoreError::UniqueViolation {
                        collection: collection.name(),
                        field: "email",
                    });
                }
            }
        }
        docs.insert(id, doc);
        Ok(id)
    }

    async fn find_by_id(
        &self,
        collection: Collection,
        id: Uuid,
    ) -> Result<Option<Value>, StoreError> {
        let guard = self.collections.read().map_err(|_| poisoned())?;
        Ok(guard.get(&collection).and_then(|docs| docs.get(&id)).cloned())
    }

    async fn find_one(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Option<Value>, StoreError> {
        let guard = self.collections.read().map_err(|_| poisoned())?;
        Ok(guard
            .get(&collection)
            .and_then(|docs| docs.values().find(|doc| filter.matches(doc)))
            .cloned())
    }

    async fn find_many(
        &self,
        collection: Collection,
        filter: &Filter,
        skip: u64,
        limit: u64,
    ) -> Result<(Vec<Value>, u64), StoreError> {
        let guard = self.collections.read().map_err(|_| poisoned())?;
        let mut matching: Vec<Value> = guard
            .get(&collection)
            .map(|docs| docs.values().filter(|doc| filter.matches(doc)).cloned().collect())
            .unwrap_or_default();
        matching.sort_by_key(Self::sort_key);
        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn update_by_id(
        &self,
        collection: Collection,
        id: Uuid,
        partial_fields: Value,
    ) -> Result<(), StoreError> {
        let mut guard = self.collections.write().map_err(|_| poisoned())?;
        let Some(docs) = guard.get_mut(&collection) else {
            return Ok(());
        };
        if collection == Collection::Users {
            if let Some(email) = partial_fields.get("email") {
                if Self::email_taken(docs, email, Some(id)) {
                    return Err(StoreError::UniqueViolation {
                        collection: collection.name(),
                        field: "email",
                    });
                }
            }
        }
        if let Some(Value::Object(doc)) = docs.get_mut(&id) {
            if let Value::Object(fields) = partial_fields {
                for (k, v) in fields {
                    doc.insert(k, v);
                }
            }
        }
        Ok(())
    }

    async fn delete_by_id(&self, collection: Collection, id: Uuid) -> Result<(), StoreError> {
        let mut guard = self.collections.write().map_err(|_| poisoned())?;
        if let Some(docs) = guard.get_mut(&collection) {
            docs.remove(&id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_doc(id: Uuid, email: &str, created_at: &str) -> Value {
        json!({"id": id.to_string(), "email": email, "created_at": created_at})
    }

    #[tokio::test]
    async fn insert_and_find_round_trip() {
        let store = MemStore::new();
        let id = Uuid::new_v4();
        store
            .insert(Collection::Users, user_doc(id, "a@example.com", "2026-01-01T00:00:00Z"))
            .await
            .unwrap();

        let by_id = store.find_by_id(Collection::Users, id).await.unwrap().unwrap();
        assert_eq!(by_id["email"], "a@example.com");

        let by_email = store
            .find_one(Collection::Users, &Filter::eq("email", "a@example.com"))
            .await
            .unwrap();
        assert!(by_email.is_some());
        assert!(store
            .find_one(Collection::Users, &Filter::eq("email", "b@example.com"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn duplicate_user_email_is_rejected() {
        let store = MemStore::new();
        store
            .insert(Collection::Users, user_doc(Uuid::new_v4(), "a@example.com", "t1"))
            .await
            .unwrap();
        let err = store
            .insert(Collection::Users, user_doc(Uuid::new_v4(), "a@example.com", "t2"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn update_merges_only_given_fields() {
        let store = MemStore::new();
        let id = Uuid::new_v4();
        store
            .insert(
                Collection::Items,
                json!({"id": id.to_string(), "title": "Book", "description": "old"}),
            )
            .await
            .unwrap();
        store
            .update_by_id(Collection::Items, id, json!({"description": "new"}))
            .await
            .unwrap();
        let doc = store.find_by_id(Collection::Items, id).await.unwrap().unwrap();
        assert_eq!(doc["title"], "Book");
        assert_eq!(doc["description"], "new");
    }

    #[tokio::test]
    async fn update_and_delete_of_absent_id_are_silent() {
        let store = MemStore::new();
        let id = Uuid::new_v4();
        store
            .update_by_id(Collection::Items, id, json!({"title": "x"}))
            .await
            .unwrap();
        store.delete_by_id(Collection::Items, id).await.unwrap();
    }

    #[tokio::test]
    async fn find_many_pages_and_counts() {
        let store = MemStore::new();
        for i in 0..5 {
            store
                .insert(
                    Collection::Items,
                    json!({
                        "id": Uuid::new_v4().to_string(),
                        "owner_id": "o1",
                        "created_at": format!("2026-01-0{}T00:00:00Z", i + 1),
                    }),
                )
                .await
                .unwrap();
        }
        store
            .insert(
                Collection::Items,
                json!({"id": Uuid::new_v4().to_string(), "owner_id": "o2", "created_at": "2026-01-01T00:00:00Z"}),
            )
            .await
            .unwrap();

        let (page, total) = store
            .find_many(Collection::Items, &Filter::eq("owner_id", "o1"), 1, 2)
            .await
            .unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0]["created_at"], "2026-01-02T00:00:00Z");
    }
}
