use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ApiError;
use crate::store::{Collection, Filter, Store};

/// Item record as stored in the `items` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

fn decode(doc: Value) -> Result<Item, ApiError> {
    serde_json::from_value(doc).map_err(|e| ApiError::Internal(anyhow::Error::new(e)))
}

fn owner_filter(owner_id: Uuid) -> Filter {
    Filter::eq("owner_id", owner_id.to_string())
}

pub async fn insert(store: &dyn Store, item: &Item) -> Result<(), ApiError> {
    let doc = serde_json::to_value(item).map_err(anyhow::Error::new)?;
    store.insert(Collection::Items, doc).await?;
    Ok(())
}

pub async fn find_by_id(store: &dyn Store, id: Uuid) -> Result<Option<Item>, ApiError> {
    store
        .find_by_id(Collection::Items, id)
        .await?
        .map(decode)
        .transpose()
}

pub async fn list_all(
    store: &dyn Store,
    skip: u64,
    limit: u64,
) -> Result<(Vec<Item>, u64), ApiError> {
    let (docs, total) = store
        .find_many(Collection::Items, &Filter::all(), skip, limit)
        .await?;
    let items = docs.into_iter().map(decode).collect::<Result<Vec<_>, _>>()?;
    Ok((items, total))
}

pub async fn list_by_owner(
    store: &dyn Store,
    owner_id: Uuid,
    skip: u64,
    limit: u64,
) -> Result<(Vec<Item>, u64), ApiError> {
    let (docs, total) = store
        .find_many(Collection::Items, &owner_filter(owner_id), skip, limit)
        .await?;
    let items = docs.into_iter().map(decode).collect::<Result<Vec<_>, _>>()?;
    Ok((items, total))
}

pub async fn update(store: &dyn Store, id: Uuid, partial_fields: Value) -> Result<(), ApiError> {
    store
        .update_by_id(Collection::Items, id, partial_fields)
        .await?;
    Ok(())
}

pub async fn delete(store: &dyn Store, id: Uuid) -> Result<(), ApiError> {
    store.delete_by_id(Collection::Items, id).await?;
    Ok(())
}

/// Cascade support for user deletion: removes every item with this owner,
/// one document at a time (no multi-document transaction), and reports how
/// many went.
pub async fn delete_all_by_owner(store: &dyn Store, owner_id: Uuid) -> Result<u64, ApiError> {
    let mut removed = 0u64;
    loop {
        let (docs, _) = store
            .find_many(Collection::Items, &owner_filter(owner_id), 0, 100)
            .await?;
        if docs.is_empty() {
            return Ok(removed);
        }
        for doc in docs {
            let item = decode(doc)?;
            store.delete_by_id(Collection::Items, item.id).await?;
            removed += 1;
        }
    }
}
