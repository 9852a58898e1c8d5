use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::Item;
use crate::users::dto::double_option;

#[derive(Debug, Deserialize)]
pub struct ItemCreate {
    pub title: String,
    pub description: Option<String>,
}

/// Partial update; a null description clears it, an omitted one is untouched.
#[derive(Debug, Deserialize)]
pub struct ItemUpdate {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
}

#[derive(Debug, Serialize)]
pub struct ItemPublic {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Item> for ItemPublic {
    fn from(i: Item) -> Self {
        Self {
            id: i.id,
            title: i.title,
            description: i.description,
            owner_id: i.owner_id,
            created_at: i.created_at,
            updated_at: i.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ItemsPublic {
    pub data: Vec<ItemPublic>,
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_update_distinguishes_omitted_from_null() {
        let omitted: ItemUpdate = serde_json::from_str(r#"{"title": "New"}"#).unwrap();
        assert!(omitted.description.is_none());

        let cleared: ItemUpdate = serde_json::from_str(r#"{"description": null}"#).unwrap();
        assert_eq!(cleared.description, Some(None));
        assert!(cleared.title.is_none());
    }
}
