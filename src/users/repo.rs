use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ApiError;
use crate::policy::Principal;
use crate::store::{Collection, Filter, Store, StoreError};

/// User record as stored in the `users` collection. The full document,
/// hash included, stays internal; the API surface serializes
/// `dto::UserPublic` instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub hashed_password: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub full_name: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl User {
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.id,
            is_superuser: self.is_superuser,
            is_active: self.is_active,
        }
    }

    #[cfg(test)]
    pub fn test_fixture(email: &str) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            email: email.to_string(),
            hashed_password: "$argon2id$fixture".to_string(),
            is_active: true,
            is_superuser: false,
            full_name: None,
            created_at: now,
            updated_at: now,
        }
    }
}

fn decode(doc: Value) -> Result<User, ApiError> {
    serde_json::from_value(doc).map_err(|e| ApiError::Internal(anyhow::Error::new(e)))
}

fn map_unique(e: StoreError) -> ApiError {
    match e {
        StoreError::UniqueViolation { .. } => {
            ApiError::conflict("a user with this email already exists")
        }
        other => other.into(),
    }
}

pub async fn insert(store: &dyn Store, user: &User) -> Result<(), ApiError> {
    let doc = serde_json::to_value(user).map_err(anyhow::Error::new)?;
    store
        .insert(Collection::Users, doc)
        .await
        .map_err(map_unique)?;
    Ok(())
}

pub async fn find_by_id(store: &dyn Store, id: Uuid) -> Result<Option<User>, ApiError> {
    store
        .find_by_id(Collection::Users, id)
        .await?
        .map(decode)
        .transpose()
}

pub async fn find_by_email(store: &dyn Store, email: &str) -> Result<Option<User>, ApiError> {
    store
        .find_one(Collection::Users, &Filter::eq("email", email))
        .await?
        .map(decode)
        .transpose()
}

pub async fn list(store: &dyn Store, skip: u64, limit: u64) -> Result<(Vec<User>, u64), ApiError> {
    let (docs, total) = store
        .find_many(Collection::Users, &Filter::all(), skip, limit)
        .await?;
    let users = docs.into_iter().map(decode).collect::<Result<Vec<_>, _>>()?;
    Ok((users, total))
}

pub async fn update(store: &dyn Store, id: Uuid, partial_fields: Value) -> Result<(), ApiError> {
    store
        .update_by_id(Collection::Users, id, partial_fields)
        .await
        .map_err(map_unique)
}

pub async fn delete(store: &dyn Store, id: Uuid) -> Result<(), ApiError> {
    store.delete_by_id(Collection::Users, id).await?;
    Ok(())
}
