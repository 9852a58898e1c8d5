use serde::Serialize;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use super::dto::{ItemCreate, ItemUpdate};
use super::repo::{self, Item};
use crate::error::ApiError;
use crate::policy::{authorize, Operation, Principal};
use crate::state::AppState;

fn check_title(title: &str) -> Result<(), ApiError> {
    let len = title.chars().count();
    if len == 0 || len > 255 {
        return Err(ApiError::validation(
            "title must be between 1 and 255 characters",
        ));
    }
    Ok(())
}

fn check_description(description: &Option<String>) -> Result<(), ApiError> {
    if let Some(d) = description {
        if d.chars().count() > 255 {
            return Err(ApiError::validation("description is too long"));
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct ItemPatchDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<Option<String>>,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
}

/// An item always belongs to its creator; `owner_id` is never taken from
/// input.
pub async fn create(
    state: &AppState,
    principal: &Principal,
    body: ItemCreate,
) -> Result<Item, ApiError> {
    authorize(principal, &Operation::CreateItem)?;
    check_title(&body.title)?;
    check_description(&body.description)?;

    let now = OffsetDateTime::now_utc();
    let item = Item {
        id: Uuid::new_v4(),
        title: body.title,
        description: body.description,
        owner_id: principal.id,
        created_at: now,
        updated_at: now,
    };
    repo::insert(state.store.as_ref(), &item).await?;
    info!(item_id = %item.id, owner_id = %item.owner_id, "item created");
    Ok(item)
}

/// Existence first, then ownership: a missing id is always 404, a foreign
/// item is always a NotOwner denial.
pub async fn get(state: &AppState, principal: &Principal, item_id: Uuid) -> Result<Item, ApiError> {
    let item = repo::find_by_id(state.store.as_ref(), item_id)
        .await?
        .ok_or(ApiError::NotFound("item"))?;
    authorize(principal, &Operation::ReadItem { owner_id: item.owner_id })?;
    Ok(item)
}

pub async fn list_own(
    state: &AppState,
    principal: &Principal,
    skip: u64,
    limit: u64,
) -> Result<(Vec<Item>, u64), ApiError> {
    authorize(principal, &Operation::ListOwnItems)?;
    repo::list_by_owner(state.store.as_ref(), principal.id, skip, limit).await
}

pub async fn list_all(
    state: &AppState,
    principal: &Principal,
    skip: u64,
    limit: u64,
) -> Result<(Vec<Item>, u64), ApiError> {
    authorize(principal, &Operation::ListAllItems)?;
    repo::list_all(state.store.as_ref(), skip, limit).await
}

pub async fn update(
    state: &AppState,
    principal: &Principal,
    item_id: Uuid,
    body: ItemUpdate,
) -> Result<Item, ApiError> {
    let item = repo::find_by_id(state.store.as_ref(), item_id)
        .await?
        .ok_or(ApiError::NotFound("item"))?;
    authorize(principal, &Operation::UpdateItem { owner_id: item.owner_id })?;

    let mut patch = ItemPatchDoc {
        title: None,
        description: None,
        updated_at: OffsetDateTime::now_utc(),
    };
    if let Some(title) = body.title {
        check_title(&title)?;
        patch.title = Some(title);
    }
    if let Some(description) = body.description {
        check_description(&description)?;
        patch.description = Some(description);
    }

    let fields = serde_json::to_value(&patch).map_err(anyhow::Error::new)?;
    repo::update(state.store.as_ref(), item_id, fields).await?;
    repo::find_by_id(state.store.as_ref(), item_id)
        .await?
        .ok_or(ApiError::NotFound("item"))
}

pub async fn delete(
    state: &AppState,
    principal: &Principal,
    item_id: Uuid,
) -> Result<(), ApiError> {
    let item = repo::find_by_id(state.store.as_ref(), item_id)
        .await?
        .ok_or(ApiError::NotFound("item"))?;
    authorize(principal, &Operation::DeleteItem { owner_id: item.owner_id })?;
    repo::delete(state.store.as_ref(), item_id).await?;
    info!(item_id = %item_id, "item deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::DenyReason;
    use crate::users::dto::UserRegister;
    use crate::users::repo::User;
    use crate::users::services as user_services;

    async fn seed_user(state: &AppState, email: &str) -> User {
        user_services::register(
            state,
            UserRegister {
                email: email.into(),
                password: "pw123456".into(),
                full_name: None,
            },
        )
        .await
        .unwrap()
    }

    fn superuser() -> Principal {
        Principal {
            id: Uuid::new_v4(),
            is_superuser: true,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn create_sets_owner_to_creator() {
        let state = AppState::fake();
        let alice = seed_user(&state, "alice@example.com").await;
        let item = create(
            &state,
            &alice.principal(),
            ItemCreate {
                title: "Book".into(),
                description: Some("hardcover".into()),
            },
        )
        .await
        .unwrap();
        assert_eq!(item.owner_id, alice.id);

        let fetched = get(&state, &alice.principal(), item.id).await.unwrap();
        assert_eq!(fetched.title, "Book");
    }

    #[tokio::test]
    async fn create_validates_shape() {
        let state = AppState::fake();
        let alice = seed_user(&state, "alice@example.com").await;
        let err = create(
            &state,
            &alice.principal(),
            ItemCreate {
                title: "".into(),
                description: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let err = create(
            &state,
            &alice.principal(),
            ItemCreate {
                title: "x".repeat(256),
                description: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn non_owner_is_denied_every_operation() {
        let state = AppState::fake();
        let alice = seed_user(&state, "alice@example.com").await;
        let bob = seed_user(&state, "bob@example.com").await;
        let item = create(
            &state,
            &alice.principal(),
            ItemCreate {
                title: "Book".into(),
                description: None,
            },
        )
        .await
        .unwrap();

        let err = get(&state, &bob.principal(), item.id).await.unwrap_err();
        assert!(matches!(err, ApiError::Permission(DenyReason::NotOwner)));

        let err = update(
            &state,
            &bob.principal(),
            item.id,
            ItemUpdate {
                title: Some("Stolen".into()),
                description: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Permission(DenyReason::NotOwner)));

        let err = delete(&state, &bob.principal(), item.id).await.unwrap_err();
        assert!(matches!(err, ApiError::Permission(DenyReason::NotOwner)));

        // Still intact and readable by its owner.
        let fetched = get(&state, &alice.principal(), item.id).await.unwrap();
        assert_eq!(fetched.title, "Book");
    }

    #[tokio::test]
    async fn superuser_bypasses_ownership() {
        let state = AppState::fake();
        let alice = seed_user(&state, "alice@example.com").await;
        let admin = superuser();
        let item = create(
            &state,
            &alice.principal(),
            ItemCreate {
                title: "Book".into(),
                description: None,
            },
        )
        .await
        .unwrap();

        assert!(get(&state, &admin, item.id).await.is_ok());
        update(
            &state,
            &admin,
            item.id,
            ItemUpdate {
                title: Some("Edited".into()),
                description: None,
            },
        )
        .await
        .unwrap();
        delete(&state, &admin, item.id).await.unwrap();
    }

    #[tokio::test]
    async fn missing_item_is_not_found_before_ownership() {
        let state = AppState::fake();
        let alice = seed_user(&state, "alice@example.com").await;
        let err = get(&state, &alice.principal(), Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        let err = delete(&state, &alice.principal(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn partial_update_leaves_other_fields_unchanged() {
        let state = AppState::fake();
        let alice = seed_user(&state, "alice@example.com").await;
        let item = create(
            &state,
            &alice.principal(),
            ItemCreate {
                title: "Book".into(),
                description: Some("hardcover".into()),
            },
        )
        .await
        .unwrap();

        let updated = update(
            &state,
            &alice.principal(),
            item.id,
            ItemUpdate {
                title: Some("Novel".into()),
                description: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.title, "Novel");
        assert_eq!(updated.description.as_deref(), Some("hardcover"));
        assert_eq!(updated.owner_id, item.owner_id);
        assert_eq!(updated.created_at, item.created_at);

        let cleared = update(
            &state,
            &alice.principal(),
            item.id,
            ItemUpdate {
                title: None,
                description: Some(None),
            },
        )
        .await
        .unwrap();
        assert_eq!(cleared.title, "Novel");
        assert_eq!(cleared.description, None);
    }

    #[tokio::test]
    async fn listing_is_scoped_by_role() {
        let state = AppState::fake();
        let alice = seed_user(&state, "alice@example.com").await;
        let bob = seed_user(&state, "bob@example.com").await;
        for owner in [&alice, &bob] {
            for i in 0..2 {
                create(
                    &state,
                    &owner.principal(),
                    ItemCreate {
                        title: format!("Item {i}"),
                        description: None,
                    },
                )
                .await
                .unwrap();
            }
        }

        let (own, total) = list_own(&state, &alice.principal(), 0, 100).await.unwrap();
        assert_eq!(total, 2);
        assert!(own.iter().all(|i| i.owner_id == alice.id));

        let err = list_all(&state, &alice.principal(), 0, 100).await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::Permission(DenyReason::InsufficientPrivilege)
        ));

        let (_, total_all) = list_all(&state, &superuser(), 0, 100).await.unwrap();
        assert_eq!(total_all, 4);
    }

    // The end-to-end contract: register, login-equivalent authentication,
    // item creation and cross-user denials all composed together.
    #[tokio::test]
    async fn alice_and_bob_scenario() {
        let state = AppState::fake();
        let alice = seed_user(&state, "alice@example.com").await;
        let a = user_services::authenticate(&state, "alice@example.com", "pw123456")
            .await
            .unwrap()
            .expect("alice authenticates");
        assert_eq!(a.id, alice.id);

        let book = create(
            &state,
            &a.principal(),
            ItemCreate {
                title: "Book".into(),
                description: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(book.owner_id, alice.id);

        let bob = seed_user(&state, "bob@example.com").await;
        let err = get(&state, &bob.principal(), book.id).await.unwrap_err();
        assert!(matches!(err, ApiError::Permission(DenyReason::NotOwner)));

        let err = user_services::delete_by_id(&state, &bob.principal(), alice.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Permission(_)));
    }
}
