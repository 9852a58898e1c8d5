use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::dto::{UpdatePassword, UserCreate, UserRegister, UserUpdate, UserUpdateMe};
use super::repo::{self, User};
use crate::auth::password::{hash_password, verify_password};
use crate::error::ApiError;
use crate::items;
use crate::policy::{authorize, Operation, Principal};
use crate::state::AppState;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    email.len() <= 255 && EMAIL_RE.is_match(email)
}

fn normalize_email(email: &str) -> Result<String, ApiError> {
    let email = email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(ApiError::validation("invalid email"));
    }
    Ok(email)
}

fn check_password_shape(password: &str) -> Result<(), ApiError> {
    let len = password.chars().count();
    if !(8..=40).contains(&len) {
        return Err(ApiError::validation(
            "password must be between 8 and 40 characters",
        ));
    }
    Ok(())
}

fn check_full_name(full_name: &Option<String>) -> Result<(), ApiError> {
    if let Some(name) = full_name {
        if name.chars().count() > 255 {
            return Err(ApiError::validation("full_name is too long"));
        }
    }
    Ok(())
}

/// Partial-field document merged into a stored user. Absent fields stay
/// untouched; `full_name: Some(None)` writes an explicit null (clear).
#[derive(Serialize)]
struct UserPatchDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hashed_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_superuser: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    full_name: Option<Option<String>>,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
}

impl UserPatchDoc {
    fn new() -> Self {
        Self {
            email: None,
            hashed_password: None,
            is_active: None,
            is_superuser: None,
            full_name: None,
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    fn to_value(&self) -> Result<serde_json::Value, ApiError> {
        serde_json::to_value(self).map_err(|e| ApiError::Internal(anyhow::Error::new(e)))
    }
}

fn new_user(
    email: String,
    password: &str,
    full_name: Option<String>,
    is_active: bool,
    is_superuser: bool,
) -> Result<User, ApiError> {
    let now = OffsetDateTime::now_utc();
    Ok(User {
        id: Uuid::new_v4(),
        email,
        hashed_password: hash_password(password).map_err(anyhow::Error::new)?,
        is_active,
        is_superuser,
        full_name,
        created_at: now,
        updated_at: now,
    })
}

/// Re-checks email uniqueness against all *other* users before a change.
async fn check_email_free(
    state: &AppState,
    email: &str,
    except: Option<Uuid>,
) -> Result<(), ApiError> {
    if let Some(existing) = repo::find_by_email(state.store.as_ref(), email).await? {
        if Some(existing.id) != except {
            return Err(ApiError::conflict("a user with this email already exists"));
        }
    }
    Ok(())
}

/// Open registration: always an active, regular user.
pub async fn register(state: &AppState, body: UserRegister) -> Result<User, ApiError> {
    let email = normalize_email(&body.email)?;
    check_password_shape(&body.password)?;
    check_full_name(&body.full_name)?;
    check_email_free(state, &email, None).await?;

    let user = new_user(email, &body.password, body.full_name, true, false)?;
    repo::insert(state.store.as_ref(), &user).await?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user)
}

/// Looks up by email and verifies the password; `None` for unknown email or
/// wrong password, indistinguishable to callers.
pub async fn authenticate(
    state: &AppState,
    email: &str,
    password: &str,
) -> Result<Option<User>, ApiError> {
    let Some(user) = repo::find_by_email(state.store.as_ref(), email).await? else {
        return Ok(None);
    };
    let ok = verify_password(password, &user.hashed_password).map_err(anyhow::Error::new)?;
    Ok(ok.then_some(user))
}

/// Privileged creation; the only path that may grant the superuser flag.
/// The new-account notification is fire-and-forget.
pub async fn create_by_admin(
    state: &AppState,
    principal: &Principal,
    body: UserCreate,
) -> Result<User, ApiError> {
    authorize(principal, &Operation::CreateUser)?;
    let email = normalize_email(&body.email)?;
    check_password_shape(&body.password)?;
    check_full_name(&body.full_name)?;
    check_email_free(state, &email, None).await?;

    let user = new_user(
        email,
        &body.password,
        body.full_name,
        body.is_active,
        body.is_superuser,
    )?;
    repo::insert(state.store.as_ref(), &user).await?;
    info!(user_id = %user.id, email = %user.email, is_superuser = user.is_superuser, "user created by admin");

    state
        .notifier
        .send_new_account_notification(&user.email, &user.email, &body.password)
        .await;

    Ok(user)
}

pub async fn list(
    state: &AppState,
    principal: &Principal,
    skip: u64,
    limit: u64,
) -> Result<(Vec<User>, u64), ApiError> {
    authorize(principal, &Operation::ListUsers)?;
    repo::list(state.store.as_ref(), skip, limit).await
}

pub async fn get_me(state: &AppState, principal: &Principal) -> Result<User, ApiError> {
    authorize(principal, &Operation::ReadUser { target: principal.id })?;
    repo::find_by_id(state.store.as_ref(), principal.id)
        .await?
        .ok_or(ApiError::NotFound("user"))
}

/// Existence first, then the policy: a missing id is always 404, a foreign
/// id is always a privilege denial, on every entry point alike.
pub async fn get_by_id(
    state: &AppState,
    principal: &Principal,
    target_id: Uuid,
) -> Result<User, ApiError> {
    let user = repo::find_by_id(state.store.as_ref(), target_id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    authorize(principal, &Operation::ReadUser { target: target_id })?;
    Ok(user)
}

pub async fn update_me(
    state: &AppState,
    principal: &Principal,
    body: UserUpdateMe,
) -> Result<User, ApiError> {
    authorize(principal, &Operation::UpdateProfile { target: principal.id })?;

    let mut patch = UserPatchDoc::new();
    if let Some(email) = &body.email {
        let email = normalize_email(email)?;
        check_email_free(state, &email, Some(principal.id)).await?;
        patch.email = Some(email);
    }
    if let Some(full_name) = body.full_name {
        check_full_name(&full_name)?;
        patch.full_name = Some(full_name);
    }

    repo::update(state.store.as_ref(), principal.id, patch.to_value()?).await?;
    repo::find_by_id(state.store.as_ref(), principal.id)
        .await?
        .ok_or(ApiError::NotFound("user"))
}

/// Verifies the current password before rotating; rejects reuse with no
/// mutation.
pub async fn update_password(
    state: &AppState,
    principal: &Principal,
    body: UpdatePassword,
) -> Result<(), ApiError> {
    authorize(principal, &Operation::ChangePassword { target: principal.id })?;
    check_password_shape(&body.new_password)?;

    let user = repo::find_by_id(state.store.as_ref(), principal.id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    let ok = verify_password(&body.current_password, &user.hashed_password)
        .map_err(anyhow::Error::new)?;
    if !ok {
        warn!(user_id = %user.id, "password change with wrong current password");
        return Err(ApiError::IncorrectPassword);
    }
    if body.new_password == body.current_password {
        return Err(ApiError::SamePassword);
    }

    let mut patch = UserPatchDoc::new();
    patch.hashed_password = Some(hash_password(&body.new_password).map_err(anyhow::Error::new)?);
    repo::update(state.store.as_ref(), principal.id, patch.to_value()?).await?;
    info!(user_id = %user.id, "password updated");
    Ok(())
}

pub async fn update_by_admin(
    state: &AppState,
    principal: &Principal,
    target_id: Uuid,
    body: UserUpdate,
) -> Result<User, ApiError> {
    let _ = repo::find_by_id(state.store.as_ref(), target_id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    authorize(principal, &Operation::AdminUpdateUser { target: target_id })?;

    let mut patch = UserPatchDoc::new();
    if let Some(email) = &body.email {
        let email = normalize_email(email)?;
        check_email_free(state, &email, Some(target_id)).await?;
        patch.email = Some(email);
    }
    if let Some(password) = &body.password {
        check_password_shape(password)?;
        patch.hashed_password = Some(hash_password(password).map_err(anyhow::Error::new)?);
    }
    if let Some(full_name) = body.full_name {
        check_full_name(&full_name)?;
        patch.full_name = Some(full_name);
    }
    patch.is_active = body.is_active;
    patch.is_superuser = body.is_superuser;

    repo::update(state.store.as_ref(), target_id, patch.to_value()?).await?;
    repo::find_by_id(state.store.as_ref(), target_id)
        .await?
        .ok_or(ApiError::NotFound("user"))
}

/// Deletes the user's items, then the user. Best-effort: a fault after some
/// items are gone leaves the user intact, never half a user.
async fn delete_user_and_items(state: &AppState, user_id: Uuid) -> Result<(), ApiError> {
    let removed = items::repo::delete_all_by_owner(state.store.as_ref(), user_id).await?;
    repo::delete(state.store.as_ref(), user_id).await?;
    info!(user_id = %user_id, items_removed = removed, "user deleted");
    Ok(())
}

pub async fn delete_me(state: &AppState, principal: &Principal) -> Result<(), ApiError> {
    authorize(principal, &Operation::DeleteUser { target: principal.id })?;
    delete_user_and_items(state, principal.id).await
}

pub async fn delete_by_id(
    state: &AppState,
    principal: &Principal,
    target_id: Uuid,
) -> Result<(), ApiError> {
    let _ = repo::find_by_id(state.store.as_ref(), target_id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    authorize(principal, &Operation::DeleteUser { target: target_id })?;
    delete_user_and_items(state, target_id).await
}

/// Idempotent startup seeding of the configured superuser account.
pub async fn ensure_first_superuser(state: &AppState) -> anyhow::Result<()> {
    let Some(first) = &state.config.first_superuser else {
        return Ok(());
    };
    let email = first.email.trim().to_lowercase();
    if repo::find_by_email(state.store.as_ref(), &email)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .is_some()
    {
        return Ok(());
    }
    let user = new_user(email, &first.password, None, true, true)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    repo::insert(state.store.as_ref(), &user)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    info!(email = %user.email, "first superuser seeded");
    Ok(())
}
