use axum::{
    extract::{FromRef, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::dto::{LoginRequest, TokenResponse};
use super::extractors::CurrentUser;
use super::jwt::JwtKeys;
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::dto::UserPublic;
use crate::users::{repo, services};

pub fn login_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/login/test-token", get(test_token))
}

#[instrument(skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    let user = services::authenticate(&state, &payload.email, &payload.password)
        .await?
        .ok_or_else(|| {
            warn!(email = %payload.email, "login rejected");
            ApiError::InvalidCredentials
        })?;

    if !user.is_active {
        return Err(ApiError::validation("inactive user"));
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id)?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(TokenResponse::bearer(token)))
}

/// Echoes the principal's own record; lets clients probe token validity.
#[instrument(skip(state))]
async fn test_token(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
) -> Result<Json<UserPublic>, ApiError> {
    let user = repo::find_by_id(state.store.as_ref(), principal.id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    Ok(Json(UserPublic::from(user)))
}
