use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use super::jwt::JwtKeys;
use crate::error::ApiError;
use crate::policy::Principal;
use crate::state::AppState;
use crate::users::repo;

/// Resolves the acting principal from the Bearer token: validates the
/// signature and expiry, then projects the referenced User record. Missing
/// header, malformed token and expired token are indistinguishable to the
/// caller. Activity is not checked here; the policy denies inactive
/// principals uniformly.
pub struct CurrentUser(pub Principal);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::InvalidToken)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or(ApiError::InvalidToken)?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(token).map_err(|e| {
            warn!(error = %e, "token rejected");
            ApiError::InvalidToken
        })?;

        let user = repo::find_by_id(state.store.as_ref(), claims.sub)
            .await?
            .ok_or(ApiError::NotFound("user"))?;

        Ok(CurrentUser(user.principal()))
    }
}
