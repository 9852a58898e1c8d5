use axum::{
    extract::{Path, Query, State},
    routing::{get, patch, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{
    Message, Pagination, UpdatePassword, UserCreate, UserPublic, UserRegister, UserUpdate,
    UserUpdateMe, UsersPublic,
};
use super::services;
use crate::auth::extractors::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/users/signup", post(signup))
        .route("/users/me", get(read_me).patch(update_me).delete(delete_me))
        .route("/users/me/password", patch(update_password))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(read_user).patch(update_user).delete(delete_user),
        )
}

#[instrument(skip(state, payload))]
async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<UserRegister>,
) -> Result<Json<UserPublic>, ApiError> {
    let user = services::register(&state, payload).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
async fn list_users(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Query(p): Query<Pagination>,
) -> Result<Json<UsersPublic>, ApiError> {
    let (users, count) = services::list(&state, &principal, p.skip, p.limit).await?;
    Ok(Json(UsersPublic {
        data: users.into_iter().map(UserPublic::from).collect(),
        count,
    }))
}

#[instrument(skip(state, payload))]
async fn create_user(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Json(payload): Json<UserCreate>,
) -> Result<Json<UserPublic>, ApiError> {
    let user = services::create_by_admin(&state, &principal, payload).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
async fn read_me(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
) -> Result<Json<UserPublic>, ApiError> {
    let user = services::get_me(&state, &principal).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
async fn update_me(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Json(payload): Json<UserUpdateMe>,
) -> Result<Json<UserPublic>, ApiError> {
    let user = services::update_me(&state, &principal, payload).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
async fn update_password(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Json(payload): Json<UpdatePassword>,
) -> Result<Json<Message>, ApiError> {
    services::update_password(&state, &principal, payload).await?;
    Ok(Json(Message {
        message: "password updated successfully",
    }))
}

#[instrument(skip(state))]
async fn delete_me(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
) -> Result<Json<Message>, ApiError> {
    services::delete_me(&state, &principal).await?;
    Ok(Json(Message {
        message: "user deleted successfully",
    }))
}

#[instrument(skip(state))]
async fn read_user(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserPublic>, ApiError> {
    let user = services::get_by_id(&state, &principal, id).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
async fn update_user(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UserUpdate>,
) -> Result<Json<UserPublic>, ApiError> {
    let user = services::update_by_admin(&state, &principal, id, payload).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Message>, ApiError> {
    services::delete_by_id(&state, &principal, id).await?;
    Ok(Json(Message {
        message: "user deleted successfully",
    }))
}
