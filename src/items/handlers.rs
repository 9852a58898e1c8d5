use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{ItemCreate, ItemPublic, ItemUpdate, ItemsPublic};
use super::services;
use crate::auth::extractors::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::dto::{Message, Pagination};

pub fn item_routes() -> Router<AppState> {
    Router::new()
        .route("/items", get(list_items).post(create_item))
        .route(
            "/items/:id",
            get(read_item).put(update_item).delete(delete_item),
        )
}

/// Role selects the scope here, not inside the store: superusers page over
/// everything, regular users over their own items.
#[instrument(skip(state))]
async fn list_items(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Query(p): Query<Pagination>,
) -> Result<Json<ItemsPublic>, ApiError> {
    let (items, count) = if principal.is_superuser {
        services::list_all(&state, &principal, p.skip, p.limit).await?
    } else {
        services::list_own(&state, &principal, p.skip, p.limit).await?
    };
    Ok(Json(ItemsPublic {
        data: items.into_iter().map(ItemPublic::from).collect(),
        count,
    }))
}

#[instrument(skip(state, payload))]
async fn create_item(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Json(payload): Json<ItemCreate>,
) -> Result<Json<ItemPublic>, ApiError> {
    let item = services::create(&state, &principal, payload).await?;
    Ok(Json(item.into()))
}

#[instrument(skip(state))]
async fn read_item(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ItemPublic>, ApiError> {
    let item = services::get(&state, &principal, id).await?;
    Ok(Json(item.into()))
}

#[instrument(skip(state, payload))]
async fn update_item(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ItemUpdate>,
) -> Result<Json<ItemPublic>, ApiError> {
    let item = services::update(&state, &principal, id, payload).await?;
    Ok(Json(item.into()))
}

#[instrument(skip(state))]
async fn delete_item(
    State(state): State<AppState>,
    CurrentUser(principal): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Message>, ApiError> {
    services::delete(&state, &principal, id).await?;
    Ok(Json(Message {
        message: "item deleted successfully",
    }))
}
