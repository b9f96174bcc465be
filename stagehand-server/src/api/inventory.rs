//! Inventory: categories, items and the movement journal

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
    Extension, Json, Router,
};
use serde::Serialize;
use stagehand_common::auth::Permission;
use stagehand_common::pagination::{Page, PageParams};
use tracing::info;

use super::CurrentUser;
use crate::db::inventory::{
    self, Category, CategoryInput, Item, ItemFilter, ItemInput, Movement, MovementInput,
};
use crate::{ApiResult, AppState};

// Categories

pub async fn list_categories(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<Category>>> {
    user.require(Permission::InventoryRead)?;
    Ok(Json(inventory::list_categories(&state.db, user.theater_id).await?))
}

pub async fn create_category(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(input): Json<CategoryInput>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    user.require(Permission::InventoryWrite)?;
    let category = inventory::create_category(&state.db, user.theater_id, &input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn delete_category(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    user.require(Permission::InventoryWrite)?;
    inventory::delete_category(&state.db, user.theater_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Items

pub async fn list_items(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(page): Query<PageParams>,
    Query(filter): Query<ItemFilter>,
) -> ApiResult<Json<Page<Item>>> {
    user.require(Permission::InventoryRead)?;
    Ok(Json(inventory::list_items(&state.db, user.theater_id, &filter, page).await?))
}

pub async fn create_item(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(input): Json<ItemInput>,
) -> ApiResult<(StatusCode, Json<Item>)> {
    user.require(Permission::InventoryWrite)?;
    let item = inventory::create_item(&state.db, user.theater_id, &input).await?;
    info!(
        "Item {} ({}) created by {}",
        item.id, item.inventory_number, user.username
    );
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn get_item(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Item>> {
    user.require(Permission::InventoryRead)?;
    Ok(Json(inventory::get_item(&state.db, user.theater_id, id).await?))
}

pub async fn update_item(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(input): Json<ItemInput>,
) -> ApiResult<Json<Item>> {
    user.require(Permission::InventoryWrite)?;
    Ok(Json(inventory::update_item(&state.db, user.theater_id, id, &input).await?))
}

pub async fn delete_item(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    user.require(Permission::InventoryWrite)?;
    inventory::delete_item(&state.db, user.theater_id, id).await?;
    info!("Item {} deleted by {}", id, user.username);
    Ok(StatusCode::NO_CONTENT)
}

// Movements

#[derive(Debug, Serialize)]
pub struct MovementResponse {
    pub item: Item,
    pub movement: Movement,
}

/// POST /api/inventory/items/:id/movements
pub async fn record_movement(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(input): Json<MovementInput>,
) -> ApiResult<(StatusCode, Json<MovementResponse>)> {
    user.require(Permission::InventoryWrite)?;
    let (item, movement) =
        inventory::record_movement(&state.db, user.theater_id, id, user.id, &input).await?;
    Ok((StatusCode::CREATED, Json(MovementResponse { item, movement })))
}

pub async fn list_movements(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<Page<Movement>>> {
    user.require(Permission::InventoryRead)?;
    Ok(Json(inventory::list_movements(&state.db, user.theater_id, id, page).await?))
}

pub fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/inventory/categories",
            get(list_categories).post(create_category),
        )
        .route("/api/inventory/categories/:id", delete(delete_category))
        .route("/api/inventory/items", get(list_items).post(create_item))
        .route(
            "/api/inventory/items/:id",
            get(get_item).put(update_item).delete(delete_item),
        )
        .route(
            "/api/inventory/items/:id/movements",
            get(list_movements).post(record_movement),
        )
}
