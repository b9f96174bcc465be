//! Inventory: categories, items and the movement journal
//!
//! An item's status only changes through a movement, so the journal is a
//! complete record of where the item has been and in what state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use stagehand_common::pagination::{Page, PageParams};
use stagehand_common::{time, Error, Result};
use tracing::info;

use super::{
    ensure_ref, fetch_page, like_pattern, optional_text, required_text, Ref, SortOrder,
};
use crate::services::workflow::{ItemStatus, MovementType};

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: i64,
    pub theater_id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    pub parent_id: Option<i64>,
}

pub async fn list_categories(pool: &SqlitePool, theater_id: i64) -> Result<Vec<Category>> {
    let categories = sqlx::query_as::<_, Category>(
        "SELECT * FROM inventory_categories WHERE theater_id = ? ORDER BY name",
    )
    .bind(theater_id)
    .fetch_all(pool)
    .await?;
    Ok(categories)
}

pub async fn create_category(
    pool: &SqlitePool,
    theater_id: i64,
    input: &CategoryInput,
) -> Result<Category> {
    let name = required_text(&input.name, "name", 200)?;
    ensure_ref(pool, theater_id, Ref::Category, input.parent_id).await?;

    let id = sqlx::query(
        "INSERT INTO inventory_categories (theater_id, name, parent_id, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(theater_id)
    .bind(&name)
    .bind(input.parent_id)
    .bind(time::now())
    .execute(pool)
    .await?
    .last_insert_rowid();

    let category = sqlx::query_as::<_, Category>("SELECT * FROM inventory_categories WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(category)
}

/// Hard delete; refused while items or sub-categories reference it
pub async fn delete_category(pool: &SqlitePool, theater_id: i64, id: i64) -> Result<()> {
    if !super::ref_exists(pool, theater_id, Ref::Category, id).await? {
        return Err(Error::NotFound(format!("Category {} not found", id)));
    }

    let in_use: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(SELECT 1 FROM inventory_items WHERE category_id = ?1)
            OR EXISTS(SELECT 1 FROM inventory_categories WHERE parent_id = ?1)
        "#,
    )
    .bind(id)
    .fetch_one(pool)
    .await?;

    if in_use {
        return Err(Error::Conflict(format!(
            "Category {} is still used by items or sub-categories",
            id
        )));
    }

    sqlx::query("DELETE FROM inventory_categories WHERE id = ? AND theater_id = ?")
        .bind(id)
        .bind(theater_id)
        .execute(pool)
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Item {
    pub id: i64,
    pub theater_id: i64,
    pub inventory_number: String,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub department_id: Option<i64>,
    pub venue_id: Option<i64>,
    pub quantity: i64,
    pub unit: String,
    pub unit_cost: f64,
    pub status: ItemStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const ITEM_COLUMNS: &str = "SELECT id, theater_id, inventory_number, name, description, \
                            category_id, department_id, venue_id, quantity, unit, unit_cost, \
                            status, created_at, updated_at";

/// Create/replace payload; status is not part of it
#[derive(Debug, Clone, Deserialize)]
pub struct ItemInput {
    pub inventory_number: String,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub department_id: Option<i64>,
    pub venue_id: Option<i64>,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default)]
    pub unit_cost: f64,
}

fn default_quantity() -> i64 {
    1
}

fn default_unit() -> String {
    "pcs".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemSort {
    Name,
    InventoryNumber,
    CreatedAt,
    Quantity,
}

impl ItemSort {
    fn column(self) -> &'static str {
        match self {
            ItemSort::Name => "name",
            ItemSort::InventoryNumber => "inventory_number",
            ItemSort::CreatedAt => "created_at",
            ItemSort::Quantity => "quantity",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemFilter {
    pub status: Option<ItemStatus>,
    pub category_id: Option<i64>,
    pub department_id: Option<i64>,
    pub venue_id: Option<i64>,
    pub search: Option<String>,
    #[serde(default)]
    pub include_written_off: bool,
    pub sort: Option<ItemSort>,
    #[serde(default)]
    pub order: SortOrder,
}

struct ValidItem {
    inventory_number: String,
    name: String,
    unit: String,
}

async fn validate_item(pool: &SqlitePool, theater_id: i64, input: &ItemInput) -> Result<ValidItem> {
    let inventory_number = required_text(&input.inventory_number, "inventory_number", 64)?;
    let name = required_text(&input.name, "name", 200)?;
    let unit = required_text(&input.unit, "unit", 16)?;

    if input.quantity < 0 {
        return Err(Error::InvalidInput("quantity must be >= 0".into()));
    }
    if !input.unit_cost.is_finite() || input.unit_cost < 0.0 {
        return Err(Error::InvalidInput("unit_cost must be a non-negative number".into()));
    }

    ensure_ref(pool, theater_id, Ref::Category, input.category_id).await?;
    ensure_ref(pool, theater_id, Ref::Department, input.department_id).await?;
    ensure_ref(pool, theater_id, Ref::Venue, input.venue_id).await?;

    Ok(ValidItem {
        inventory_number,
        name,
        unit,
    })
}

pub async fn create_item(pool: &SqlitePool, theater_id: i64, input: &ItemInput) -> Result<Item> {
    let valid = validate_item(pool, theater_id, input).await?;
    let now = time::now();

    let id = sqlx::query(
        r#"
        INSERT INTO inventory_items (theater_id, inventory_number, name, description, category_id,
                                     department_id, venue_id, quantity, unit, unit_cost, status,
                                     created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(theater_id)
    .bind(&valid.inventory_number)
    .bind(&valid.name)
    .bind(optional_text(input.description.as_deref()))
    .bind(input.category_id)
    .bind(input.department_id)
    .bind(input.venue_id)
    .bind(input.quantity)
    .bind(&valid.unit)
    .bind(input.unit_cost)
    .bind(ItemStatus::Available)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?
    .last_insert_rowid();

    get_item(pool, theater_id, id).await
}

pub async fn get_item(pool: &SqlitePool, theater_id: i64, id: i64) -> Result<Item> {
    let sql = format!(
        "{} FROM inventory_items WHERE id = ? AND theater_id = ? AND deleted_at IS NULL",
        ITEM_COLUMNS
    );
    sqlx::query_as::<_, Item>(&sql)
        .bind(id)
        .bind(theater_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Inventory item {} not found", id)))
}

pub async fn list_items(
    pool: &SqlitePool,
    theater_id: i64,
    filter: &ItemFilter,
    page: PageParams,
) -> Result<Page<Item>> {
    let search = like_pattern(filter.search.as_deref());
    let sort = filter.sort.unwrap_or(ItemSort::Name);
    let order_by = format!("{} {}, id ASC", sort.column(), filter.order.as_sql());

    fetch_page(
        pool,
        ITEM_COLUMNS,
        |qb: &mut QueryBuilder<'_, Sqlite>| {
            qb.push("FROM inventory_items WHERE deleted_at IS NULL AND theater_id = ");
            qb.push_bind(theater_id);
            match filter.status {
                Some(status) => {
                    qb.push(" AND status = ");
                    qb.push_bind(status);
                }
                None if !filter.include_written_off => {
                    qb.push(" AND status != ");
                    qb.push_bind(ItemStatus::WrittenOff);
                }
                None => {}
            }
            if let Some(category_id) = filter.category_id {
                qb.push(" AND category_id = ");
                qb.push_bind(category_id);
            }
            if let Some(department_id) = filter.department_id {
                qb.push(" AND department_id = ");
                qb.push_bind(department_id);
            }
            if let Some(venue_id) = filter.venue_id {
                qb.push(" AND venue_id = ");
                qb.push_bind(venue_id);
            }
            if let Some(ref pattern) = search {
                qb.push(" AND (name LIKE ");
                qb.push_bind(pattern.clone());
                qb.push(" OR inventory_number LIKE ");
                qb.push_bind(pattern.clone());
                qb.push(")");
            }
        },
        &order_by,
        page,
    )
    .await
}

/// Replace an item's descriptive fields (status is left alone)
pub async fn update_item(
    pool: &SqlitePool,
    theater_id: i64,
    id: i64,
    input: &ItemInput,
) -> Result<Item> {
    get_item(pool, theater_id, id).await?;
    let valid = validate_item(pool, theater_id, input).await?;

    sqlx::query(
        r#"
        UPDATE inventory_items
        SET inventory_number = ?, name = ?, description = ?, category_id = ?, department_id = ?,
            venue_id = ?, quantity = ?, unit = ?, unit_cost = ?, updated_at = ?
        WHERE id = ? AND theater_id = ?
        "#,
    )
    .bind(&valid.inventory_number)
    .bind(&valid.name)
    .bind(optional_text(input.description.as_deref()))
    .bind(input.category_id)
    .bind(input.department_id)
    .bind(input.venue_id)
    .bind(input.quantity)
    .bind(&valid.unit)
    .bind(input.unit_cost)
    .bind(time::now())
    .bind(id)
    .bind(theater_id)
    .execute(pool)
    .await?;

    get_item(pool, theater_id, id).await
}

pub async fn delete_item(pool: &SqlitePool, theater_id: i64, id: i64) -> Result<()> {
    let now = time::now();
    let result = sqlx::query(
        r#"
        UPDATE inventory_items SET deleted_at = ?, updated_at = ?
        WHERE id = ? AND theater_id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(now)
    .bind(now)
    .bind(id)
    .bind(theater_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Inventory item {} not found", id)));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Movements
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Movement {
    pub id: i64,
    pub item_id: i64,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub from_venue_id: Option<i64>,
    pub to_venue_id: Option<i64>,
    pub from_status: ItemStatus,
    pub to_status: ItemStatus,
    pub performance_id: Option<i64>,
    pub comment: Option<String>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MovementInput {
    pub movement_type: MovementType,
    pub quantity: Option<i64>,
    pub to_venue_id: Option<i64>,
    pub performance_id: Option<i64>,
    pub comment: Option<String>,
}

/// Item state after a movement, plus the quantity recorded in the journal
#[derive(Debug, Clone, PartialEq)]
struct MovementPlan {
    status: ItemStatus,
    quantity: i64,
    venue_id: Option<i64>,
    recorded_quantity: i64,
}

fn plan_movement(item: &Item, input: &MovementInput) -> Result<MovementPlan> {
    let status = input.movement_type.apply(item.status)?;

    match input.movement_type {
        MovementType::Receipt => {
            let received = input.quantity.unwrap_or(0);
            if received <= 0 {
                return Err(Error::InvalidInput("RECEIPT requires a positive quantity".into()));
            }
            let quantity = item.quantity.checked_add(received).ok_or_else(|| {
                Error::InvalidInput(format!(
                    "RECEIPT of {} would overflow the item quantity",
                    received
                ))
            })?;
            Ok(MovementPlan {
                status,
                quantity,
                venue_id: input.to_venue_id.or(item.venue_id),
                recorded_quantity: received,
            })
        }
        MovementType::Transfer => {
            let to_venue = input
                .to_venue_id
                .ok_or_else(|| Error::InvalidInput("TRANSFER requires to_venue_id".into()))?;
            if item.venue_id == Some(to_venue) {
                return Err(Error::InvalidInput(format!(
                    "Item is already located at venue {}",
                    to_venue
                )));
            }
            Ok(MovementPlan {
                status,
                quantity: item.quantity,
                venue_id: Some(to_venue),
                recorded_quantity: checked_quantity(item, input.quantity)?,
            })
        }
        _ => Ok(MovementPlan {
            status,
            quantity: item.quantity,
            venue_id: input.to_venue_id.or(item.venue_id),
            recorded_quantity: checked_quantity(item, input.quantity)?,
        }),
    }
}

fn checked_quantity(item: &Item, requested: Option<i64>) -> Result<i64> {
    let quantity = requested.unwrap_or(item.quantity);
    if quantity < 0 || quantity > item.quantity {
        return Err(Error::InvalidInput(format!(
            "quantity must be between 0 and {}",
            item.quantity
        )));
    }
    Ok(quantity)
}

/// Apply a movement and journal it in one transaction
pub async fn record_movement(
    pool: &SqlitePool,
    theater_id: i64,
    item_id: i64,
    actor_id: i64,
    input: &MovementInput,
) -> Result<(Item, Movement)> {
    ensure_ref(pool, theater_id, Ref::Venue, input.to_venue_id).await?;
    ensure_ref(pool, theater_id, Ref::Performance, input.performance_id).await?;

    let mut tx = pool.begin().await?;

    let sql = format!(
        "{} FROM inventory_items WHERE id = ? AND theater_id = ? AND deleted_at IS NULL",
        ITEM_COLUMNS
    );
    let item = sqlx::query_as::<_, Item>(&sql)
        .bind(item_id)
        .bind(theater_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Inventory item {} not found", item_id)))?;

    let plan = plan_movement(&item, input)?;
    let now = time::now();

    sqlx::query(
        r#"
        UPDATE inventory_items SET status = ?, quantity = ?, venue_id = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(plan.status)
    .bind(plan.quantity)
    .bind(plan.venue_id)
    .bind(now)
    .bind(item_id)
    .execute(&mut *tx)
    .await?;

    let movement_id = sqlx::query(
        r#"
        INSERT INTO inventory_movements (item_id, movement_type, quantity, from_venue_id,
                                         to_venue_id, from_status, to_status, performance_id,
                                         comment, created_by, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(item_id)
    .bind(input.movement_type)
    .bind(plan.recorded_quantity)
    .bind(item.venue_id)
    .bind(plan.venue_id)
    .bind(item.status)
    .bind(plan.status)
    .bind(input.performance_id)
    .bind(optional_text(input.comment.as_deref()))
    .bind(actor_id)
    .bind(now)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    tx.commit().await?;

    info!(
        "Inventory item {} {}: {} -> {} by user {}",
        item_id, input.movement_type, item.status, plan.status, actor_id
    );

    let movement = sqlx::query_as::<_, Movement>("SELECT * FROM inventory_movements WHERE id = ?")
        .bind(movement_id)
        .fetch_one(pool)
        .await?;
    let item = get_item(pool, theater_id, item_id).await?;

    Ok((item, movement))
}

/// Journal of one item, newest first
pub async fn list_movements(
    pool: &SqlitePool,
    theater_id: i64,
    item_id: i64,
    page: PageParams,
) -> Result<Page<Movement>> {
    get_item(pool, theater_id, item_id).await?;

    fetch_page(
        pool,
        "SELECT *",
        |qb: &mut QueryBuilder<'_, Sqlite>| {
            qb.push("FROM inventory_movements WHERE item_id = ");
            qb.push_bind(item_id);
        },
        "created_at DESC, id DESC",
        page,
    )
    .await
}
