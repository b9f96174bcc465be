//! Venues: stages, rehearsal rooms, workshops, warehouses

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use stagehand_common::pagination::{Page, PageParams};
use stagehand_common::{time, Error, Result};

use super::{fetch_page, like_pattern, optional_text, required_text};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VenueType {
    MainStage,
    SmallStage,
    RehearsalRoom,
    Workshop,
    Warehouse,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Venue {
    pub id: i64,
    pub theater_id: i64,
    pub name: String,
    pub venue_type: VenueType,
    pub capacity: i64,
    pub address: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const VENUE_COLUMNS: &str =
    "SELECT id, theater_id, name, venue_type, capacity, address, is_active, created_at, updated_at";

#[derive(Debug, Clone, Deserialize)]
pub struct VenueInput {
    pub name: String,
    pub venue_type: VenueType,
    #[serde(default)]
    pub capacity: i64,
    pub address: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VenueFilter {
    pub venue_type: Option<VenueType>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

fn validate(input: &VenueInput) -> Result<String> {
    if input.capacity < 0 {
        return Err(Error::InvalidInput("capacity must be >= 0".into()));
    }
    required_text(&input.name, "name", 200)
}

pub async fn create_venue(pool: &SqlitePool, theater_id: i64, input: &VenueInput) -> Result<Venue> {
    let name = validate(input)?;
    let now = time::now();

    let id = sqlx::query(
        r#"
        INSERT INTO venues (theater_id, name, venue_type, capacity, address, is_active,
                            created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(theater_id)
    .bind(&name)
    .bind(input.venue_type)
    .bind(input.capacity)
    .bind(optional_text(input.address.as_deref()))
    .bind(input.is_active)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?
    .last_insert_rowid();

    get_venue(pool, theater_id, id).await
}

pub async fn get_venue(pool: &SqlitePool, theater_id: i64, id: i64) -> Result<Venue> {
    let sql = format!(
        "{} FROM venues WHERE id = ? AND theater_id = ? AND deleted_at IS NULL",
        VENUE_COLUMNS
    );
    sqlx::query_as::<_, Venue>(&sql)
        .bind(id)
        .bind(theater_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Venue {} not found", id)))
}

pub async fn list_venues(
    pool: &SqlitePool,
    theater_id: i64,
    filter: &VenueFilter,
    page: PageParams,
) -> Result<Page<Venue>> {
    let search = like_pattern(filter.search.as_deref());

    fetch_page(
        pool,
        VENUE_COLUMNS,
        |qb: &mut QueryBuilder<'_, Sqlite>| {
            qb.push("FROM venues WHERE deleted_at IS NULL AND theater_id = ");
            qb.push_bind(theater_id);
            if let Some(venue_type) = filter.venue_type {
                qb.push(" AND venue_type = ");
                qb.push_bind(venue_type);
            }
            if let Some(active) = filter.is_active {
                qb.push(" AND is_active = ");
                qb.push_bind(active);
            }
            if let Some(ref pattern) = search {
                qb.push(" AND name LIKE ");
                qb.push_bind(pattern.clone());
            }
        },
        "name ASC",
        page,
    )
    .await
}

pub async fn update_venue(
    pool: &SqlitePool,
    theater_id: i64,
    id: i64,
    input: &VenueInput,
) -> Result<Venue> {
    let name = validate(input)?;

    let result = sqlx::query(
        r#"
        UPDATE venues SET name = ?, venue_type = ?, capacity = ?, address = ?, is_active = ?,
                          updated_at = ?
        WHERE id = ? AND theater_id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(&name)
    .bind(input.venue_type)
    .bind(input.capacity)
    .bind(optional_text(input.address.as_deref()))
    .bind(input.is_active)
    .bind(time::now())
    .bind(id)
    .bind(theater_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Venue {} not found", id)));
    }

    get_venue(pool, theater_id, id).await
}

/// Soft delete; refused while the venue still has upcoming events
///
/// Recurring events count as upcoming regardless of their end date.
pub async fn delete_venue(pool: &SqlitePool, theater_id: i64, id: i64) -> Result<()> {
    get_venue(pool, theater_id, id).await?;
    let now = time::now();

    let upcoming: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM schedule_events
            WHERE venue_id = ? AND deleted_at IS NULL AND status != 'CANCELLED'
              AND (ends_at > ? OR recurrence_rule IS NOT NULL)
        )
        "#,
    )
    .bind(id)
    .bind(now)
    .fetch_one(pool)
    .await?;

    if upcoming {
        return Err(Error::Conflict(format!(
            "Venue {} has upcoming events; cancel or move them first",
            id
        )));
    }

    sqlx::query("UPDATE venues SET deleted_at = ?, updated_at = ? WHERE id = ? AND theater_id = ?")
        .bind(now)
        .bind(now)
        .bind(id)
        .bind(theater_id)
        .execute(pool)
        .await?;

    Ok(())
}
