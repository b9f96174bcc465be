//! Performance passports: the production record with its cast and crew,
//! required inventory and readiness tasks

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use stagehand_common::pagination::{Page, PageParams};
use stagehand_common::{time, Error, Result};
use tracing::info;

use super::{ensure_ref, fetch_page, like_pattern, optional_text, required_text, Ref};
use crate::services::workflow::{ItemStatus, PerformanceStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum AgeRating {
    #[serde(rename = "0+")]
    #[sqlx(rename = "0+")]
    All,
    #[serde(rename = "6+")]
    #[sqlx(rename = "6+")]
    Six,
    #[serde(rename = "12+")]
    #[sqlx(rename = "12+")]
    Twelve,
    #[serde(rename = "16+")]
    #[sqlx(rename = "16+")]
    Sixteen,
    #[serde(rename = "18+")]
    #[sqlx(rename = "18+")]
    Eighteen,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Performance {
    pub id: i64,
    pub theater_id: i64,
    pub title: String,
    pub subtitle: Option<String>,
    pub author: Option<String>,
    pub director: Option<String>,
    pub genre: Option<String>,
    pub age_rating: Option<AgeRating>,
    pub duration_minutes: Option<i64>,
    pub intermissions: i64,
    pub premiere_date: Option<NaiveDate>,
    pub status: PerformanceStatus,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const PERFORMANCE_COLUMNS: &str = "SELECT id, theater_id, title, subtitle, author, director, genre, \
                                   age_rating, duration_minutes, intermissions, premiere_date, \
                                   status, description, created_at, updated_at";

#[derive(Debug, Clone, Deserialize)]
pub struct PerformanceInput {
    pub title: String,
    pub subtitle: Option<String>,
    pub author: Option<String>,
    pub director: Option<String>,
    pub genre: Option<String>,
    pub age_rating: Option<AgeRating>,
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub intermissions: i64,
    pub premiere_date: Option<NaiveDate>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PerformanceFilter {
    pub status: Option<PerformanceStatus>,
    pub genre: Option<String>,
    pub search: Option<String>,
}

fn validate(input: &PerformanceInput) -> Result<String> {
    let title = required_text(&input.title, "title", 300)?;
    if matches!(input.duration_minutes, Some(d) if d <= 0) {
        return Err(Error::InvalidInput("duration_minutes must be > 0".into()));
    }
    if input.intermissions < 0 {
        return Err(Error::InvalidInput("intermissions must be >= 0".into()));
    }
    Ok(title)
}

pub async fn create_performance(
    pool: &SqlitePool,
    theater_id: i64,
    input: &PerformanceInput,
) -> Result<Performance> {
    let title = validate(input)?;
    let now = time::now();

    let id = sqlx::query(
        r#"
        INSERT INTO performances (theater_id, title, subtitle, author, director, genre, age_rating,
                                  duration_minutes, intermissions, premiere_date, status,
                                  description, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(theater_id)
    .bind(&title)
    .bind(optional_text(input.subtitle.as_deref()))
    .bind(optional_text(input.author.as_deref()))
    .bind(optional_text(input.director.as_deref()))
    .bind(optional_text(input.genre.as_deref()))
    .bind(input.age_rating)
    .bind(input.duration_minutes)
    .bind(input.intermissions)
    .bind(input.premiere_date)
    .bind(PerformanceStatus::Preparation)
    .bind(optional_text(input.description.as_deref()))
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?
    .last_insert_rowid();

    get_performance(pool, theater_id, id).await
}

pub async fn get_performance(pool: &SqlitePool, theater_id: i64, id: i64) -> Result<Performance> {
    let sql = format!(
        "{} FROM performances WHERE id = ? AND theater_id = ? AND deleted_at IS NULL",
        PERFORMANCE_COLUMNS
    );
    sqlx::query_as::<_, Performance>(&sql)
        .bind(id)
        .bind(theater_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Performance {} not found", id)))
}

pub async fn list_performances(
    pool: &SqlitePool,
    theater_id: i64,
    filter: &PerformanceFilter,
    page: PageParams,
) -> Result<Page<Performance>> {
    let search = like_pattern(filter.search.as_deref());
    let genre = optional_text(filter.genre.as_deref());

    fetch_page(
        pool,
        PERFORMANCE_COLUMNS,
        |qb: &mut QueryBuilder<'_, Sqlite>| {
            qb.push("FROM performances WHERE deleted_at IS NULL AND theater_id = ");
            qb.push_bind(theater_id);
            if let Some(status) = filter.status {
                qb.push(" AND status = ");
                qb.push_bind(status);
            }
            if let Some(ref genre) = genre {
                qb.push(" AND genre = ");
                qb.push_bind(genre.clone());
            }
            if let Some(ref pattern) = search {
                qb.push(" AND (title LIKE ");
                qb.push_bind(pattern.clone());
                qb.push(" OR author LIKE ");
                qb.push_bind(pattern.clone());
                qb.push(" OR director LIKE ");
                qb.push_bind(pattern.clone());
                qb.push(")");
            }
        },
        "title ASC, id ASC",
        page,
    )
    .await
}

/// Replace the passport fields; archived performances are read-only
pub async fn update_performance(
    pool: &SqlitePool,
    theater_id: i64,
    id: i64,
    input: &PerformanceInput,
) -> Result<Performance> {
    let current = get_performance(pool, theater_id, id).await?;
    if current.status == PerformanceStatus::Archived {
        return Err(Error::Conflict(format!("Performance {} is archived", id)));
    }
    let title = validate(input)?;
    if current.status != PerformanceStatus::Preparation && input.premiere_date.is_none() {
        return Err(Error::InvalidInput(
            "premiere_date cannot be cleared once the performance has premiered".into(),
        ));
    }

    sqlx::query(
        r#"
        UPDATE performances
        SET title = ?, subtitle = ?, author = ?, director = ?, genre = ?, age_rating = ?,
            duration_minutes = ?, intermissions = ?, premiere_date = ?, description = ?,
            updated_at = ?
        WHERE id = ? AND theater_id = ?
        "#,
    )
    .bind(&title)
    .bind(optional_text(input.subtitle.as_deref()))
    .bind(optional_text(input.author.as_deref()))
    .bind(optional_text(input.director.as_deref()))
    .bind(optional_text(input.genre.as_deref()))
    .bind(input.age_rating)
    .bind(input.duration_minutes)
    .bind(input.intermissions)
    .bind(input.premiere_date)
    .bind(optional_text(input.description.as_deref()))
    .bind(time::now())
    .bind(id)
    .bind(theater_id)
    .execute(pool)
    .await?;

    get_performance(pool, theater_id, id).await
}

pub async fn change_status(
    pool: &SqlitePool,
    theater_id: i64,
    id: i64,
    next: PerformanceStatus,
) -> Result<Performance> {
    let current = get_performance(pool, theater_id, id).await?;
    let next = current
        .status
        .transition(next, current.premiere_date.is_some())?;

    let result = sqlx::query(
        "UPDATE performances SET status = ?, updated_at = ? WHERE id = ? AND theater_id = ? AND status = ?",
    )
    .bind(next)
    .bind(time::now())
    .bind(id)
    .bind(theater_id)
    .bind(current.status)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::Conflict(format!(
            "Performance {} changed status concurrently",
            id
        )));
    }

    info!("Performance {} status {} -> {}", id, current.status, next);
    get_performance(pool, theater_id, id).await
}

/// Soft delete; a performance on stage (in repertoire or paused) must be
/// archived instead
pub async fn delete_performance(pool: &SqlitePool, theater_id: i64, id: i64) -> Result<()> {
    let current = get_performance(pool, theater_id, id).await?;
    if matches!(
        current.status,
        PerformanceStatus::InRepertoire | PerformanceStatus::Paused
    ) {
        return Err(Error::Conflict(format!(
            "Performance {} is {}; archive it instead of deleting",
            id, current.status
        )));
    }

    let now = time::now();
    sqlx::query("UPDATE performances SET deleted_at = ?, updated_at = ? WHERE id = ? AND theater_id = ?")
        .bind(now)
        .bind(now)
        .bind(id)
        .bind(theater_id)
        .execute(pool)
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Cast & crew
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StaffKind {
    Cast,
    Crew,
    Creative,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StaffMember {
    pub id: i64,
    pub performance_id: i64,
    pub user_id: Option<i64>,
    pub person_name: String,
    pub kind: StaffKind,
    pub role_name: String,
    pub department_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StaffInput {
    /// Defaults to the linked user's full name
    pub person_name: Option<String>,
    pub user_id: Option<i64>,
    pub kind: StaffKind,
    pub role_name: String,
    pub department_id: Option<i64>,
}

pub async fn list_staff(
    pool: &SqlitePool,
    theater_id: i64,
    performance_id: i64,
) -> Result<Vec<StaffMember>> {
    get_performance(pool, theater_id, performance_id).await?;

    let staff = sqlx::query_as::<_, StaffMember>(
        "SELECT * FROM performance_staff WHERE performance_id = ? ORDER BY kind, person_name, id",
    )
    .bind(performance_id)
    .fetch_all(pool)
    .await?;
    Ok(staff)
}

pub async fn add_staff(
    pool: &SqlitePool,
    theater_id: i64,
    performance_id: i64,
    input: &StaffInput,
) -> Result<StaffMember> {
    get_performance(pool, theater_id, performance_id).await?;
    ensure_ref(pool, theater_id, Ref::User, input.user_id).await?;
    ensure_ref(pool, theater_id, Ref::Department, input.department_id).await?;
    let role_name = required_text(&input.role_name, "role_name", 200)?;

    let person_name = match (optional_text(input.person_name.as_deref()), input.user_id) {
        (Some(name), _) => required_text(&name, "person_name", 200)?,
        (None, Some(user_id)) => super::users::get_user(pool, theater_id, user_id).await?.full_name,
        (None, None) => {
            return Err(Error::InvalidInput(
                "person_name is required when no user_id is given".into(),
            ))
        }
    };

    let id = sqlx::query(
        r#"
        INSERT INTO performance_staff (performance_id, user_id, person_name, kind, role_name,
                                       department_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(performance_id)
    .bind(input.user_id)
    .bind(&person_name)
    .bind(input.kind)
    .bind(&role_name)
    .bind(input.department_id)
    .bind(time::now())
    .execute(pool)
    .await?
    .last_insert_rowid();

    let member = sqlx::query_as::<_, StaffMember>("SELECT * FROM performance_staff WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(member)
}

pub async fn remove_staff(
    pool: &SqlitePool,
    theater_id: i64,
    performance_id: i64,
    staff_id: i64,
) -> Result<()> {
    get_performance(pool, theater_id, performance_id).await?;

    let result = sqlx::query("DELETE FROM performance_staff WHERE id = ? AND performance_id = ?")
        .bind(staff_id)
        .bind(performance_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Staff entry {} not found", staff_id)));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Required inventory
// ---------------------------------------------------------------------------

/// A required item joined with its current stock
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RequiredItem {
    pub item_id: i64,
    pub inventory_number: String,
    pub name: String,
    pub status: ItemStatus,
    pub stock_quantity: i64,
    /// Quantity the performance needs
    pub quantity: i64,
    pub note: Option<String>,
    /// The inventory item was deleted after being attached
    pub is_deleted: bool,
}

impl RequiredItem {
    /// Still in inventory, usable status and enough stock
    pub fn is_ready(&self) -> bool {
        !self.is_deleted && self.status.is_serviceable() && self.stock_quantity >= self.quantity
    }

    /// Stock that counts toward the requirement
    pub fn available(&self) -> i64 {
        if self.is_deleted || !self.status.is_serviceable() {
            0
        } else {
            self.stock_quantity
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequiredItemInput {
    pub quantity: i64,
    pub note: Option<String>,
}

/// Required items, including ones deleted from inventory since
pub async fn list_required_items(
    pool: &SqlitePool,
    theater_id: i64,
    performance_id: i64,
) -> Result<Vec<RequiredItem>> {
    get_performance(pool, theater_id, performance_id).await?;

    let items = sqlx::query_as::<_, RequiredItem>(
        r#"
        SELECT pi.item_id, i.inventory_number, i.name, i.status, i.quantity AS stock_quantity,
               pi.quantity, pi.note, (i.deleted_at IS NOT NULL) AS is_deleted
        FROM performance_items pi
        JOIN inventory_items i ON i.id = pi.item_id
        WHERE pi.performance_id = ?
        ORDER BY i.name, i.id
        "#,
    )
    .bind(performance_id)
    .fetch_all(pool)
    .await?;
    Ok(items)
}

/// Attach an item or change its required quantity
pub async fn set_required_item(
    pool: &SqlitePool,
    theater_id: i64,
    performance_id: i64,
    item_id: i64,
    input: &RequiredItemInput,
) -> Result<RequiredItem> {
    get_performance(pool, theater_id, performance_id).await?;
    let item = super::inventory::get_item(pool, theater_id, item_id).await?;

    if input.quantity < 1 {
        return Err(Error::InvalidInput("quantity must be >= 1".into()));
    }
    if item.status == ItemStatus::WrittenOff {
        return Err(Error::Conflict(format!(
            "Inventory item {} is written off",
            item_id
        )));
    }

    sqlx::query(
        r#"
        INSERT INTO performance_items (performance_id, item_id, quantity, note)
        VALUES (?, ?, ?, ?)
        ON CONFLICT (performance_id, item_id)
        DO UPDATE SET quantity = excluded.quantity, note = excluded.note
        "#,
    )
    .bind(performance_id)
    .bind(item_id)
    .bind(input.quantity)
    .bind(optional_text(input.note.as_deref()))
    .execute(pool)
    .await?;

    list_required_items(pool, theater_id, performance_id)
        .await?
        .into_iter()
        .find(|r| r.item_id == item_id)
        .ok_or_else(|| Error::Internal(format!("Required item {} vanished", item_id)))
}

pub async fn remove_required_item(
    pool: &SqlitePool,
    theater_id: i64,
    performance_id: i64,
    item_id: i64,
) -> Result<()> {
    get_performance(pool, theater_id, performance_id).await?;

    let result = sqlx::query("DELETE FROM performance_items WHERE performance_id = ? AND item_id = ?")
        .bind(performance_id)
        .bind(item_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!(
            "Item {} is not required by performance {}",
            item_id, performance_id
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Readiness tasks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReadinessTask {
    pub id: i64,
    pub performance_id: i64,
    pub title: String,
    pub department_id: Option<i64>,
    pub due_date: Option<NaiveDate>,
    pub is_done: bool,
    pub done_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskInput {
    pub title: String,
    pub department_id: Option<i64>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub is_done: Option<bool>,
    pub due_date: Option<NaiveDate>,
    pub department_id: Option<i64>,
}

pub async fn list_tasks(
    pool: &SqlitePool,
    theater_id: i64,
    performance_id: i64,
) -> Result<Vec<ReadinessTask>> {
    get_performance(pool, theater_id, performance_id).await?;

    let tasks = sqlx::query_as::<_, ReadinessTask>(
        r#"
        SELECT * FROM readiness_tasks
        WHERE performance_id = ?
        ORDER BY is_done, due_date IS NULL, due_date, id
        "#,
    )
    .bind(performance_id)
    .fetch_all(pool)
    .await?;
    Ok(tasks)
}

async fn get_task(pool: &SqlitePool, performance_id: i64, task_id: i64) -> Result<ReadinessTask> {
    sqlx::query_as::<_, ReadinessTask>(
        "SELECT * FROM readiness_tasks WHERE id = ? AND performance_id = ?",
    )
    .bind(task_id)
    .bind(performance_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Task {} not found", task_id)))
}

pub async fn add_task(
    pool: &SqlitePool,
    theater_id: i64,
    performance_id: i64,
    input: &TaskInput,
) -> Result<ReadinessTask> {
    get_performance(pool, theater_id, performance_id).await?;
    ensure_ref(pool, theater_id, Ref::Department, input.department_id).await?;
    let title = required_text(&input.title, "title", 300)?;

    let id = sqlx::query(
        r#"
        INSERT INTO readiness_tasks (performance_id, title, department_id, due_date, is_done, created_at)
        VALUES (?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(performance_id)
    .bind(&title)
    .bind(input.department_id)
    .bind(input.due_date)
    .bind(time::now())
    .execute(pool)
    .await?
    .last_insert_rowid();

    get_task(pool, performance_id, id).await
}

/// Partial update; `done_at` follows `is_done`
pub async fn update_task(
    pool: &SqlitePool,
    theater_id: i64,
    performance_id: i64,
    task_id: i64,
    update: &TaskUpdate,
) -> Result<ReadinessTask> {
    get_performance(pool, theater_id, performance_id).await?;
    let current = get_task(pool, performance_id, task_id).await?;
    ensure_ref(pool, theater_id, Ref::Department, update.department_id).await?;

    let title = match update.title.as_deref() {
        Some(title) => required_text(title, "title", 300)?,
        None => current.title,
    };
    let is_done = update.is_done.unwrap_or(current.is_done);
    let done_at = match (current.is_done, is_done) {
        (false, true) => Some(time::now()),
        (true, true) => current.done_at,
        (_, false) => None,
    };

    sqlx::query(
        r#"
        UPDATE readiness_tasks
        SET title = ?, is_done = ?, done_at = ?, due_date = ?, department_id = ?
        WHERE id = ? AND performance_id = ?
        "#,
    )
    .bind(&title)
    .bind(is_done)
    .bind(done_at)
    .bind(update.due_date.or(current.due_date))
    .bind(update.department_id.or(current.department_id))
    .bind(task_id)
    .bind(performance_id)
    .execute(pool)
    .await?;

    get_task(pool, performance_id, task_id).await
}

pub async fn delete_task(
    pool: &SqlitePool,
    theater_id: i64,
    performance_id: i64,
    task_id: i64,
) -> Result<()> {
    get_performance(pool, theater_id, performance_id).await?;

    let result = sqlx::query("DELETE FROM readiness_tasks WHERE id = ? AND performance_id = ?")
        .bind(task_id)
        .bind(performance_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Task {} not found", task_id)));
    }
    Ok(())
}
