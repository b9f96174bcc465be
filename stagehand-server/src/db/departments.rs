//! Departments (props, costumes, lighting, ...)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use stagehand_common::pagination::{Page, PageParams};
use stagehand_common::{time, Error, Result};

use super::{ensure_ref, fetch_page, like_pattern, optional_text, required_text, Ref};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Department {
    pub id: i64,
    pub theater_id: i64,
    pub name: String,
    pub code: String,
    pub head_user_id: Option<i64>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const DEPARTMENT_COLUMNS: &str = "SELECT id, theater_id, name, code, head_user_id, description, \
                                  created_at, updated_at";

#[derive(Debug, Clone, Deserialize)]
pub struct DepartmentInput {
    pub name: String,
    pub code: String,
    pub head_user_id: Option<i64>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DepartmentFilter {
    pub search: Option<String>,
}

/// Validate and normalize: codes are stored upper-case
async fn validate(
    pool: &SqlitePool,
    theater_id: i64,
    input: &DepartmentInput,
) -> Result<(String, String)> {
    let name = required_text(&input.name, "name", 200)?;
    let code = required_text(&input.code, "code", 32)?.to_uppercase();
    ensure_ref(pool, theater_id, Ref::User, input.head_user_id).await?;
    Ok((name, code))
}

pub async fn create_department(
    pool: &SqlitePool,
    theater_id: i64,
    input: &DepartmentInput,
) -> Result<Department> {
    let (name, code) = validate(pool, theater_id, input).await?;
    let now = time::now();

    let id = sqlx::query(
        r#"
        INSERT INTO departments (theater_id, name, code, head_user_id, description,
                                 created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(theater_id)
    .bind(&name)
    .bind(&code)
    .bind(input.head_user_id)
    .bind(optional_text(input.description.as_deref()))
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?
    .last_insert_rowid();

    get_department(pool, theater_id, id).await
}

pub async fn get_department(pool: &SqlitePool, theater_id: i64, id: i64) -> Result<Department> {
    let sql = format!(
        "{} FROM departments WHERE id = ? AND theater_id = ? AND deleted_at IS NULL",
        DEPARTMENT_COLUMNS
    );
    sqlx::query_as::<_, Department>(&sql)
        .bind(id)
        .bind(theater_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Department {} not found", id)))
}

pub async fn list_departments(
    pool: &SqlitePool,
    theater_id: i64,
    filter: &DepartmentFilter,
    page: PageParams,
) -> Result<Page<Department>> {
    let search = like_pattern(filter.search.as_deref());

    fetch_page(
        pool,
        DEPARTMENT_COLUMNS,
        |qb: &mut QueryBuilder<'_, Sqlite>| {
            qb.push("FROM departments WHERE deleted_at IS NULL AND theater_id = ");
            qb.push_bind(theater_id);
            if let Some(ref pattern) = search {
                qb.push(" AND (name LIKE ");
                qb.push_bind(pattern.clone());
                qb.push(" OR code LIKE ");
                qb.push_bind(pattern.clone());
                qb.push(")");
            }
        },
        "name ASC",
        page,
    )
    .await
}

pub async fn update_department(
    pool: &SqlitePool,
    theater_id: i64,
    id: i64,
    input: &DepartmentInput,
) -> Result<Department> {
    get_department(pool, theater_id, id).await?;
    let (name, code) = validate(pool, theater_id, input).await?;

    sqlx::query(
        r#"
        UPDATE departments SET name = ?, code = ?, head_user_id = ?, description = ?, updated_at = ?
        WHERE id = ? AND theater_id = ?
        "#,
    )
    .bind(&name)
    .bind(&code)
    .bind(input.head_user_id)
    .bind(optional_text(input.description.as_deref()))
    .bind(time::now())
    .bind(id)
    .bind(theater_id)
    .execute(pool)
    .await?;

    get_department(pool, theater_id, id).await
}

pub async fn delete_department(pool: &SqlitePool, theater_id: i64, id: i64) -> Result<()> {
    let now = time::now();
    let result = sqlx::query(
        r#"
        UPDATE departments SET deleted_at = ?, updated_at = ?
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
        return Err(Error::NotFound(format!("Department {} not found", id)));
    }
    Ok(())
}
