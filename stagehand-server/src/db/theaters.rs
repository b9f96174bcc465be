//! Theaters (tenants)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use stagehand_common::auth::Role;
use stagehand_common::{time, Error, Result};
use tracing::info;

use super::users::{insert_user, NewUser};
use super::{optional_text, required_text};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Theater {
    pub id: i64,
    pub name: String,
    pub city: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TheaterInput {
    pub name: String,
    pub city: Option<String>,
}

pub async fn get_theater(pool: &SqlitePool, id: i64) -> Result<Theater> {
    sqlx::query_as::<_, Theater>("SELECT * FROM theaters WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Theater {} not found", id)))
}

/// Create a theater together with its first administrator
///
/// Both rows are written in one transaction; returns the theater and the
/// admin's user id.
pub async fn create_theater_with_admin(
    pool: &SqlitePool,
    input: &TheaterInput,
    admin: &NewUser,
) -> Result<(Theater, i64)> {
    let name = required_text(&input.name, "name", 200)?;
    if admin.role != Role::Admin {
        return Err(Error::InvalidInput("The first user of a theater must be an ADMIN".into()));
    }

    let now = time::now();
    let mut tx = pool.begin().await?;

    let theater_id = sqlx::query(
        "INSERT INTO theaters (name, city, created_at, updated_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&name)
    .bind(optional_text(input.city.as_deref()))
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    let admin_id = insert_user(&mut tx, theater_id, admin).await?;

    tx.commit().await?;

    info!(
        "Created theater {} ('{}') with admin '{}'",
        theater_id, name, admin.username
    );

    Ok((get_theater(pool, theater_id).await?, admin_id))
}

pub async fn update_theater(pool: &SqlitePool, id: i64, input: &TheaterInput) -> Result<Theater> {
    let name = required_text(&input.name, "name", 200)?;

    let result = sqlx::query("UPDATE theaters SET name = ?, city = ?, updated_at = ? WHERE id = ?")
        .bind(&name)
        .bind(optional_text(input.city.as_deref()))
        .bind(time::now())
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Theater {} not found", id)));
    }

    get_theater(pool, id).await
}
