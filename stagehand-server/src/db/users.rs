//! User accounts
//!
//! Usernames are unique across all theaters since login carries no theater
//! selector. Password hashes never leave this module's [`UserRecord`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use stagehand_common::auth::{spawn_hash_password, validate_password_policy, Role};
use stagehand_common::pagination::{Page, PageParams};
use stagehand_common::{time, Error, Result};

use super::{fetch_page, like_pattern, optional_text, required_text};

/// Full row including credentials
#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub theater_id: i64,
    pub username: String,
    pub full_name: String,
    /// Argon2id PHC string
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
}

/// Public view of a user
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub theater_id: i64,
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const USER_COLUMNS: &str = "SELECT id, theater_id, username, full_name, email, role, is_active, \
                            last_login_at, created_at, updated_at";

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

fn validate_username(username: &str) -> Result<String> {
    let username = username.trim();
    let valid_chars = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if username.len() < 3 || username.len() > 64 || !valid_chars {
        return Err(Error::InvalidInput(
            "Username must be 3-64 characters of letters, digits, '.', '_' or '-'".to_string(),
        ));
    }
    Ok(username.to_string())
}

fn validate_email(email: Option<&str>) -> Result<Option<String>> {
    let email = optional_text(email);
    if let Some(ref e) = email {
        if !e.contains('@') || e.len() > 254 {
            return Err(Error::InvalidInput(format!("Invalid email address: {}", e)));
        }
    }
    Ok(email)
}

/// Insert a user on an open connection (used inside transactions)
pub async fn insert_user(conn: &mut SqliteConnection, theater_id: i64, input: &NewUser) -> Result<i64> {
    let username = validate_username(&input.username)?;
    let full_name = required_text(&input.full_name, "full_name", 200)?;
    let email = validate_email(input.email.as_deref())?;
    validate_password_policy(&input.password)?;

    let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = ?)")
        .bind(&username)
        .fetch_one(&mut *conn)
        .await?;
    if taken {
        return Err(Error::Conflict(format!("Username '{}' is already taken", username)));
    }

    let password_hash = spawn_hash_password(input.password.clone()).await?;
    let now = time::now();

    let id = sqlx::query(
        r#"
        INSERT INTO users (theater_id, username, full_name, email, password_hash,
                           role, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)
        "#,
    )
    .bind(theater_id)
    .bind(&username)
    .bind(&full_name)
    .bind(&email)
    .bind(&password_hash)
    .bind(input.role)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    Ok(id)
}

pub async fn create_user(pool: &SqlitePool, theater_id: i64, input: &NewUser) -> Result<User> {
    let mut conn = pool.acquire().await?;
    let id = insert_user(&mut conn, theater_id, input).await?;
    drop(conn);
    get_user(pool, theater_id, id).await
}

pub async fn get_user(pool: &SqlitePool, theater_id: i64, id: i64) -> Result<User> {
    let sql = format!(
        "{} FROM users WHERE id = ? AND theater_id = ? AND deleted_at IS NULL",
        USER_COLUMNS
    );
    sqlx::query_as::<_, User>(&sql)
        .bind(id)
        .bind(theater_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User {} not found", id)))
}

/// Credentials for login (soft-deleted users are invisible)
pub async fn find_by_username(pool: &SqlitePool, username: &str) -> Result<Option<UserRecord>> {
    let record = sqlx::query_as::<_, UserRecord>(
        r#"
        SELECT id, theater_id, username, full_name, password_hash, role, is_active
        FROM users
        WHERE username = ? AND deleted_at IS NULL
        "#,
    )
    .bind(username.trim())
    .fetch_optional(pool)
    .await?;
    Ok(record)
}

/// Credentials by id, any theater (token validation)
pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<UserRecord>> {
    let record = sqlx::query_as::<_, UserRecord>(
        r#"
        SELECT id, theater_id, username, full_name, password_hash, role, is_active
        FROM users
        WHERE id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(record)
}

pub async fn list_users(
    pool: &SqlitePool,
    theater_id: i64,
    filter: &UserFilter,
    page: PageParams,
) -> Result<Page<User>> {
    let search = like_pattern(filter.search.as_deref());

    fetch_page(
        pool,
        USER_COLUMNS,
        |qb: &mut QueryBuilder<'_, Sqlite>| {
            qb.push("FROM users WHERE deleted_at IS NULL AND theater_id = ");
            qb.push_bind(theater_id);
            if let Some(role) = filter.role {
                qb.push(" AND role = ");
                qb.push_bind(role);
            }
            if let Some(active) = filter.is_active {
                qb.push(" AND is_active = ");
                qb.push_bind(active);
            }
            if let Some(ref pattern) = search {
                qb.push(" AND (username LIKE ");
                qb.push_bind(pattern.clone());
                qb.push(" OR full_name LIKE ");
                qb.push_bind(pattern.clone());
                qb.push(")");
            }
        },
        "username ASC",
        page,
    )
    .await
}

pub async fn update_user(
    pool: &SqlitePool,
    theater_id: i64,
    id: i64,
    update: &UserUpdate,
) -> Result<User> {
    let current = get_user(pool, theater_id, id).await?;

    let full_name = match update.full_name.as_deref() {
        Some(name) => required_text(name, "full_name", 200)?,
        None => current.full_name,
    };
    let email = match update.email.as_deref() {
        Some(email) => validate_email(Some(email))?,
        None => current.email,
    };
    let role = update.role.unwrap_or(current.role);
    let is_active = update.is_active.unwrap_or(current.is_active);

    sqlx::query(
        r#"
        UPDATE users SET full_name = ?, email = ?, role = ?, is_active = ?, updated_at = ?
        WHERE id = ? AND theater_id = ?
        "#,
    )
    .bind(&full_name)
    .bind(&email)
    .bind(role)
    .bind(is_active)
    .bind(time::now())
    .bind(id)
    .bind(theater_id)
    .execute(pool)
    .await?;

    get_user(pool, theater_id, id).await
}

/// Replace the password (policy enforced)
pub async fn set_password(pool: &SqlitePool, id: i64, new_password: &str) -> Result<()> {
    validate_password_policy(new_password)?;
    let password_hash = spawn_hash_password(new_password.to_string()).await?;

    sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(&password_hash)
        .bind(time::now())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn touch_last_login(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
        .bind(time::now())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Soft delete; the account is also deactivated
pub async fn delete_user(pool: &SqlitePool, theater_id: i64, id: i64) -> Result<()> {
    let now = time::now();
    let result = sqlx::query(
        r#"
        UPDATE users SET deleted_at = ?, is_active = 0, updated_at = ?
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
        return Err(Error::NotFound(format!("User {} not found", id)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_rules() {
        assert_eq!(validate_username("  stage.mgr ").unwrap(), "stage.mgr");
        assert!(validate_username("ab").is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username("semi;colon").is_err());
    }

    #[test]
    fn test_email_rules() {
        assert_eq!(validate_email(Some("")).unwrap(), None);
        assert_eq!(
            validate_email(Some("props@theatre.org")).unwrap(),
            Some("props@theatre.org".to_string())
        );
        assert!(validate_email(Some("not-an-email")).is_err());
    }
}
