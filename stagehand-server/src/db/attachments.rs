//! Attachment metadata
//!
//! Blobs live in the [`crate::storage::AttachmentStore`]; this table keeps
//! owner, name, type, size and checksum.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use stagehand_common::auth::Permission;
use stagehand_common::{time, Error, Result};

use super::{ref_exists, Ref};

/// Longest stored file name, in characters
pub const MAX_FILE_NAME_LEN: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OwnerType {
    Document,
    Performance,
    InventoryItem,
}

impl OwnerType {
    fn owner_ref(self) -> Ref {
        match self {
            OwnerType::Document => Ref::Document,
            OwnerType::Performance => Ref::Performance,
            OwnerType::InventoryItem => Ref::Item,
        }
    }

    /// Permission needed to read the owner's attachments
    pub fn read_permission(self) -> Permission {
        match self {
            OwnerType::Document => Permission::DocumentsRead,
            OwnerType::Performance => Permission::PerformancesRead,
            OwnerType::InventoryItem => Permission::InventoryRead,
        }
    }

    /// Permission needed to add or remove the owner's attachments
    pub fn write_permission(self) -> Permission {
        match self {
            OwnerType::Document => Permission::DocumentsWrite,
            OwnerType::Performance => Permission::PerformancesWrite,
            OwnerType::InventoryItem => Permission::InventoryWrite,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Attachment {
    pub id: i64,
    pub theater_id: i64,
    pub owner_type: OwnerType,
    pub owner_id: i64,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub sha256: String,
    #[serde(skip)]
    pub storage_key: String,
    pub uploaded_by: i64,
    pub created_at: DateTime<Utc>,
}

const ATTACHMENT_COLUMNS: &str = "SELECT id, theater_id, owner_type, owner_id, file_name, \
                                  content_type, size_bytes, sha256, storage_key, uploaded_by, \
                                  created_at";

#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub owner_type: OwnerType,
    pub owner_id: i64,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub sha256: String,
    pub storage_key: String,
    pub uploaded_by: i64,
}

/// Strip path separators and control characters from a client file name
pub fn sanitize_file_name(name: &str) -> Result<String> {
    // Keep only the last path component
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim().trim_start_matches('.').trim();

    if cleaned.is_empty() {
        return Err(Error::InvalidInput("file_name must not be empty".into()));
    }
    if cleaned.chars().count() > MAX_FILE_NAME_LEN {
        return Err(Error::InvalidInput(format!(
            "file_name must be at most {} characters",
            MAX_FILE_NAME_LEN
        )));
    }
    Ok(cleaned.to_string())
}

/// 404 unless the owner is a live record of the theater
pub async fn ensure_owner(
    pool: &SqlitePool,
    theater_id: i64,
    owner_type: OwnerType,
    owner_id: i64,
) -> Result<()> {
    if !ref_exists(pool, theater_id, owner_type.owner_ref(), owner_id).await? {
        return Err(Error::NotFound(format!(
            "{:?} {} not found",
            owner_type, owner_id
        )));
    }
    Ok(())
}

pub async fn insert_attachment(
    pool: &SqlitePool,
    theater_id: i64,
    new: &NewAttachment,
) -> Result<Attachment> {
    let id = sqlx::query(
        r#"
        INSERT INTO attachments (theater_id, owner_type, owner_id, file_name, content_type,
                                 size_bytes, sha256, storage_key, uploaded_by, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(theater_id)
    .bind(new.owner_type)
    .bind(new.owner_id)
    .bind(&new.file_name)
    .bind(&new.content_type)
    .bind(new.size_bytes)
    .bind(&new.sha256)
    .bind(&new.storage_key)
    .bind(new.uploaded_by)
    .bind(time::now())
    .execute(pool)
    .await?
    .last_insert_rowid();

    get_attachment(pool, theater_id, id).await
}

pub async fn get_attachment(pool: &SqlitePool, theater_id: i64, id: i64) -> Result<Attachment> {
    let sql = format!(
        "{} FROM attachments WHERE id = ? AND theater_id = ? AND deleted_at IS NULL",
        ATTACHMENT_COLUMNS
    );
    sqlx::query_as::<_, Attachment>(&sql)
        .bind(id)
        .bind(theater_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Attachment {} not found", id)))
}

pub async fn list_attachments(
    pool: &SqlitePool,
    theater_id: i64,
    owner_type: OwnerType,
    owner_id: i64,
) -> Result<Vec<Attachment>> {
    let sql = format!(
        "{} FROM attachments \
         WHERE theater_id = ? AND owner_type = ? AND owner_id = ? AND deleted_at IS NULL \
         ORDER BY created_at, id",
        ATTACHMENT_COLUMNS
    );
    let attachments = sqlx::query_as::<_, Attachment>(&sql)
        .bind(theater_id)
        .bind(owner_type)
        .bind(owner_id)
        .fetch_all(pool)
        .await?;
    Ok(attachments)
}

pub async fn delete_attachment(pool: &SqlitePool, theater_id: i64, id: i64) -> Result<()> {
    let result = sqlx::query(
        "UPDATE attachments SET deleted_at = ? WHERE id = ? AND theater_id = ? AND deleted_at IS NULL",
    )
    .bind(time::now())
    .bind(id)
    .bind(theater_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Attachment {} not found", id)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_paths_and_control_chars() {
        assert_eq!(sanitize_file_name("rider.pdf").unwrap(), "rider.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd").unwrap(), "passwd");
        assert_eq!(sanitize_file_name("C:\\docs\\plan\u{0007}.png").unwrap(), "plan.png");
        assert_eq!(sanitize_file_name("  .hidden ").unwrap(), "hidden");
    }

    #[test]
    fn test_sanitize_rejects_empty_and_long_names() {
        assert!(sanitize_file_name("").is_err());
        assert!(sanitize_file_name("dir/").is_err());
        assert!(sanitize_file_name("..").is_err());
        assert!(sanitize_file_name(&"a".repeat(256)).is_err());
        assert!(sanitize_file_name(&"a".repeat(255)).is_ok());
    }
}
