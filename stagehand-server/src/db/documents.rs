//! Documents and their approval workflow
//!
//! Every status change, including creation, is appended to
//! `document_history` in the same transaction as the status write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use stagehand_common::pagination::{Page, PageParams};
use stagehand_common::{time, Error, Result};
use tracing::info;

use super::{ensure_ref, fetch_page, like_pattern, optional_text, required_text, Ref};
use crate::services::workflow::{DocumentAction, DocumentStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    Order,
    Contract,
    Act,
    Memo,
    TechnicalRider,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Document {
    pub id: i64,
    pub theater_id: i64,
    pub title: String,
    pub doc_type: DocumentType,
    pub number: Option<String>,
    pub status: DocumentStatus,
    pub author_id: i64,
    pub department_id: Option<i64>,
    pub performance_id: Option<i64>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const DOCUMENT_COLUMNS: &str = "SELECT id, theater_id, title, doc_type, number, status, author_id, \
                                department_id, performance_id, description, created_at, updated_at";

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentInput {
    pub title: String,
    pub doc_type: DocumentType,
    pub number: Option<String>,
    pub department_id: Option<i64>,
    pub performance_id: Option<i64>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentFilter {
    pub status: Option<DocumentStatus>,
    pub doc_type: Option<DocumentType>,
    pub department_id: Option<i64>,
    pub performance_id: Option<i64>,
    pub author_id: Option<i64>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HistoryEntry {
    pub id: i64,
    pub document_id: i64,
    pub from_status: Option<DocumentStatus>,
    pub to_status: DocumentStatus,
    pub actor_id: i64,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

async fn validate(pool: &SqlitePool, theater_id: i64, input: &DocumentInput) -> Result<String> {
    let title = required_text(&input.title, "title", 300)?;
    ensure_ref(pool, theater_id, Ref::Department, input.department_id).await?;
    ensure_ref(pool, theater_id, Ref::Performance, input.performance_id).await?;
    Ok(title)
}

pub async fn create_document(
    pool: &SqlitePool,
    theater_id: i64,
    author_id: i64,
    input: &DocumentInput,
) -> Result<Document> {
    let title = validate(pool, theater_id, input).await?;
    let now = time::now();
    let mut tx = pool.begin().await?;

    let id = sqlx::query(
        r#"
        INSERT INTO documents (theater_id, title, doc_type, number, status, author_id,
                               department_id, performance_id, description, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(theater_id)
    .bind(&title)
    .bind(input.doc_type)
    .bind(optional_text(input.number.as_deref()))
    .bind(DocumentStatus::Draft)
    .bind(author_id)
    .bind(input.department_id)
    .bind(input.performance_id)
    .bind(optional_text(input.description.as_deref()))
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    sqlx::query(
        r#"
        INSERT INTO document_history (document_id, from_status, to_status, actor_id, comment, created_at)
        VALUES (?, NULL, ?, ?, NULL, ?)
        "#,
    )
    .bind(id)
    .bind(DocumentStatus::Draft)
    .bind(author_id)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    get_document(pool, theater_id, id).await
}

pub async fn get_document(pool: &SqlitePool, theater_id: i64, id: i64) -> Result<Document> {
    let sql = format!(
        "{} FROM documents WHERE id = ? AND theater_id = ? AND deleted_at IS NULL",
        DOCUMENT_COLUMNS
    );
    sqlx::query_as::<_, Document>(&sql)
        .bind(id)
        .bind(theater_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Document {} not found", id)))
}

pub async fn list_documents(
    pool: &SqlitePool,
    theater_id: i64,
    filter: &DocumentFilter,
    page: PageParams,
) -> Result<Page<Document>> {
    let search = like_pattern(filter.search.as_deref());

    fetch_page(
        pool,
        DOCUMENT_COLUMNS,
        |qb: &mut QueryBuilder<'_, Sqlite>| {
            qb.push("FROM documents WHERE deleted_at IS NULL AND theater_id = ");
            qb.push_bind(theater_id);
            if let Some(status) = filter.status {
                qb.push(" AND status = ");
                qb.push_bind(status);
            }
            if let Some(doc_type) = filter.doc_type {
                qb.push(" AND doc_type = ");
                qb.push_bind(doc_type);
            }
            if let Some(department_id) = filter.department_id {
                qb.push(" AND department_id = ");
                qb.push_bind(department_id);
            }
            if let Some(performance_id) = filter.performance_id {
                qb.push(" AND performance_id = ");
                qb.push_bind(performance_id);
            }
            if let Some(author_id) = filter.author_id {
                qb.push(" AND author_id = ");
                qb.push_bind(author_id);
            }
            if let Some(ref pattern) = search {
                qb.push(" AND (title LIKE ");
                qb.push_bind(pattern.clone());
                qb.push(" OR number LIKE ");
                qb.push_bind(pattern.clone());
                qb.push(")");
            }
        },
        "created_at DESC, id DESC",
        page,
    )
    .await
}

/// Replace a draft's fields
pub async fn update_document(
    pool: &SqlitePool,
    theater_id: i64,
    id: i64,
    input: &DocumentInput,
) -> Result<Document> {
    let current = get_document(pool, theater_id, id).await?;
    if !current.status.is_editable() {
        return Err(Error::Conflict(format!(
            "Document {} is {} and can no longer be edited",
            id, current.status
        )));
    }
    let title = validate(pool, theater_id, input).await?;

    sqlx::query(
        r#"
        UPDATE documents
        SET title = ?, doc_type = ?, number = ?, department_id = ?, performance_id = ?,
            description = ?, updated_at = ?
        WHERE id = ? AND theater_id = ? AND status = ?
        "#,
    )
    .bind(&title)
    .bind(input.doc_type)
    .bind(optional_text(input.number.as_deref()))
    .bind(input.department_id)
    .bind(input.performance_id)
    .bind(optional_text(input.description.as_deref()))
    .bind(time::now())
    .bind(id)
    .bind(theater_id)
    .bind(DocumentStatus::Draft)
    .execute(pool)
    .await?;

    get_document(pool, theater_id, id).await
}

pub async fn delete_document(pool: &SqlitePool, theater_id: i64, id: i64) -> Result<()> {
    let current = get_document(pool, theater_id, id).await?;
    if !current.status.is_deletable() {
        return Err(Error::Conflict(format!(
            "Document {} is {}; only DRAFT or REJECTED documents can be deleted",
            id, current.status
        )));
    }

    let now = time::now();
    sqlx::query("UPDATE documents SET deleted_at = ?, updated_at = ? WHERE id = ? AND theater_id = ?")
        .bind(now)
        .bind(now)
        .bind(id)
        .bind(theater_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Apply a workflow action on behalf of `actor_id`
///
/// Callers check the approve permission; this checks the state machine, the
/// author-cannot-review rule and the reject comment.
pub async fn transition_document(
    pool: &SqlitePool,
    theater_id: i64,
    id: i64,
    actor_id: i64,
    action: DocumentAction,
    comment: Option<&str>,
) -> Result<Document> {
    let current = get_document(pool, theater_id, id).await?;
    let next = action.apply(current.status)?;
    let comment = optional_text(comment);

    if action.is_review() && current.author_id == actor_id {
        return Err(Error::Forbidden(
            "Authors cannot approve or reject their own documents".into(),
        ));
    }
    if action == DocumentAction::Reject && comment.is_none() {
        return Err(Error::InvalidInput("A comment is required to reject a document".into()));
    }

    let now = time::now();
    let mut tx = pool.begin().await?;

    // Guard on the old status so concurrent actions cannot both apply
    let result = sqlx::query(
        "UPDATE documents SET status = ?, updated_at = ? WHERE id = ? AND theater_id = ? AND status = ?",
    )
    .bind(next)
    .bind(now)
    .bind(id)
    .bind(theater_id)
    .bind(current.status)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::Conflict(format!(
            "Document {} changed status concurrently",
            id
        )));
    }

    sqlx::query(
        r#"
        INSERT INTO document_history (document_id, from_status, to_status, actor_id, comment, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id)
    .bind(current.status)
    .bind(next)
    .bind(actor_id)
    .bind(&comment)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(
        "Document {} {}: {} -> {} by user {}",
        id, action, current.status, next, actor_id
    );

    get_document(pool, theater_id, id).await
}

/// History of one document, oldest first
pub async fn document_history(
    pool: &SqlitePool,
    theater_id: i64,
    id: i64,
) -> Result<Vec<HistoryEntry>> {
    get_document(pool, theater_id, id).await?;

    let entries = sqlx::query_as::<_, HistoryEntry>(
        "SELECT * FROM document_history WHERE document_id = ? ORDER BY created_at, id",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;
    Ok(entries)
}
