//! Aggregate queries for the analytics endpoints
//!
//! Counting and summing is left to SQLite; statuses with no rows are filled
//! in with zeros so clients always see every status.

use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use stagehand_common::Result;
use std::collections::HashMap;

use super::documents::DocumentType;
use crate::services::workflow::{DocumentStatus, ItemStatus, PerformanceStatus};

#[derive(Debug, Clone, Serialize, FromRow, PartialEq)]
pub struct ItemStatusCount {
    pub status: ItemStatus,
    pub item_count: i64,
    pub total_quantity: i64,
}

#[derive(Debug, Clone, Serialize, FromRow, PartialEq)]
pub struct CategoryBreakdown {
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub item_count: i64,
    pub total_quantity: i64,
    pub total_value: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InventorySummary {
    pub by_status: Vec<ItemStatusCount>,
    /// Totals exclude written-off items
    pub item_count: i64,
    pub total_quantity: i64,
    pub total_value: f64,
    pub by_category: Vec<CategoryBreakdown>,
}

pub async fn inventory_summary(pool: &SqlitePool, theater_id: i64) -> Result<InventorySummary> {
    let rows = sqlx::query_as::<_, ItemStatusCount>(
        r#"
        SELECT status, COUNT(*) AS item_count, COALESCE(SUM(quantity), 0) AS total_quantity
        FROM inventory_items
        WHERE theater_id = ? AND deleted_at IS NULL
        GROUP BY status
        "#,
    )
    .bind(theater_id)
    .fetch_all(pool)
    .await?;

    let mut counts: HashMap<ItemStatus, ItemStatusCount> =
        rows.into_iter().map(|r| (r.status, r)).collect();
    let by_status: Vec<ItemStatusCount> = ItemStatus::ALL
        .iter()
        .map(|status| {
            counts.remove(status).unwrap_or(ItemStatusCount {
                status: *status,
                item_count: 0,
                total_quantity: 0,
            })
        })
        .collect();

    let (item_count, total_quantity, total_value): (i64, i64, f64) = sqlx::query_as(
        r#"
        SELECT COUNT(*), COALESCE(SUM(quantity), 0), COALESCE(SUM(quantity * unit_cost), 0.0)
        FROM inventory_items
        WHERE theater_id = ? AND deleted_at IS NULL AND status != ?
        "#,
    )
    .bind(theater_id)
    .bind(ItemStatus::WrittenOff)
    .fetch_one(pool)
    .await?;

    let by_category = sqlx::query_as::<_, CategoryBreakdown>(
        r#"
        SELECT i.category_id, c.name AS category_name, COUNT(*) AS item_count,
               COALESCE(SUM(i.quantity), 0) AS total_quantity,
               COALESCE(SUM(i.quantity * i.unit_cost), 0.0) AS total_value
        FROM inventory_items i
        LEFT JOIN inventory_categories c ON c.id = i.category_id
        WHERE i.theater_id = ? AND i.deleted_at IS NULL AND i.status != ?
        GROUP BY i.category_id, c.name
        ORDER BY c.name IS NULL, c.name
        "#,
    )
    .bind(theater_id)
    .bind(ItemStatus::WrittenOff)
    .fetch_all(pool)
    .await?;

    Ok(InventorySummary {
        by_status,
        item_count,
        total_quantity,
        total_value,
        by_category,
    })
}

#[derive(Debug, Clone, Serialize, FromRow, PartialEq)]
pub struct DocumentStatusCount {
    pub status: DocumentStatus,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, FromRow, PartialEq)]
pub struct DocumentTypeCount {
    pub doc_type: DocumentType,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DocumentSummary {
    pub total: i64,
    pub by_status: Vec<DocumentStatusCount>,
    pub by_type: Vec<DocumentTypeCount>,
    pub pending_review: i64,
}

pub async fn document_summary(pool: &SqlitePool, theater_id: i64) -> Result<DocumentSummary> {
    let rows = sqlx::query_as::<_, DocumentStatusCount>(
        r#"
        SELECT status, COUNT(*) AS count FROM documents
        WHERE theater_id = ? AND deleted_at IS NULL
        GROUP BY status
        "#,
    )
    .bind(theater_id)
    .fetch_all(pool)
    .await?;

    let mut counts: HashMap<DocumentStatus, i64> =
        rows.into_iter().map(|r| (r.status, r.count)).collect();
    let by_status: Vec<DocumentStatusCount> = DocumentStatus::ALL
        .iter()
        .map(|status| DocumentStatusCount {
            status: *status,
            count: counts.remove(status).unwrap_or(0),
        })
        .collect();

    let by_type = sqlx::query_as::<_, DocumentTypeCount>(
        r#"
        SELECT doc_type, COUNT(*) AS count FROM documents
        WHERE theater_id = ? AND deleted_at IS NULL
        GROUP BY doc_type
        ORDER BY count DESC, doc_type
        "#,
    )
    .bind(theater_id)
    .fetch_all(pool)
    .await?;

    let total = by_status.iter().map(|s| s.count).sum();
    let pending_review = by_status
        .iter()
        .find(|s| s.status == DocumentStatus::InReview)
        .map(|s| s.count)
        .unwrap_or(0);

    Ok(DocumentSummary {
        total,
        by_status,
        by_type,
        pending_review,
    })
}

#[derive(Debug, Clone, Serialize, FromRow, PartialEq)]
pub struct PerformanceStatusCount {
    pub status: PerformanceStatus,
    pub count: i64,
}

pub async fn performance_status_counts(
    pool: &SqlitePool,
    theater_id: i64,
) -> Result<Vec<PerformanceStatusCount>> {
    let rows = sqlx::query_as::<_, PerformanceStatusCount>(
        r#"
        SELECT status, COUNT(*) AS count FROM performances
        WHERE theater_id = ? AND deleted_at IS NULL
        GROUP BY status
        "#,
    )
    .bind(theater_id)
    .fetch_all(pool)
    .await?;

    let mut counts: HashMap<PerformanceStatus, i64> =
        rows.into_iter().map(|r| (r.status, r.count)).collect();
    Ok(PerformanceStatus::ALL
        .iter()
        .map(|status| PerformanceStatusCount {
            status: *status,
            count: counts.remove(status).unwrap_or(0),
        })
        .collect())
}

/// Ids and titles of performances still in preparation
pub async fn preparation_performances(
    pool: &SqlitePool,
    theater_id: i64,
) -> Result<Vec<(i64, String)>> {
    let rows = sqlx::query_as::<_, (i64, String)>(
        r#"
        SELECT id, title FROM performances
        WHERE theater_id = ? AND deleted_at IS NULL AND status = ?
        ORDER BY premiere_date IS NULL, premiere_date, title
        "#,
    )
    .bind(theater_id)
    .bind(PerformanceStatus::Preparation)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Venue names by id, deleted venues included
pub async fn venue_names(pool: &SqlitePool, theater_id: i64) -> Result<HashMap<i64, String>> {
    let rows = sqlx::query_as::<_, (i64, String)>("SELECT id, name FROM venues WHERE theater_id = ?")
        .bind(theater_id)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().collect())
}
