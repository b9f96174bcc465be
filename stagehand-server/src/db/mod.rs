//! Repositories
//!
//! Free functions over `&SqlitePool`, one module per entity. Every function
//! takes the caller's `theater_id`; rows of another theater behave exactly
//! like missing rows.

pub mod analytics;
pub mod attachments;
pub mod departments;
pub mod documents;
pub mod inventory;
pub mod performances;
pub mod schedule;
pub mod theaters;
pub mod users;
pub mod venues;

use sqlx::{sqlite::SqliteRow, QueryBuilder, Sqlite, SqlitePool};
use stagehand_common::pagination::{Page, PageParams};
use stagehand_common::{Error, Result};

/// Entities that request bodies refer to by id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ref {
    User,
    Venue,
    Department,
    Category,
    Item,
    Document,
    Performance,
}

impl Ref {
    fn table(self) -> &'static str {
        match self {
            Ref::User => "users",
            Ref::Venue => "venues",
            Ref::Department => "departments",
            Ref::Category => "inventory_categories",
            Ref::Item => "inventory_items",
            Ref::Document => "documents",
            Ref::Performance => "performances",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Ref::User => "User",
            Ref::Venue => "Venue",
            Ref::Department => "Department",
            Ref::Category => "Category",
            Ref::Item => "Inventory item",
            Ref::Document => "Document",
            Ref::Performance => "Performance",
        }
    }
}

/// True when `id` is a live row of `theater_id`
pub async fn ref_exists(pool: &SqlitePool, theater_id: i64, r: Ref, id: i64) -> Result<bool> {
    // Categories are hard-deleted
    let live = if r == Ref::Category {
        ""
    } else {
        " AND deleted_at IS NULL"
    };
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE id = ? AND theater_id = ?{})",
        r.table(),
        live
    );

    let exists: bool = sqlx::query_scalar(&sql)
        .bind(id)
        .bind(theater_id)
        .fetch_one(pool)
        .await?;
    Ok(exists)
}

/// Validate a reference from a request body (400 when dangling)
pub async fn ensure_ref(pool: &SqlitePool, theater_id: i64, r: Ref, id: Option<i64>) -> Result<()> {
    if let Some(id) = id {
        if !ref_exists(pool, theater_id, r, id).await? {
            return Err(Error::InvalidInput(format!("{} {} does not exist", r.label(), id)));
        }
    }
    Ok(())
}

/// `%term%` for a LIKE filter, or None for a blank search
pub(crate) fn like_pattern(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s))
}

/// Trimmed, non-empty text field
pub(crate) fn required_text(value: &str, field: &str, max_len: usize) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::InvalidInput(format!("{} must not be empty", field)));
    }
    if value.chars().count() > max_len {
        return Err(Error::InvalidInput(format!(
            "{} must be at most {} characters",
            field, max_len
        )));
    }
    Ok(value.to_string())
}

/// Trimmed optional text; blank becomes None
pub(crate) fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Run a COUNT and a paged SELECT over the same `FROM ... WHERE ...` clause
///
/// `from_where` pushes the clause (starting with `FROM`) and its binds; it is
/// called once per query.
pub(crate) async fn fetch_page<T, F>(
    pool: &SqlitePool,
    select: &str,
    from_where: F,
    order_by: &str,
    params: PageParams,
) -> Result<Page<T>>
where
    T: for<'r> sqlx::FromRow<'r, SqliteRow> + Send + Unpin,
    F: Fn(&mut QueryBuilder<'_, Sqlite>),
{
    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) ");
    from_where(&mut count);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let pagination = params.resolve(total);

    let mut query = QueryBuilder::<Sqlite>::new(select);
    query.push(" ");
    from_where(&mut query);
    query.push(" ORDER BY ");
    query.push(order_by);
    query.push(" LIMIT ");
    query.push_bind(pagination.page_size);
    query.push(" OFFSET ");
    query.push_bind(pagination.offset);

    let items = query.build_query_as::<T>().fetch_all(pool).await?;

    Ok(Page::new(items, total, pagination))
}

/// Sort direction from a query parameter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}
