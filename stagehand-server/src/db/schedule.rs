//! Schedule events, their participants and skipped occurrences
//!
//! Times are stored as UTC text truncated to whole seconds, so textual
//! comparison in SQL matches chronological order.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use stagehand_common::pagination::{Page, PageParams};
use stagehand_common::recurrence::RecurrenceRule;
use stagehand_common::{time, Error, Result};
use std::collections::HashMap;
use tracing::warn;

use super::fetch_page;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Performance,
    Rehearsal,
    Technical,
    Tour,
    Meeting,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Planned,
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScheduleEvent {
    pub id: i64,
    pub theater_id: i64,
    pub title: String,
    pub event_type: EventType,
    pub venue_id: i64,
    pub performance_id: Option<i64>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub recurrence_rule: Option<String>,
    pub status: EventStatus,
    pub notes: Option<String>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const EVENT_COLUMNS: &str = "SELECT id, theater_id, title, event_type, venue_id, performance_id, \
                             starts_at, ends_at, recurrence_rule, status, notes, created_by, \
                             created_at, updated_at";

/// Event with participants and skipped occurrences
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDetail {
    #[serde(flatten)]
    pub event: ScheduleEvent,
    pub participant_ids: Vec<i64>,
    pub exceptions: Vec<DateTime<Utc>>,
}

impl EventDetail {
    pub fn duration(&self) -> Duration {
        self.event.ends_at - self.event.starts_at
    }

    /// Parsed rule; an unparsable stored rule is treated as a single event
    pub fn rule(&self) -> Option<RecurrenceRule> {
        let text = self.event.recurrence_rule.as_deref()?;
        match RecurrenceRule::parse(text) {
            Ok(rule) => Some(rule),
            Err(e) => {
                warn!("Event {} has an invalid stored rule '{}': {}", self.event.id, text, e);
                None
            }
        }
    }
}

/// Validated event fields ready to be written
#[derive(Debug, Clone)]
pub struct EventData {
    pub title: String,
    pub event_type: EventType,
    pub venue_id: i64,
    pub performance_id: Option<i64>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub rule: Option<RecurrenceRule>,
    pub status: EventStatus,
    pub notes: Option<String>,
    pub participant_ids: Vec<i64>,
}

impl EventData {
    /// Same first start and rule, so stored exceptions still name real occurrences
    pub fn keeps_series(&self, starts_at: DateTime<Utc>, rule: Option<&str>) -> bool {
        self.starts_at == starts_at && self.rule.as_ref().map(|r| r.to_string()).as_deref() == rule
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFilter {
    pub venue_id: Option<i64>,
    pub performance_id: Option<i64>,
    pub event_type: Option<EventType>,
    pub status: Option<EventStatus>,
}

/// Whole seconds, UTC
pub fn normalize_time(t: DateTime<Utc>) -> DateTime<Utc> {
    t.trunc_subsecs(0)
}

async fn replace_participants(conn: &mut SqliteConnection, event_id: i64, user_ids: &[i64]) -> Result<()> {
    sqlx::query("DELETE FROM schedule_event_participants WHERE event_id = ?")
        .bind(event_id)
        .execute(&mut *conn)
        .await?;

    for user_id in user_ids {
        sqlx::query("INSERT INTO schedule_event_participants (event_id, user_id) VALUES (?, ?)")
            .bind(event_id)
            .bind(user_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn insert_event(
    pool: &SqlitePool,
    theater_id: i64,
    created_by: i64,
    data: &EventData,
) -> Result<i64> {
    let now = time::now();
    let mut tx = pool.begin().await?;

    let id = sqlx::query(
        r#"
        INSERT INTO schedule_events (theater_id, title, event_type, venue_id, performance_id,
                                     starts_at, ends_at, recurrence_rule, status, notes,
                                     created_by, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(theater_id)
    .bind(&data.title)
    .bind(data.event_type)
    .bind(data.venue_id)
    .bind(data.performance_id)
    .bind(data.starts_at)
    .bind(data.ends_at)
    .bind(data.rule.as_ref().map(|r| r.to_string()))
    .bind(data.status)
    .bind(&data.notes)
    .bind(created_by)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    replace_participants(&mut tx, id, &data.participant_ids).await?;
    tx.commit().await?;

    Ok(id)
}

pub async fn update_event(pool: &SqlitePool, theater_id: i64, id: i64, data: &EventData) -> Result<()> {
    let mut tx = pool.begin().await?;

    let current: Option<(DateTime<Utc>, Option<String>)> = sqlx::query_as(
        "SELECT starts_at, recurrence_rule FROM schedule_events \
         WHERE id = ? AND theater_id = ? AND deleted_at IS NULL",
    )
    .bind(id)
    .bind(theater_id)
    .fetch_optional(&mut *tx)
    .await?;
    let (starts_at, rule) =
        current.ok_or_else(|| Error::NotFound(format!("Event {} not found", id)))?;

    sqlx::query(
        r#"
        UPDATE schedule_events
        SET title = ?, event_type = ?, venue_id = ?, performance_id = ?, starts_at = ?,
            ends_at = ?, recurrence_rule = ?, status = ?, notes = ?, updated_at = ?
        WHERE id = ? AND theater_id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(&data.title)
    .bind(data.event_type)
    .bind(data.venue_id)
    .bind(data.performance_id)
    .bind(data.starts_at)
    .bind(data.ends_at)
    .bind(data.rule.as_ref().map(|r| r.to_string()))
    .bind(data.status)
    .bind(&data.notes)
    .bind(time::now())
    .bind(id)
    .bind(theater_id)
    .execute(&mut *tx)
    .await?;

    replace_participants(&mut tx, id, &data.participant_ids).await?;

    if !data.keeps_series(starts_at, rule.as_deref()) {
        sqlx::query("DELETE FROM schedule_exceptions WHERE event_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}

async fn load_details(pool: &SqlitePool, events: Vec<ScheduleEvent>) -> Result<Vec<EventDetail>> {
    if events.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i64> = events.iter().map(|e| e.id).collect();

    let mut participants: HashMap<i64, Vec<i64>> = HashMap::new();
    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT event_id, user_id FROM schedule_event_participants WHERE event_id IN (",
    );
    let mut list = qb.separated(", ");
    for id in &ids {
        list.push_bind(*id);
    }
    qb.push(") ORDER BY user_id");
    let rows: Vec<(i64, i64)> = qb.build_query_as().fetch_all(pool).await?;
    for (event_id, user_id) in rows {
        participants.entry(event_id).or_default().push(user_id);
    }

    let mut exceptions: HashMap<i64, Vec<DateTime<Utc>>> = HashMap::new();
    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT event_id, occurrence_start FROM schedule_exceptions WHERE event_id IN (",
    );
    let mut list = qb.separated(", ");
    for id in &ids {
        list.push_bind(*id);
    }
    qb.push(") ORDER BY occurrence_start");
    let rows: Vec<(i64, DateTime<Utc>)> = qb.build_query_as().fetch_all(pool).await?;
    for (event_id, start) in rows {
        exceptions.entry(event_id).or_default().push(start);
    }

    Ok(events
        .into_iter()
        .map(|event| EventDetail {
            participant_ids: participants.remove(&event.id).unwrap_or_default(),
            exceptions: exceptions.remove(&event.id).unwrap_or_default(),
            event,
        })
        .collect())
}

pub async fn get_event(pool: &SqlitePool, theater_id: i64, id: i64) -> Result<EventDetail> {
    let sql = format!(
        "{} FROM schedule_events WHERE id = ? AND theater_id = ? AND deleted_at IS NULL",
        EVENT_COLUMNS
    );
    let event = sqlx::query_as::<_, ScheduleEvent>(&sql)
        .bind(id)
        .bind(theater_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Event {} not found", id)))?;

    load_details(pool, vec![event])
        .await?
        .pop()
        .ok_or_else(|| Error::Internal(format!("Event {} vanished", id)))
}

pub async fn list_events(
    pool: &SqlitePool,
    theater_id: i64,
    filter: &EventFilter,
    page: PageParams,
) -> Result<Page<EventDetail>> {
    let rows: Page<ScheduleEvent> = fetch_page(
        pool,
        EVENT_COLUMNS,
        |qb: &mut QueryBuilder<'_, Sqlite>| {
            qb.push("FROM schedule_events WHERE deleted_at IS NULL AND theater_id = ");
            qb.push_bind(theater_id);
            if let Some(venue_id) = filter.venue_id {
                qb.push(" AND venue_id = ");
                qb.push_bind(venue_id);
            }
            if let Some(performance_id) = filter.performance_id {
                qb.push(" AND performance_id = ");
                qb.push_bind(performance_id);
            }
            if let Some(event_type) = filter.event_type {
                qb.push(" AND event_type = ");
                qb.push_bind(event_type);
            }
            if let Some(status) = filter.status {
                qb.push(" AND status = ");
                qb.push_bind(status);
            }
        },
        "starts_at ASC, id ASC",
        page,
    )
    .await?;

    let items = load_details(pool, rows.items).await?;
    Ok(Page {
        items,
        total: rows.total,
        page: rows.page,
        page_size: rows.page_size,
        total_pages: rows.total_pages,
    })
}

/// Which events a window query returns
#[derive(Debug, Clone, Default)]
pub struct WindowQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    /// Events at this venue or with any of these participants
    pub venue_id: Option<i64>,
    pub participant_ids: Vec<i64>,
    pub exclude_event_id: Option<i64>,
    pub include_cancelled: bool,
    pub performance_id: Option<i64>,
    pub event_type: Option<EventType>,
}

/// Events that may have an occurrence inside `[from, to)`
///
/// Recurring events are returned whenever their series starts before `to`;
/// callers expand them to find actual occurrences.
pub async fn window_events(
    pool: &SqlitePool,
    theater_id: i64,
    query: &WindowQuery,
) -> Result<Vec<EventDetail>> {
    let mut qb = QueryBuilder::<Sqlite>::new(EVENT_COLUMNS);
    qb.push(" FROM schedule_events WHERE deleted_at IS NULL AND theater_id = ");
    qb.push_bind(theater_id);
    qb.push(" AND starts_at < ");
    qb.push_bind(query.to);
    qb.push(" AND (recurrence_rule IS NOT NULL OR ends_at > ");
    qb.push_bind(query.from);
    qb.push(")");

    if !query.include_cancelled {
        qb.push(" AND status != ");
        qb.push_bind(EventStatus::Cancelled);
    }
    if let Some(id) = query.exclude_event_id {
        qb.push(" AND id != ");
        qb.push_bind(id);
    }
    if let Some(performance_id) = query.performance_id {
        qb.push(" AND performance_id = ");
        qb.push_bind(performance_id);
    }
    if let Some(event_type) = query.event_type {
        qb.push(" AND event_type = ");
        qb.push_bind(event_type);
    }

    if query.venue_id.is_some() || !query.participant_ids.is_empty() {
        qb.push(" AND (0");
        if let Some(venue_id) = query.venue_id {
            qb.push(" OR venue_id = ");
            qb.push_bind(venue_id);
        }
        if !query.participant_ids.is_empty() {
            qb.push(" OR id IN (SELECT event_id FROM schedule_event_participants WHERE user_id IN (");
            let mut list = qb.separated(", ");
            for user_id in &query.participant_ids {
                list.push_bind(*user_id);
            }
            qb.push("))");
        }
        qb.push(")");
    }

    qb.push(" ORDER BY starts_at, id");

    let events: Vec<ScheduleEvent> = qb.build_query_as().fetch_all(pool).await?;
    load_details(pool, events).await
}

pub async fn set_status(pool: &SqlitePool, theater_id: i64, id: i64, status: EventStatus) -> Result<()> {
    let result = sqlx::query(
        "UPDATE schedule_events SET status = ?, updated_at = ? WHERE id = ? AND theater_id = ? AND deleted_at IS NULL",
    )
    .bind(status)
    .bind(time::now())
    .bind(id)
    .bind(theater_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Event {} not found", id)));
    }
    Ok(())
}

pub async fn delete_event(pool: &SqlitePool, theater_id: i64, id: i64) -> Result<()> {
    let now = time::now();
    let result = sqlx::query(
        r#"
        UPDATE schedule_events SET deleted_at = ?, updated_at = ?
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
        return Err(Error::NotFound(format!("Event {} not found", id)));
    }
    Ok(())
}

/// Record a skipped occurrence (idempotent)
pub async fn add_exception(pool: &SqlitePool, event_id: i64, occurrence_start: DateTime<Utc>) -> Result<()> {
    sqlx::query(
        "INSERT OR IGNORE INTO schedule_exceptions (event_id, occurrence_start, created_at) VALUES (?, ?, ?)",
    )
    .bind(event_id)
    .bind(normalize_time(occurrence_start))
    .bind(time::now())
    .execute(pool)
    .await?;
    Ok(())
}
