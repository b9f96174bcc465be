//! Scheduling: event validation, occurrence expansion and conflict detection
//!
//! Two events conflict when one of their occurrences overlap (half-open
//! intervals) and they share the venue or at least one participant.
//! Cancelled and deleted events never conflict.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use stagehand_common::db::RuntimeSettings;
use stagehand_common::recurrence::{Occurrence, RecurrenceRule, MAX_OCCURRENCES};
use stagehand_common::{time, Error, Result};
use tracing::debug;

use crate::db::schedule::{
    self, normalize_time, EventData, EventDetail, EventStatus, EventType, WindowQuery,
};
use crate::db::{ensure_ref, optional_text, performances, required_text, Ref};
use crate::services::workflow::PerformanceStatus;

/// Bounded series are checked up to this far ahead
const BOUNDED_SERIES_SPAN_DAYS: i64 = 36_600;

/// Create/update payload
#[derive(Debug, Clone, Deserialize)]
pub struct EventInput {
    pub title: String,
    pub event_type: EventType,
    pub venue_id: i64,
    pub performance_id: Option<i64>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub recurrence_rule: Option<String>,
    pub status: Option<EventStatus>,
    pub notes: Option<String>,
    #[serde(default)]
    pub participant_ids: Vec<i64>,
    /// Save even when conflicts are found
    #[serde(default)]
    pub allow_conflicts: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictReason {
    Venue,
    Participant,
}

/// One occurrence of another event that overlaps the candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub event_id: i64,
    pub title: String,
    pub venue_id: i64,
    pub occurrence_start: DateTime<Utc>,
    pub occurrence_end: DateTime<Utc>,
    pub reason: ConflictReason,
}

/// Validate an event payload against the theater's data and settings
pub async fn validate_event(
    pool: &SqlitePool,
    theater_id: i64,
    settings: &RuntimeSettings,
    input: &EventInput,
) -> Result<EventData> {
    let title = required_text(&input.title, "title", 300)?;
    let starts_at = normalize_time(input.starts_at);
    let ends_at = normalize_time(input.ends_at);

    if starts_at >= ends_at {
        return Err(Error::InvalidInput("starts_at must be before ends_at".into()));
    }
    if ends_at - starts_at > Duration::hours(settings.max_event_hours) {
        return Err(Error::InvalidInput(format!(
            "An occurrence may last at most {} hours",
            settings.max_event_hours
        )));
    }

    let rule = match optional_text(input.recurrence_rule.as_deref()) {
        Some(text) => {
            let rule = RecurrenceRule::parse(&text)?;
            if matches!(rule.until, Some(until) if until < starts_at) {
                return Err(Error::InvalidInput("UNTIL is before the first occurrence".into()));
            }
            Some(rule)
        }
        None => None,
    };

    let status = input.status.unwrap_or(EventStatus::Planned);
    if status == EventStatus::Cancelled {
        return Err(Error::InvalidInput(
            "Use the cancel endpoint to cancel an event".into(),
        ));
    }

    ensure_ref(pool, theater_id, Ref::Venue, Some(input.venue_id)).await?;

    match (input.event_type, input.performance_id) {
        (EventType::Performance, None) => {
            return Err(Error::InvalidInput(
                "PERFORMANCE events require a performance_id".into(),
            ));
        }
        (event_type, Some(performance_id)) => {
            ensure_ref(pool, theater_id, Ref::Performance, Some(performance_id)).await?;
            let performance =
                performances::get_performance(pool, theater_id, performance_id).await?;
            if event_type == EventType::Performance
                && performance.status == PerformanceStatus::Archived
            {
                return Err(Error::InvalidInput(format!(
                    "Performance {} is archived and cannot be scheduled",
                    performance_id
                )));
            }
        }
        (_, None) => {}
    }

    let mut participant_ids = input.participant_ids.clone();
    participant_ids.sort_unstable();
    participant_ids.dedup();
    for user_id in &participant_ids {
        ensure_ref(pool, theater_id, Ref::User, Some(*user_id)).await?;
    }

    Ok(EventData {
        title,
        event_type: input.event_type,
        venue_id: input.venue_id,
        performance_id: input.performance_id,
        starts_at,
        ends_at,
        rule,
        status,
        notes: optional_text(input.notes.as_deref()),
        participant_ids,
    })
}

/// Occurrences of a series in `[from, to)`, skipping `exceptions`
pub fn expand_series(
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    rule: Option<&RecurrenceRule>,
    exceptions: &[DateTime<Utc>],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Vec<Occurrence> {
    match rule {
        None => {
            if time::intervals_overlap(starts_at, ends_at, from, to) {
                vec![Occurrence {
                    start: starts_at,
                    end: ends_at,
                }]
            } else {
                Vec::new()
            }
        }
        Some(rule) => rule
            .expand(starts_at, ends_at - starts_at, from, to, MAX_OCCURRENCES)
            .into_iter()
            .filter(|o| !exceptions.contains(&o.start))
            .collect(),
    }
}

/// Occurrences of a stored event in `[from, to)`
pub fn expand_event(event: &EventDetail, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<Occurrence> {
    expand_series(
        event.event.starts_at,
        event.event.ends_at,
        event.rule().as_ref(),
        &event.exceptions,
        from,
        to,
    )
}

/// Occurrences the candidate is checked with
///
/// Unbounded series are checked `horizon_days` ahead; every series is capped
/// at [`MAX_OCCURRENCES`].
pub fn candidate_occurrences(
    data: &EventData,
    exceptions: &[DateTime<Utc>],
    horizon_days: i64,
) -> Vec<Occurrence> {
    let horizon = match &data.rule {
        Some(rule) if !rule.is_bounded() => data.starts_at + time::days(horizon_days),
        _ => data.starts_at + time::days(BOUNDED_SERIES_SPAN_DAYS),
    };
    expand_series(
        data.starts_at,
        data.ends_at,
        data.rule.as_ref(),
        exceptions,
        data.starts_at,
        horizon,
    )
}

/// Compare the candidate's occurrences with other events
///
/// `candidate` must be sorted by start with equal lengths, as produced by
/// [`candidate_occurrences`].
pub fn find_conflicts(data: &EventData, candidate: &[Occurrence], others: &[EventDetail]) -> Vec<Conflict> {
    let (Some(first), Some(last)) = (candidate.first(), candidate.last()) else {
        return Vec::new();
    };
    let (window_start, window_end) = (first.start, last.end);

    let mut conflicts = Vec::new();
    for other in others {
        if other.event.status == EventStatus::Cancelled {
            continue;
        }
        let reason = if other.event.venue_id == data.venue_id {
            ConflictReason::Venue
        } else if other
            .participant_ids
            .iter()
            .any(|id| data.participant_ids.contains(id))
        {
            ConflictReason::Participant
        } else {
            continue;
        };

        for occ in expand_event(other, window_start, window_end) {
            let idx = candidate.partition_point(|c| c.end <= occ.start);
            if idx < candidate.len() && candidate[idx].start < occ.end {
                conflicts.push(Conflict {
                    event_id: other.event.id,
                    title: other.event.title.clone(),
                    venue_id: other.event.venue_id,
                    occurrence_start: occ.start,
                    occurrence_end: occ.end,
                    reason,
                });
            }
        }
    }

    conflicts.sort_by(|a, b| {
        a.occurrence_start
            .cmp(&b.occurrence_start)
            .then(a.event_id.cmp(&b.event_id))
    });
    conflicts
}

/// Find conflicts for a validated event
///
/// `exclude_event_id` and `exceptions` are set when re-checking an existing
/// event on update.
pub async fn detect_conflicts(
    pool: &SqlitePool,
    theater_id: i64,
    settings: &RuntimeSettings,
    data: &EventData,
    exclude_event_id: Option<i64>,
    exceptions: &[DateTime<Utc>],
) -> Result<Vec<Conflict>> {
    let candidate = candidate_occurrences(data, exceptions, settings.schedule_horizon_days);
    let (Some(first), Some(last)) = (candidate.first(), candidate.last()) else {
        return Ok(Vec::new());
    };

    let others = schedule::window_events(
        pool,
        theater_id,
        &WindowQuery {
            from: first.start,
            to: last.end,
            venue_id: Some(data.venue_id),
            participant_ids: data.participant_ids.clone(),
            exclude_event_id,
            ..Default::default()
        },
    )
    .await?;

    debug!(
        "Conflict check: {} candidate occurrence(s) against {} event(s)",
        candidate.len(),
        others.len()
    );

    Ok(find_conflicts(data, &candidate, &others))
}

/// Calendar and analytics window, validated against `max_window_days`
pub fn check_window(
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    settings: &RuntimeSettings,
) -> Result<()> {
    if from >= to {
        return Err(Error::InvalidInput("'from' must be before 'to'".into()));
    }
    if to - from > time::days(settings.max_window_days) {
        return Err(Error::InvalidInput(format!(
            "Window may span at most {} days",
            settings.max_window_days
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub venue_id: Option<i64>,
    pub performance_id: Option<i64>,
    pub event_type: Option<EventType>,
    #[serde(default)]
    pub include_cancelled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub event_id: i64,
    pub title: String,
    pub event_type: EventType,
    pub status: EventStatus,
    pub venue_id: i64,
    pub performance_id: Option<i64>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub recurring: bool,
}

/// Every occurrence in the window, sorted by start
pub async fn calendar(
    pool: &SqlitePool,
    theater_id: i64,
    settings: &RuntimeSettings,
    query: &CalendarQuery,
) -> Result<Vec<CalendarEntry>> {
    check_window(query.from, query.to, settings)?;

    let events = schedule::window_events(
        pool,
        theater_id,
        &WindowQuery {
            from: query.from,
            to: query.to,
            venue_id: query.venue_id,
            include_cancelled: query.include_cancelled,
            performance_id: query.performance_id,
            event_type: query.event_type,
            ..Default::default()
        },
    )
    .await?;

    let mut entries: Vec<CalendarEntry> = events
        .iter()
        .flat_map(|event| {
            expand_event(event, query.from, query.to)
                .into_iter()
                .map(move |occ| CalendarEntry {
                    event_id: event.event.id,
                    title: event.event.title.clone(),
                    event_type: event.event.event_type,
                    status: event.event.status,
                    venue_id: event.event.venue_id,
                    performance_id: event.event.performance_id,
                    start: occ.start,
                    end: occ.end,
                    recurring: event.event.recurrence_rule.is_some(),
                })
        })
        .collect();

    entries.sort_by(|a, b| a.start.cmp(&b.start).then(a.event_id.cmp(&b.event_id)));
    Ok(entries)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VenueUsage {
    pub venue_id: i64,
    pub venue_name: Option<String>,
    /// Occurrences in the window
    pub event_count: i64,
    /// Minutes booked inside the window
    pub booked_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleSummary {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub total_events: i64,
    pub total_minutes: i64,
    pub venues: Vec<VenueUsage>,
}

/// Per-venue occurrence count and booked minutes, ordered by venue id
pub fn venue_usage(events: &[EventDetail], from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<VenueUsage> {
    let mut usage: BTreeMap<i64, VenueUsage> = BTreeMap::new();

    for event in events.iter().filter(|e| e.event.status != EventStatus::Cancelled) {
        for occ in expand_event(event, from, to) {
            let entry = usage.entry(event.event.venue_id).or_insert(VenueUsage {
                venue_id: event.event.venue_id,
                venue_name: None,
                event_count: 0,
                booked_minutes: 0,
            });
            entry.event_count += 1;
            entry.booked_minutes += time::clipped_minutes(occ.start, occ.end, from, to);
        }
    }

    usage.into_values().collect()
}

/// Venue utilisation over `[from, to)`, cancelled events excluded
pub async fn schedule_summary(
    pool: &SqlitePool,
    theater_id: i64,
    settings: &RuntimeSettings,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<ScheduleSummary> {
    check_window(from, to, settings)?;

    let events = schedule::window_events(
        pool,
        theater_id,
        &WindowQuery {
            from,
            to,
            ..Default::default()
        },
    )
    .await?;

    let names = crate::db::analytics::venue_names(pool, theater_id).await?;
    let mut venues = venue_usage(&events, from, to);
    for venue in &mut venues {
        venue.venue_name = names.get(&venue.venue_id).cloned();
    }

    Ok(ScheduleSummary {
        from,
        to,
        total_events: venues.iter().map(|v| v.event_count).sum(),
        total_minutes: venues.iter().map(|v| v.booked_minutes).sum(),
        venues,
    })
}

/// Check that `occurrence_start` is a real occurrence of a recurring event
pub fn check_exception(event: &EventDetail, occurrence_start: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let occurrence_start = normalize_time(occurrence_start);
    let rule = event.rule().ok_or_else(|| {
        Error::InvalidInput(format!("Event {} is not recurring", event.event.id))
    })?;

    let is_occurrence = rule
        .starts(event.event.starts_at)
        .take_while(|s| *s <= occurrence_start)
        .any(|s| s == occurrence_start);

    if !is_occurrence {
        return Err(Error::InvalidInput(format!(
            "{} is not an occurrence of event {}",
            occurrence_start.to_rfc3339(),
            event.event.id
        )));
    }
    Ok(occurrence_start)
}
