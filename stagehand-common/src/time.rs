//! Timestamp utilities

use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Today's date in UTC
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Half-open interval overlap: `[a_start, a_end)` intersects `[b_start, b_end)`
///
/// Touching intervals (one ends exactly when the other starts) do not overlap.
pub fn intervals_overlap(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// Whole minutes of `[start, end)` clipped to `[window_start, window_end)`
pub fn clipped_minutes(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> i64 {
    let from = start.max(window_start);
    let to = end.min(window_end);
    if to <= from {
        0
    } else {
        (to - from).num_minutes()
    }
}

/// Convert whole days to a chrono duration
pub fn days(n: i64) -> Duration {
    Duration::days(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, h, m, 0).unwrap()
    }

    #[test]
    fn test_now_returns_recent_timestamp() {
        let timestamp = now();
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01
        assert!(timestamp.timestamp() < 4_102_444_800); // 2100-01-01
    }

    #[test]
    fn test_overlap_partial() {
        assert!(intervals_overlap(at(10, 0), at(12, 0), at(11, 0), at(13, 0)));
        assert!(intervals_overlap(at(11, 0), at(13, 0), at(10, 0), at(12, 0)));
    }

    #[test]
    fn test_overlap_containment() {
        assert!(intervals_overlap(at(10, 0), at(14, 0), at(11, 0), at(12, 0)));
    }

    #[test]
    fn test_touching_intervals_do_not_overlap() {
        assert!(!intervals_overlap(at(10, 0), at(12, 0), at(12, 0), at(13, 0)));
        assert!(!intervals_overlap(at(12, 0), at(13, 0), at(10, 0), at(12, 0)));
    }

    #[test]
    fn test_disjoint_intervals() {
        assert!(!intervals_overlap(at(8, 0), at(9, 0), at(10, 0), at(11, 0)));
    }

    #[test]
    fn test_clipped_minutes() {
        assert_eq!(clipped_minutes(at(10, 0), at(12, 0), at(11, 0), at(23, 0)), 60);
        assert_eq!(clipped_minutes(at(10, 0), at(12, 0), at(13, 0), at(23, 0)), 0);
        assert_eq!(clipped_minutes(at(10, 0), at(10, 45), at(0, 0), at(23, 0)), 45);
    }
}
