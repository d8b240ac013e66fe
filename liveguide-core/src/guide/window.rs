use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;

use crate::models::TimeWindow;

/// Computes the default guide window: from 1 hour ago to 12 hours later.
pub fn compute_window(now: DateTime<Utc>) -> TimeWindow {
    TimeWindow {
        start: now - Duration::hours(1),
        end: now + Duration::hours(12),
    }
}

/// Returns `None` if the window cannot be represented.
pub fn compute_window_with(
    now: DateTime<Utc>,
    past: Duration,
    future: Duration,
) -> Option<TimeWindow> {
    Some(TimeWindow {
        start: now.checked_sub_signed(past)?,
        end: now.checked_add_signed(future)?,
    })
}

// <coverage:exclude>
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_compute_window() {
        let now = Utc.with_ymd_and_hms(2025, 6, 30, 23, 30, 0).unwrap();
        let window = compute_window(now);
        assert_eq!(window.start, now - Duration::hours(1));
        assert_eq!(window.end - window.start, Duration::hours(13));
        assert_eq!(
            window.end,
            Utc.with_ymd_and_hms(2025, 7, 1, 11, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_compute_window_now() {
        // Sub-second precision must not break the fixed offsets.
        let now = Utc::now();
        let window = compute_window(now);
        assert_eq!(window.start, now - Duration::hours(1));
        assert_eq!(window.duration(), Duration::hours(13));
        assert!(window.contains(now));
    }

    #[test]
    fn test_compute_window_with() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let window = compute_window_with(now, Duration::minutes(30), Duration::hours(24)).unwrap();
        assert_eq!(window.start, now - Duration::minutes(30));
        assert_eq!(window.end, now + Duration::hours(24));
    }

    #[test]
    fn test_compute_window_with_overflow() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let huge = Duration::seconds(1_000_000_000_000_000);
        assert_eq!(compute_window_with(now, huge, Duration::hours(12)), None);
        assert_eq!(compute_window_with(now, Duration::hours(1), huge), None);
    }
}
// </coverage:exclude>
