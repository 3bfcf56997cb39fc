// Property-based tests for the query windows

use chrono::{Duration, NaiveDate, NaiveDateTime};
use common::window::{ready_window, upcoming_window};
use proptest::prelude::*;

fn base() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn instant() -> impl Strategy<Value = NaiveDateTime> {
    // Any second within one year
    (0i64..365 * 24 * 3600).prop_map(|s| base() + Duration::seconds(s))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Polls one minute apart select every mission exactly once
    #[test]
    fn property_upcoming_windows_have_no_gap_and_no_duplicate(
        start in instant(),
        minutes in 1i64..240,
        offset_seconds in 0i64..(60 * 60),
    ) {
        let estimated = start + Duration::minutes(minutes) + Duration::seconds(offset_seconds);

        let hits = (0..=61)
            .filter_map(|poll| upcoming_window(start + Duration::minutes(poll), minutes))
            .filter(|window| window.contains(estimated))
            .count();

        prop_assert_eq!(hits, 1);
    }

    #[test]
    fn property_upcoming_window_is_one_minute_wide(
        now in instant(),
        minutes in 1i64..1440,
    ) {
        let window = upcoming_window(now, minutes).unwrap();
        prop_assert_eq!(window.until - window.after, Duration::minutes(1));
        prop_assert_eq!(window.until, now + Duration::minutes(minutes));
        prop_assert!(window.contains(window.until));
        prop_assert!(!window.contains(window.after));
    }

    #[test]
    fn property_windows_are_pure(now in instant(), minutes in 1i64..1440) {
        prop_assert_eq!(upcoming_window(now, minutes), upcoming_window(now, minutes));
        prop_assert_eq!(ready_window(now), ready_window(now));
    }

    #[test]
    fn property_ready_window_includes_past_and_present_only(
        now in instant(),
        delta_seconds in -100_000i64..100_000,
    ) {
        let estimated = now + Duration::seconds(delta_seconds);
        prop_assert_eq!(ready_window(now).contains(estimated), delta_seconds <= 0);
    }
}
