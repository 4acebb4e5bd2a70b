#[cfg(test)]
mod tests {
    use crate::availability::{free_segments, resolve_slots, ResolverOptions};
    use crate::test_support::*;
    use chrono::{DateTime, Duration, Utc};
    use chrono_tz::Tz;
    use proptest::prelude::*;
    use slotwise_common::CalendarEvent;

    fn busy_events(base: DateTime<Utc>, blocks: &[(i64, i64)]) -> Vec<CalendarEvent> {
        blocks
            .iter()
            .enumerate()
            .map(|(i, (offset, length))| {
                let start = base + Duration::minutes(*offset);
                busy(&format!("e{}", i), start, start + Duration::minutes(*length))
            })
            .collect()
    }

    proptest! {
        #[test]
        fn test_slots_fit_window_and_avoid_busy_time(
            start_hour in 0..20u32,
            window_hours in 1..72i64,
            duration_minutes in 15..180i64,
            step_minutes in prop::sample::select(vec![0i64, 15, 30, 60]),
            blocks in prop::collection::vec((0..4320i64, 5..240i64), 0..12),
        ) {
            let earliest = week(0, start_hour, 0);
            let latest = earliest + Duration::hours(window_hours);
            let request = request_in(Tz::Europe__Zurich, earliest, latest, duration_minutes, working_hours());
            let events = busy_events(earliest, &blocks);
            let options = ResolverOptions {
                step: (step_minutes > 0).then(|| Duration::minutes(step_minutes)),
                display_limit: None,
            };
            let now = earliest - Duration::hours(1);

            let slots = resolve_slots(&request, &events, now, &options).unwrap();

            for slot in &slots {
                prop_assert!(slot.start >= earliest && slot.end <= latest);
                prop_assert!(slot.duration() >= request.duration());
                prop_assert!(events.iter().all(|e| !e.overlaps(slot.start, slot.end)));
            }
            for pair in slots.windows(2) {
                prop_assert!(pair[0].end <= pair[1].start, "overlapping offers: {:?}", pair);
            }
        }

        #[test]
        fn test_resolver_is_deterministic(
            start_hour in 0..20u32,
            window_hours in 1..48i64,
            duration_minutes in 15..120i64,
            blocks in prop::collection::vec((0..2880i64, 5..180i64), 0..10),
            limit in 1..8usize,
        ) {
            let earliest = week(0, start_hour, 0);
            let latest = earliest + Duration::hours(window_hours);
            let request = request(earliest, latest, duration_minutes);
            let events = busy_events(earliest, &blocks);
            let options = ResolverOptions {
                step: Some(Duration::minutes(30)),
                display_limit: Some(limit),
            };
            let now = earliest;

            let first = resolve_slots(&request, &events, now, &options).unwrap();
            let second = resolve_slots(&request, &events, now, &options).unwrap();
            prop_assert_eq!(&first, &second);
            prop_assert!(first.len() <= limit);

            let unlimited = ResolverOptions { display_limit: None, ..options };
            let all = resolve_slots(&request, &events, now, &unlimited).unwrap();
            prop_assert_eq!(&all[..first.len()], &first[..]);
        }

        #[test]
        fn test_free_segments_are_disjoint_and_ordered(
            window_hours in 1..96i64,
            duration_minutes in 5..90i64,
            blocks in prop::collection::vec((0..5760i64, 5..300i64), 0..16),
        ) {
            let earliest = week(0, 0, 0);
            let latest = earliest + Duration::hours(window_hours);
            let request = request(earliest, latest, duration_minutes);
            let events = busy_events(earliest, &blocks);

            let free = free_segments(&request, &events, earliest).unwrap();
            for pair in free.windows(2) {
                prop_assert!(pair[0].end <= pair[1].start);
            }
            for segment in &free {
                prop_assert!(segment.duration() >= request.duration());
                prop_assert!(events.iter().all(|e| !e.overlaps(segment.start, segment.end)));
            }
        }
    }
}
