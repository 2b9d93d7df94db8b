// src/pipeline/dedup.rs

//! Deduplication and final ordering.

use std::collections::HashSet;

use crate::models::Event;

/// Collapse events sharing an identity key; the first-seen instance wins.
///
/// Callers feed events in fixed source-configuration order, so the winner
/// is deterministic across runs regardless of fetch completion order.
pub fn dedup_events(events: Vec<Event>) -> Vec<Event> {
    let mut seen = HashSet::new();
    events
        .into_iter()
        .filter(|event| seen.insert(event.dedup_key()))
        .collect()
}

/// Order the collection: start ascending, all-day before timed events on
/// the same day, title ascending for stability.
pub fn sort_events(events: &mut [Event]) {
    events.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventLink, EventStart};
    use chrono::{DateTime, NaiveDate};

    fn event(source: &str, title: &str, start: EventStart, display_time: &str) -> Event {
        Event {
            source: source.to_string(),
            title: title.to_string(),
            start,
            display_time: display_time.to_string(),
            location: "Main".to_string(),
            age_group: "General".to_string(),
            category: "Not found".to_string(),
            description: "Not found".to_string(),
            link: EventLink::Unavailable,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn timed(s: &str) -> EventStart {
        EventStart::Timed(DateTime::parse_from_rfc3339(s).unwrap())
    }

    #[test]
    fn first_seen_wins_regardless_of_later_fields() {
        let mut first = event("A", "Storytime", EventStart::AllDay(day(14)), "All Day");
        first.description = "kept".to_string();
        let mut second = event("A", "  storytime ", EventStart::AllDay(day(14)), "All Day");
        second.description = "discarded".to_string();

        let deduped = dedup_events(vec![first, second]);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].description, "kept");
    }

    #[test]
    fn different_sources_never_collapse() {
        let a = event("A", "Storytime", EventStart::AllDay(day(14)), "All Day");
        let b = event("B", "Storytime", EventStart::AllDay(day(14)), "All Day");
        assert_eq!(dedup_events(vec![a, b]).len(), 2);
    }

    #[test]
    fn different_times_on_one_day_are_distinct_events() {
        let morning = event("A", "Yoga", timed("2026-03-14T09:00:00-05:00"), "9:00 AM");
        let evening = event("A", "Yoga", timed("2026-03-14T18:00:00-05:00"), "6:00 PM");
        assert_eq!(dedup_events(vec![morning, evening]).len(), 2);
    }

    #[test]
    fn sort_puts_all_day_first_then_instants_then_title() {
        let mut events = vec![
            event("A", "Zebra Talk", timed("2026-03-14T09:00:00-05:00"), "9:00 AM"),
            event("A", "Book Sale", EventStart::AllDay(day(14)), "All Day"),
            event("A", "Art Club", timed("2026-03-14T09:00:00-05:00"), "9:00 AM"),
            event("A", "Early Bird", timed("2026-03-13T09:00:00-05:00"), "9:00 AM"),
        ];
        sort_events(&mut events);
        let titles: Vec<&str> = events.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, ["Early Bird", "Book Sale", "Art Club", "Zebra Talk"]);
    }
}
