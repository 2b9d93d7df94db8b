// src/normalize/dates.rs

//! Date and time resolution.
//!
//! Upstream sources disagree wildly on date formats: ISO dates, long-form
//! month names with or without weekdays, bare weekday names relative to the
//! fetch window, and the "All Day" literal. Everything resolves into an
//! [`EventStart`] against the one configured timezone, or not at all —
//! a guessed date would corrupt the final ordering.

use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveTime, TimeZone, Weekday};
use chrono_tz::Tz;

use crate::models::{DateWindow, EventStart};

/// A parsed time-of-day field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedTime {
    /// Explicit "All Day" literal
    AllDay,
    /// Clock time (start of a range if the field held one)
    At(NaiveTime),
    /// Field missing or unparsable
    NotFound,
}

/// Parse an upstream date string into a local calendar date.
///
/// Bare weekday names resolve to the first matching date inside the fetch
/// window. Returns `None` for anything unrecognized.
pub fn resolve_date(text: &str, window: &DateWindow) -> Option<NaiveDate> {
    let cleaned = text
        .trim()
        .trim_start_matches("All Day")
        .replace(',', "")
        .replace(" at", "");
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() || cleaned == "Not found" {
        return None;
    }

    // "Monday January 5 2026", "January 5 2026", "Jan 5 2026", "2026-01-05"
    const FORMATS: [&str; 4] = ["%A %B %d %Y", "%B %d %Y", "%b %d %Y", "%Y-%m-%d"];
    for fmt in FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&cleaned, fmt) {
            return Some(date);
        }
    }

    // A lone weekday name is relative to the fetch window
    if !cleaned.contains(' ') {
        if let Ok(weekday) = Weekday::from_str(&cleaned) {
            return first_weekday_in_window(weekday, window);
        }
    }

    None
}

fn first_weekday_in_window(weekday: Weekday, window: &DateWindow) -> Option<NaiveDate> {
    let mut date = window.start;
    while date <= window.end() {
        if date.weekday() == weekday {
            return Some(date);
        }
        date = date.succ_opt()?;
    }
    None
}

/// Parse an upstream time string.
///
/// Accepts `2:30 PM`, `2:30pm`, `7 pm`, and ranges like `2:30pm–4:00pm`
/// (the start wins). An "All Day" literal is distinguished from an
/// unparsable field.
pub fn resolve_time(text: &str) -> ResolvedTime {
    let lowered = text.to_lowercase();
    // Drop any "Wed Mar 4 @ " style prefix, then keep the range start
    let after_at = lowered.rsplit('@').next().unwrap_or(&lowered);
    let start = after_at
        .split(['\u{2013}', '-'])
        .next()
        .unwrap_or(after_at)
        .trim();

    if start.contains("all day") {
        return ResolvedTime::AllDay;
    }
    if start.is_empty() || start == "not found" {
        return ResolvedTime::NotFound;
    }

    let compact = start.replace(' ', "").to_uppercase();
    for fmt in ["%I:%M%p", "%I%p"] {
        if let Ok(time) = NaiveTime::parse_from_str(&compact, fmt) {
            return ResolvedTime::At(time);
        }
    }
    ResolvedTime::NotFound
}

/// Resolve raw date and time fields into an [`EventStart`] against the
/// configured timezone.
///
/// A missing or unparsable time degrades to the day-only marker; an
/// unresolvable date yields `None` and the caller drops the record.
pub fn resolve_start(
    date_text: &str,
    time_text: &str,
    tz: Tz,
    window: &DateWindow,
) -> Option<EventStart> {
    let date = resolve_date(date_text, window)?;
    match resolve_time(time_text) {
        ResolvedTime::At(time) => {
            // DST gaps have no valid local instant; earliest() resolves
            // ambiguous fall-back times deterministically
            let local = tz.from_local_datetime(&date.and_time(time)).earliest()?;
            Some(EventStart::Timed(local.fixed_offset()))
        }
        ResolvedTime::AllDay | ResolvedTime::NotFound => Some(EventStart::AllDay(date)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::Chicago;

    fn window() -> DateWindow {
        DateWindow::new(NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(), 31)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_iso_dates() {
        assert_eq!(resolve_date("2026-03-14", &window()), Some(date(2026, 3, 14)));
    }

    #[test]
    fn parses_long_form_dates() {
        assert_eq!(
            resolve_date("Saturday, March 14, 2026", &window()),
            Some(date(2026, 3, 14))
        );
        assert_eq!(
            resolve_date("March 14, 2026", &window()),
            Some(date(2026, 3, 14))
        );
        assert_eq!(resolve_date("Mar 14, 2026", &window()), Some(date(2026, 3, 14)));
    }

    #[test]
    fn strips_all_day_prefix() {
        assert_eq!(
            resolve_date("All Day March 14, 2026", &window()),
            Some(date(2026, 3, 14))
        );
    }

    #[test]
    fn weekday_resolves_inside_window() {
        // Window starts Monday 2026-03-02; first Saturday is 03-07
        assert_eq!(resolve_date("Saturday", &window()), Some(date(2026, 3, 7)));
        assert_eq!(resolve_date("Monday", &window()), Some(date(2026, 3, 2)));
    }

    #[test]
    fn unresolvable_dates_are_none() {
        assert_eq!(resolve_date("Not found", &window()), None);
        assert_eq!(resolve_date("sometime soon", &window()), None);
        assert_eq!(resolve_date("", &window()), None);
    }

    #[test]
    fn parses_time_variants() {
        let expected = ResolvedTime::At(NaiveTime::from_hms_opt(14, 30, 0).unwrap());
        assert_eq!(resolve_time("2:30 PM"), expected);
        assert_eq!(resolve_time("2:30pm"), expected);
        assert_eq!(resolve_time("2:30pm\u{2013}4:00pm"), expected);
        assert_eq!(
            resolve_time("7 pm"),
            ResolvedTime::At(NaiveTime::from_hms_opt(19, 0, 0).unwrap())
        );
    }

    #[test]
    fn all_day_literal_is_distinguished() {
        assert_eq!(resolve_time("All Day"), ResolvedTime::AllDay);
        assert_eq!(resolve_time("All Day Event"), ResolvedTime::AllDay);
        assert_eq!(resolve_time("whenever"), ResolvedTime::NotFound);
    }

    #[test]
    fn timed_start_carries_chicago_offset() {
        let start = resolve_start("2026-03-14", "2:30 PM", Chicago, &window()).unwrap();
        match start {
            EventStart::Timed(dt) => {
                assert_eq!(dt.date_naive(), date(2026, 3, 14));
                // DST starts 2026-03-08, so March 14 is CDT (-05:00)
                assert_eq!(dt.offset().local_minus_utc(), -5 * 3600);
            }
            other => panic!("expected timed start, got {other:?}"),
        }
    }

    #[test]
    fn all_day_round_trips_without_fabricated_time() {
        let start = resolve_start("March 14, 2026", "All Day", Chicago, &window()).unwrap();
        assert_eq!(start, EventStart::AllDay(date(2026, 3, 14)));
        assert_eq!(start.local_time(), None);
    }

    #[test]
    fn missing_time_degrades_to_day_only() {
        let start = resolve_start("2026-03-14", "Not found", Chicago, &window()).unwrap();
        assert!(start.is_all_day());
    }

    #[test]
    fn unresolvable_date_drops_the_record() {
        assert_eq!(resolve_start("mystery", "2:30 PM", Chicago, &window()), None);
    }
}
