// src/models/event.rs

//! Canonical event data structures.
//!
//! An [`Event`] is the normalized record every source adapter's output is
//! converted into. Its start is either an absolute instant or the day-only
//! marker for all-day events, never an unparsed string.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// When an event starts.
///
/// Upstream sources report either a full clock time or an "All Day"
/// literal. The two are kept distinct so an all-day event never carries a
/// fabricated clock time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum EventStart {
    /// All-day event: only the local date is known.
    AllDay(NaiveDate),
    /// Timed event: absolute instant, offset resolved from the configured
    /// IANA timezone for that local date.
    Timed(DateTime<FixedOffset>),
}

impl EventStart {
    /// The local calendar date of the start.
    pub fn local_date(&self) -> NaiveDate {
        match self {
            EventStart::AllDay(date) => *date,
            EventStart::Timed(dt) => dt.date_naive(),
        }
    }

    /// The local clock time, if the event has one.
    pub fn local_time(&self) -> Option<NaiveTime> {
        match self {
            EventStart::AllDay(_) => None,
            EventStart::Timed(dt) => Some(dt.time()),
        }
    }

    /// Returns true for the day-only marker.
    pub fn is_all_day(&self) -> bool {
        matches!(self, EventStart::AllDay(_))
    }

    /// Total-order key: date ascending, all-day before timed events on the
    /// same day, then clock time.
    fn sort_key(&self) -> (NaiveDate, u8, NaiveTime) {
        match self {
            EventStart::AllDay(date) => (*date, 0, NaiveTime::MIN),
            EventStart::Timed(dt) => (dt.date_naive(), 1, dt.time()),
        }
    }
}

impl Ord for EventStart {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for EventStart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Link to the event page, or an explicit "unavailable" sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum EventLink {
    /// Absolute URL
    Url(String),
    /// The source exposes no link for this event
    Unavailable,
}

impl fmt::Display for EventLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventLink::Url(url) => write!(f, "{url}"),
            EventLink::Unavailable => write!(f, "N/A"),
        }
    }
}

/// A normalized event in the aggregated collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Originating venue/organization name
    pub source: String,

    /// Cleaned display title
    pub title: String,

    /// Resolved start
    pub start: EventStart,

    /// Human time label ("2:30 PM" or "All Day"), kept for presentation
    pub display_time: String,

    /// Venue/room text
    pub location: String,

    /// Age group classifier
    pub age_group: String,

    /// Program type / category classifier
    pub category: String,

    /// Cleaned free-text description
    pub description: String,

    /// Event page link
    pub link: EventLink,
}

/// Identity key used by the deduplicator.
///
/// Description, location, and link differences are intentionally ignored:
/// those fields are stable per logical event within one source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub source: String,
    pub title: String,
    pub day: NaiveDate,
    pub display_time: String,
}

impl Event {
    /// Identity key: `(source, normalized title, start day, display time)`.
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            source: self.source.clone(),
            title: self.title.trim().to_lowercase(),
            day: self.start.local_date(),
            display_time: self.display_time.clone(),
        }
    }

    /// Key for the final total order: start ascending, title for stability.
    pub fn sort_key(&self) -> ((NaiveDate, u8, NaiveTime), String) {
        (self.start.sort_key(), self.title.clone())
    }
}
