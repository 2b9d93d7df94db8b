// src/models/mod.rs

//! Domain models for the aggregator.

mod config;
mod event;
mod run;
mod source;

// Re-export all public types
pub use config::{Config, ExtractorConfig, FetchConfig, RetryConfig};
pub use event::{DedupKey, Event, EventLink, EventStart};
pub use run::{RunState, ScrapeRun, SourceOutcome, SourceStatus};
pub use source::{Dependency, PlatformFamily, SourceDescriptor};

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// The date window a run fetches events for (inclusive on both ends).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    /// First day of the window
    pub start: NaiveDate,
    /// Number of days covered, at least 1
    pub days: u32,
}

impl DateWindow {
    pub fn new(start: NaiveDate, days: u32) -> Self {
        Self {
            start,
            days: days.max(1),
        }
    }

    /// Last day of the window (inclusive).
    pub fn end(&self) -> NaiveDate {
        self.start + Duration::days(i64::from(self.days) - 1)
    }

    /// Whether a date falls inside the window.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end()
    }
}
