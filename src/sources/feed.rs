// src/sources/feed.rs

//! Adapter for JSON event-feed platforms.
//!
//! One structured query returns the whole window. Fields map directly
//! from the feed's JSON; the only local work is flattening the nested
//! location/audience/category arrays and applying the configured
//! age-group allow-list when the platform cannot filter server-side.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde_json::Value;

use crate::error::{FetchCause, FetchError};
use crate::fetch::FetchClient;
use crate::models::{DateWindow, PlatformFamily, SourceDescriptor};
use crate::normalize::html_to_text;
use crate::sources::{RawRecord, SourceAdapter};

const PER_PAGE: u32 = 100;

/// Single-query JSON feed source.
pub struct FeedSource {
    descriptor: SourceDescriptor,
}

impl FeedSource {
    pub fn new(descriptor: SourceDescriptor) -> Self {
        Self { descriptor }
    }

    fn query(&self, window: &DateWindow) -> Vec<(String, String)> {
        vec![
            (
                "c".to_string(),
                self.descriptor.calendar_id.clone().unwrap_or_default(),
            ),
            ("date".to_string(), window.start.format("%Y-%m-%d").to_string()),
            ("perpage".to_string(), PER_PAGE.to_string()),
            ("page".to_string(), "1".to_string()),
            ("audience".to_string(), String::new()),
            ("cats".to_string(), String::new()),
            ("inc".to_string(), "0".to_string()),
        ]
    }

    fn map_item(&self, item: &Value) -> Option<RawRecord> {
        let title = item.get("title").and_then(Value::as_str)?.trim();
        if title.is_empty() {
            return None;
        }
        let mut record = RawRecord::new(&self.descriptor.name, title);

        if let Some(start) = item.get("startdt").and_then(Value::as_str) {
            match NaiveDateTime::parse_from_str(start, "%Y-%m-%d %H:%M:%S") {
                Ok(dt) => record.date_text = dt.date().format("%Y-%m-%d").to_string(),
                Err(_) => {
                    log::debug!(
                        "{}: could not parse start '{start}' for '{title}'",
                        self.descriptor.name
                    );
                }
            }
        }

        if item.get("all_day").and_then(Value::as_bool) == Some(true) {
            record.time_text = "All Day".to_string();
        } else {
            let start = item.get("start").and_then(Value::as_str).unwrap_or("").trim();
            let end = item.get("end").and_then(Value::as_str).unwrap_or("").trim();
            if !start.is_empty() {
                record.time_text = if !end.is_empty() && end != start {
                    format!("{start} - {end}")
                } else {
                    start.to_string()
                };
            }
        }

        // The feed scatters venue information across several fields
        let mut parts: Vec<String> = Vec::new();
        if let Some(locations) = item.get("locations").and_then(Value::as_array) {
            parts.extend(named_entries(locations));
        }
        if let Some(location) = item.get("location").and_then(Value::as_str) {
            if !location.trim().is_empty() {
                parts.push(location.trim().to_string());
            }
        }
        if item.get("online_event").and_then(Value::as_bool) == Some(true) {
            parts.push("Online".to_string());
        }
        let mut seen = HashSet::new();
        parts.retain(|part| seen.insert(part.clone()));
        if !parts.is_empty() {
            record.location = parts.join(", ");
        }

        if let Some(audiences) = item.get("audiences").and_then(Value::as_array) {
            let names = named_entries(audiences).join(", ");
            if !names.is_empty() {
                record.age_group = names;
            }
        }
        if let Some(categories) = item.get("categories_arr").and_then(Value::as_array) {
            let names = named_entries(categories).join(", ");
            if !names.is_empty() {
                record.category = names;
            }
        }

        let description_html = ["description", "shortdesc", "more_info"]
            .iter()
            .find_map(|key| item.get(*key).and_then(Value::as_str))
            .unwrap_or("");
        let description = html_to_text(description_html);
        if !description.is_empty() {
            record.description = description;
        }

        record.link = item
            .get("url")
            .and_then(Value::as_str)
            .map(str::to_string);

        Some(record)
    }

    /// Keep only records whose audience matches the configured allow-list.
    fn apply_age_filter(&self, records: Vec<RawRecord>) -> Vec<RawRecord> {
        if self.descriptor.age_groups.is_empty() {
            return records;
        }
        let before = records.len();
        let kept: Vec<RawRecord> = records
            .into_iter()
            .filter(|record| {
                let audience = record.age_group.to_lowercase();
                self.descriptor
                    .age_groups
                    .iter()
                    .any(|allowed| audience.contains(&allowed.to_lowercase()))
            })
            .collect();
        if kept.is_empty() && before > 0 {
            log::warn!(
                "Age-group filter removed all {before} events for {}",
                self.name()
            );
        }
        kept
    }
}

fn named_entries(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .filter_map(|v| v.get("name").and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl SourceAdapter for FeedSource {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn family(&self) -> PlatformFamily {
        PlatformFamily::Feed
    }

    async fn fetch(
        &self,
        window: &DateWindow,
        client: &FetchClient,
    ) -> Result<Vec<RawRecord>, FetchError> {
        let response = client
            .get_json(
                self.name(),
                self.descriptor.dependency(),
                &self.descriptor.endpoint,
                &self.query(window),
            )
            .await?;

        let Some(results) = response.get("results").and_then(Value::as_array) else {
            return Err(FetchError::new(
                self.name(),
                FetchCause::MalformedResponse("response has no 'results' array".into()),
            ));
        };

        let records: Vec<RawRecord> = results
            .iter()
            .filter_map(|item| self.map_item(item))
            .collect();
        let records = self.apply_age_filter(records);

        log::info!("Found {} events for {}", records.len(), self.name());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::NOT_FOUND;
    use chrono::NaiveDate;
    use serde_json::json;

    fn source(age_groups: Vec<String>) -> FeedSource {
        FeedSource::new(SourceDescriptor {
            name: "Glencoe".to_string(),
            family: PlatformFamily::Feed,
            endpoint: "https://calendar.example.org/ajax/calendar/list".to_string(),
            dependency: None,
            branch_query: None,
            calendar_id: Some("19721".to_string()),
            page_cap: 5,
            age_groups,
        })
    }

    #[test]
    fn query_carries_calendar_id_and_window_start() {
        let window = DateWindow::new(NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(), 31);
        let query = source(Vec::new()).query(&window);
        assert!(query.contains(&("c".to_string(), "19721".to_string())));
        assert!(query.contains(&("date".to_string(), "2026-03-02".to_string())));
    }

    #[test]
    fn maps_feed_fields_directly() {
        let item = json!({
            "title": "Lego Club",
            "startdt": "2026-03-14 16:00:00",
            "all_day": false,
            "start": "4:00pm",
            "end": "5:00pm",
            "locations": [{"name": "Community Room"}],
            "audiences": [{"name": "Kids"}, {"name": "Family"}],
            "categories_arr": [{"name": "STEM"}],
            "description": "<p>Free build &amp; display.</p>",
            "url": "https://calendar.example.org/event/1"
        });
        let record = source(Vec::new()).map_item(&item).unwrap();
        assert_eq!(record.date_text, "2026-03-14");
        assert_eq!(record.time_text, "4:00pm - 5:00pm");
        assert_eq!(record.location, "Community Room");
        assert_eq!(record.age_group, "Kids, Family");
        assert_eq!(record.category, "STEM");
        assert_eq!(record.description, "Free build & display.");
    }

    #[test]
    fn all_day_flag_wins_over_clock_fields() {
        let item = json!({
            "title": "Puzzle Exchange",
            "startdt": "2026-03-10 00:00:00",
            "all_day": true,
            "start": "12:00am"
        });
        let record = source(Vec::new()).map_item(&item).unwrap();
        assert_eq!(record.time_text, "All Day");
    }

    #[test]
    fn online_events_are_labelled() {
        let item = json!({
            "title": "Virtual Author Talk",
            "online_event": true
        });
        let record = source(Vec::new()).map_item(&item).unwrap();
        assert_eq!(record.location, "Online");
    }

    #[test]
    fn repeated_location_parts_collapse_wherever_they_appear() {
        // "Online" shows up both as a named location and via the flag,
        // with another venue in between
        let item = json!({
            "title": "Hybrid Book Club",
            "locations": [{"name": "Online"}, {"name": "Community Room"}],
            "online_event": true
        });
        let record = source(Vec::new()).map_item(&item).unwrap();
        assert_eq!(record.location, "Online, Community Room");
    }

    #[test]
    fn age_filter_is_an_allow_list() {
        let mut kids = RawRecord::new("Glencoe", "Lego Club");
        kids.age_group = "Kids, Family".to_string();
        let mut adults = RawRecord::new("Glencoe", "Tax Help");
        adults.age_group = "Adult".to_string();

        let kept = source(vec!["kids".to_string()]).apply_age_filter(vec![kids, adults]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "Lego Club");
    }

    #[test]
    fn empty_allow_list_keeps_everything() {
        let mut record = RawRecord::new("Glencoe", "Tax Help");
        record.age_group = NOT_FOUND.to_string();
        let kept = source(Vec::new()).apply_age_filter(vec![record]);
        assert_eq!(kept.len(), 1);
    }
}
