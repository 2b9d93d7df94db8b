// src/sources/community.rs

//! Adapter for the community-platform event API.
//!
//! Pure data mapping over a paginated JSON endpoint. Pages are walked in
//! order until an empty page, a short page, or the configured cap; a
//! branch filter query can be appended for multi-branch systems.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde_json::Value;

use crate::error::{FetchCause, FetchError};
use crate::fetch::FetchClient;
use crate::models::{DateWindow, PlatformFamily, SourceDescriptor};
use crate::sources::{RawRecord, SourceAdapter};

/// Full pages carry this many events; a shorter page is the last one.
const PAGE_SIZE: usize = 20;

/// Paginated community-platform source.
pub struct CommunitySource {
    descriptor: SourceDescriptor,
}

impl CommunitySource {
    pub fn new(descriptor: SourceDescriptor) -> Self {
        Self { descriptor }
    }

    fn page_query(&self, page: u32) -> Vec<(String, String)> {
        let mut query = vec![("page".to_string(), page.to_string())];
        if let Some(branch) = &self.descriptor.branch_query {
            for pair in branch.split('&') {
                if let Some((key, value)) = pair.split_once('=') {
                    query.push((key.to_string(), value.to_string()));
                }
            }
        }
        query
    }

    fn map_item(&self, item: &Value) -> Option<RawRecord> {
        let title = item.get("title").and_then(Value::as_str)?.trim();
        if title.is_empty() {
            return None;
        }
        let mut record = RawRecord::new(&self.descriptor.name, title);

        if let Some(start) = item.get("start").and_then(Value::as_str) {
            if let Ok(dt) = NaiveDateTime::parse_from_str(start, "%Y-%m-%dT%H:%M:%S") {
                record.date_text = dt.date().format("%Y-%m-%d").to_string();
                record.time_text = if item.get("all_day").and_then(Value::as_bool) == Some(true) {
                    "All Day".to_string()
                } else {
                    dt.time().format("%l:%M %p").to_string().trim().to_string()
                };
            } else {
                log::debug!(
                    "{}: could not parse start '{start}' for '{title}'",
                    self.descriptor.name
                );
            }
        }

        if let Some(location) = item
            .pointer("/location/name")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
        {
            record.location = location.trim().to_string();
        }
        if let Some(audiences) = item.get("audiences").and_then(Value::as_array) {
            let names = join_strings(audiences);
            if !names.is_empty() {
                record.age_group = names;
            }
        }
        if let Some(types) = item.get("program_types").and_then(Value::as_array) {
            let names = join_strings(types);
            if !names.is_empty() {
                record.category = names;
            }
        }
        if let Some(description) = item
            .get("description")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
        {
            record.description = description.to_string();
        }
        // Event links may come back relative to the platform host
        record.link = item.get("url").and_then(Value::as_str).map(|href| {
            if href.starts_with("http") {
                href.to_string()
            } else {
                crate::utils::resolve(&self.descriptor.endpoint, href)
                    .unwrap_or_else(|| href.to_string())
            }
        });

        Some(record)
    }
}

fn join_strings(values: &[Value]) -> String {
    values
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

#[async_trait]
impl SourceAdapter for CommunitySource {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn family(&self) -> PlatformFamily {
        PlatformFamily::Community
    }

    async fn fetch(
        &self,
        _window: &DateWindow,
        client: &FetchClient,
    ) -> Result<Vec<RawRecord>, FetchError> {
        let mut records = Vec::new();

        for page in 1..=self.descriptor.page_cap {
            log::debug!("Fetching page {page} for {}", self.name());
            let response = client
                .get_json(
                    self.name(),
                    self.descriptor.dependency(),
                    &self.descriptor.endpoint,
                    &self.page_query(page),
                )
                .await?;

            let Some(items) = response.get("events").and_then(Value::as_array) else {
                return Err(FetchError::new(
                    self.name(),
                    FetchCause::MalformedResponse("response has no 'events' array".into()),
                ));
            };
            if items.is_empty() {
                log::debug!("No more events on page {page} for {}", self.name());
                break;
            }

            let page_count = items.len();
            records.extend(items.iter().filter_map(|item| self.map_item(item)));

            if page_count < PAGE_SIZE {
                log::debug!("Reached the last page of results for {}", self.name());
                break;
            }
        }

        log::info!("Found {} events for {}", records.len(), self.name());
        Ok(records)
    }
}
