// src/sources/scrape.rs

//! Adapter for venue sites with no machine-readable feed.
//!
//! The listing page is rendered to markdown through the content-extraction
//! service, then parsed structurally: `### ` headings open event blocks,
//! the nearest preceding long-form date line dates them, and a time range
//! inside the block confirms the block really is an event. Blocks missing
//! either are skipped and counted, never fatal.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};

use crate::error::{FetchCause, FetchError};
use crate::fetch::FetchClient;
use crate::models::{DateWindow, PlatformFamily, SourceDescriptor};
use crate::normalize::clean_text;
use crate::sources::{RawRecord, SourceAdapter, NOT_FOUND};

fn long_form_date() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b(?:Monday|Tuesday|Wednesday|Thursday|Friday|Saturday|Sunday),\s+(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2},\s+\d{4}\b",
        )
        .unwrap()
    })
}

fn time_range() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\d{1,2}:\d{2}\s*[ap]m(?:\s*[\u{2013}-]\s*\d{1,2}:\d{2}\s*[ap]m)?")
            .unwrap()
    })
}

// Headings on listing pages that are page furniture, not events
fn non_event_heading() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)policy|library\s+hours|about\s+the\s+library|accessibilit(y|ies)|registration\s+info|how\s+to\s+register",
        )
        .unwrap()
    })
}

fn room_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        vec![
            Regex::new(r"(?i)Room:\s*(Meeting Room\s*[A-Z/]+)").unwrap(),
            Regex::new(r"(?i)(Meeting Room\s*[A-Z/]+)").unwrap(),
            Regex::new(r"(?i)Room:\s*([^,\n*]+)").unwrap(),
        ]
    })
}

/// Custom-scrape source backed by the content-extraction service.
pub struct ScrapeSource {
    descriptor: SourceDescriptor,
    extractor_endpoint: String,
    api_key: String,
}

impl ScrapeSource {
    pub fn new(descriptor: SourceDescriptor, extractor_endpoint: String, api_key: String) -> Self {
        Self {
            descriptor,
            extractor_endpoint,
            api_key,
        }
    }
}

#[async_trait]
impl SourceAdapter for ScrapeSource {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn family(&self) -> PlatformFamily {
        PlatformFamily::Scrape
    }

    async fn fetch(
        &self,
        _window: &DateWindow,
        client: &FetchClient,
    ) -> Result<Vec<RawRecord>, FetchError> {
        let body = json!({
            "url": self.descriptor.endpoint,
            "formats": ["markdown"],
        });
        let response = client
            .post_json(
                self.name(),
                self.descriptor.dependency(),
                &self.extractor_endpoint,
                &self.api_key,
                &body,
            )
            .await?;

        let markdown = extract_markdown(&response).ok_or_else(|| {
            FetchError::new(
                self.name(),
                FetchCause::MalformedResponse("no markdown in extraction response".into()),
            )
        })?;

        if markdown.trim().is_empty() {
            log::warn!("No markdown content received for {}", self.name());
            return Ok(Vec::new());
        }

        Ok(parse_listing(self.name(), markdown))
    }
}

/// Pull the markdown payload out of the extraction response; the service
/// has nested it under `data` in some API versions and not others.
fn extract_markdown(response: &Value) -> Option<&str> {
    response
        .pointer("/data/markdown")
        .or_else(|| response.get("markdown"))
        .and_then(Value::as_str)
}

/// Parse a rendered listing page into raw records.
fn parse_listing(source: &str, markdown: &str) -> Vec<RawRecord> {
    let heading_offsets: Vec<usize> = markdown
        .match_indices("### ")
        .map(|(offset, _)| offset)
        .collect();

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for (i, &offset) in heading_offsets.iter().enumerate() {
        let block_end = heading_offsets
            .get(i + 1)
            .copied()
            .unwrap_or(markdown.len());
        let block = &markdown[offset + 4..block_end];

        let Some(first_line) = block.lines().map(str::trim).find(|l| !l.is_empty()) else {
            skipped += 1;
            continue;
        };
        let title = clean_text(first_line);
        if title.is_empty() {
            skipped += 1;
            continue;
        }
        if non_event_heading().is_match(&title) {
            log::debug!("Skipping non-event heading for {source}: '{title}'");
            continue;
        }

        // A block with no time is page furniture, not an event
        let Some(time) = time_range().find(block) else {
            log::debug!("Skipping '{title}' for {source}: no time found");
            skipped += 1;
            continue;
        };

        // The date heading precedes the event blocks it governs
        let Some(date) = long_form_date()
            .find_iter(&markdown[..offset])
            .last()
        else {
            log::debug!("Skipping '{title}' for {source}: no date found");
            skipped += 1;
            continue;
        };

        let description_lines: Vec<String> = block
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .skip(1)
            .filter(|l| !l.to_lowercase().contains("register"))
            .map(clean_text)
            .filter(|l| !l.is_empty())
            .collect();
        let description = if description_lines.is_empty() {
            NOT_FOUND.to_string()
        } else {
            description_lines.join(" ")
        };

        let mut record = RawRecord::new(source, title);
        record.date_text = date.as_str().to_string();
        record.time_text = time.as_str().to_string();
        record.location = extract_location(source, block);
        record.description = description;
        records.push(record);
    }

    if skipped > 0 {
        log::debug!("Skipped {skipped} malformed blocks for {source}");
    }
    log::info!("Found {} events for {source}", records.len());
    records
}

/// Room annotations refine the default venue-level location.
fn extract_location(source: &str, block: &str) -> String {
    for pattern in room_patterns() {
        if let Some(captures) = pattern.captures(block) {
            let room = clean_text(&captures[1]);
            if !room.is_empty() && !room.to_lowercase().contains(&source.to_lowercase()) {
                return format!("{room} at {source}");
            }
        }
    }
    source.to_string()
}
