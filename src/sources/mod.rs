// src/sources/mod.rs

//! Source adapters.
//!
//! Each upstream platform gets one adapter. Adapters only produce raw
//! records: normalization, windowing, deduplication, and ordering all
//! happen downstream, identically for every family.

mod community;
mod feed;
mod scrape;

pub use community::CommunitySource;
pub use feed::FeedSource;
pub use scrape::ScrapeSource;

use async_trait::async_trait;

use crate::error::{AppError, FetchError, Result};
use crate::fetch::FetchClient;
use crate::models::{DateWindow, ExtractorConfig, PlatformFamily, SourceDescriptor};

/// Marker for a field the upstream listing did not provide.
pub const NOT_FOUND: &str = "Not found";

/// One event as extracted from an upstream source, before normalization.
///
/// Everything except the title may legitimately be missing; missing text
/// fields carry the [`NOT_FOUND`] marker so downstream code can tell
/// "absent" from "empty".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub source: String,
    pub title: String,
    pub date_text: String,
    pub time_text: String,
    pub location: String,
    pub age_group: String,
    pub category: String,
    pub description: String,
    pub link: Option<String>,
}

impl RawRecord {
    /// A record with only source and title set; every other field starts
    /// at the missing-field marker.
    pub fn new(source: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            title: title.into(),
            date_text: NOT_FOUND.to_string(),
            time_text: NOT_FOUND.to_string(),
            location: NOT_FOUND.to_string(),
            age_group: NOT_FOUND.to_string(),
            category: NOT_FOUND.to_string(),
            description: NOT_FOUND.to_string(),
            link: None,
        }
    }
}

/// A per-source fetcher.
///
/// `fetch` returns every raw record the source lists for the window; it
/// must be cancel-safe, since the orchestrator may drop the future when
/// a run is cancelled.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Display name, used as `Event::source` and in logs.
    fn name(&self) -> &str;

    /// Platform family this adapter speaks.
    fn family(&self) -> PlatformFamily;

    /// Fetch all raw records for the window.
    async fn fetch(
        &self,
        window: &DateWindow,
        client: &FetchClient,
    ) -> std::result::Result<Vec<RawRecord>, FetchError>;
}

/// Build the adapter for a source descriptor.
///
/// Per-source configuration errors surface here so the orchestrator can
/// record them as that source's failure without touching the others.
pub fn build_adapter(
    descriptor: &SourceDescriptor,
    extractor: &ExtractorConfig,
) -> Result<Box<dyn SourceAdapter>> {
    descriptor.validate()?;
    match descriptor.family {
        PlatformFamily::Scrape => {
            let api_key = std::env::var(&extractor.api_key_env).map_err(|_| {
                AppError::config(format!(
                    "source '{}' needs the extraction API key in ${}",
                    descriptor.name, extractor.api_key_env
                ))
            })?;
            Ok(Box::new(ScrapeSource::new(
                descriptor.clone(),
                extractor.endpoint.clone(),
                api_key,
            )))
        }
        PlatformFamily::Community => Ok(Box::new(CommunitySource::new(descriptor.clone()))),
        PlatformFamily::Feed => Ok(Box::new(FeedSource::new(descriptor.clone()))),
    }
}
