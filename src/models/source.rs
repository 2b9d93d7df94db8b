// src/models/source.rs

//! Static per-source configuration.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// The platform family a source's adapter speaks.
///
/// This is a closed set: each family differs only in how raw records are
/// produced, never in downstream handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformFamily {
    /// Venue page scraped through the content-extraction service
    Scrape,
    /// Paginated community-platform event API
    Community,
    /// Single-query JSON event feed
    Feed,
}

/// The external dependency an outbound call counts against.
///
/// Several sources can share one dependency (every scrape source goes
/// through the same metered extraction API), so the concurrency gate is
/// keyed by dependency rather than by source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dependency {
    /// The content-extraction service
    Extractor,
    /// Direct traffic to the venue's own site or API
    Direct,
}

impl PlatformFamily {
    /// Which dependency calls for this family count against by default.
    pub fn default_dependency(&self) -> Dependency {
        match self {
            PlatformFamily::Scrape => Dependency::Extractor,
            PlatformFamily::Community | PlatformFamily::Feed => Dependency::Direct,
        }
    }
}

/// One configured upstream source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Display name, also the `Event::source` value
    pub name: String,

    /// Adapter variant to use
    pub family: PlatformFamily,

    /// Listing page URL (scrape) or API endpoint (community/feed)
    pub endpoint: String,

    /// Concurrency gate this source's calls count against
    #[serde(default)]
    pub dependency: Option<Dependency>,

    /// Extra query string appended to every page request (community),
    /// e.g. a branch/location filter
    #[serde(default)]
    pub branch_query: Option<String>,

    /// Calendar identifier sent with the query (feed)
    #[serde(default)]
    pub calendar_id: Option<String>,

    /// Maximum pages to walk before giving up (community)
    #[serde(default = "default_page_cap")]
    pub page_cap: u32,

    /// Age-group allow-list; empty means no filtering (feed)
    #[serde(default)]
    pub age_groups: Vec<String>,
}

fn default_page_cap() -> u32 {
    5
}

impl SourceDescriptor {
    /// Resolved dependency for this source.
    pub fn dependency(&self) -> Dependency {
        self.dependency
            .unwrap_or_else(|| self.family.default_dependency())
    }

    /// Check the descriptor for per-source configuration errors.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::config("source name is empty"));
        }
        if self.endpoint.trim().is_empty() {
            return Err(AppError::config(format!(
                "source '{}' has no endpoint",
                self.name
            )));
        }
        url::Url::parse(&self.endpoint).map_err(|e| {
            AppError::config(format!("source '{}' endpoint is invalid: {e}", self.name))
        })?;
        if self.family == PlatformFamily::Community && self.page_cap == 0 {
            return Err(AppError::config(format!(
                "source '{}' page_cap must be > 0",
                self.name
            )));
        }
        Ok(())
    }
}
