// src/models/config.rs

//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::SourceDescriptor;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and fetch behavior settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Retry/backoff policy shared by all adapters
    #[serde(default)]
    pub retry: RetryConfig,

    /// IANA timezone every start instant is resolved against
    #[serde(default = "defaults::timezone")]
    pub timezone: String,

    /// Content-extraction service used by scrape sources
    #[serde(default)]
    pub extractor: ExtractorConfig,

    /// Upstream source definitions, in deterministic order
    #[serde(default = "defaults::default_sources")]
    pub sources: Vec<SourceDescriptor>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate global configuration values.
    ///
    /// Per-source problems are deliberately not checked here: a bad source
    /// is isolated at run time and must never block the others.
    pub fn validate(&self) -> Result<()> {
        if self.fetch.user_agent.trim().is_empty() {
            return Err(AppError::config("fetch.user_agent is empty"));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(AppError::config("fetch.timeout_secs must be > 0"));
        }
        if self.fetch.max_concurrent == 0 {
            return Err(AppError::config("fetch.max_concurrent must be > 0"));
        }
        if self.fetch.extractor_concurrency == 0 || self.fetch.direct_concurrency == 0 {
            return Err(AppError::config("per-dependency concurrency must be > 0"));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::config("retry.max_attempts must be > 0"));
        }
        self.resolve_timezone()?;
        Ok(())
    }

    /// Parse the configured IANA timezone identifier.
    pub fn resolve_timezone(&self) -> Result<Tz> {
        Tz::from_str(&self.timezone)
            .map_err(|_| AppError::config(format!("unknown timezone '{}'", self.timezone)))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            retry: RetryConfig::default(),
            timezone: defaults::timezone(),
            extractor: ExtractorConfig::default(),
            sources: defaults::default_sources(),
        }
    }
}

/// HTTP client and fetch behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Maximum source adapters running at once
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// In-flight request cap against the extraction service
    #[serde(default = "defaults::extractor_concurrency")]
    pub extractor_concurrency: usize,

    /// In-flight request cap for direct site traffic
    #[serde(default = "defaults::direct_concurrency")]
    pub direct_concurrency: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_concurrent: defaults::max_concurrent(),
            extractor_concurrency: defaults::extractor_concurrency(),
            direct_concurrency: defaults::direct_concurrency(),
        }
    }
}

/// Retry with exponential backoff, shared process-wide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts per request, including the first
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Base delay before the first retry; doubles each attempt
    #[serde(default = "defaults::base_delay_ms")]
    pub base_delay_ms: u64,

    /// Base delay after a rate-limit response; also doubles
    #[serde(default = "defaults::rate_limit_delay_ms")]
    pub rate_limit_delay_ms: u64,

    /// Hard cap on any single backoff sleep, in seconds
    #[serde(default = "defaults::max_delay_secs")]
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            base_delay_ms: defaults::base_delay_ms(),
            rate_limit_delay_ms: defaults::rate_limit_delay_ms(),
            max_delay_secs: defaults::max_delay_secs(),
        }
    }
}

/// Content-extraction service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Extraction API endpoint
    #[serde(default = "defaults::extractor_endpoint")]
    pub endpoint: String,

    /// Environment variable holding the API key
    #[serde(default = "defaults::extractor_api_key_env")]
    pub api_key_env: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::extractor_endpoint(),
            api_key_env: defaults::extractor_api_key_env(),
        }
    }
}

mod defaults {
    use crate::models::{PlatformFamily, SourceDescriptor};

    // Fetch defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; eventscout/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_concurrent() -> usize {
        5
    }
    pub fn extractor_concurrency() -> usize {
        3
    }
    pub fn direct_concurrency() -> usize {
        5
    }

    // Retry defaults
    pub fn max_attempts() -> u32 {
        3
    }
    pub fn base_delay_ms() -> u64 {
        1000
    }
    pub fn rate_limit_delay_ms() -> u64 {
        5000
    }
    pub fn max_delay_secs() -> u64 {
        60
    }

    // Timezone default
    pub fn timezone() -> String {
        "America/Chicago".into()
    }

    // Extractor defaults
    pub fn extractor_endpoint() -> String {
        "https://api.firecrawl.dev/v2/scrape".into()
    }
    pub fn extractor_api_key_env() -> String {
        "EXTRACTOR_API_KEY".into()
    }

    // Source defaults
    pub fn default_sources() -> Vec<SourceDescriptor> {
        fn source(name: &str, family: PlatformFamily, endpoint: &str) -> SourceDescriptor {
            SourceDescriptor {
                name: name.to_string(),
                family,
                endpoint: endpoint.to_string(),
                dependency: None,
                branch_query: None,
                calendar_id: None,
                page_cap: 5,
                age_groups: Vec::new(),
            }
        }

        let mut sources = vec![
            source(
                "Lincolnwood",
                PlatformFamily::Scrape,
                "https://www.lincolnwoodlibrary.org/events/list",
            ),
            source(
                "Morton Grove",
                PlatformFamily::Scrape,
                "https://www.mgpl.org/events/list",
            ),
            source(
                "Evanston",
                PlatformFamily::Community,
                "https://evanstonlibrary.bibliocommons.com/v2/events",
            ),
            source(
                "CPL Edgebrook",
                PlatformFamily::Community,
                "https://chipublib.bibliocommons.com/v2/events",
            ),
            source(
                "Glencoe",
                PlatformFamily::Feed,
                "https://calendar.glencoelibrary.org/ajax/calendar/list",
            ),
        ];
        sources[3].branch_query = Some("locations=27".to_string());
        sources[4].calendar_id = Some("19721".to_string());
        sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlatformFamily;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.fetch.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_timezone() {
        let mut config = Config::default();
        config.timezone = "America/Nowhere".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.fetch.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_sources_cover_every_family() {
        let config = Config::default();
        for family in [
            PlatformFamily::Scrape,
            PlatformFamily::Community,
            PlatformFamily::Feed,
        ] {
            assert!(
                config.sources.iter().any(|s| s.family == family),
                "missing family {family:?}"
            );
        }
    }

    #[test]
    fn config_parses_from_toml() {
        let toml = r#"
            timezone = "America/New_York"

            [fetch]
            max_concurrent = 2

            [[sources]]
            name = "Testville"
            family = "feed"
            endpoint = "https://example.org/calendar/list"
            calendar_id = "42"
            age_groups = ["Family/All Ages"]
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.timezone, "America/New_York");
        assert_eq!(config.fetch.max_concurrent, 2);
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].calendar_id.as_deref(), Some("42"));
        assert!(config.validate().is_ok());
    }
}
