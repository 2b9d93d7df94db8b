// src/error.rs

//! Unified error handling for the aggregator.
//!
//! Per-source failures travel as [`FetchError`] so the orchestrator can
//! record them against the run without aborting sibling sources. Only
//! precondition failures ([`AppError::Run`]) are fatal to a whole run.

use std::fmt;

use thiserror::Error;

/// Result type alias for aggregator operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Per-source fetch failure
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Per-record normalization failure
    #[error("Parse error: {0}")]
    Parse(String),

    /// Source or application configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Precondition failure fatal to a whole run
    #[error("Run error: {0}")]
    Run(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a per-record parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Create a run-level precondition error.
    pub fn run(message: impl Into<String>) -> Self {
        Self::Run(message.into())
    }
}

/// Why a fetch against one upstream source failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchCause {
    /// Connection-level failure (DNS, refused, reset)
    Transport(String),
    /// Request or response exceeded the configured timeout
    Timeout,
    /// Upstream returned HTTP 429; optional Retry-After seconds
    RateLimited(Option<u64>),
    /// Upstream returned a non-success status
    Status(u16),
    /// Response body failed minimum-field validation
    MalformedResponse(String),
    /// Authentication or quota failure
    Auth(String),
    /// The run was cancelled while this fetch was in flight
    Cancelled,
}

impl FetchCause {
    /// Whether this failure is worth retrying.
    ///
    /// Transient: connection errors, timeouts, rate limits, and 5xx.
    /// Everything else propagates immediately without consuming the
    /// retry budget.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchCause::Transport(_) | FetchCause::Timeout | FetchCause::RateLimited(_) => true,
            FetchCause::Status(code) => *code >= 500,
            _ => false,
        }
    }
}

impl fmt::Display for FetchCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchCause::Transport(msg) => write!(f, "transport error: {msg}"),
            FetchCause::Timeout => write!(f, "request timed out"),
            FetchCause::RateLimited(Some(secs)) => {
                write!(f, "rate limited (retry after {secs}s)")
            }
            FetchCause::RateLimited(None) => write!(f, "rate limited"),
            FetchCause::Status(code) => write!(f, "HTTP status {code}"),
            FetchCause::MalformedResponse(msg) => write!(f, "malformed response: {msg}"),
            FetchCause::Auth(msg) => write!(f, "authentication failure: {msg}"),
            FetchCause::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A failed fetch for one source, after the retry budget is spent.
//
// Implemented by hand rather than via `#[derive(Error)]` because
// thiserror treats a field named `source` as the error source, which
// would require it to implement `std::error::Error`.
#[derive(Debug, Clone)]
pub struct FetchError {
    /// Name of the source whose fetch failed
    pub source: String,
    /// Final classified cause
    pub cause: FetchCause,
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fetch failed for {}: {}", self.source, self.cause)
    }
}

impl std::error::Error for FetchError {}

impl FetchError {
    pub fn new(source: impl Into<String>, cause: FetchCause) -> Self {
        Self {
            source: source.into(),
            cause,
        }
    }
}
