// src/fetch/client.rs

//! Resilient fetch client.
//!
//! Every outbound call goes through one of these: a per-dependency
//! concurrency gate bounds in-flight requests against each external
//! service (several sources can share one dependency), and transient
//! failures are retried with exponential backoff. Rate-limit responses
//! get a distinguished longer delay. The gate permit is held only while
//! the request is in flight, never across a backoff sleep, so sources
//! sharing a gate are not starved while one of them backs off.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::error::{FetchCause, FetchError};
use crate::models::{Dependency, FetchConfig, RetryConfig};

/// Retry an operation under the given policy.
///
/// Transient failures back off with a doubling delay; rate limits use
/// the longer rate-limit base or the upstream's Retry-After, capped.
/// Non-transient failures propagate immediately without consuming the
/// retry budget.
pub async fn with_retry<T, F, Fut>(
    source: &str,
    policy: &RetryConfig,
    mut op: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchCause>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(cause) if cause.is_transient() && attempt < policy.max_attempts => {
                let delay = backoff_delay(policy, &cause, attempt);
                log::warn!(
                    "Attempt {attempt} failed for {source} ({cause}), retrying in {delay:?}"
                );
                tokio::time::sleep(delay).await;
            }
            Err(cause) => return Err(FetchError::new(source, cause)),
        }
    }
}

fn backoff_delay(policy: &RetryConfig, cause: &FetchCause, attempt: u32) -> Duration {
    let cap = Duration::from_secs(policy.max_delay_secs);
    // max_attempts is user config with no upper bound; clamp the exponent
    // so 2^n cannot overflow before the cap applies
    let factor = 2u32.pow((attempt - 1).min(20));
    let delay = match cause {
        FetchCause::RateLimited(Some(secs)) => Duration::from_secs(*secs),
        FetchCause::RateLimited(None) => {
            Duration::from_millis(policy.rate_limit_delay_ms) * factor
        }
        _ => Duration::from_millis(policy.base_delay_ms) * factor,
    };
    delay.min(cap)
}

/// HTTP client shared by all source adapters.
pub struct FetchClient {
    http: Client,
    retry: RetryConfig,
    gates: HashMap<Dependency, Arc<Semaphore>>,
}

impl FetchClient {
    /// Build the shared client and its per-dependency gates.
    pub fn new(fetch: &FetchConfig, retry: RetryConfig) -> Self {
        let http = Client::builder()
            .user_agent(&fetch.user_agent)
            .timeout(Duration::from_secs(fetch.timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        let gates = HashMap::from([
            (
                Dependency::Extractor,
                Arc::new(Semaphore::new(fetch.extractor_concurrency)),
            ),
            (
                Dependency::Direct,
                Arc::new(Semaphore::new(fetch.direct_concurrency)),
            ),
        ]);

        Self { http, retry, gates }
    }

    /// GET a text body.
    pub async fn get_text(
        &self,
        source: &str,
        dep: Dependency,
        url: &str,
        query: &[(String, String)],
    ) -> Result<String, FetchError> {
        with_retry(source, &self.retry, || {
            self.attempt_text(dep, self.http.get(url).query(query))
        })
        .await
    }

    /// GET a JSON body.
    pub async fn get_json(
        &self,
        source: &str,
        dep: Dependency,
        url: &str,
        query: &[(String, String)],
    ) -> Result<Value, FetchError> {
        let body = self.get_text(source, dep, url, query).await?;
        serde_json::from_str(&body).map_err(|e| {
            FetchError::new(source, FetchCause::MalformedResponse(e.to_string()))
        })
    }

    /// POST a JSON body with a bearer token, returning the JSON response.
    /// This is the shape the content-extraction service expects.
    pub async fn post_json(
        &self,
        source: &str,
        dep: Dependency,
        url: &str,
        bearer: &str,
        body: &Value,
    ) -> Result<Value, FetchError> {
        let text = with_retry(source, &self.retry, || {
            self.attempt_text(dep, self.http.post(url).bearer_auth(bearer).json(body))
        })
        .await?;
        serde_json::from_str(&text).map_err(|e| {
            FetchError::new(source, FetchCause::MalformedResponse(e.to_string()))
        })
    }

    /// Run one request attempt under the dependency's gate.
    async fn attempt_text(
        &self,
        dep: Dependency,
        request: reqwest::RequestBuilder,
    ) -> Result<String, FetchCause> {
        let gate = &self.gates[&dep];
        let _permit = gate
            .acquire()
            .await
            .map_err(|_| FetchCause::Cancelled)?;

        let response = request
            .send()
            .await
            .map_err(|e| classify_reqwest(&e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(FetchCause::RateLimited(retry_after));
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchCause::Auth(format!("HTTP {}", status.as_u16())));
        }
        if !status.is_success() {
            return Err(FetchCause::Status(status.as_u16()));
        }

        response.text().await.map_err(|e| classify_reqwest(&e))
        // _permit drops here, before any backoff the caller may take
    }
}

fn classify_reqwest(err: &reqwest::Error) -> FetchCause {
    if err.is_timeout() {
        FetchCause::Timeout
    } else {
        FetchCause::Transport(err.to_string())
    }
}
