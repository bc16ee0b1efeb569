// GitHub API HTTP client.
// Handles authentication, rate limiting, response caching and status mapping.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{
    Client, Response, StatusCode,
    header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT},
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::cache::TtlCache;
use crate::error::{Result, StatsError};

use super::types::RateLimit;

pub const GITHUB_API_BASE: &str = "https://api.github.com";
const GITHUB_API_VERSION: &str = "2022-11-28";

/// Per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Remaining-call count at or below which requests wait for the reset.
const RATE_LIMIT_FLOOR: u64 = 10;

/// GitHub API client with authentication, caching and rate limit tracking.
pub struct GitHubClient {
    client: Client,
    base_url: String,
    cache: Arc<TtlCache>,
    cache_prefix: &'static str,
    rate_limit: RateLimit,
}

impl GitHubClient {
    /// Create a client for `base_url` whose cache keys start with `cache_prefix`.
    pub fn new(
        token: &str,
        base_url: impl Into<String>,
        cache: Arc<TtlCache>,
        cache_prefix: &'static str,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();

        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| StatsError::Other(e.to_string()))?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static(GITHUB_API_VERSION),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("ghstats/", env!("CARGO_PKG_VERSION"))),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(StatsError::Api)?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cache,
            cache_prefix,
            rate_limit: RateLimit::default(),
        })
    }

    /// Get the current rate limit information.
    pub fn rate_limit(&self) -> &RateLimit {
        &self.rate_limit
    }

    /// Cache key for an endpoint.
    pub fn cache_key(&self, endpoint: &str) -> String {
        format!("{}{}", self.cache_prefix, endpoint)
    }

    /// GET an endpoint and deserialize the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &mut self,
        endpoint: &str,
        use_cache: bool,
    ) -> Result<T> {
        let value = self.get_value(endpoint, use_cache).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// GET an endpoint as raw JSON, consulting the cache first when `use_cache` is set.
    ///
    /// Cache hits skip the network and the rate limit guard. A failed request
    /// serves the last stored payload, however old, before the error propagates.
    pub async fn get_value(&mut self, endpoint: &str, use_cache: bool) -> Result<Value> {
        let key = self.cache_key(endpoint);

        // Taken before the TTL check below deletes an expired entry.
        let stale = if use_cache {
            self.cache.peek_stale(&key)
        } else {
            None
        };

        if use_cache && let Some(cached) = self.cache.get(&key) {
            tracing::trace!(endpoint, "cache hit");
            return Ok(cached);
        }

        match self.fetch(endpoint).await {
            Ok(value) => {
                if use_cache {
                    self.cache.set(&key, &value);
                }
                Ok(value)
            }
            Err(e) => match stale {
                Some(cached) => {
                    tracing::warn!(endpoint, error = %e, "request failed, serving stale cached copy");
                    Ok(cached)
                }
                None => Err(e),
            },
        }
    }

    async fn fetch(&mut self, endpoint: &str) -> Result<Value> {
        self.wait_for_rate_limit().await;

        let url = format!("{}{}", self.base_url, endpoint);
        tracing::debug!(%url, "GET");
        let response = self.client.get(&url).send().await.map_err(StatsError::Api)?;

        self.update_rate_limit(&response);
        let response = self.check_response(response).await?;
        Ok(response.json().await?)
    }

    /// How long to wait before the next request, given the current Unix time.
    pub fn rate_limit_wait(&self, now_unix: u64) -> Option<Duration> {
        if self.rate_limit.remaining <= RATE_LIMIT_FLOOR && self.rate_limit.reset > now_unix {
            Some(Duration::from_secs(self.rate_limit.reset - now_unix + 1))
        } else {
            None
        }
    }

    async fn wait_for_rate_limit(&self) {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        if let Some(wait) = self.rate_limit_wait(now) {
            tracing::warn!(
                remaining = self.rate_limit.remaining,
                "Rate limit nearly exhausted, waiting {}s for reset",
                wait.as_secs()
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Update rate limit from response headers.
    fn update_rate_limit(&mut self, response: &Response) {
        if let Some(limit) = header_u64(response, "x-ratelimit-limit") {
            self.rate_limit.limit = limit;
        }

        if let Some(remaining) = header_u64(response, "x-ratelimit-remaining") {
            self.rate_limit.remaining = remaining;
        }

        if let Some(reset) = header_u64(response, "x-ratelimit-reset") {
            self.rate_limit.reset = reset;
        }
    }

    /// Check response status and convert errors.
    async fn check_response(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match status {
            StatusCode::UNAUTHORIZED => Err(StatsError::Unauthorized),
            StatusCode::NOT_FOUND => {
                let url = response.url().to_string();
                Err(StatsError::NotFound(url))
            }
            StatusCode::FORBIDDEN if self.rate_limit.remaining == 0 => {
                let reset_at = chrono::DateTime::from_timestamp(self.rate_limit.reset as i64, 0)
                    .map(|dt| dt.format("%H:%M:%S").to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                Err(StatsError::RateLimited { reset_at })
            }
            status => Err(StatsError::Http {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

fn header_u64(response: &Response, name: &str) -> Option<u64> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}
