//! HTTP JSON decklist source.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

use super::wire::{DecklistPage, RecentEvents};
use super::{DecklistProvider, EventIdProvider, FetchError, RetryPolicy};
use crate::config::SourceConfig;
use crate::models::{ArchetypeKey, RawSample, SourceEventId};

/// Configuration for the HTTP provider.
#[derive(Debug, Clone)]
pub struct HttpProviderConfig {
    pub base_url: Url,

    /// Request timeout
    pub timeout: Duration,

    /// User agent string
    pub user_agent: String,

    /// Fixed delay between consecutive requests
    pub request_delay: Duration,

    pub retry: RetryPolicy,
}

impl HttpProviderConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: Duration::from_secs(30),
            user_agent: concat!("deck-meta/", env!("CARGO_PKG_VERSION")).to_string(),
            request_delay: Duration::from_millis(300),
            retry: RetryPolicy::default(),
        }
    }

    /// Build from the `[source]` section. Fails when no base URL is set.
    pub fn from_source(source: &SourceConfig) -> Result<Self, FetchError> {
        let raw = source
            .base_url
            .as_deref()
            .ok_or_else(|| FetchError::InvalidUrl("no base URL configured".to_string()))?;
        let base_url = Url::parse(raw).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", raw, e)))?;

        Ok(Self {
            timeout: Duration::from_secs(source.timeout_seconds),
            request_delay: Duration::from_millis(source.rate_limit_ms),
            retry: RetryPolicy::from(source),
            ..Self::new(base_url)
        })
    }
}

/// Fetches decklists and event ids from a JSON service.
///
/// Endpoints, relative to the base URL:
/// - `archetypes/{archetype}/{format}/decklists` returns a decklist page
/// - `events/recent` returns recent event ids
pub struct HttpProvider {
    client: Client,
    config: HttpProviderConfig,
    last_request: Mutex<Option<Instant>>,
}

impl HttpProvider {
    pub fn new(config: HttpProviderConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static("deck-meta")),
        );

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            config,
            last_request: Mutex::new(None),
        })
    }

    /// Build an endpoint URL from path segments.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, FetchError> {
        let mut url = self.config.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::InvalidUrl(self.config.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Wait out the fixed delay since the previous request.
    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.config.request_delay {
                tokio::time::sleep(self.config.request_delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, FetchError> {
        self.throttle().await;
        debug!("GET {}", url);

        let response = self.client.get(url.as_str()).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);

            return Err(FetchError::RateLimited {
                host: url.host_str().unwrap_or("unknown").to_string(),
                retry_after_secs: retry_after,
            });
        }

        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl DecklistProvider for HttpProvider {
    async fn fetch_decklists(&self, key: &ArchetypeKey) -> Result<RawSample, FetchError> {
        let url = self.endpoint(&[
            "archetypes",
            key.archetype.as_str(),
            key.format.as_str(),
            "decklists",
        ])?;

        let page: DecklistPage = self
            .config
            .retry
            .run(&format!("decklists for {}", key), || self.get_json(&url))
            .await?;
        let sample = page.into_sample()?;

        info!(
            "Fetched {} decklists for {} ({} in sample)",
            sample.decks.len(),
            key,
            sample.total_decks
        );
        Ok(sample)
    }
}

#[async_trait]
impl EventIdProvider for HttpProvider {
    async fn fetch_recent_event_ids(&self) -> Result<Vec<SourceEventId>, FetchError> {
        let url = self.endpoint(&["events", "recent"])?;
        let events: RecentEvents = self
            .config
            .retry
            .run("recent events", || self.get_json(&url))
            .await?;

        debug!("Fetched {} recent event ids", events.event_ids.len());
        Ok(events.into_ids())
    }
}
