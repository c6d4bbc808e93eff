//! Decklist and event-id sources.
//!
//! Sources sit behind the [`DecklistProvider`] and [`EventIdProvider`]
//! traits so the cache and the incremental updater can be driven by the
//! HTTP source, local files, or test doubles.

pub mod http;
pub mod local;
pub mod wire;

pub use http::{HttpProvider, HttpProviderConfig};
pub use local::LocalProvider;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::config::SourceConfig;
use crate::models::{ArchetypeKey, RawSample, SourceEventId};

/// Errors that can occur during fetching.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Rate limited by {host}, retry after {retry_after_secs}s")]
    RateLimited { host: String, retry_after_secs: u64 },

    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl FetchError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            FetchError::RateLimited { .. } => true,
            FetchError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Supplies the decklists behind one archetype key.
#[async_trait]
pub trait DecklistProvider: Send + Sync {
    async fn fetch_decklists(&self, key: &ArchetypeKey) -> Result<RawSample, FetchError>;
}

/// Supplies identifiers of recently completed events.
#[async_trait]
pub trait EventIdProvider: Send + Sync {
    async fn fetch_recent_event_ids(&self) -> Result<Vec<SourceEventId>, FetchError>;
}

/// Retry policy for source requests.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            backoff_multiplier: 2.0,
        }
    }
}

impl From<&SourceConfig> for RetryPolicy {
    fn from(config: &SourceConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay_ms: config.initial_backoff_ms,
            backoff_multiplier: config.backoff_multiplier,
        }
    }
}

impl RetryPolicy {
    /// Run `op`, retrying retryable failures with exponential backoff.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut delay = Duration::from_millis(self.initial_delay_ms);
        let mut attempt = 0;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let wait = match &e {
                        FetchError::RateLimited {
                            retry_after_secs, ..
                        } => delay.max(Duration::from_secs(*retry_after_secs)),
                        _ => delay,
                    };
                    warn!(
                        "{} failed (attempt {}/{}): {}, retrying in {:?}",
                        what,
                        attempt,
                        self.max_retries + 1,
                        e,
                        wait
                    );
                    tokio::time::sleep(wait).await;
                    delay = delay.mul_f64(self.backoff_multiplier);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
