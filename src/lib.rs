//! # Deck Meta
//!
//! Card usage, variant and power index analysis for competitive deck
//! archetypes, kept current by incremental tournament tracking.
//!
//! ## Architecture
//!
//! - **models**: Core data structures (cards, samples, snapshots, analyses)
//! - **calculate**: Aggregation, variant classification, power index, templates
//! - **fetch**: Decklist and event sources (HTTP and local files)
//! - **cache**: Tiered cache with consistency repair
//! - **sync**: Incremental tournament tracking and updates
//! - **storage**: Filesystem persistence (JSON entries, JSONL state)
//! - **api**: REST API endpoints
//! - **config**: Configuration loading and validation

pub mod api;
pub mod cache;
pub mod calculate;
pub mod config;
pub mod fetch;
pub mod models;
pub mod storage;
pub mod sync;

pub use models::*;

use std::time::Duration;

/// Parse a human-friendly duration string (e.g., "6h", "30m", "90s").
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix('h') {
        (n, 3600)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1)
    } else {
        // Default to seconds
        (s, 1)
    };

    let num: u64 = num_str.parse().ok()?;
    Some(Duration::from_secs(num * multiplier))
}
