//! Power index: a confidence-adjusted performance score.
//!
//! The Wilson score lower bound of the win rate (ties count as half a
//! win), recentred on 0.5 and scaled by 10. Small samples are pulled
//! toward zero and below; an even record scores negative.

use crate::models::PerformanceRecord;

/// z-score for a 95% confidence interval.
pub const Z_95: f64 = 1.96;

/// Lower bound of the Wilson score interval for `p` over `n` trials.
pub fn wilson_lower_bound(p: f64, n: f64, z: f64) -> f64 {
    if n <= 0.0 {
        return 0.0;
    }
    let z2 = z * z;
    let spread = (p * (1.0 - p) / n + z2 / (4.0 * n * n)).max(0.0).sqrt();
    (p + z2 / (2.0 * n) - z * spread) / (1.0 + z2 / n)
}

/// Score a record. Returns exactly 0.0 when no games were played.
pub fn power_index(wins: u32, losses: u32, ties: u32) -> f64 {
    let n = wins as f64 + losses as f64 + ties as f64;
    if n == 0.0 {
        return 0.0;
    }
    let p = (wins as f64 + 0.5 * ties as f64) / n;
    (wilson_lower_bound(p, n, Z_95) - 0.5) * 10.0
}

/// Score a performance record.
pub fn record_power_index(record: &PerformanceRecord) -> f64 {
    power_index(record.wins, record.losses, record.ties)
}

/// Order items by the power index of their record, strongest first.
/// Ties keep input order.
pub fn rank_by_power_index<T>(
    items: Vec<T>,
    record: impl Fn(&T) -> &PerformanceRecord,
) -> Vec<(T, f64)> {
    let mut ranked: Vec<_> = items
        .into_iter()
        .map(|item| {
            let score = record_power_index(record(&item));
            (item, score)
        })
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
}
