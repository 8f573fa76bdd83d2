//! Randomized courtesy delays.
//!
//! Every pause in the crawl (between listing requests, product batches,
//! categories and cycles) is drawn uniformly from a [`DelayRange`], so the
//! request timing never settles into a fixed rhythm.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Inclusive range of seconds a pause is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_secs: f64,
    pub max_secs: f64,
}

impl DelayRange {
    /// No delay at all. Used by tests and one-shot runs.
    pub const ZERO: DelayRange = DelayRange {
        min_secs: 0.0,
        max_secs: 0.0,
    };

    pub const fn new(min_secs: f64, max_secs: f64) -> Self {
        Self { min_secs, max_secs }
    }

    pub fn is_valid(&self) -> bool {
        self.min_secs.is_finite()
            && self.max_secs.is_finite()
            && self.min_secs >= 0.0
            && self.min_secs <= self.max_secs
    }

    /// Draw one delay from the range.
    pub fn sample(&self) -> Duration {
        let min = self.min_secs.max(0.0);
        if !self.is_valid() || self.max_secs <= min {
            return Duration::from_secs_f64(if min.is_finite() { min } else { 0.0 });
        }
        let secs = rand::rng().random_range(min..=self.max_secs);
        Duration::from_secs_f64(secs)
    }
}

/// Sleep for a duration drawn from `range`.
pub async fn pause(range: DelayRange) {
    let delay = range.sample();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Sleep for `delay` unless `cancel` fires first.
///
/// Returns `false` when the sleep was interrupted by cancellation.
pub async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    if delay.is_zero() {
        tokio::task::yield_now().await;
        return !cancel.is_cancelled();
    }
    tokio::select! {
        () = tokio::time::sleep(delay) => true,
        () = cancel.cancelled() => false,
    }
}
