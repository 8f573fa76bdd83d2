//! Global price ledger shared by every category.
//!
//! Loaded once per cycle, mutated in memory while products are extracted,
//! and written back once at the end of the cycle when anything changed.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::CrawlSettings;
use crate::error::AppError;
use crate::util::{parse_timestamp, value_as_f64};

/// One observed price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Price ledger of one product or variant id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistoryEntry {
    pub name: String,
    /// First price ever observed. Never changes once set.
    pub initial_price: f64,
    /// Most recent samples, oldest first.
    #[serde(rename = "prices")]
    pub price_samples: Vec<PriceSample>,
    pub recently_reduced: bool,
    #[serde(rename = "reduction_from_initial")]
    pub reduction_from_initial_pct: f64,
}

impl PriceHistoryEntry {
    fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let price_samples: Vec<PriceSample> = obj
            .get("prices")
            .and_then(Value::as_array)
            .map(|samples| {
                samples
                    .iter()
                    .filter_map(|s| {
                        let price = s.get("price").and_then(value_as_f64)?;
                        let timestamp = s
                            .get("timestamp")
                            .and_then(Value::as_str)
                            .and_then(parse_timestamp)?;
                        Some(PriceSample { price, timestamp })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let initial_price = obj
            .get("initial_price")
            .and_then(value_as_f64)
            .filter(|p| *p > 0.0)
            .or_else(|| price_samples.first().map(|s| s.price))?;

        Some(Self {
            name: obj
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("Unknown")
                .to_string(),
            initial_price,
            price_samples,
            recently_reduced: obj
                .get("recently_reduced")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            reduction_from_initial_pct: obj
                .get("reduction_from_initial")
                .and_then(value_as_f64)
                .unwrap_or(0.0),
        })
    }

    pub fn latest(&self) -> Option<&PriceSample> {
        self.price_samples.last()
    }
}

/// Tunables of the "recently reduced" rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryPolicy {
    /// Maximum samples kept per id.
    pub capacity: usize,
    /// Reduction from the initial price that counts as recently reduced.
    pub reduction_threshold_pct: f64,
}

impl Default for HistoryPolicy {
    fn default() -> Self {
        Self {
            capacity: 20,
            reduction_threshold_pct: 5.0,
        }
    }
}

impl From<&CrawlSettings> for HistoryPolicy {
    fn from(settings: &CrawlSettings) -> Self {
        Self {
            capacity: settings.history_capacity.max(1),
            reduction_threshold_pct: settings.reduction_threshold_pct,
        }
    }
}

/// In-memory price history session with a dirty flag.
#[derive(Debug, Clone, Default)]
pub struct PriceHistory {
    entries: BTreeMap<String, PriceHistoryEntry>,
    policy: HistoryPolicy,
    dirty: bool,
}

impl PriceHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a parsed history file. Entries that are not objects or
    /// carry no usable price are skipped.
    pub fn from_value(value: &Value) -> Self {
        let entries = value
            .as_object()
            .map(|map| {
                map.iter()
                    .filter_map(|(id, v)| {
                        let entry = PriceHistoryEntry::from_value(v);
                        if entry.is_none() {
                            tracing::debug!(product_id = %id, "Skipping malformed price history entry");
                        }
                        entry.map(|e| (id.clone(), e))
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self {
            entries,
            policy: HistoryPolicy::default(),
            dirty: false,
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, AppError> {
        let value: Value = serde_json::from_str(raw)?;
        Ok(Self::from_value(&value))
    }

    pub fn to_json_pretty(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }

    pub fn with_policy(mut self, policy: HistoryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn set_policy(&mut self, policy: HistoryPolicy) {
        self.policy = policy;
    }

    /// Record a price for `id` and return whether it counts as recently reduced.
    ///
    /// A first sighting creates the entry with `initial_price = price` and
    /// returns `false`.
    pub fn update(&mut self, id: &str, name: &str, price: f64, now: DateTime<Utc>) -> bool {
        self.dirty = true;
        let sample = PriceSample {
            price,
            timestamp: now,
        };

        let Some(entry) = self.entries.get_mut(id) else {
            tracing::info!(product_id = %id, %name, price, "New product tracked");
            self.entries.insert(
                id.to_string(),
                PriceHistoryEntry {
                    name: name.to_string(),
                    initial_price: price,
                    price_samples: vec![sample],
                    recently_reduced: false,
                    reduction_from_initial_pct: 0.0,
                },
            );
            return false;
        };

        entry.price_samples.push(sample);
        let overflow = entry
            .price_samples
            .len()
            .saturating_sub(self.policy.capacity);
        if overflow > 0 {
            entry.price_samples.drain(..overflow);
        }

        let initial = entry.initial_price;
        entry.reduction_from_initial_pct = if initial > 0.0 {
            (initial - price) / initial * 100.0
        } else {
            0.0
        };

        let samples = &entry.price_samples;
        let recent_drop = samples.len() >= 3 && {
            let last_three = &samples[samples.len() - 3..];
            last_three[2].price < last_three[0].price
        };

        entry.recently_reduced =
            entry.reduction_from_initial_pct >= self.policy.reduction_threshold_pct || recent_drop;
        if entry.recently_reduced {
            tracing::info!(
                product_id = %id,
                initial_price = initial,
                current_price = price,
                reduction_pct = entry.reduction_from_initial_pct,
                "Recently reduced"
            );
        }
        entry.recently_reduced
    }

    pub fn recently_reduced_ids(&self) -> HashSet<String> {
        self.entries
            .iter()
            .filter(|(_, e)| e.recently_reduced)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&PriceHistoryEntry> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
}
