//! Last-known product snapshots of one category.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::KeywordFilter;
use crate::error::AppError;
use crate::models::{ProductRecord, StockStatus};
use crate::util::{parse_timestamp, value_as_f64};

/// How long a price drop keeps an entry flagged as recently reduced.
pub const DEFAULT_REDUCED_DECAY_HOURS: i64 = 168;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStateEntry {
    pub name: String,
    pub url: String,
    pub original_price: Option<f64>,
    pub latest_price: Option<f64>,
    pub stock_status: StockStatus,
    /// Set on first sighting in this category and never changed.
    pub first_seen: Option<DateTime<Utc>>,
    pub recently_reduced: bool,
    pub reduced_timestamp: Option<DateTime<Utc>>,
}

impl CategoryStateEntry {
    fn from_value(id: &str, value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let text = |key: &str, default: &str| {
            obj.get(key)
                .and_then(Value::as_str)
                .unwrap_or(default)
                .to_string()
        };
        let timestamp = |key: &str| {
            let raw = obj.get(key).and_then(Value::as_str)?;
            let parsed = parse_timestamp(raw);
            if parsed.is_none() {
                tracing::warn!(product_id = %id, field = key, value = raw, "Unreadable timestamp in category state, ignoring it");
            }
            parsed
        };

        Some(Self {
            name: text("name", "Unknown"),
            url: text("url", "Unknown"),
            original_price: obj.get("original_price").and_then(value_as_f64),
            latest_price: obj.get("latest_price").and_then(value_as_f64),
            stock_status: obj
                .get("stock_status")
                .and_then(Value::as_str)
                .map(StockStatus::from_label)
                .unwrap_or(StockStatus::Unknown),
            first_seen: timestamp("first_seen"),
            recently_reduced: obj
                .get("recently_reduced")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            reduced_timestamp: timestamp("reduced_timestamp"),
        })
    }
}

/// In-memory state session for one category, with a dirty flag.
#[derive(Debug, Clone)]
pub struct CategoryState {
    entries: BTreeMap<String, CategoryStateEntry>,
    reduced_decay: TimeDelta,
    dirty: bool,
}

impl Default for CategoryState {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            reduced_decay: TimeDelta::hours(DEFAULT_REDUCED_DECAY_HOURS),
            dirty: false,
        }
    }
}

impl CategoryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a parsed state file. Non-numeric prices become `None`,
    /// records that are not objects are skipped.
    pub fn from_value(value: &Value) -> Self {
        let entries = value
            .as_object()
            .map(|map| {
                map.iter()
                    .filter_map(|(id, v)| {
                        CategoryStateEntry::from_value(id, v).map(|e| (id.clone(), e))
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self {
            entries,
            ..Self::default()
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, AppError> {
        let value: Value = serde_json::from_str(raw)?;
        Ok(Self::from_value(&value))
    }

    pub fn to_json_pretty(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }

    pub fn set_reduced_decay(&mut self, decay: TimeDelta) {
        self.reduced_decay = decay;
    }

    /// Write the latest observation of `record`.
    ///
    /// Returns `false` without touching the state when the record's name
    /// matches an excluded keyword.
    pub fn update_product(
        &mut self,
        record: &ProductRecord,
        now: DateTime<Utc>,
        excluded: &KeywordFilter,
    ) -> bool {
        if excluded.is_excluded(&record.name) {
            return false;
        }

        let previous = self.entries.get(&record.product_id);
        let first_seen = previous.and_then(|p| p.first_seen).or(Some(now));

        let (recently_reduced, reduced_timestamp) = match previous {
            Some(prev) => match (prev.latest_price, record.current_price) {
                (Some(old), Some(new)) if new < old => (true, Some(now)),
                _ => match prev.reduced_timestamp {
                    Some(ts) if prev.recently_reduced && now - ts < self.reduced_decay => {
                        (true, Some(ts))
                    }
                    _ => (false, None),
                },
            },
            None => (false, None),
        };

        self.entries.insert(
            record.product_id.clone(),
            CategoryStateEntry {
                name: record.name.clone(),
                url: record.url.clone(),
                original_price: record.original_price,
                latest_price: record.current_price,
                stock_status: record.stock_status,
                first_seen,
                recently_reduced,
                reduced_timestamp,
            },
        );
        self.dirty = true;
        true
    }

    /// Remove entries absent from `current_ids` whose last known stock
    /// status is out of stock. Returns the removed ids.
    pub fn prune_stale(&mut self, current_ids: &HashSet<String>) -> Vec<String> {
        let stale: Vec<String> = self
            .entries
            .iter()
            .filter(|(id, e)| {
                !current_ids.contains(id.as_str()) && e.stock_status == StockStatus::OutOfStock
            })
            .map(|(id, _)| id.clone())
            .collect();
        for id in &stale {
            tracing::info!(product_id = %id, "Removing out of stock product");
            self.entries.remove(id);
        }
        if !stale.is_empty() {
            self.dirty = true;
        }
        stale
    }

    pub fn get(&self, id: &str) -> Option<&CategoryStateEntry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
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
