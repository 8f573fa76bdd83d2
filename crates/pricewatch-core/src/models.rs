use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Size label used when a product page lists no size options.
pub const DEFAULT_SIZE: &str = "One Size";

/// Stock availability as last observed on a product page.
///
/// Persisted as the human-readable labels `"In Stock"`, `"Out of Stock"`
/// and `"Not listed"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StockStatus {
    InStock,
    OutOfStock,
    Unknown,
}

impl StockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::InStock => "In Stock",
            StockStatus::OutOfStock => "Out of Stock",
            StockStatus::Unknown => "Not listed",
        }
    }

    /// Map a schema.org availability value (e.g. `https://schema.org/InStock`).
    ///
    /// Anything that does not mention `InStock` counts as out of stock.
    pub fn from_availability(availability: &str) -> Self {
        if availability.contains("InStock") {
            StockStatus::InStock
        } else {
            StockStatus::OutOfStock
        }
    }

    /// Map a stock label, from a state file or a markup availability
    /// message. Only the exact labels (trimmed, any case) are recognised;
    /// other text such as "Out of stock online" is `Unknown` and is never
    /// pruned as out of stock.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        if label.eq_ignore_ascii_case(StockStatus::OutOfStock.as_str()) {
            StockStatus::OutOfStock
        } else if label.eq_ignore_ascii_case(StockStatus::InStock.as_str()) {
            StockStatus::InStock
        } else {
            StockStatus::Unknown
        }
    }
}

impl fmt::Display for StockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for StockStatus {
    fn from(s: String) -> Self {
        StockStatus::from_label(&s)
    }
}

impl From<StockStatus> for String {
    fn from(status: StockStatus) -> Self {
        status.as_str().to_string()
    }
}

/// Discount percentage of `current` relative to `original`.
///
/// Only computed when `original > current > 0`; every other combination,
/// including a missing price, yields `0.0`.
pub fn discount_pct(current: Option<f64>, original: Option<f64>) -> f64 {
    match (current, original) {
        (Some(current), Some(original)) if original > current && current > 0.0 => {
            (original - current) / original * 100.0
        }
        _ => 0.0,
    }
}

/// A current/original price pair as found on a page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PricePair {
    pub current: Option<f64>,
    pub original: Option<f64>,
}

impl PricePair {
    pub fn new(current: Option<f64>, original: Option<f64>) -> Self {
        Self { current, original }
    }

    pub fn discount_pct(&self) -> f64 {
        discount_pct(self.current, self.original)
    }
}

/// One colour/style option of a product page with its own prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantOffer {
    pub name: String,
    pub price: PricePair,
}

/// Raw fields parsed from one product page, before any filtering.
///
/// Produced by a [`PageParser`](crate::traits::PageParser); the extraction
/// contract (exclusion, thresholds, id synthesis) is applied on top of it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductPage {
    pub name: Option<String>,
    pub stock_status: Option<StockStatus>,
    pub image_url: Option<String>,
    pub sizes: Vec<String>,
    /// Every variant found, qualifying or not.
    pub variants: Vec<VariantOffer>,
    /// Colour option labels shown on the page, for display only.
    pub variant_labels: Vec<String>,
    /// Single price pair for pages without qualifying variants.
    pub price: PricePair,
}

/// A normalized product (or product variant) observed during one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub product_id: String,
    pub base_product_id: String,
    pub name: String,
    pub url: String,
    pub current_price: Option<f64>,
    pub original_price: Option<f64>,
    pub discount_pct: f64,
    pub stock_status: StockStatus,
    pub image_url: Option<String>,
    pub sizes: Vec<String>,
    pub variant_names: Vec<String>,
    pub category: String,
    pub recently_reduced: bool,
}

/// Direction of a price change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceDirection {
    Increased,
    Decreased,
}

impl PriceDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceDirection::Increased => "increased",
            PriceDirection::Decreased => "decreased",
        }
    }
}

impl fmt::Display for PriceDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a record is being reported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    New,
    PriceChange { previous_price: f64, delta: f64 },
}

impl EventKind {
    /// Stable label used in the report log.
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::New => "new",
            EventKind::PriceChange { .. } => "price_change",
        }
    }

    pub fn direction(&self) -> Option<PriceDirection> {
        match self {
            EventKind::New => None,
            EventKind::PriceChange { delta, .. } if *delta > 0.0 => Some(PriceDirection::Increased),
            EventKind::PriceChange { .. } => Some(PriceDirection::Decreased),
        }
    }
}

/// A record paired with the event it triggered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedEvent {
    pub record: ProductRecord,
    pub kind: EventKind,
}

/// One row of the append-only report/audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub product_id: String,
    pub name: String,
    pub current_price: Option<f64>,
    pub original_price: Option<f64>,
    pub discount_pct: f64,
    pub stock_status: StockStatus,
    pub sizes: Vec<String>,
    pub url: String,
    pub event_kind: String,
    pub timestamp: DateTime<Utc>,
    pub image_url: Option<String>,
    pub category: String,
    pub variant_names: Vec<String>,
}

impl ReportEntry {
    pub fn from_event(event: &ClassifiedEvent, timestamp: DateTime<Utc>) -> Self {
        let record = &event.record;
        Self {
            product_id: record.product_id.clone(),
            name: record.name.clone(),
            current_price: record.current_price,
            original_price: record.original_price,
            discount_pct: record.discount_pct,
            stock_status: record.stock_status,
            sizes: record.sizes.clone(),
            url: record.url.clone(),
            event_kind: event.kind.label().to_string(),
            timestamp,
            image_url: record.image_url.clone(),
            category: record.category.clone(),
            variant_names: record.variant_names.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discount_requires_original_above_current_above_zero() {
        assert!((discount_pct(Some(50.0), Some(100.0)) - 50.0).abs() < 1e-9);
        assert_eq!(discount_pct(Some(100.0), Some(50.0)), 0.0);
        assert_eq!(discount_pct(Some(0.0), Some(50.0)), 0.0);
        assert_eq!(discount_pct(None, Some(50.0)), 0.0);
        assert_eq!(discount_pct(Some(10.0), None), 0.0);
        assert_eq!(discount_pct(Some(10.0), Some(10.0)), 0.0);
    }

    #[test]
    fn test_stock_status_from_availability() {
        assert_eq!(
            StockStatus::from_availability("https://schema.org/InStock"),
            StockStatus::InStock
        );
        assert_eq!(
            StockStatus::from_availability("https://schema.org/OutOfStock"),
            StockStatus::OutOfStock
        );
        assert_eq!(
            StockStatus::from_availability("PreOrder"),
            StockStatus::OutOfStock
        );
    }

    #[test]
    fn test_stock_status_serde_uses_labels() {
        let json = serde_json::to_string(&StockStatus::OutOfStock).unwrap();
        assert_eq!(json, "\"Out of Stock\"");

        let parsed: StockStatus = serde_json::from_str("\"In Stock\"").unwrap();
        assert_eq!(parsed, StockStatus::InStock);

        let parsed: StockStatus = serde_json::from_str("\"Only 2 left\"").unwrap();
        assert_eq!(parsed, StockStatus::Unknown);
    }

    #[test]
    fn test_from_label_matches_exact_labels_only() {
        assert_eq!(StockStatus::from_label(" out of stock "), StockStatus::OutOfStock);
        assert_eq!(StockStatus::from_label("IN STOCK"), StockStatus::InStock);
        assert_eq!(StockStatus::from_label("Out of stock online"), StockStatus::Unknown);
        assert_eq!(StockStatus::from_label("Sold out"), StockStatus::Unknown);
        assert_eq!(StockStatus::from_label("Not listed"), StockStatus::Unknown);
    }

    #[test]
    fn test_event_kind_direction() {
        assert_eq!(EventKind::New.direction(), None);
        let up = EventKind::PriceChange {
            previous_price: 10.0,
            delta: 2.5,
        };
        assert_eq!(up.direction(), Some(PriceDirection::Increased));
        let down = EventKind::PriceChange {
            previous_price: 50.0,
            delta: -5.0,
        };
        assert_eq!(down.direction(), Some(PriceDirection::Decreased));
        assert_eq!(down.label(), "price_change");
    }
}
