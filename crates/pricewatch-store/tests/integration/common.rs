use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use pricewatch_core::config::CategoryConfig;
use pricewatch_core::models::{
    ClassifiedEvent, EventKind, ProductRecord, ReportEntry, StockStatus, discount_pct,
};

/// Category whose state file lives in `dir`.
pub fn category_in(dir: &Path, name: &str) -> CategoryConfig {
    let slug = name.to_lowercase();
    CategoryConfig {
        name: name.to_string(),
        listing_url: format!("https://shop.example.com/browse/{slug}?sale=1"),
        min_discount_pct: 50.0,
        max_pages: 1,
        max_products_per_page: 192,
        state_file: dir.join(format!("{slug}_state.json")),
    }
}

pub fn record(id: &str, current: f64, original: f64) -> ProductRecord {
    ProductRecord {
        product_id: id.to_string(),
        base_product_id: id.to_string(),
        name: format!("Oak Shelf {id}"),
        url: format!("https://shop.example.com/oak-shelf/p{id}"),
        current_price: Some(current),
        original_price: Some(original),
        discount_pct: discount_pct(Some(current), Some(original)),
        stock_status: StockStatus::InStock,
        image_url: Some(format!("https://img.example.com/{id}.jpg")),
        sizes: vec!["One Size".to_string()],
        variant_names: vec![],
        category: "Furniture".to_string(),
        recently_reduced: false,
    }
}

pub fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

pub fn entry(id: &str, kind: EventKind, timestamp: DateTime<Utc>) -> ReportEntry {
    let event = ClassifiedEvent {
        record: record(id, 40.0, 100.0),
        kind,
    };
    ReportEntry::from_event(&event, timestamp)
}

pub fn report_path(dir: &Path) -> PathBuf {
    dir.join("reports").join("price_changes.csv")
}
