use std::fs;

use chrono::Utc;
use pricewatch_core::category_state::CategoryState;
use pricewatch_core::config::KeywordFilter;
use pricewatch_core::models::StockStatus;
use pricewatch_core::price_history::PriceHistory;
use pricewatch_core::traits::StateStore;
use pricewatch_store::{JsonStateStore, Storage, StoreConfig};

use crate::common::{at, category_in, record};

#[test]
fn missing_files_load_as_empty_state() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonStateStore::new(dir.path().join("price_history.json"));
    let furniture = category_in(dir.path(), "Furniture");

    assert!(store.load_history().unwrap().is_empty());
    assert!(store.load_category(&furniture).unwrap().is_empty());
}

#[test]
fn category_state_survives_a_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonStateStore::new(dir.path().join("price_history.json"));
    let furniture = category_in(dir.path(), "Furniture");

    let mut state = CategoryState::new();
    let first_seen = at(2026, 3, 1, 9);
    state.update_product(&record("111", 40.0, 100.0), first_seen, &KeywordFilter::default());
    store.save_category(&furniture, &state).unwrap();

    let loaded = store.load_category(&furniture).unwrap();
    let entry = loaded.get("111").unwrap();
    assert_eq!(entry.name, "Oak Shelf 111");
    assert_eq!(entry.latest_price, Some(40.0));
    assert_eq!(entry.original_price, Some(100.0));
    assert_eq!(entry.stock_status, StockStatus::InStock);
    assert_eq!(entry.first_seen, Some(first_seen));
    assert!(!loaded.is_dirty());
}

#[test]
fn corrupt_category_file_loads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonStateStore::new(dir.path().join("price_history.json"));
    let furniture = category_in(dir.path(), "Furniture");
    fs::write(&furniture.state_file, "{\"111\": {\"name\": ").unwrap();

    assert!(store.load_category(&furniture).unwrap().is_empty());
}

#[test]
fn lenient_category_records_are_coerced() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonStateStore::new(dir.path().join("price_history.json"));
    let furniture = category_in(dir.path(), "Furniture");
    fs::write(
        &furniture.state_file,
        r#"{
            "111": {"name": "Oak Shelf", "url": "https://shop.example.com/oak/p111",
                    "original_price": "100.00", "latest_price": "call us",
                    "stock_status": "In Stock"},
            "222": "not an object"
        }"#,
    )
    .unwrap();

    let state = store.load_category(&furniture).unwrap();
    assert_eq!(state.len(), 1);
    let entry = state.get("111").unwrap();
    assert_eq!(entry.original_price, Some(100.0));
    assert_eq!(entry.latest_price, None);
    assert!(!state.contains("222"));
}

#[test]
fn price_history_survives_a_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonStateStore::new(dir.path().join("nested").join("price_history.json"));

    let mut history = PriceHistory::new();
    let now = Utc::now();
    history.update("111", "Oak Shelf", 100.0, now);
    history.update("111", "Oak Shelf", 80.0, now);
    store.save_history(&history).unwrap();

    let loaded = store.load_history().unwrap();
    let entry = loaded.get("111").unwrap();
    assert_eq!(entry.initial_price, 100.0);
    assert_eq!(entry.price_samples.len(), 2);
    assert!(entry.recently_reduced);
    assert!(loaded.recently_reduced_ids().contains("111"));
}

#[test]
fn corrupt_history_file_loads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("price_history.json");
    fs::write(&path, "not json at all").unwrap();

    let store = JsonStateStore::new(&path);
    assert!(store.load_history().unwrap().is_empty());
}

#[test]
fn storage_creates_state_dir_and_vends_stores() {
    let dir = tempfile::tempdir().unwrap();
    let state_dir = dir.path().join("state");
    let storage = Storage::open(StoreConfig::new(&state_dir)).unwrap();

    assert!(state_dir.is_dir());
    assert_eq!(
        storage.state_store().history_path(),
        state_dir.join("price_history.json")
    );
    assert_eq!(
        storage.report_log().path(),
        state_dir.join("price_changes.csv")
    );
}
