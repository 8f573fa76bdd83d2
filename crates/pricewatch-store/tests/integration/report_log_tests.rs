use std::collections::HashSet;
use std::fs;

use pricewatch_core::models::EventKind;
use pricewatch_core::traits::EventLog;
use pricewatch_store::CsvReportLog;
use pricewatch_store::report_log::HEADERS;

use crate::common::{at, entry, report_path};

fn change() -> EventKind {
    EventKind::PriceChange {
        previous_price: 50.0,
        delta: -10.0,
    }
}

#[test]
fn append_writes_header_once_and_quotes_every_field() {
    let dir = tempfile::tempdir().unwrap();
    let log = CsvReportLog::new(report_path(dir.path()));

    log.append(&entry("111", EventKind::New, at(2026, 3, 1, 9)))
        .unwrap();
    log.append(&entry("222", change(), at(2026, 3, 1, 10)))
        .unwrap();

    let raw = fs::read_to_string(log.path()).unwrap();
    let lines: Vec<&str> = raw.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("\"Product ID\",\"Product Name\""));
    assert_eq!(raw.matches("\"Product ID\"").count(), 1);
    assert!(lines[1].starts_with("\"111\",\"Oak Shelf 111\",\"40.00\",\"100.00\",\"60.00\",\"In Stock\""));
    assert!(lines[1].contains("\"New\",\"2026-03-01 09:00:00\""));
    assert!(lines[2].contains("\"Price_change\""));

    let rows = log.rows().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].len(), HEADERS.len());
}

#[test]
fn sizes_and_variants_are_capped() {
    let dir = tempfile::tempdir().unwrap();
    let log = CsvReportLog::new(report_path(dir.path()));
    let mut row = entry("111", EventKind::New, at(2026, 3, 1, 9));
    row.sizes = (1..=12).map(|i| format!("S{i}")).collect();
    row.variant_names = (1..=8).map(|i| format!("V{i}")).collect();
    row.current_price = None;
    log.append(&row).unwrap();

    let rows = log.rows().unwrap();
    assert_eq!(&rows[0][2], "N/A");
    assert_eq!(&rows[0][6], "S1, S2, S3, S4, S5, S6, S7, S8, S9, S10");
    assert_eq!(&rows[0][12], "V1, V2, V3, V4, V5");
}

#[test]
fn contains_on_matches_id_kind_and_day() {
    let dir = tempfile::tempdir().unwrap();
    let log = CsvReportLog::new(report_path(dir.path()));
    log.append(&entry("111", EventKind::New, at(2026, 3, 1, 23)))
        .unwrap();

    let day = at(2026, 3, 1, 0).date_naive();
    let next_day = at(2026, 3, 2, 0).date_naive();
    assert!(log.contains_on("111", "new", day).unwrap());
    assert!(log.contains_on("111", "NEW", day).unwrap());
    assert!(!log.contains_on("111", "price_change", day).unwrap());
    assert!(!log.contains_on("111", "new", next_day).unwrap());
    assert!(!log.contains_on("222", "new", day).unwrap());
}

#[test]
fn contains_on_missing_file_is_false() {
    let dir = tempfile::tempdir().unwrap();
    let log = CsvReportLog::new(report_path(dir.path()));
    assert!(!log.contains_on("111", "new", at(2026, 3, 1, 0).date_naive()).unwrap());
}

#[test]
fn retain_products_drops_unseen_rows() {
    let dir = tempfile::tempdir().unwrap();
    let log = CsvReportLog::new(report_path(dir.path()));
    for id in ["111", "222", "333"] {
        log.append(&entry(id, EventKind::New, at(2026, 3, 1, 9)))
            .unwrap();
    }

    let keep: HashSet<String> = ["111".to_string(), "333".to_string()].into();
    assert_eq!(log.retain_products(&keep).unwrap(), 1);

    let ids: Vec<String> = log.rows().unwrap().iter().map(|r| r[0].to_string()).collect();
    assert_eq!(ids, vec!["111".to_string(), "333".to_string()]);

    // Rows appended after a rewrite do not repeat the header.
    log.append(&entry("444", change(), at(2026, 3, 2, 9))).unwrap();
    let raw = fs::read_to_string(log.path()).unwrap();
    assert_eq!(raw.matches("\"Product ID\"").count(), 1);
    assert_eq!(log.rows().unwrap().len(), 3);
}

#[test]
fn retain_products_without_file_removes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let log = CsvReportLog::new(report_path(dir.path()));
    assert_eq!(log.retain_products(&HashSet::new()).unwrap(), 0);
    assert!(!log.path().exists());
}
