use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use csv::{QuoteStyle, ReaderBuilder, StringRecord, WriterBuilder};
use pricewatch_core::error::AppError;
use pricewatch_core::models::ReportEntry;
use pricewatch_core::traits::EventLog;

use crate::state_repository::write_atomic;

/// Column headers of the report file, in order.
pub const HEADERS: [&str; 13] = [
    "Product ID",
    "Product Name",
    "Current Price",
    "Original Price",
    "Discount",
    "Stock Status",
    "Sizes",
    "URL",
    "Event Type",
    "Timestamp",
    "Image",
    "Category",
    "Variants",
];

/// Timestamp format of the `Timestamp` column (UTC).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const MAX_SIZES: usize = 10;
const MAX_VARIANTS: usize = 5;

const COL_PRODUCT_ID: usize = 0;
const COL_EVENT_TYPE: usize = 8;
const COL_TIMESTAMP: usize = 9;

/// Append-only CSV audit log of delivered notifications.
///
/// Every field is quoted. The header is written when the file is new or
/// empty.
#[derive(Debug, Clone)]
pub struct CsvReportLog {
    path: PathBuf,
}

impl CsvReportLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All data rows, header excluded. A missing file has no rows.
    pub fn rows(&self) -> Result<Vec<StringRecord>, AppError> {
        let Some(file) = self.open_existing()? else {
            return Ok(Vec::new());
        };
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);
        let mut rows = Vec::new();
        for record in reader.records() {
            match record {
                Ok(record) => rows.push(record),
                Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "Skipping malformed report row"),
            }
        }
        Ok(rows)
    }

    fn open_existing(&self) -> Result<Option<File>, AppError> {
        match File::open(&self.path) {
            Ok(file) => Ok(Some(file)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::StateError(format!(
                "Failed to open {}: {e}",
                self.path.display()
            ))),
        }
    }

    fn is_empty_or_missing(&self) -> bool {
        fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true)
    }
}

/// One report row as written to the file.
pub fn entry_row(entry: &ReportEntry) -> Vec<String> {
    vec![
        entry.product_id.clone(),
        entry.name.clone(),
        price_cell(entry.current_price),
        price_cell(entry.original_price),
        format!("{:.2}", entry.discount_pct),
        entry.stock_status.to_string(),
        join_first(&entry.sizes, MAX_SIZES),
        entry.url.clone(),
        event_type_cell(&entry.event_kind),
        entry.timestamp.format(TIMESTAMP_FORMAT).to_string(),
        entry.image_url.clone().unwrap_or_default(),
        entry.category.clone(),
        join_first(&entry.variant_names, MAX_VARIANTS),
    ]
}

fn price_cell(price: Option<f64>) -> String {
    match price {
        Some(p) if p > 0.0 => format!("{p:.2}"),
        _ => "N/A".to_string(),
    }
}

fn join_first(items: &[String], max: usize) -> String {
    items.iter().take(max).cloned().collect::<Vec<_>>().join(", ")
}

/// `"price_change"` → `"Price_change"`.
fn event_type_cell(kind: &str) -> String {
    let mut chars = kind.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn row_date(record: &StringRecord) -> Option<NaiveDate> {
    let raw = record.get(COL_TIMESTAMP)?;
    NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
        .ok()
        .map(|ts| ts.date())
}

fn csv_error(path: &Path, e: csv::Error) -> AppError {
    AppError::StateError(format!("CSV error in {}: {e}", path.display()))
}

impl EventLog for CsvReportLog {
    fn append(&self, entry: &ReportEntry) -> Result<(), AppError> {
        let write_header = self.is_empty_or_missing();
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                AppError::StateError(format!("Failed to open {}: {e}", self.path.display()))
            })?;

        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            .from_writer(file);
        if write_header {
            writer
                .write_record(HEADERS)
                .map_err(|e| csv_error(&self.path, e))?;
        }
        writer
            .write_record(entry_row(entry))
            .map_err(|e| csv_error(&self.path, e))?;
        writer.flush()?;

        tracing::debug!(product_id = %entry.product_id, event = %entry.event_kind, "Report row appended");
        Ok(())
    }

    fn contains_on(
        &self,
        product_id: &str,
        event_kind: &str,
        date: NaiveDate,
    ) -> Result<bool, AppError> {
        Ok(self.rows()?.iter().any(|row| {
            row.get(COL_PRODUCT_ID) == Some(product_id)
                && row
                    .get(COL_EVENT_TYPE)
                    .is_some_and(|kind| kind.eq_ignore_ascii_case(event_kind))
                && row_date(row) == Some(date)
        }))
    }

    fn retain_products(&self, ids: &HashSet<String>) -> Result<usize, AppError> {
        let rows = self.rows()?;
        if rows.is_empty() {
            return Ok(0);
        }
        let before = rows.len();
        let kept: Vec<&StringRecord> = rows
            .iter()
            .filter(|row| row.get(COL_PRODUCT_ID).is_some_and(|id| ids.contains(id)))
            .collect();
        let removed = before - kept.len();
        if removed == 0 {
            return Ok(0);
        }

        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            .from_writer(Vec::new());
        writer
            .write_record(HEADERS)
            .map_err(|e| csv_error(&self.path, e))?;
        for row in kept {
            writer
                .write_record(row)
                .map_err(|e| csv_error(&self.path, e))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| AppError::StateError(format!("CSV buffer error: {e}")))?;
        let contents = String::from_utf8(bytes)
            .map_err(|e| AppError::StateError(format!("CSV buffer is not UTF-8: {e}")))?;
        write_atomic(&self.path, &contents)?;

        tracing::info!(path = %self.path.display(), removed, "Report rows for unseen products removed");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_cell_capitalizes_first_letter() {
        assert_eq!(event_type_cell("new"), "New");
        assert_eq!(event_type_cell("price_change"), "Price_change");
        assert_eq!(event_type_cell(""), "");
    }

    #[test]
    fn test_price_cell() {
        assert_eq!(price_cell(Some(12.5)), "12.50");
        assert_eq!(price_cell(Some(0.0)), "N/A");
        assert_eq!(price_cell(None), "N/A");
    }

    #[test]
    fn test_join_first_caps_items() {
        let items: Vec<String> = (1..=12).map(|i| i.to_string()).collect();
        assert_eq!(join_first(&items, 3), "1, 2, 3");
        assert_eq!(join_first(&[], 3), "");
    }
}
