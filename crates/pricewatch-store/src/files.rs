use std::fs;

use pricewatch_core::AppError;

use crate::config::StoreConfig;
use crate::report_log::CsvReportLog;
use crate::state_repository::JsonStateStore;

/// Central storage facade: owns the file locations, prepares the state
/// directory, and vends the stores.
#[derive(Debug, Clone)]
pub struct Storage {
    config: StoreConfig,
}

impl Storage {
    /// Create the state directory if needed.
    pub fn open(config: StoreConfig) -> Result<Self, AppError> {
        fs::create_dir_all(&config.state_dir).map_err(|e| {
            AppError::StateError(format!(
                "Failed to create state directory {}: {e}",
                config.state_dir.display()
            ))
        })?;
        Ok(Self { config })
    }

    /// Get a [`JsonStateStore`] for the history and category files.
    pub fn state_store(&self) -> JsonStateStore {
        JsonStateStore::new(&self.config.history_file)
    }

    /// Get a [`CsvReportLog`] for the report file.
    pub fn report_log(&self) -> CsvReportLog {
        CsvReportLog::new(&self.config.report_file)
    }
}
