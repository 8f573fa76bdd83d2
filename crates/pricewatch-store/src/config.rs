use std::path::{Path, PathBuf};

const DEFAULT_STATE_DIR: &str = "state";
const HISTORY_FILE: &str = "price_history.json";
const REPORT_FILE: &str = "price_changes.csv";

/// Locations of the files the monitor persists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Directory holding the history file and relative category state files.
    pub state_dir: PathBuf,
    pub history_file: PathBuf,
    pub report_file: PathBuf,
}

impl StoreConfig {
    /// Default file names inside `state_dir`.
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        let state_dir = state_dir.into();
        Self {
            history_file: state_dir.join(HISTORY_FILE),
            report_file: state_dir.join(REPORT_FILE),
            state_dir,
        }
    }

    pub fn with_report_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_file = path.into();
        self
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(DEFAULT_STATE_DIR)
    }
}
