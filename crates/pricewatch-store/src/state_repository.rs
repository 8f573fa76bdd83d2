use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use pricewatch_core::category_state::CategoryState;
use pricewatch_core::config::CategoryConfig;
use pricewatch_core::error::AppError;
use pricewatch_core::price_history::PriceHistory;
use pricewatch_core::traits::StateStore;

/// JSON file persistence for price history and category state.
///
/// A missing file loads as an empty state. A file that is not valid JSON is
/// logged and also loads as empty.
/// Writes go to a temporary sibling first and are renamed into place.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    history_path: PathBuf,
}

impl JsonStateStore {
    pub fn new(history_path: impl Into<PathBuf>) -> Self {
        Self {
            history_path: history_path.into(),
        }
    }

    pub fn history_path(&self) -> &Path {
        &self.history_path
    }
}

impl StateStore for JsonStateStore {
    fn load_history(&self) -> Result<PriceHistory, AppError> {
        let Some(raw) = read_optional(&self.history_path)? else {
            return Ok(PriceHistory::new());
        };
        match PriceHistory::from_json_str(&raw) {
            Ok(history) => Ok(history),
            Err(e) => {
                tracing::warn!(path = %self.history_path.display(), error = %e, "Corrupt price history, starting empty");
                Ok(PriceHistory::new())
            }
        }
    }

    fn save_history(&self, history: &PriceHistory) -> Result<(), AppError> {
        write_atomic(&self.history_path, &history.to_json_pretty()?)?;
        tracing::debug!(path = %self.history_path.display(), entries = history.len(), "Price history saved");
        Ok(())
    }

    fn load_category(&self, category: &CategoryConfig) -> Result<CategoryState, AppError> {
        let path = &category.state_file;
        let Some(raw) = read_optional(path)? else {
            return Ok(CategoryState::new());
        };
        match CategoryState::from_json_str(&raw) {
            Ok(state) => Ok(state),
            Err(e) => {
                tracing::warn!(category = %category.name, path = %path.display(), error = %e, "Corrupt category state, starting empty");
                Ok(CategoryState::new())
            }
        }
    }

    fn save_category(
        &self,
        category: &CategoryConfig,
        state: &CategoryState,
    ) -> Result<(), AppError> {
        write_atomic(&category.state_file, &state.to_json_pretty()?)?;
        tracing::debug!(category = %category.name, entries = state.len(), "Category state saved");
        Ok(())
    }
}

/// File contents, or `None` when the file does not exist.
fn read_optional(path: &Path) -> Result<Option<String>, AppError> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AppError::StateError(format!(
            "Failed to read {}: {e}",
            path.display()
        ))),
    }
}

/// Replace `path` with `contents` through a temporary sibling file.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::StateError(format!("Failed to create {}: {e}", parent.display()))
        })?;
    }
    let tmp = tmp_path(path);
    fs::write(&tmp, contents)
        .map_err(|e| AppError::StateError(format!("Failed to write {}: {e}", tmp.display())))?;
    fs::rename(&tmp, path).map_err(|e| {
        AppError::StateError(format!("Failed to replace {}: {e}", path.display()))
    })
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
