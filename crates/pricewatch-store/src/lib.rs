pub mod config;
pub mod files;
pub mod report_log;
pub mod state_repository;

pub use config::StoreConfig;
pub use files::Storage;
pub use report_log::CsvReportLog;
pub use state_repository::JsonStateStore;
