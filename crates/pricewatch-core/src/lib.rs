pub mod category_state;
pub mod classifier;
pub mod config;
pub mod dedup;
pub mod discovery;
pub mod error;
pub mod extract;
pub mod models;
pub mod orchestrator;
pub mod pacing;
pub mod price_history;
pub mod retry;
pub mod summary;
pub mod traits;
pub mod util;

#[cfg(test)]
pub(crate) mod testutil;

pub use category_state::{CategoryState, CategoryStateEntry};
pub use classifier::{Classification, ClassifierPolicy, EventClassifier, GuardTrip};
pub use config::{CategoryConfig, CrawlSettings, KeywordFilter, MonitorConfig};
pub use dedup::DeduplicationIndex;
pub use discovery::{CategoryDiscoverer, Discovery, DiscoveryStats};
pub use error::AppError;
pub use extract::{ExtractReport, ProductExtractor};
pub use models::{
    ClassifiedEvent, EventKind, PriceDirection, PricePair, ProductPage, ProductRecord,
    ReportEntry, StockStatus, VariantOffer,
};
pub use orchestrator::{CycleEvent, CycleReporter, CycleStage, Monitor, TracingCycleReporter};
pub use pacing::DelayRange;
pub use price_history::{HistoryPolicy, PriceHistory, PriceHistoryEntry, PriceSample};
pub use retry::{RetryPolicy, RetryingFetcher};
pub use summary::{CategoryReport, CycleSummary};
pub use traits::{EventLog, Fetcher, Notifier, NullNotifier, PageParser, StateStore};
