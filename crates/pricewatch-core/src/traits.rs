use std::collections::HashSet;
use std::future::Future;

use chrono::NaiveDate;
use url::Url;

use crate::category_state::CategoryState;
use crate::config::CategoryConfig;
use crate::error::AppError;
use crate::models::{ClassifiedEvent, ProductPage, ReportEntry};
use crate::price_history::PriceHistory;

/// Fetches the raw body of a page.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Turns storefront markup into raw page data.
///
/// Implementations hold all site-specific selector knowledge; everything
/// downstream works on [`ProductPage`] and plain URLs.
pub trait PageParser: Send + Sync + Clone {
    /// Product links found on a category listing page, resolved against `base`.
    fn parse_listing(&self, html: &str, base: &Url) -> Vec<String>;

    /// All fields of a product page, variants included, before filtering.
    fn parse_product(&self, html: &str) -> Result<ProductPage, AppError>;
}

/// Loads and persists the two tiers of monitor state.
pub trait StateStore: Send + Sync + Clone {
    fn load_history(&self) -> Result<PriceHistory, AppError>;

    fn save_history(&self, history: &PriceHistory) -> Result<(), AppError>;

    /// Missing or corrupt files load as an empty state.
    fn load_category(&self, category: &CategoryConfig) -> Result<CategoryState, AppError>;

    fn save_category(&self, category: &CategoryConfig, state: &CategoryState)
    -> Result<(), AppError>;
}

/// Append-only audit log of emitted events.
pub trait EventLog: Send + Sync + Clone {
    fn append(&self, entry: &ReportEntry) -> Result<(), AppError>;

    /// Whether an entry for the same product and event kind was logged on `date`.
    fn contains_on(
        &self,
        product_id: &str,
        event_kind: &str,
        date: NaiveDate,
    ) -> Result<bool, AppError>;

    /// Drop every row whose product id is not in `ids`. Returns the number removed.
    fn retain_products(&self, ids: &HashSet<String>) -> Result<usize, AppError>;
}

/// Delivers event and status messages to humans.
pub trait Notifier: Send + Sync + Clone {
    fn notify_event(
        &self,
        event: &ClassifiedEvent,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    fn notify_status(&self, message: &str) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// A no-op Notifier for use when no delivery channel is configured.
#[derive(Debug, Clone)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    async fn notify_event(&self, _event: &ClassifiedEvent) -> Result<(), AppError> {
        Ok(())
    }

    async fn notify_status(&self, _message: &str) -> Result<(), AppError> {
        Ok(())
    }
}
