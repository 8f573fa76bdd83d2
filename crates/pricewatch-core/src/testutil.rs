//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use url::Url;

use crate::category_state::CategoryState;
use crate::config::CategoryConfig;
use crate::error::AppError;
use crate::models::{
    ClassifiedEvent, DEFAULT_SIZE, EventKind, ProductPage, ProductRecord, ReportEntry, StockStatus,
    discount_pct,
};
use crate::orchestrator::{CycleEvent, CycleReporter};
use crate::price_history::PriceHistory;
use crate::traits::{EventLog, Fetcher, Notifier, PageParser, StateStore};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Category with a listing URL on a fake host and a single page.
pub fn test_category(name: &str) -> CategoryConfig {
    let slug = name.to_lowercase().replace(' ', "_");
    CategoryConfig {
        name: name.to_string(),
        listing_url: format!("https://shop.example.com/browse/{slug}"),
        min_discount_pct: 50.0,
        max_pages: 1,
        max_products_per_page: 192,
        state_file: PathBuf::from(format!("{slug}_state.json")),
    }
}

/// In-stock record named `Product <id>`.
pub fn sample_record(id: &str, current: f64, original: Option<f64>) -> ProductRecord {
    ProductRecord {
        product_id: id.to_string(),
        base_product_id: id.to_string(),
        name: format!("Product {id}"),
        url: format!("https://shop.example.com/item/p{id}"),
        current_price: Some(current),
        original_price: original,
        discount_pct: discount_pct(Some(current), original),
        stock_status: StockStatus::InStock,
        image_url: None,
        sizes: vec![DEFAULT_SIZE.to_string()],
        variant_names: vec![],
        category: "Furniture".to_string(),
        recently_reduced: false,
    }
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher with per-URL routes and a fallback response queue.
#[derive(Clone)]
pub struct MockFetcher {
    /// Exact-URL bodies, checked first.
    routes: Arc<Mutex<HashMap<String, String>>>,
    /// Queue of responses. Each unrouted call pops the first element.
    /// If empty, returns a default HTML string.
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    requested: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new(html: &str) -> Self {
        Self::with_responses(vec![Ok(html.to_string())])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            routes: Arc::new(Mutex::new(HashMap::new())),
            responses: Arc::new(Mutex::new(responses)),
            requested: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_route(self, url: &str, body: &str) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), body.to_string());
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requested.lock().unwrap().len()
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        self.requested.lock().unwrap().push(url.to_string());
        if let Some(body) = self.routes.lock().unwrap().get(url) {
            return Ok(body.clone());
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok("<html><body>default</body></html>".to_string())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// InFlightFetcher
// ---------------------------------------------------------------------------

/// Fetcher that holds each request open for `hold` and records the highest
/// number of requests in flight at once.
#[derive(Clone)]
pub struct InFlightFetcher {
    hold: Duration,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

impl InFlightFetcher {
    pub fn new(hold: Duration) -> Self {
        Self {
            hold,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Fetcher for InFlightFetcher {
    async fn fetch(&self, _url: &str) -> Result<String, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.hold).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok("<html><body>product</body></html>".to_string())
    }
}

// ---------------------------------------------------------------------------
// MockParser
// ---------------------------------------------------------------------------

/// Mock parser keyed by page body, with fallback queues.
#[derive(Clone, Default)]
pub struct MockParser {
    listings_by_body: Arc<Mutex<HashMap<String, Vec<String>>>>,
    listings: Arc<Mutex<Vec<Vec<String>>>>,
    pages_by_body: Arc<Mutex<HashMap<String, ProductPage>>>,
    products: Arc<Mutex<Vec<Result<ProductPage, AppError>>>>,
}

impl MockParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Links returned by successive unkeyed `parse_listing` calls.
    pub fn with_listings(self, listings: Vec<Vec<String>>) -> Self {
        *self.listings.lock().unwrap() = listings;
        self
    }

    pub fn with_listing_for(self, body: &str, links: Vec<String>) -> Self {
        self.listings_by_body
            .lock()
            .unwrap()
            .insert(body.to_string(), links);
        self
    }

    /// Pages returned by successive unkeyed `parse_product` calls.
    pub fn with_products(self, products: Vec<Result<ProductPage, AppError>>) -> Self {
        *self.products.lock().unwrap() = products;
        self
    }

    pub fn with_page_for(self, body: &str, page: ProductPage) -> Self {
        self.pages_by_body
            .lock()
            .unwrap()
            .insert(body.to_string(), page);
        self
    }
}

impl PageParser for MockParser {
    fn parse_listing(&self, html: &str, _base: &Url) -> Vec<String> {
        if let Some(links) = self.listings_by_body.lock().unwrap().get(html) {
            return links.clone();
        }
        let mut listings = self.listings.lock().unwrap();
        if listings.is_empty() {
            Vec::new()
        } else {
            listings.remove(0)
        }
    }

    fn parse_product(&self, html: &str) -> Result<ProductPage, AppError> {
        if let Some(page) = self.pages_by_body.lock().unwrap().get(html) {
            return Ok(page.clone());
        }
        let mut products = self.products.lock().unwrap();
        if products.is_empty() {
            Ok(ProductPage::default())
        } else {
            products.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockStateStore
// ---------------------------------------------------------------------------

/// In-memory state store keyed by category name.
#[derive(Clone, Default)]
pub struct MockStateStore {
    history: Arc<Mutex<PriceHistory>>,
    categories: Arc<Mutex<HashMap<String, CategoryState>>>,
    history_saves: Arc<Mutex<usize>>,
    failing_history_loads: Arc<Mutex<usize>>,
}

impl MockStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` history loads fail with a state error.
    pub fn failing_history_loads(self, n: usize) -> Self {
        *self.failing_history_loads.lock().unwrap() = n;
        self
    }

    pub fn put_history(&self, history: PriceHistory) {
        *self.history.lock().unwrap() = history;
    }

    pub fn put_category(&self, name: &str, state: CategoryState) {
        self.categories
            .lock()
            .unwrap()
            .insert(name.to_string(), state);
    }

    pub fn category_state(&self, name: &str) -> Option<CategoryState> {
        self.categories.lock().unwrap().get(name).cloned()
    }

    pub fn history_saves(&self) -> usize {
        *self.history_saves.lock().unwrap()
    }
}

impl StateStore for MockStateStore {
    fn load_history(&self) -> Result<PriceHistory, AppError> {
        let mut failing = self.failing_history_loads.lock().unwrap();
        if *failing > 0 {
            *failing -= 1;
            return Err(AppError::StateError("history file unreadable".into()));
        }
        Ok(self.history.lock().unwrap().clone())
    }

    fn save_history(&self, history: &PriceHistory) -> Result<(), AppError> {
        *self.history.lock().unwrap() = history.clone();
        *self.history_saves.lock().unwrap() += 1;
        Ok(())
    }

    fn load_category(&self, category: &CategoryConfig) -> Result<CategoryState, AppError> {
        Ok(self.category_state(&category.name).unwrap_or_default())
    }

    fn save_category(
        &self,
        category: &CategoryConfig,
        state: &CategoryState,
    ) -> Result<(), AppError> {
        self.put_category(&category.name, state.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockEventLog
// ---------------------------------------------------------------------------

/// In-memory event log.
#[derive(Clone, Default)]
pub struct MockEventLog {
    entries: Arc<Mutex<Vec<ReportEntry>>>,
    lookups: Arc<Mutex<Vec<(String, NaiveDate)>>>,
    retain_calls: Arc<Mutex<usize>>,
}

impl MockEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend `product_id` was already logged today with `event_kind`.
    pub fn seed_today(&self, product_id: &str, event_kind: &str) {
        let event = ClassifiedEvent {
            record: sample_record(product_id, 10.0, None),
            kind: EventKind::New,
        };
        let mut entry = ReportEntry::from_event(&event, Utc::now());
        entry.event_kind = event_kind.to_string();
        self.entries.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<ReportEntry> {
        self.entries.lock().unwrap().clone()
    }

    /// `(product_id, date)` of every `contains_on` call, in order.
    pub fn lookups(&self) -> Vec<(String, NaiveDate)> {
        self.lookups.lock().unwrap().clone()
    }

    pub fn retain_calls(&self) -> usize {
        *self.retain_calls.lock().unwrap()
    }
}

impl EventLog for MockEventLog {
    fn append(&self, entry: &ReportEntry) -> Result<(), AppError> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }

    fn contains_on(
        &self,
        product_id: &str,
        event_kind: &str,
        date: NaiveDate,
    ) -> Result<bool, AppError> {
        self.lookups
            .lock()
            .unwrap()
            .push((product_id.to_string(), date));
        Ok(self.entries.lock().unwrap().iter().any(|e| {
            e.product_id == product_id
                && e.event_kind.eq_ignore_ascii_case(event_kind)
                && e.timestamp.date_naive() == date
        }))
    }

    fn retain_products(&self, ids: &HashSet<String>) -> Result<usize, AppError> {
        *self.retain_calls.lock().unwrap() += 1;
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|e| ids.contains(&e.product_id));
        Ok(before - entries.len())
    }
}

// ---------------------------------------------------------------------------
// MockNotifier
// ---------------------------------------------------------------------------

/// Notifier that records deliveries and can fail for chosen product ids.
#[derive(Clone, Default)]
pub struct MockNotifier {
    sent: Arc<Mutex<Vec<ClassifiedEvent>>>,
    statuses: Arc<Mutex<Vec<String>>>,
    failing_ids: Arc<Mutex<HashSet<String>>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(self, product_id: &str) -> Self {
        self.failing_ids
            .lock()
            .unwrap()
            .insert(product_id.to_string());
        self
    }

    pub fn sent(&self) -> Vec<ClassifiedEvent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_ids(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.record.product_id.clone())
            .collect()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.statuses.lock().unwrap().clone()
    }
}

impl Notifier for MockNotifier {
    async fn notify_event(&self, event: &ClassifiedEvent) -> Result<(), AppError> {
        if self
            .failing_ids
            .lock()
            .unwrap()
            .contains(&event.record.product_id)
        {
            return Err(AppError::NotifyError("webhook rejected".into()));
        }
        self.sent.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn notify_status(&self, message: &str) -> Result<(), AppError> {
        self.statuses.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Reporter that records the names of received events.
#[derive(Clone, Default)]
pub struct MockReporter {
    events: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl CycleReporter for MockReporter {
    fn report(&self, event: CycleEvent<'_>) {
        let name = match event {
            CycleEvent::Started { .. } => "started",
            CycleEvent::CycleStarted { .. } => "cycle_started",
            CycleEvent::Stage { .. } => "stage",
            CycleEvent::GuardTripped { .. } => "guard_tripped",
            CycleEvent::NotificationFailed { .. } => "notification_failed",
            CycleEvent::CategoryCompleted { .. } => "category_completed",
            CycleEvent::CycleCompleted { .. } => "cycle_completed",
            CycleEvent::CycleFailed { .. } => "cycle_failed",
            CycleEvent::Sleeping { .. } => "sleeping",
            CycleEvent::ShuttingDown => "shutting_down",
            CycleEvent::Stopped => "stopped",
        };
        self.events.lock().unwrap().push(name.to_string());
    }
}
