use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::AppError;
use crate::pacing::DelayRange;

/// Name fragments that mark a product as out of scope for monitoring.
pub const DEFAULT_EXCLUDED_KEYWORDS: &[&str] = &[
    "kids", "baby", "bikini", "top", "bra", "hat", "bodysuit", "dress", "pyjama", "boys", "girls",
    "Knickers", "Blouse", "Cincher", "Children", "Swimsuit", "Skirt", "Briefs",
];

fn default_max_pages() -> u32 {
    3
}

fn default_max_products_per_page() -> usize {
    192
}

fn default_excluded_keywords() -> Vec<String> {
    DEFAULT_EXCLUDED_KEYWORDS
        .iter()
        .map(|k| k.to_string())
        .collect()
}

/// One monitored category listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub name: String,
    pub listing_url: String,
    pub min_discount_pct: f64,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_max_products_per_page")]
    pub max_products_per_page: usize,
    /// Path of the category state file. Relative paths are resolved
    /// against the state directory.
    pub state_file: PathBuf,
}

impl CategoryConfig {
    /// Filesystem-safe lowercase form of the category name.
    pub fn slug(&self) -> String {
        let mut slug = String::with_capacity(self.name.len());
        for c in self.name.chars() {
            if c.is_ascii_alphanumeric() {
                slug.push(c.to_ascii_lowercase());
            } else if !slug.ends_with('_') {
                slug.push('_');
            }
        }
        slug.trim_matches('_').to_string()
    }
}

/// Crawl tunables. Every field is optional in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlSettings {
    /// Courtesy delay before each listing request.
    pub listing_delay: DelayRange,
    pub max_chunks: u32,
    /// Hard cap on listing requests per category per cycle.
    pub max_listing_requests: u32,
    /// A chunk with fewer raw links than this ends the page.
    pub low_yield_threshold: usize,
    pub product_concurrency: usize,
    pub batch_size: usize,
    pub batch_pause: DelayRange,
    /// Delay inside each product task, after it is admitted.
    pub product_delay: DelayRange,
    pub category_pause: DelayRange,
    pub cycle_interval: DelayRange,
    pub restart_delay_secs: u64,
    pub fetch_retries: u32,
    pub fetch_backoff: DelayRange,
    pub request_timeout_secs: u64,
    pub dns_cache_ttl_secs: u64,
    pub pool_idle_timeout_secs: u64,
    pub history_capacity: usize,
    pub reduction_threshold_pct: f64,
    pub reduced_decay_hours: i64,
    pub guard_min_batch: usize,
    pub guard_new_ratio: f64,
    pub price_epsilon: f64,
    pub notify_pacing: DelayRange,
    pub status_every_cycles: u64,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            listing_delay: DelayRange::new(1.5, 2.5),
            max_chunks: 8,
            max_listing_requests: 50,
            low_yield_threshold: 10,
            product_concurrency: 10,
            batch_size: 10,
            batch_pause: DelayRange::new(0.3, 0.8),
            product_delay: DelayRange::new(0.1, 0.3),
            category_pause: DelayRange::new(30.0, 60.0),
            cycle_interval: DelayRange::new(6900.0, 7500.0),
            restart_delay_secs: 60,
            fetch_retries: 3,
            fetch_backoff: DelayRange::new(1.0, 2.0),
            request_timeout_secs: 10,
            dns_cache_ttl_secs: 300,
            pool_idle_timeout_secs: 60,
            history_capacity: 20,
            reduction_threshold_pct: 5.0,
            reduced_decay_hours: 168,
            guard_min_batch: 10,
            guard_new_ratio: 0.5,
            price_epsilon: 0.01,
            notify_pacing: DelayRange::new(1.0, 1.5),
            status_every_cycles: 3,
        }
    }
}

impl CrawlSettings {
    /// Same settings with every pacing range set to zero.
    pub fn without_delays(mut self) -> Self {
        self.listing_delay = DelayRange::ZERO;
        self.batch_pause = DelayRange::ZERO;
        self.product_delay = DelayRange::ZERO;
        self.category_pause = DelayRange::ZERO;
        self.cycle_interval = DelayRange::ZERO;
        self.fetch_backoff = DelayRange::ZERO;
        self.notify_pacing = DelayRange::ZERO;
        self.restart_delay_secs = 0;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_secs(self.restart_delay_secs)
    }

    /// Idle keep-alive sockets kept per host, twice the product fetch
    /// concurrency. Caps idle connections only; in-flight product fetches
    /// are bounded by `product_concurrency`.
    pub fn pool_max_idle_per_host(&self) -> usize {
        self.product_concurrency.saturating_mul(2)
    }
}

/// Case-insensitive substring filter over product names.
#[derive(Debug, Clone, Default)]
pub struct KeywordFilter {
    keywords: Vec<String>,
}

impl KeywordFilter {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// First keyword contained in `name`, if any.
    pub fn matched(&self, name: &str) -> Option<&str> {
        let lower = name.to_lowercase();
        self.keywords
            .iter()
            .find(|k| lower.contains(k.as_str()))
            .map(String::as_str)
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.matched(name).is_some()
    }
}

/// Top-level monitor configuration, loaded from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub categories: Vec<CategoryConfig>,
    #[serde(default)]
    pub settings: CrawlSettings,
    #[serde(default = "default_excluded_keywords")]
    pub excluded_keywords: Vec<String>,
    #[serde(default)]
    pub debug_dir: Option<PathBuf>,
}

impl MonitorConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, AppError> {
        serde_json::from_str(raw)
            .map_err(|e| AppError::ConfigError(format!("Invalid monitor config: {e}")))
    }

    /// Read, parse and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(format!("Cannot read config '{}': {e}", path.display()))
        })?;
        let config = Self::from_json_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.categories.is_empty() {
            return Err(AppError::ConfigError(
                "At least one category must be configured".into(),
            ));
        }

        let mut names = HashSet::new();
        for category in &self.categories {
            if category.name.trim().is_empty() {
                return Err(AppError::ConfigError("Category name cannot be empty".into()));
            }
            if !names.insert(category.name.as_str()) {
                return Err(AppError::ConfigError(format!(
                    "Duplicate category name '{}'",
                    category.name
                )));
            }
            Url::parse(&category.listing_url).map_err(|e| {
                AppError::ConfigError(format!(
                    "Invalid listing_url for '{}': {e}",
                    category.name
                ))
            })?;
            if !(0.0..=100.0).contains(&category.min_discount_pct) {
                return Err(AppError::ConfigError(format!(
                    "min_discount_pct for '{}' must be between 0 and 100",
                    category.name
                )));
            }
            if category.max_pages == 0 {
                return Err(AppError::ConfigError(format!(
                    "max_pages for '{}' must be at least 1",
                    category.name
                )));
            }
        }

        let s = &self.settings;
        let ranges = [
            ("listing_delay", s.listing_delay),
            ("batch_pause", s.batch_pause),
            ("product_delay", s.product_delay),
            ("category_pause", s.category_pause),
            ("cycle_interval", s.cycle_interval),
            ("fetch_backoff", s.fetch_backoff),
            ("notify_pacing", s.notify_pacing),
        ];
        for (name, range) in ranges {
            if !range.is_valid() {
                return Err(AppError::ConfigError(format!(
                    "{name} must satisfy 0 <= min_secs <= max_secs"
                )));
            }
        }
        if s.product_concurrency == 0 || s.batch_size == 0 {
            return Err(AppError::ConfigError(
                "product_concurrency and batch_size must be at least 1".into(),
            ));
        }
        if s.max_chunks == 0 || s.max_listing_requests == 0 {
            return Err(AppError::ConfigError(
                "max_chunks and max_listing_requests must be at least 1".into(),
            ));
        }
        if s.history_capacity == 0 {
            return Err(AppError::ConfigError(
                "history_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Resolve relative `state_file` paths against `state_dir`.
    pub fn resolve_state_paths(&mut self, state_dir: &Path) {
        for category in &mut self.categories {
            if category.state_file.is_relative() {
                category.state_file = state_dir.join(&category.state_file);
            }
        }
    }

    pub fn keyword_filter(&self) -> KeywordFilter {
        KeywordFilter::new(&self.excluded_keywords)
    }
}
