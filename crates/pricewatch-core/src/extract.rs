//! Product page extraction.
//!
//! Product pages are fetched concurrently, bounded by a counting semaphore
//! and grouped into fixed-size batches with a short randomized pause in
//! between. Price history is annotated afterwards, one record at a time,
//! so the history session only ever has a single writer.

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::Semaphore;

use crate::config::{CategoryConfig, CrawlSettings, KeywordFilter};
use crate::models::{DEFAULT_SIZE, ProductPage, ProductRecord, StockStatus};
use crate::pacing;
use crate::price_history::PriceHistory;
use crate::traits::{Fetcher, PageParser};
use crate::util::{extract_product_id, normalize_url, variant_id};

/// What became of one product URL.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractOutcome {
    Records(Vec<ProductRecord>),
    /// No product id could be read from the URL.
    InvalidUrl,
    FetchFailed,
    ParseFailed,
    /// The product name matched an excluded keyword.
    Excluded,
    /// Neither a variant nor the single price met the discount threshold.
    BelowThreshold,
}

/// Records and counters of one category's extraction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractReport {
    pub records: Vec<ProductRecord>,
    pub fetch_failures: usize,
    pub parse_failures: usize,
    pub excluded: usize,
    pub below_threshold: usize,
    pub invalid_urls: usize,
}

impl ExtractReport {
    fn absorb(&mut self, outcome: ExtractOutcome) {
        match outcome {
            ExtractOutcome::Records(records) => self.records.extend(records),
            ExtractOutcome::InvalidUrl => self.invalid_urls += 1,
            ExtractOutcome::FetchFailed => self.fetch_failures += 1,
            ExtractOutcome::ParseFailed => self.parse_failures += 1,
            ExtractOutcome::Excluded => self.excluded += 1,
            ExtractOutcome::BelowThreshold => self.below_threshold += 1,
        }
    }
}

/// Apply the extraction rules to a parsed page.
///
/// Qualifying variants (a current price and a discount of at least
/// `min_discount_pct`) become one record each. Without any, the page's
/// single price pair must meet the same threshold.
pub fn build_records(
    page: ProductPage,
    base_id: &str,
    url: &str,
    category: &CategoryConfig,
    excluded: &KeywordFilter,
) -> ExtractOutcome {
    let base_name = page
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "Unknown".to_string());

    if let Some(keyword) = excluded.matched(&base_name) {
        tracing::info!(name = %base_name, %keyword, "Excluded by keyword");
        return ExtractOutcome::Excluded;
    }

    let stock_status = page.stock_status.unwrap_or(StockStatus::Unknown);
    let sizes = if page.sizes.is_empty() {
        vec![DEFAULT_SIZE.to_string()]
    } else {
        page.sizes
    };

    let qualifying: Vec<_> = page
        .variants
        .into_iter()
        .filter(|v| {
            v.price.current.is_some_and(|p| p > 0.0)
                && v.price.discount_pct() >= category.min_discount_pct
        })
        .collect();

    if !qualifying.is_empty() {
        let variant_names: Vec<String> = qualifying.iter().map(|v| v.name.clone()).collect();
        let records = qualifying
            .into_iter()
            .map(|variant| ProductRecord {
                product_id: variant_id(base_id, &variant.name),
                base_product_id: base_id.to_string(),
                name: format!("{base_name} - {}", variant.name),
                url: url.to_string(),
                current_price: variant.price.current,
                original_price: variant.price.original,
                discount_pct: variant.price.discount_pct(),
                stock_status,
                image_url: page.image_url.clone(),
                sizes: sizes.clone(),
                variant_names: variant_names.clone(),
                category: category.name.clone(),
                recently_reduced: false,
            })
            .collect();
        return ExtractOutcome::Records(records);
    }

    let discount_pct = page.price.discount_pct();
    if discount_pct < category.min_discount_pct {
        tracing::debug!(name = %base_name, discount = discount_pct, "Below threshold");
        return ExtractOutcome::BelowThreshold;
    }

    ExtractOutcome::Records(vec![ProductRecord {
        product_id: base_id.to_string(),
        base_product_id: base_id.to_string(),
        name: base_name,
        url: url.to_string(),
        current_price: page.price.current,
        original_price: page.price.original,
        discount_pct,
        stock_status,
        image_url: page.image_url,
        sizes,
        variant_names: page.variant_labels,
        category: category.name.clone(),
        recently_reduced: false,
    }])
}

/// Fetches and parses product pages of one category.
#[derive(Debug, Clone)]
pub struct ProductExtractor<F, P> {
    fetcher: F,
    parser: P,
    settings: CrawlSettings,
    excluded: KeywordFilter,
}

impl<F: Fetcher, P: PageParser> ProductExtractor<F, P> {
    pub fn new(fetcher: F, parser: P, settings: CrawlSettings, excluded: KeywordFilter) -> Self {
        Self {
            fetcher,
            parser,
            settings,
            excluded,
        }
    }

    /// Extract one product URL. Never fails; problems become outcomes.
    pub async fn extract(&self, url: &str, category: &CategoryConfig) -> ExtractOutcome {
        let Some(base_id) = extract_product_id(&normalize_url(url)) else {
            return ExtractOutcome::InvalidUrl;
        };

        pacing::pause(self.settings.product_delay).await;

        let html = match self.fetcher.fetch(url).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(%url, error = %e, "Product fetch failed");
                return ExtractOutcome::FetchFailed;
            }
        };

        match self.parser.parse_product(&html) {
            Ok(page) => build_records(page, &base_id, url, category, &self.excluded),
            Err(e) => {
                tracing::error!(%url, error = %e, "Error parsing product page");
                ExtractOutcome::ParseFailed
            }
        }
    }

    /// Extract every URL of a category and annotate the records with their
    /// price history.
    pub async fn extract_all(
        &self,
        urls: &[String],
        category: &CategoryConfig,
        history: &mut PriceHistory,
    ) -> ExtractReport {
        let gate = Semaphore::new(self.settings.product_concurrency.max(1));
        let batch_size = self.settings.batch_size.max(1);
        let total = urls.len();
        let mut report = ExtractReport::default();

        for (index, batch) in urls.chunks(batch_size).enumerate() {
            let tasks = batch.iter().map(|url| {
                let gate = &gate;
                async move {
                    let Ok(_permit) = gate.acquire().await else {
                        return ExtractOutcome::FetchFailed;
                    };
                    self.extract(url, category).await
                }
            });
            for outcome in join_all(tasks).await {
                report.absorb(outcome);
            }

            let done = (index * batch_size + batch.len()).min(total);
            tracing::debug!(
                category = %category.name,
                done,
                total,
                records = report.records.len(),
                "Extraction progress"
            );
            if done < total {
                pacing::pause(self.settings.batch_pause).await;
            }
        }

        let now = Utc::now();
        for record in &mut report.records {
            if let Some(price) = record.current_price {
                record.recently_reduced =
                    history.update(&record.product_id, &record.name, price, now);
            }
        }

        tracing::info!(
            category = %category.name,
            urls = total,
            records = report.records.len(),
            excluded = report.excluded,
            below_threshold = report.below_threshold,
            fetch_failures = report.fetch_failures,
            "Extraction complete"
        );
        report
    }
}
