//! Category listing traversal.
//!
//! Each listing page is requested in sequential chunks. A chunk's yield
//! decides whether the next chunk is worth requesting, so chunks are never
//! fetched concurrently.

use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;

use url::Url;

use crate::config::{CategoryConfig, CrawlSettings};
use crate::error::AppError;
use crate::pacing;
use crate::traits::{Fetcher, PageParser};
use crate::util::{extract_product_id, listing_url, normalize_url};

/// Counters of one discovery run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryStats {
    pub listing_requests: u32,
    pub failed_requests: u32,
    /// Links dropped because no product id could be read from them.
    pub invalid_links: usize,
}

/// Deduplicated product URLs of one category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Discovery {
    /// Normalized URLs, one per product id, sorted.
    pub urls: Vec<String>,
    pub stats: DiscoveryStats,
}

/// Turns a category config into the set of its product URLs.
#[derive(Debug, Clone)]
pub struct CategoryDiscoverer<F, P> {
    fetcher: F,
    parser: P,
    settings: CrawlSettings,
    debug_dir: Option<PathBuf>,
}

impl<F: Fetcher, P: PageParser> CategoryDiscoverer<F, P> {
    pub fn new(fetcher: F, parser: P, settings: CrawlSettings) -> Self {
        Self {
            fetcher,
            parser,
            settings,
            debug_dir: None,
        }
    }

    /// Write listing pages that yield no links into `dir`.
    pub fn with_debug_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.debug_dir = dir;
        self
    }

    pub async fn discover(&self, category: &CategoryConfig) -> Result<Discovery, AppError> {
        let base = Url::parse(&category.listing_url).map_err(|e| {
            AppError::ConfigError(format!("Invalid listing URL for {}: {e}", category.name))
        })?;

        let mut stats = DiscoveryStats::default();
        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut urls: BTreeSet<String> = BTreeSet::new();

        'pages: for page in 1..=category.max_pages {
            let mut previous_chunk: HashSet<String> = HashSet::new();
            let mut page_total = 0usize;

            for chunk in 1..=self.settings.max_chunks {
                if stats.listing_requests >= self.settings.max_listing_requests {
                    tracing::warn!(
                        category = %category.name,
                        max = self.settings.max_listing_requests,
                        "Reached listing request budget"
                    );
                    break 'pages;
                }

                let links = self
                    .fetch_links(category, &base, page, chunk, &mut stats)
                    .await?;
                let raw_count = links.len();

                let mut chunk_urls: HashSet<String> = HashSet::new();
                for link in links {
                    let normalized = normalize_url(&link);
                    let Some(id) = extract_product_id(&normalized) else {
                        tracing::error!(url = %normalized, "Failed to extract product ID from URL");
                        stats.invalid_links += 1;
                        continue;
                    };
                    if seen_ids.insert(id) {
                        chunk_urls.insert(normalized);
                    }
                }
                tracing::debug!(
                    category = %category.name,
                    page,
                    chunk,
                    raw = raw_count,
                    new = chunk_urls.len(),
                    "Listing chunk parsed"
                );

                if raw_count < self.settings.low_yield_threshold {
                    tracing::debug!(page, chunk, raw = raw_count, "Low product count, stopping chunks");
                    urls.extend(chunk_urls);
                    break;
                }

                page_total += chunk_urls.difference(&previous_chunk).count();
                let exhausted = chunk_urls.is_subset(&previous_chunk);
                urls.extend(chunk_urls.iter().cloned());

                if exhausted || page_total >= category.max_products_per_page {
                    tracing::debug!(page, chunk, page_total, "Listing page exhausted");
                    break;
                }
                previous_chunk.extend(chunk_urls);
            }
        }

        tracing::info!(
            category = %category.name,
            urls = urls.len(),
            requests = stats.listing_requests,
            "Discovery complete"
        );
        Ok(Discovery {
            urls: urls.into_iter().collect(),
            stats,
        })
    }

    /// Request one listing chunk and return its distinct product links.
    ///
    /// A failed request yields no links.
    async fn fetch_links(
        &self,
        category: &CategoryConfig,
        base: &Url,
        page: u32,
        chunk: u32,
        stats: &mut DiscoveryStats,
    ) -> Result<Vec<String>, AppError> {
        let url = listing_url(&category.listing_url, page, chunk)?;
        pacing::pause(self.settings.listing_delay).await;
        stats.listing_requests += 1;

        let html = match self.fetcher.fetch(&url).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(%url, error = %e, "Listing request failed");
                stats.failed_requests += 1;
                return Ok(Vec::new());
            }
        };

        let mut links = self.parser.parse_listing(&html, base);
        let mut seen = HashSet::new();
        links.retain(|l| seen.insert(l.clone()));

        if links.is_empty() {
            self.write_snapshot(category, page, chunk, &html).await;
        }
        Ok(links)
    }

    async fn write_snapshot(&self, category: &CategoryConfig, page: u32, chunk: u32, html: &str) {
        let Some(dir) = &self.debug_dir else {
            tracing::warn!(category = %category.name, page, chunk, "No products found on listing page");
            return;
        };
        let path = dir.join(format!(
            "debug_{}_page_{page}_chunk_{chunk}.html",
            category.slug()
        ));
        let result = match tokio::fs::create_dir_all(dir).await {
            Ok(()) => tokio::fs::write(&path, html).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => tracing::warn!(
                category = %category.name,
                page,
                chunk,
                snapshot = %path.display(),
                "No products found on listing page"
            ),
            Err(e) => tracing::error!(
                path = %path.display(),
                error = %e,
                "Failed to write listing snapshot"
            ),
        }
    }
}
