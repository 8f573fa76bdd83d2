use std::time::Duration;

use crate::discovery::DiscoveryStats;
use crate::extract::ExtractReport;

/// Counters of one category within a cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryReport {
    pub name: String,
    pub discovered_urls: usize,
    pub products: usize,
    pub events: usize,
    pub notifications_sent: usize,
    pub duplicates_skipped: usize,
    pub notify_failures: usize,
    pub cross_category_skips: usize,
    pub guard_tripped: bool,
    pub listing_requests: u32,
    pub fetch_failures: usize,
    pub parse_failures: usize,
    pub excluded: usize,
    pub below_threshold: usize,
    pub stale_removed: usize,
}

impl CategoryReport {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub(crate) fn record_discovery(&mut self, urls: usize, stats: &DiscoveryStats) {
        self.discovered_urls = urls;
        self.listing_requests = stats.listing_requests;
        self.fetch_failures += stats.failed_requests as usize;
    }

    pub(crate) fn record_extraction(&mut self, report: &ExtractReport) {
        self.products = report.records.len();
        self.fetch_failures += report.fetch_failures;
        self.parse_failures += report.parse_failures;
        self.excluded += report.excluded;
        self.below_threshold += report.below_threshold;
    }
}

/// Aggregate result of one full cycle over every category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleSummary {
    pub cycle: u64,
    pub duration: Duration,
    pub categories: Vec<CategoryReport>,
    pub report_rows_removed: usize,
}

impl CycleSummary {
    fn sum(&self, f: impl Fn(&CategoryReport) -> usize) -> usize {
        self.categories.iter().map(f).sum()
    }

    pub fn products(&self) -> usize {
        self.sum(|c| c.products)
    }

    pub fn events(&self) -> usize {
        self.sum(|c| c.events)
    }

    pub fn notifications_sent(&self) -> usize {
        self.sum(|c| c.notifications_sent)
    }

    pub fn duplicates_skipped(&self) -> usize {
        self.sum(|c| c.duplicates_skipped)
    }

    pub fn fetch_failures(&self) -> usize {
        self.sum(|c| c.fetch_failures)
    }

    pub fn parse_failures(&self) -> usize {
        self.sum(|c| c.parse_failures)
    }

    pub fn excluded(&self) -> usize {
        self.sum(|c| c.excluded)
    }

    pub fn below_threshold(&self) -> usize {
        self.sum(|c| c.below_threshold)
    }

    pub fn stale_removed(&self) -> usize {
        self.sum(|c| c.stale_removed)
    }

    /// One-line status message for the periodic summary notification.
    pub fn status_line(&self) -> String {
        format!(
            "Cycle {}: {} products, {} changes ({}s)",
            self.cycle,
            self.products(),
            self.events(),
            self.duration.as_secs()
        )
    }
}
