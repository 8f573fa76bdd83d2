//! New / price-change classification of one category's scan.

use crate::category_state::CategoryState;
use crate::config::CrawlSettings;
use crate::dedup::DeduplicationIndex;
use crate::models::{ClassifiedEvent, EventKind, ProductRecord};

/// Thresholds of the classifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierPolicy {
    /// The corruption guard only applies to batches larger than this.
    pub guard_min_batch: usize,
    /// Share of "new" records above which the batch is suppressed.
    pub guard_new_ratio: f64,
    /// Price differences at or below this are float noise.
    pub price_epsilon: f64,
}

impl Default for ClassifierPolicy {
    fn default() -> Self {
        Self {
            guard_min_batch: 10,
            guard_new_ratio: 0.5,
            price_epsilon: 0.01,
        }
    }
}

impl From<&CrawlSettings> for ClassifierPolicy {
    fn from(settings: &CrawlSettings) -> Self {
        Self {
            guard_min_batch: settings.guard_min_batch,
            guard_new_ratio: settings.guard_new_ratio,
            price_epsilon: settings.price_epsilon,
        }
    }
}

/// A batch that looked like a lost state file rather than new stock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuardTrip {
    pub new_count: usize,
    pub total: usize,
}

impl GuardTrip {
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.new_count as f64 / self.total as f64
        }
    }

    /// Warning sent in place of the suppressed notifications.
    pub fn warning(&self, category: &str) -> String {
        format!(
            "WARNING: {}/{} ({:.0}%) products appear as 'new' in {category}. \
             This suggests possible state file corruption. \
             Skipping notifications to prevent spam. Check state file: {category}",
            self.new_count,
            self.total,
            self.ratio() * 100.0
        )
    }
}

/// Result of classifying one batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// Events sorted by discount, highest first.
    Events {
        events: Vec<ClassifiedEvent>,
        /// "New" records suppressed because another category tracks them.
        cross_category_skips: usize,
    },
    /// The corruption guard tripped; nothing may be emitted.
    Suppressed(GuardTrip),
}

impl Classification {
    pub fn events(&self) -> &[ClassifiedEvent] {
        match self {
            Classification::Events { events, .. } => events,
            Classification::Suppressed(_) => &[],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventClassifier {
    policy: ClassifierPolicy,
}

impl EventClassifier {
    pub fn new(policy: ClassifierPolicy) -> Self {
        Self { policy }
    }

    /// Classify a fresh scan against the category's previous state.
    ///
    /// `state` must be the state as loaded before this scan was applied.
    pub fn classify(
        &self,
        records: &[ProductRecord],
        state: &CategoryState,
        index: &DeduplicationIndex,
    ) -> Classification {
        let new_count = records
            .iter()
            .filter(|r| !state.contains(&r.product_id) && !index.contains(&r.product_id))
            .count();
        let total = records.len();
        if total > self.policy.guard_min_batch
            && new_count as f64 / total as f64 > self.policy.guard_new_ratio
        {
            return Classification::Suppressed(GuardTrip { new_count, total });
        }

        let mut events = Vec::new();
        let mut cross_category_skips = 0;
        for record in records {
            let Some(previous) = state.get(&record.product_id) else {
                if index.contains(&record.product_id) {
                    tracing::debug!(
                        product_id = %record.product_id,
                        name = %record.name,
                        "Skipped, tracked by another category"
                    );
                    cross_category_skips += 1;
                } else {
                    events.push(ClassifiedEvent {
                        record: record.clone(),
                        kind: EventKind::New,
                    });
                }
                continue;
            };

            if let (Some(old), Some(new)) = (previous.latest_price, record.current_price) {
                let delta = new - old;
                if delta.abs() > self.policy.price_epsilon {
                    events.push(ClassifiedEvent {
                        record: record.clone(),
                        kind: EventKind::PriceChange {
                            previous_price: old,
                            delta,
                        },
                    });
                }
            }
        }

        events.sort_by(|a, b| b.record.discount_pct.total_cmp(&a.record.discount_pct));
        Classification::Events {
            events,
            cross_category_skips,
        }
    }
}
