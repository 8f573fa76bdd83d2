use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};

use chrono::{TimeDelta, Utc};
use tokio_util::sync::CancellationToken;

use crate::classifier::{Classification, ClassifierPolicy, EventClassifier, GuardTrip};
use crate::config::{CategoryConfig, KeywordFilter, MonitorConfig};
use crate::dedup::DeduplicationIndex;
use crate::discovery::CategoryDiscoverer;
use crate::error::AppError;
use crate::extract::ProductExtractor;
use crate::models::{ClassifiedEvent, ReportEntry};
use crate::pacing;
use crate::price_history::{HistoryPolicy, PriceHistory};
use crate::summary::{CategoryReport, CycleSummary};
use crate::traits::{EventLog, Fetcher, Notifier, PageParser, StateStore};

/// Where the monitor is within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    Idle,
    Discovering,
    Extracting,
    Classifying,
    Persisting,
    Cooling,
    CleaningReport,
    Sleeping,
}

impl CycleStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleStage::Idle => "idle",
            CycleStage::Discovering => "discovering",
            CycleStage::Extracting => "extracting",
            CycleStage::Classifying => "classifying",
            CycleStage::Persisting => "persisting",
            CycleStage::Cooling => "cooling",
            CycleStage::CleaningReport => "cleaning_report",
            CycleStage::Sleeping => "sleeping",
        }
    }
}

impl fmt::Display for CycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events emitted by the monitor for progress reporting.
#[derive(Debug, Clone)]
pub enum CycleEvent<'a> {
    Started {
        categories: usize,
    },
    CycleStarted {
        cycle: u64,
    },
    Stage {
        category: Option<&'a str>,
        stage: CycleStage,
    },
    GuardTripped {
        category: &'a str,
        trip: &'a GuardTrip,
    },
    NotificationFailed {
        product_id: &'a str,
        error: &'a str,
    },
    CategoryCompleted {
        report: &'a CategoryReport,
    },
    CycleCompleted {
        summary: &'a CycleSummary,
    },
    CycleFailed {
        cycle: u64,
        error: &'a str,
        restart_in: Duration,
    },
    Sleeping {
        duration: Duration,
    },
    ShuttingDown,
    Stopped,
}

/// Trait for receiving monitor events (decoupled logging).
pub trait CycleReporter: Send + Sync {
    fn report(&self, event: CycleEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingCycleReporter;

impl CycleReporter for TracingCycleReporter {
    fn report(&self, event: CycleEvent<'_>) {
        match event {
            CycleEvent::Started { categories } => {
                tracing::info!(%categories, "Monitor started");
            }
            CycleEvent::CycleStarted { cycle } => {
                tracing::info!(%cycle, "Cycle started");
            }
            CycleEvent::Stage { category, stage } => {
                tracing::debug!(category = category.unwrap_or("-"), %stage, "Stage");
            }
            CycleEvent::GuardTripped { category, trip } => {
                tracing::warn!(
                    %category,
                    new = trip.new_count,
                    total = trip.total,
                    "Most of the scan looks new, suppressing notifications"
                );
            }
            CycleEvent::NotificationFailed { product_id, error } => {
                tracing::error!(%product_id, %error, "Notification failed");
            }
            CycleEvent::CategoryCompleted { report } => {
                tracing::info!(
                    category = %report.name,
                    products = report.products,
                    events = report.events,
                    notified = report.notifications_sent,
                    "Category complete"
                );
            }
            CycleEvent::CycleCompleted { summary } => {
                tracing::info!(
                    cycle = summary.cycle,
                    duration_secs = summary.duration.as_secs(),
                    products = summary.products(),
                    events = summary.events(),
                    fetch_failures = summary.fetch_failures(),
                    excluded = summary.excluded(),
                    "Cycle complete"
                );
            }
            CycleEvent::CycleFailed {
                cycle,
                error,
                restart_in,
            } => {
                tracing::error!(%cycle, %error, restart_secs = restart_in.as_secs(), "Cycle failed");
            }
            CycleEvent::Sleeping { duration } => {
                tracing::info!(minutes = duration.as_secs() / 60, "Next check scheduled");
            }
            CycleEvent::ShuttingDown => {
                tracing::info!("Monitor shutting down");
            }
            CycleEvent::Stopped => {
                tracing::info!("Monitor stopped");
            }
        }
    }
}

/// Drives discovery, extraction, classification and persistence for every
/// configured category, once per cycle, forever.
pub struct Monitor<F, P, S, L, N>
where
    F: Fetcher,
    P: PageParser,
    S: StateStore,
    L: EventLog,
    N: Notifier,
{
    config: MonitorConfig,
    discoverer: CategoryDiscoverer<F, P>,
    extractor: ProductExtractor<F, P>,
    classifier: EventClassifier,
    excluded: KeywordFilter,
    store: S,
    log: L,
    notifier: N,
}

impl<F, P, S, L, N> Monitor<F, P, S, L, N>
where
    F: Fetcher,
    P: PageParser,
    S: StateStore,
    L: EventLog,
    N: Notifier,
{
    pub fn new(config: MonitorConfig, fetcher: F, parser: P, store: S, log: L, notifier: N) -> Self {
        let settings = config.settings.clone();
        let excluded = config.keyword_filter();
        let discoverer = CategoryDiscoverer::new(fetcher.clone(), parser.clone(), settings.clone())
            .with_debug_dir(config.debug_dir.clone());
        let extractor = ProductExtractor::new(fetcher, parser, settings.clone(), excluded.clone());
        let classifier = EventClassifier::new(ClassifierPolicy::from(&settings));
        Self {
            config,
            discoverer,
            extractor,
            classifier,
            excluded,
            store,
            log,
            notifier,
        }
    }

    /// Run cycles until `cancel_token` fires.
    ///
    /// A failed cycle is reported and retried after the restart delay; only
    /// cancellation ends the loop.
    pub async fn run<R: CycleReporter>(
        &self,
        cancel_token: CancellationToken,
        reporter: &R,
    ) -> Result<(), AppError> {
        let settings = &self.config.settings;
        reporter.report(CycleEvent::Started {
            categories: self.config.categories.len(),
        });

        let mut cycle = 0u64;
        loop {
            if cancel_token.is_cancelled() {
                break;
            }
            cycle += 1;

            let result = tokio::select! {
                r = self.run_cycle(cycle, reporter) => r,
                () = cancel_token.cancelled() => break,
            };

            let delay = match result {
                Ok(summary) => {
                    let every = settings.status_every_cycles;
                    if every > 0 && cycle % every == 0 {
                        self.send_status(&summary.status_line()).await;
                    }
                    settings.cycle_interval.sample()
                }
                Err(e) => {
                    let error = e.to_string();
                    let restart_in = settings.restart_delay();
                    reporter.report(CycleEvent::CycleFailed {
                        cycle,
                        error: &error,
                        restart_in,
                    });
                    self.send_status(&format!("Monitor crashed: {error}")).await;
                    restart_in
                }
            };

            reporter.report(CycleEvent::Stage {
                category: None,
                stage: CycleStage::Sleeping,
            });
            reporter.report(CycleEvent::Sleeping { duration: delay });
            if !pacing::sleep_or_cancel(delay, &cancel_token).await {
                break;
            }
        }

        reporter.report(CycleEvent::ShuttingDown);
        reporter.report(CycleEvent::Stopped);
        Ok(())
    }

    /// Run one full cycle over every category.
    pub async fn run_cycle<R: CycleReporter>(
        &self,
        cycle: u64,
        reporter: &R,
    ) -> Result<CycleSummary, AppError> {
        let started = Instant::now();
        reporter.report(CycleEvent::CycleStarted { cycle });

        let mut history = self.store.load_history()?;
        history.set_policy(HistoryPolicy::from(&self.config.settings));

        // Snapshot of every tracked id; not updated until the next cycle.
        let states = self
            .config
            .categories
            .iter()
            .map(|category| self.store.load_category(category))
            .collect::<Result<Vec<_>, _>>()?;
        let index = DeduplicationIndex::from_states(&states);
        tracing::info!(ids = index.len(), "Loaded dedup index");

        let mut scanned_ids: HashSet<String> = HashSet::new();
        let mut categories = Vec::with_capacity(self.config.categories.len());
        let last = self.config.categories.len().saturating_sub(1);
        for (i, category) in self.config.categories.iter().enumerate() {
            let report = self
                .process_category(category, &mut history, &index, &mut scanned_ids, reporter)
                .await?;
            reporter.report(CycleEvent::CategoryCompleted { report: &report });
            categories.push(report);

            if i < last {
                reporter.report(CycleEvent::Stage {
                    category: Some(&category.name),
                    stage: CycleStage::Cooling,
                });
                pacing::pause(self.config.settings.category_pause).await;
            }
        }

        if history.is_dirty() {
            self.store.save_history(&history)?;
            history.mark_clean();
        }

        reporter.report(CycleEvent::Stage {
            category: None,
            stage: CycleStage::CleaningReport,
        });
        let report_rows_removed = if scanned_ids.is_empty() {
            tracing::warn!("Nothing scanned this cycle, keeping report rows");
            0
        } else {
            match self.log.retain_products(&scanned_ids) {
                Ok(removed) => removed,
                Err(e) => {
                    tracing::error!(error = %e, "Report cleanup failed");
                    0
                }
            }
        };

        let summary = CycleSummary {
            cycle,
            duration: started.elapsed(),
            categories,
            report_rows_removed,
        };
        reporter.report(CycleEvent::CycleCompleted { summary: &summary });
        reporter.report(CycleEvent::Stage {
            category: None,
            stage: CycleStage::Idle,
        });
        Ok(summary)
    }

    async fn process_category<R: CycleReporter>(
        &self,
        category: &CategoryConfig,
        history: &mut PriceHistory,
        index: &DeduplicationIndex,
        scanned_ids: &mut HashSet<String>,
        reporter: &R,
    ) -> Result<CategoryReport, AppError> {
        let name = category.name.as_str();
        let mut report = CategoryReport::new(name);
        self.send_status(&format!("Monitor started - Cycle: {name}"))
            .await;

        let mut state = self.store.load_category(category)?;
        state.set_reduced_decay(TimeDelta::hours(self.config.settings.reduced_decay_hours));

        let stage_event = |stage| CycleEvent::Stage {
            category: Some(name),
            stage,
        };

        reporter.report(stage_event(CycleStage::Discovering));
        let discovery = self.discoverer.discover(category).await?;
        report.record_discovery(discovery.urls.len(), &discovery.stats);

        reporter.report(stage_event(CycleStage::Extracting));
        let extraction = self
            .extractor
            .extract_all(&discovery.urls, category, history)
            .await;
        report.record_extraction(&extraction);

        let records = extraction.records;
        let current_ids: HashSet<String> = records.iter().map(|r| r.product_id.clone()).collect();
        scanned_ids.extend(current_ids.iter().cloned());
        if records.is_empty() {
            tracing::warn!(category = %name, "No products extracted, leaving state untouched");
            return Ok(report);
        }

        reporter.report(stage_event(CycleStage::Classifying));
        match self.classifier.classify(&records, &state, index) {
            Classification::Suppressed(trip) => {
                report.guard_tripped = true;
                reporter.report(CycleEvent::GuardTripped {
                    category: name,
                    trip: &trip,
                });
                self.send_status(&trip.warning(name)).await;
            }
            Classification::Events {
                events,
                cross_category_skips,
            } => {
                report.events = events.len();
                report.cross_category_skips = cross_category_skips;
                self.emit_events(&events, &mut report, reporter).await;
            }
        }

        reporter.report(stage_event(CycleStage::Persisting));
        let now = Utc::now();
        for record in &records {
            state.update_product(record, now, &self.excluded);
        }
        report.stale_removed = state.prune_stale(&current_ids).len();
        self.store.save_category(category, &state)?;
        state.mark_clean();

        Ok(report)
    }

    /// Notify each event unless the report already holds it for today.
    ///
    /// Delivered events are appended to the report; failures never stop
    /// the remaining events.
    async fn emit_events<R: CycleReporter>(
        &self,
        events: &[ClassifiedEvent],
        report: &mut CategoryReport,
        reporter: &R,
    ) {
        for event in events {
            let product_id = event.record.product_id.as_str();
            let kind = event.kind.label();
            let now = Utc::now();

            match self.log.contains_on(product_id, kind, now.date_naive()) {
                Ok(true) => {
                    tracing::info!(%product_id, %kind, "Skipping duplicate notification, already logged today");
                    report.duplicates_skipped += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(%product_id, error = %e, "Error checking report for duplicates");
                }
            }

            pacing::pause(self.config.settings.notify_pacing).await;
            match self.notifier.notify_event(event).await {
                Ok(()) => {
                    report.notifications_sent += 1;
                    let entry = ReportEntry::from_event(event, now);
                    if let Err(e) = self.log.append(&entry) {
                        tracing::error!(%product_id, error = %e, "Failed to append report entry");
                    }
                }
                Err(e) => {
                    report.notify_failures += 1;
                    let error = e.to_string();
                    reporter.report(CycleEvent::NotificationFailed {
                        product_id,
                        error: &error,
                    });
                }
            }
        }
    }

    async fn send_status(&self, message: &str) {
        if let Err(e) = self.notifier.notify_status(message).await {
            tracing::error!(error = %e, "Status notification failed");
        }
    }
}
