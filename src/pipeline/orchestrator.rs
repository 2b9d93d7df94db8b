// src/pipeline/orchestrator.rs

//! Run orchestration.
//!
//! All configured sources are fetched concurrently under one overall
//! parallelism bound. Failures are isolated per source: a fetch error or a
//! misconfigured descriptor is recorded against that source's outcome and
//! contributes nothing, without disturbing the siblings. Aggregation walks
//! sources in fixed configuration order, so dedup tie-breaks never depend
//! on fetch completion order.

use std::sync::{Arc, RwLock};
use std::time::Instant;

use chrono_tz::Tz;
use futures::stream::{self, StreamExt};
use tokio::sync::watch;

use crate::error::{AppError, Result};
use crate::fetch::FetchClient;
use crate::models::{Config, DateWindow, Event, ScrapeRun, SourceStatus};
use crate::normalize::Normalizer;
use crate::sources::{build_adapter, RawRecord, SourceAdapter};

/// Cancels an in-flight run.
#[derive(Clone)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// One adapter slot in fixed configuration order. A descriptor that fails
/// to build still occupies its slot so its failure shows up in the run.
enum AdapterSlot {
    Ready(Box<dyn SourceAdapter>),
    Misconfigured { name: String, reason: String },
}

impl AdapterSlot {
    fn name(&self) -> &str {
        match self {
            AdapterSlot::Ready(adapter) => adapter.name(),
            AdapterSlot::Misconfigured { name, .. } => name,
        }
    }
}

/// What one source's fetch task produced.
enum FetchOutcome {
    Fetched { records: Vec<RawRecord>, duration_ms: u64 },
    Failed(String),
    Cancelled,
}

/// Runs the whole aggregation pipeline.
pub struct Orchestrator {
    slots: Vec<AdapterSlot>,
    client: FetchClient,
    tz: Tz,
    max_concurrent: usize,
    progress: Arc<RwLock<Option<ScrapeRun>>>,
    cancel_tx: watch::Sender<bool>,
}

impl Orchestrator {
    /// Build an orchestrator from configuration.
    ///
    /// Fails only on global problems (no sources at all, bad timezone);
    /// per-source configuration errors become that source's failure at
    /// run time.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        if config.sources.is_empty() {
            return Err(AppError::run("no sources configured"));
        }

        let slots = config
            .sources
            .iter()
            .map(|descriptor| match build_adapter(descriptor, &config.extractor) {
                Ok(adapter) => AdapterSlot::Ready(adapter),
                Err(e) => AdapterSlot::Misconfigured {
                    name: descriptor.name.clone(),
                    reason: e.to_string(),
                },
            })
            .collect();

        let (cancel_tx, _) = watch::channel(false);

        Ok(Self {
            slots,
            client: FetchClient::new(&config.fetch, config.retry.clone()),
            tz: config.resolve_timezone()?,
            max_concurrent: config.fetch.max_concurrent,
            progress: Arc::new(RwLock::new(None)),
            cancel_tx,
        })
    }

    /// Build an orchestrator around ready-made adapters, bypassing the
    /// descriptor table. Embedding callers use this to mix in their own
    /// [`SourceAdapter`] implementations.
    pub fn from_adapters(adapters: Vec<Box<dyn SourceAdapter>>, config: &Config) -> Result<Self> {
        config.validate()?;
        if adapters.is_empty() {
            return Err(AppError::run("no sources configured"));
        }
        let (cancel_tx, _) = watch::channel(false);
        Ok(Self {
            slots: adapters.into_iter().map(AdapterSlot::Ready).collect(),
            client: FetchClient::new(&config.fetch, config.retry.clone()),
            tz: config.resolve_timezone()?,
            max_concurrent: config.fetch.max_concurrent,
            progress: Arc::new(RwLock::new(None)),
            cancel_tx,
        })
    }

    /// Handle for cancelling a run from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: self.cancel_tx.clone(),
        }
    }

    /// Snapshot of the current or most recent run, for progress polling.
    pub fn progress(&self) -> Option<ScrapeRun> {
        self.progress.read().ok().and_then(|guard| guard.clone())
    }

    /// Fetch, normalize, dedup, and order every configured source's events
    /// for the window. An optional source-name filter restricts the run.
    ///
    /// Partial failure is not an error: the run report carries per-source
    /// outcomes and the collection holds whatever normalized cleanly. Only
    /// precondition failures (e.g. the filter matches nothing) are `Err`.
    pub async fn run(
        &self,
        window: DateWindow,
        source_filter: Option<&[String]>,
    ) -> Result<(ScrapeRun, Vec<Event>)> {
        let selected: Vec<&AdapterSlot> = self
            .slots
            .iter()
            .filter(|slot| match source_filter {
                Some(names) => names.iter().any(|n| n == slot.name()),
                None => true,
            })
            .collect();
        if selected.is_empty() {
            return Err(AppError::run("source filter matches no configured source"));
        }

        let names: Vec<String> = selected.iter().map(|s| s.name().to_string()).collect();
        self.store_progress(ScrapeRun::new(window, &names));
        // A cancel aimed at a previous run must not kill this one
        self.cancel_tx.send_replace(false);

        log::info!(
            "Starting run for {} sources, {} through {}",
            selected.len(),
            window.start,
            window.end()
        );

        let outcomes: Vec<(usize, FetchOutcome)> = stream::iter(
            selected
                .iter()
                .copied()
                .enumerate()
                .map(|(index, slot)| self.fetch_one(index, slot, window)),
        )
        .buffer_unordered(self.max_concurrent)
        .collect()
        .await;

        // Reassemble in configuration order
        let mut ordered: Vec<Option<FetchOutcome>> =
            selected.iter().map(|_| None).collect();
        for (index, outcome) in outcomes {
            ordered[index] = Some(outcome);
        }

        let mut run = match self.progress() {
            Some(run) => run,
            None => ScrapeRun::new(window, &names),
        };

        if *self.cancel_tx.borrow() {
            log::warn!("Run cancelled; discarding partial results");
            for name in &names {
                run.set_status(name, SourceStatus::Cancelled);
            }
            run.cancelled = true;
            run.finish();
            self.store_progress(run.clone());
            return Ok((run, Vec::new()));
        }

        let normalizer = Normalizer::new(self.tz, window);
        let mut events = Vec::new();

        for (slot, outcome) in selected.iter().zip(ordered) {
            let name = slot.name();
            match outcome {
                Some(FetchOutcome::Fetched { records, duration_ms }) => {
                    let fetched = records.len();
                    let mut kept = 0usize;
                    for record in &records {
                        match normalizer.normalize(record) {
                            Ok(event) if normalizer.in_window(&event) => {
                                events.push(event);
                                kept += 1;
                            }
                            Ok(event) => {
                                log::debug!(
                                    "{name}: '{}' outside the window, dropped",
                                    event.title
                                );
                            }
                            Err(e) => log::debug!("{name}: dropped record: {e}"),
                        }
                    }
                    run.set_status(
                        name,
                        SourceStatus::Succeeded {
                            events: kept,
                            dropped: fetched - kept,
                            duration_ms,
                        },
                    );
                }
                Some(FetchOutcome::Failed(reason)) => {
                    log::error!("{name}: {reason}");
                    run.set_status(name, SourceStatus::Failed { reason });
                }
                Some(FetchOutcome::Cancelled) | None => {
                    run.set_status(name, SourceStatus::Cancelled);
                }
            }
        }

        let before = events.len();
        let mut events = crate::pipeline::dedup_events(events);
        if before > events.len() {
            log::info!("Removed {} duplicate events", before - events.len());
        }
        crate::pipeline::sort_events(&mut events);

        run.finish();
        log::info!(
            "Run finished: {:?}, {} events from {} sources",
            run.state(),
            events.len(),
            run.sources.len()
        );
        self.store_progress(run.clone());
        Ok((run, events))
    }

    /// Fetch one source, reporting status transitions as they happen.
    async fn fetch_one(
        &self,
        index: usize,
        slot: &AdapterSlot,
        window: DateWindow,
    ) -> (usize, FetchOutcome) {
        let adapter = match slot {
            AdapterSlot::Ready(adapter) => adapter,
            AdapterSlot::Misconfigured { name, reason } => {
                self.update_status(name, SourceStatus::Failed { reason: reason.clone() });
                return (index, FetchOutcome::Failed(reason.clone()));
            }
        };

        let name = adapter.name();
        self.update_status(name, SourceStatus::Running);
        let started = Instant::now();

        let mut cancel_rx = self.cancel_tx.subscribe();
        let outcome = tokio::select! {
            result = adapter.fetch(&window, &self.client) => match result {
                Ok(records) => FetchOutcome::Fetched {
                    records,
                    duration_ms: started.elapsed().as_millis() as u64,
                },
                Err(e) => FetchOutcome::Failed(e.to_string()),
            },
            _ = cancel_rx.wait_for(|cancelled| *cancelled) => FetchOutcome::Cancelled,
        };

        // Publish the terminal status right away so progress polls see it
        // while sibling sources are still in flight. Succeeded counts are
        // provisional here; aggregation refines them after normalization.
        match &outcome {
            FetchOutcome::Fetched { records, duration_ms } => self.update_status(
                name,
                SourceStatus::Succeeded {
                    events: records.len(),
                    dropped: 0,
                    duration_ms: *duration_ms,
                },
            ),
            FetchOutcome::Failed(reason) => {
                self.update_status(name, SourceStatus::Failed { reason: reason.clone() })
            }
            FetchOutcome::Cancelled => self.update_status(name, SourceStatus::Cancelled),
        }

        (index, outcome)
    }

    fn update_status(&self, name: &str, status: SourceStatus) {
        if let Ok(mut guard) = self.progress.write() {
            if let Some(run) = guard.as_mut() {
                run.set_status(name, status);
            }
        }
    }

    fn store_progress(&self, run: ScrapeRun) {
        if let Ok(mut guard) = self.progress.write() {
            *guard = Some(run);
        }
    }
}
