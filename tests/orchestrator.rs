// tests/orchestrator.rs

//! End-to-end pipeline tests over in-process source adapters.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use eventscout::error::{FetchCause, FetchError};
use eventscout::fetch::FetchClient;
use eventscout::models::{Config, DateWindow, PlatformFamily, RunState, SourceStatus};
use eventscout::pipeline::Orchestrator;
use eventscout::sources::{RawRecord, SourceAdapter};

fn window() -> DateWindow {
    DateWindow::new(NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(), 31)
}

fn raw(source: &str, title: &str, date: &str, time: &str) -> RawRecord {
    let mut record = RawRecord::new(source, title);
    record.date_text = date.to_string();
    record.time_text = time.to_string();
    record
}

/// Serves a fixed set of records.
struct StaticSource {
    name: String,
    records: Vec<RawRecord>,
}

impl StaticSource {
    fn new(name: &str, records: Vec<RawRecord>) -> Box<Self> {
        Box::new(Self {
            name: name.to_string(),
            records,
        })
    }
}

#[async_trait]
impl SourceAdapter for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }
    fn family(&self) -> PlatformFamily {
        PlatformFamily::Feed
    }
    async fn fetch(
        &self,
        _window: &DateWindow,
        _client: &FetchClient,
    ) -> Result<Vec<RawRecord>, FetchError> {
        Ok(self.records.clone())
    }
}

/// Fails on every call.
struct FailingSource {
    name: String,
}

impl FailingSource {
    fn new(name: &str) -> Box<Self> {
        Box::new(Self {
            name: name.to_string(),
        })
    }
}

#[async_trait]
impl SourceAdapter for FailingSource {
    fn name(&self) -> &str {
        &self.name
    }
    fn family(&self) -> PlatformFamily {
        PlatformFamily::Feed
    }
    async fn fetch(
        &self,
        _window: &DateWindow,
        _client: &FetchClient,
    ) -> Result<Vec<RawRecord>, FetchError> {
        Err(FetchError::new(&self.name, FetchCause::Status(503)))
    }
}

/// Never completes within any realistic window.
struct StalledSource {
    name: String,
}

impl StalledSource {
    fn new(name: &str) -> Box<Self> {
        Box::new(Self {
            name: name.to_string(),
        })
    }
}

#[async_trait]
impl SourceAdapter for StalledSource {
    fn name(&self) -> &str {
        &self.name
    }
    fn family(&self) -> PlatformFamily {
        PlatformFamily::Feed
    }
    async fn fetch(
        &self,
        _window: &DateWindow,
        _client: &FetchClient,
    ) -> Result<Vec<RawRecord>, FetchError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }
}

fn orchestrator(adapters: Vec<Box<dyn SourceAdapter>>) -> Orchestrator {
    Orchestrator::from_adapters(adapters, &Config::default()).unwrap()
}

#[tokio::test]
async fn failing_source_is_isolated_from_its_siblings() {
    let orchestrator = orchestrator(vec![
        FailingSource::new("Broken"),
        StaticSource::new(
            "Evanston",
            vec![
                raw("Evanston", "Toddler Storytime", "2026-03-10", "10:30 AM"),
                raw("Evanston", "Teen Art Workshop", "2026-03-12", "4:00 PM"),
            ],
        ),
    ]);

    let (run, events) = orchestrator.run(window(), None).await.unwrap();

    assert_eq!(run.state(), RunState::PartiallyFailed);
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.source == "Evanston"));

    let failures = run.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "Broken");
    assert!(failures[0].1.contains("503"));
}

#[tokio::test]
async fn all_sources_failing_is_not_a_quiet_window() {
    let orchestrator = orchestrator(vec![
        FailingSource::new("Broken A"),
        FailingSource::new("Broken B"),
    ]);

    let (run, events) = orchestrator.run(window(), None).await.unwrap();

    assert!(events.is_empty());
    assert_eq!(run.state(), RunState::Failed);
    assert!(run.all_sources_failed());

    // Whereas a succeeding source with nothing to report is a success
    let orchestrator = super_quiet();
    let (run, events) = orchestrator.run(window(), None).await.unwrap();
    assert!(events.is_empty());
    assert_eq!(run.state(), RunState::Succeeded);
    assert!(!run.all_sources_failed());
}

fn super_quiet() -> Orchestrator {
    orchestrator(vec![StaticSource::new("Quiet", Vec::new())])
}

#[tokio::test]
async fn duplicates_collapse_to_the_first_seen_instance() {
    let mut kept = raw("Evanston", "Storytime", "2026-03-10", "10:30 AM");
    kept.description = "kept".to_string();
    let mut dropped = raw("Evanston", "  storytime ", "2026-03-10", "10:30 AM");
    dropped.description = "dropped".to_string();

    let orchestrator = orchestrator(vec![StaticSource::new("Evanston", vec![kept, dropped])]);
    let (_, events) = orchestrator.run(window(), None).await.unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].description, "kept");
}

#[tokio::test]
async fn records_outside_the_window_are_counted_as_dropped() {
    let orchestrator = orchestrator(vec![StaticSource::new(
        "Evanston",
        vec![
            raw("Evanston", "In Window", "2026-03-10", "10:30 AM"),
            raw("Evanston", "Too Late", "2026-06-01", "10:30 AM"),
            raw("Evanston", "No Date", "Not found", "10:30 AM"),
        ],
    )]);

    let (run, events) = orchestrator.run(window(), None).await.unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].title, "In Window");
    assert_eq!(run.fetched_events(), 1);
    let outcome = &run.sources[0];
    match &outcome.status {
        eventscout::models::SourceStatus::Succeeded { events, dropped, .. } => {
            assert_eq!(*events, 1);
            assert_eq!(*dropped, 2);
        }
        other => panic!("expected success, got {other:?}"),
    }
}

#[tokio::test]
async fn collection_is_ordered_across_sources() {
    let orchestrator = orchestrator(vec![
        StaticSource::new(
            "Glencoe",
            vec![
                raw("Glencoe", "Evening Concert", "2026-03-10", "7:00 PM"),
                raw("Glencoe", "Puzzle Swap", "2026-03-10", "All Day"),
            ],
        ),
        StaticSource::new(
            "Evanston",
            vec![raw("Evanston", "Morning Yoga", "2026-03-10", "9:00 AM")],
        ),
    ]);

    let (_, events) = orchestrator.run(window(), None).await.unwrap();
    let titles: Vec<&str> = events.iter().map(|e| e.title.as_str()).collect();
    // All-day first, then clock times ascending
    assert_eq!(titles, ["Puzzle Swap", "Morning Yoga", "Evening Concert"]);
}

#[tokio::test]
async fn source_filter_restricts_the_run() {
    let orchestrator = orchestrator(vec![
        StaticSource::new(
            "Evanston",
            vec![raw("Evanston", "Storytime", "2026-03-10", "10:30 AM")],
        ),
        FailingSource::new("Broken"),
    ]);

    let filter = vec!["Evanston".to_string()];
    let (run, events) = orchestrator.run(window(), Some(&filter)).await.unwrap();

    assert_eq!(run.sources.len(), 1);
    assert_eq!(run.state(), RunState::Succeeded);
    assert_eq!(events.len(), 1);

    let unknown = vec!["Nowhere".to_string()];
    assert!(orchestrator.run(window(), Some(&unknown)).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn cancellation_discards_partial_results() {
    let orchestrator = orchestrator(vec![
        StaticSource::new(
            "Evanston",
            vec![raw("Evanston", "Storytime", "2026-03-10", "10:30 AM")],
        ),
        StalledSource::new("Stalled"),
    ]);
    let handle = orchestrator.cancel_handle();

    let (result, ()) = tokio::join!(orchestrator.run(window(), None), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.cancel();
    });

    let (run, events) = result.unwrap();
    assert_eq!(run.state(), RunState::Cancelled);
    assert!(events.is_empty());
    assert!(run.cancelled);
}

#[tokio::test(start_paused = true)]
async fn progress_is_pollable_while_a_source_stalls() {
    let orchestrator = orchestrator(vec![
        StaticSource::new(
            "Evanston",
            vec![raw("Evanston", "Storytime", "2026-03-10", "10:30 AM")],
        ),
        StalledSource::new("Stalled"),
    ]);
    let handle = orchestrator.cancel_handle();

    let (result, snapshot) = tokio::join!(orchestrator.run(window(), None), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let snapshot = orchestrator.progress().unwrap();
        handle.cancel();
        snapshot
    });

    // Mid-run: the quick source is already terminal, the stalled one is
    // still in flight, and the fraction reflects exactly that.
    assert_eq!(snapshot.state(), RunState::Running);
    assert!((snapshot.completion() - 0.5).abs() < f64::EPSILON);
    let evanston = snapshot
        .sources
        .iter()
        .find(|o| o.source == "Evanston")
        .unwrap();
    assert!(evanston.status.is_terminal());
    let stalled = snapshot
        .sources
        .iter()
        .find(|o| o.source == "Stalled")
        .unwrap();
    assert_eq!(stalled.status, SourceStatus::Running);

    // Polling never blocked the run; it still reached its terminal state
    let (run, events) = result.unwrap();
    assert_eq!(run.state(), RunState::Cancelled);
    assert!(events.is_empty());
}

#[tokio::test]
async fn no_adapters_is_a_run_error() {
    assert!(Orchestrator::from_adapters(Vec::new(), &Config::default()).is_err());
}
