// src/models/run.rs

//! Per-run state and per-source outcomes.
//!
//! One [`ScrapeRun`] is created per orchestrator execution. The
//! orchestrator is its only writer; collaborators poll cloned snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::DateWindow;

/// Status of one source within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceStatus {
    /// Not started yet
    Pending,
    /// Fetch in flight
    Running,
    /// Fetch and normalization finished
    Succeeded {
        /// Normalized events this source contributed
        events: usize,
        /// Records dropped during normalization
        dropped: usize,
        /// Wall time for the fetch
        duration_ms: u64,
    },
    /// Fetch failed after exhausting retries, or the source was misconfigured
    Failed { reason: String },
    /// The run was cancelled before this source finished
    Cancelled,
}

impl SourceStatus {
    /// Whether this source has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SourceStatus::Pending | SourceStatus::Running)
    }
}

/// Outcome entry for one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceOutcome {
    pub source: String,
    pub status: SourceStatus,
}

/// Overall state of a run, derived from its per-source outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Pending,
    Running,
    /// Every source either succeeded or was skipped; at least one
    /// returned events without failure
    Succeeded,
    /// Some sources failed, others returned data
    PartiallyFailed,
    /// Every source failed. The run itself still completed; the
    /// aggregated collection is simply empty
    Failed,
    /// The run was cancelled and its events discarded
    Cancelled,
}

/// One execution of the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeRun {
    /// Requested date window
    pub window: DateWindow,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run reached a terminal state
    pub finished_at: Option<DateTime<Utc>>,

    /// Per-source outcomes, in fixed configuration order
    pub sources: Vec<SourceOutcome>,

    /// Whether the run was cancelled
    pub cancelled: bool,
}

impl ScrapeRun {
    /// Create a run with every source pending.
    pub fn new(window: DateWindow, source_names: &[String]) -> Self {
        Self {
            window,
            started_at: Utc::now(),
            finished_at: None,
            sources: source_names
                .iter()
                .map(|name| SourceOutcome {
                    source: name.clone(),
                    status: SourceStatus::Pending,
                })
                .collect(),
            cancelled: false,
        }
    }

    /// Update one source's status. No-op for unknown names.
    pub fn set_status(&mut self, source: &str, status: SourceStatus) {
        if let Some(outcome) = self.sources.iter_mut().find(|o| o.source == source) {
            outcome.status = status;
        }
    }

    /// Derived overall state.
    pub fn state(&self) -> RunState {
        if self.cancelled {
            return RunState::Cancelled;
        }
        if self.sources.iter().all(|o| o.status == SourceStatus::Pending) {
            return if self.finished_at.is_some() {
                RunState::Failed
            } else {
                RunState::Pending
            };
        }
        if !self.sources.iter().all(|o| o.status.is_terminal()) {
            return RunState::Running;
        }

        let failed = self
            .sources
            .iter()
            .filter(|o| matches!(o.status, SourceStatus::Failed { .. }))
            .count();
        if failed == self.sources.len() {
            RunState::Failed
        } else if failed > 0 {
            RunState::PartiallyFailed
        } else {
            RunState::Succeeded
        }
    }

    /// Fraction of sources in a terminal state, 0.0..=1.0.
    pub fn completion(&self) -> f64 {
        if self.sources.is_empty() {
            return 1.0;
        }
        let done = self.sources.iter().filter(|o| o.status.is_terminal()).count();
        done as f64 / self.sources.len() as f64
    }

    /// Total events contributed across succeeded sources, before dedup.
    pub fn fetched_events(&self) -> usize {
        self.sources
            .iter()
            .filter_map(|o| match o.status {
                SourceStatus::Succeeded { events, .. } => Some(events),
                _ => None,
            })
            .sum()
    }

    /// Failure reasons per failed source, for caller-side reporting.
    pub fn failures(&self) -> Vec<(String, String)> {
        self.sources
            .iter()
            .filter_map(|o| match &o.status {
                SourceStatus::Failed { reason } => Some((o.source.clone(), reason.clone())),
                _ => None,
            })
            .collect()
    }

    /// Distinguishes all-sources-errored from a genuinely empty window.
    pub fn all_sources_failed(&self) -> bool {
        !self.sources.is_empty()
            && self
                .sources
                .iter()
                .all(|o| matches!(o.status, SourceStatus::Failed { .. }))
    }

    /// Mark the run finished.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}
