// src/pipeline/mod.rs

//! Aggregation pipeline: concurrent fetch, normalization, dedup, ordering.

mod dedup;
mod orchestrator;

pub use dedup::{dedup_events, sort_events};
pub use orchestrator::{CancelHandle, Orchestrator};
