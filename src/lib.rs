// src/lib.rs

//! eventscout: multi-source event listing aggregator.
//!
//! Fetches event listings from heterogeneous upstream platforms, cleans
//! and normalizes them into one canonical schema, deduplicates, orders,
//! and exposes a multi-mode search over the result.

pub mod error;
pub mod fetch;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod search;
pub mod sources;
pub mod utils;
