// src/fetch/mod.rs

//! Resilient HTTP fetch layer.

mod client;

pub use client::{with_retry, FetchClient};
