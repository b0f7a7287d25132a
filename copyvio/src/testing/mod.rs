//! Testing utilities for copyvio checks.
//!
//! [`MockFetcher`] serves scripted pages with configurable latency and
//! failures, and records when each fetch ran so tests can assert on
//! concurrency and per-domain exclusivity.

mod mocks;

pub use mocks::{FetchRecord, MockFetcher};
