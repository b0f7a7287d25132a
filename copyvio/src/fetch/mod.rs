//! Content fetching.
//!
//! A [`Fetcher`] turns a candidate URL into plain text within a time bound.
//! The scheduler only sees this trait; [`HttpFetcher`] is the production
//! implementation and `testing::MockFetcher` a scripted one.

mod extract;
#[cfg(feature = "http")]
mod http;

use async_trait::async_trait;
use std::time::Duration;

use crate::errors::FetchError;

pub use extract::{html_to_text, plain_text, ContentKind};
#[cfg(feature = "http")]
pub use http::HttpFetcher;

/// Retrieves a URL as plain text with markup stripped.
///
/// Implementations never retry and must give up once `timeout` elapses.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `url` and returns its plain text.
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError>;
}
