//! `reqwest`-backed fetcher.

use async_trait::async_trait;
use std::time::Duration;

use super::extract::{html_to_text, plain_text, ContentKind};
use super::Fetcher;
use crate::config::FetchConfig;
use crate::errors::{CopyvioError, FetchError};

/// Fetches candidate pages over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

impl HttpFetcher {
    /// Builds a fetcher with its own client.
    pub fn new(config: FetchConfig) -> Result<Self, CopyvioError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .connect_timeout(config.timeout())
            .build()
            .map_err(|e| CopyvioError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Wraps an existing client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client, config: FetchConfig) -> Self {
        Self { client, config }
    }

    /// Gets the configuration.
    #[must_use]
    pub const fn config(&self) -> &FetchConfig {
        &self.config
    }

    async fn fetch_body(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        let limit = self.config.max_response_size;
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| map_reqwest_error(&e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::http(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let kind = ContentKind::from_content_type(content_type.as_deref());
        if kind == ContentKind::Unsupported {
            return Err(FetchError::UnsupportedContent(
                content_type.unwrap_or_default(),
            ));
        }

        if response
            .content_length()
            .is_some_and(|len| len > limit as u64)
        {
            return Err(FetchError::TooLarge { limit });
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| map_reqwest_error(&e, timeout))?
        {
            if body.len() + chunk.len() > limit {
                return Err(FetchError::TooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }

        let decoded = String::from_utf8_lossy(&body);
        Ok(match kind {
            ContentKind::Text => plain_text(&decoded),
            _ => html_to_text(&decoded),
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        tracing::debug!(url, timeout_ms = timeout.as_millis() as u64, "fetching candidate");
        match tokio::time::timeout(timeout, self.fetch_body(url, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(timeout)),
        }
    }
}

fn map_reqwest_error(error: &reqwest::Error, timeout: Duration) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout(timeout)
    } else if let Some(status) = error.status() {
        FetchError::http(status.as_u16())
    } else {
        FetchError::network(error.to_string())
    }
}
