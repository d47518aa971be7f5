//! Paginated reply fetcher
//!
//! Drains the cursor-paginated reply endpoint for one user into a single
//! ordered batch. Pages are requested strictly in sequence (`pn` = 1, 2, ...)
//! with a fixed pause between requests. Any failure aborts the whole fetch;
//! there is no retry and no partial result.

use crate::models::{Record, ReplyEnvelope, ReplyPage};
use replyscope_common::config::ApiConfig;
use std::time::Duration;
use thiserror::Error;

/// Spinner glyphs cycled by page number
pub const PROGRESS_GLYPHS: [char; 5] = [' ', '\u{25D0}', '\u{25D1}', '\u{25D2}', '\u{25D3}'];

/// Fixed mode selector sent with every request
const SEARCH_MODE: &str = "0";

/// Reply fetcher errors
#[derive(Debug, Error)]
pub enum FetchError {
    /// Endpoint answered with a non-success HTTP status
    #[error("Request failed with HTTP status {0}")]
    Transport(u16),

    /// Endpoint answered but reported a non-zero application code
    #[error("Remote service returned error code {0}")]
    Application(i64),

    /// No HTTP response at all (connect failure, timeout, ...)
    #[error("Network error: {0}")]
    Network(String),

    /// Response body does not have the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Empty, or not usable as part of a file name
    #[error("Identifier must be non-empty and free of path separators and '..'")]
    InvalidIdentifier,

    #[error("Page size must be positive")]
    InvalidPageSize,
}

/// Whether `identifier` can be sent to the service and embedded in
/// artifact file names without leaving the output directory
pub fn is_valid_identifier(identifier: &str) -> bool {
    !identifier.trim().is_empty()
        && !identifier.contains(['/', '\\', '\0'])
        && !identifier.contains("..")
}

/// Progress line shown while page `page_number` is being collected
pub fn progress_indicator(page_number: u32) -> String {
    let glyph = PROGRESS_GLYPHS[page_number as usize % PROGRESS_GLYPHS.len()];
    format!("Querying... {glyph}")
}

/// Reply endpoint client
pub struct ReplyFetcher {
    http_client: reqwest::Client,
    base_url: String,
    page_delay: Duration,
}

impl ReplyFetcher {
    pub fn new(config: &ApiConfig) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.clone(),
            page_delay: Duration::from_millis(config.page_delay_ms),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Request a single page
    pub async fn fetch_page(
        &self,
        identifier: &str,
        page_number: u32,
        page_size: u32,
    ) -> Result<ReplyPage, FetchError> {
        tracing::debug!(
            uid = %identifier,
            page = page_number,
            page_size = page_size,
            "Requesting reply page"
        );

        let response = self
            .http_client
            .get(&self.base_url)
            .query(&[
                ("uid", identifier.to_string()),
                ("pn", page_number.to_string()),
                ("ps", page_size.to_string()),
                ("mode", SEARCH_MODE.to_string()),
            ])
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(uid = %identifier, page = page_number, status = status.as_u16(), "Reply page request failed");
            return Err(FetchError::Transport(status.as_u16()));
        }

        let envelope: ReplyEnvelope = response
            .json()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))?;

        if envelope.code != 0 {
            tracing::warn!(
                uid = %identifier,
                page = page_number,
                code = envelope.code,
                service_message = envelope.message.as_deref().unwrap_or(""),
                "Reply service reported an error"
            );
            return Err(FetchError::Application(envelope.code));
        }

        envelope
            .data
            .ok_or_else(|| FetchError::Parse("successful response without data".to_string()))
    }

    /// Collect every reply of `identifier`, in page order
    ///
    /// `on_progress` receives a cycling indicator after each collected page.
    pub async fn fetch_all<F>(
        &self,
        identifier: &str,
        page_size: u32,
        on_progress: F,
    ) -> Result<Vec<Record>, FetchError>
    where
        F: Fn(&str),
    {
        if !is_valid_identifier(identifier) {
            return Err(FetchError::InvalidIdentifier);
        }
        if page_size == 0 {
            return Err(FetchError::InvalidPageSize);
        }

        let mut records = Vec::new();
        let mut page_number: u32 = 1;

        loop {
            let page = self.fetch_page(identifier, page_number, page_size).await?;
            let is_end = page.cursor.is_end;
            records.extend(page.into_records());

            on_progress(&progress_indicator(page_number));

            if is_end {
                break;
            }

            page_number += 1;
            if !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }
        }

        tracing::info!(
            uid = %identifier,
            pages = page_number,
            records = records.len(),
            "Collected all reply pages"
        );

        Ok(records)
    }
}
