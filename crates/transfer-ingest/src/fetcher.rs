//! Listing page fetcher with bounded retry

use reqwest::Client;
use tracing::{debug, warn};
use transfer_common::Source;
use url::Url;

use crate::config::FetchConfig;
use crate::error::{IngestError, Result};

/// HTTP client for listing pages
pub struct PageFetcher {
    client: Client,
    base_url: Url,
    config: FetchConfig,
}

impl PageFetcher {
    pub fn new(base_url: Url, config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| IngestError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    /// Absolute URL of one page of a source
    pub fn page_url(&self, source: &Source, page: u32) -> Result<Url> {
        Ok(source.page_url(&self.base_url, page)?)
    }

    /// Fetch one page, retrying transient failures with a fixed delay
    pub async fn fetch_page(&self, source: &Source, page: u32) -> Result<String> {
        let url = self.page_url(source, page)?;
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match self.fetch_once(&url).await {
                Ok(body) => {
                    debug!(source = %source.id, page, attempt, bytes = body.len(), "Fetched page");
                    return Ok(body);
                },
                Err(e) => {
                    warn!(
                        source = %source.id,
                        page,
                        attempt,
                        max_attempts,
                        error = %e,
                        "Page fetch attempt failed"
                    );
                    last_error = e;

                    if attempt < max_attempts {
                        tokio::time::sleep(self.config.retry_delay()).await;
                    }
                },
            }
        }

        Err(IngestError::Fetch {
            url: url.to_string(),
            attempts: max_attempts,
            message: last_error,
        })
    }

    /// Single GET; every failure is reported as transient
    async fn fetch_once(&self, url: &Url) -> std::result::Result<String, String> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP error: {}", status));
        }

        response.text().await.map_err(|e| e.to_string())
    }
}
