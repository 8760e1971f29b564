//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the shared HTTP client with a proper user agent string
//! - Admitting each request through the fetch gate
//! - Bounding each request, body included, with a hard timeout
//! - Error classification (transport, timeout, HTTP status)

use crate::config::{Config, CrawlerConfig, UserAgentConfig};
use crate::crawler::gate::FetchGate;
use crate::CrawlerError;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::borrow::Cow;
use std::time::Duration;
use url::Url;

/// A successfully downloaded resource
#[derive(Debug, Clone)]
pub struct Page {
    /// Final URL after redirects
    pub final_url: Url,

    /// HTTP status code
    pub status_code: u16,

    /// Content-Type header value, if any
    pub content_type: Option<String>,

    /// Raw body
    pub body: Vec<u8>,
}

impl Page {
    /// Body decoded as UTF-8, with invalid sequences replaced
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `crawler` - Timeouts are taken from here
///
/// # Example
///
/// ```no_run
/// use ycrawler::config::{CrawlerConfig, UserAgentConfig};
/// use ycrawler::crawler::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default(), &CrawlerConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    crawler: &CrawlerConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(crawler.fetch_timeout())
        .connect_timeout(crawler.connect_timeout())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Gated, time-bounded HTTP GET
///
/// Cloning is cheap; clones share the connection pool and the gate.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    gate: FetchGate,
    timeout: Duration,
}

impl Fetcher {
    pub fn new(client: Client, gate: FetchGate, timeout: Duration) -> Self {
        Self {
            client,
            gate,
            timeout,
        }
    }

    /// Builds a fetcher with a client configured from `config`
    pub fn from_config(config: &Config, gate: FetchGate) -> Result<Self, CrawlerError> {
        let client = build_http_client(&config.user_agent, &config.crawler)?;
        Ok(Self::new(client, gate, config.crawler.fetch_timeout()))
    }

    pub fn gate(&self) -> &FetchGate {
        &self.gate
    }

    /// Fetches a URL
    ///
    /// Waits for a gate slot first; the timeout only starts once admitted. The
    /// slot is released on every return path and if the future is dropped.
    ///
    /// # Errors
    ///
    /// | Condition | Error |
    /// |-----------|-------|
    /// | Scheme other than http(s) | `UnsupportedScheme` |
    /// | Gate closed | `GateClosed` |
    /// | Non-2xx status | `HttpStatus` |
    /// | No response within the timeout | `Timeout` |
    /// | Connection, TLS, body read failure | `Transport` |
    pub async fn fetch(&self, url: &Url) -> Result<Page, CrawlerError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CrawlerError::UnsupportedScheme {
                url: url.to_string(),
            });
        }

        let Some(_permit) = self.gate.acquire().await else {
            return Err(CrawlerError::GateClosed {
                url: url.to_string(),
            });
        };
        tracing::trace!(
            "Fetching {} ({}/{} slots in use)",
            url,
            self.gate.in_flight(),
            self.gate.capacity()
        );

        match tokio::time::timeout(self.timeout, self.download(url)).await {
            Ok(result) => result,
            Err(_) => Err(CrawlerError::Timeout {
                url: url.to_string(),
                after: self.timeout,
            }),
        }
    }

    async fn download(&self, url: &Url) -> Result<Page, CrawlerError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlerError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .bytes()
            .await
            .map_err(|e| self.classify(url, e))?;

        Ok(Page {
            final_url,
            status_code: status.as_u16(),
            content_type,
            body: body.to_vec(),
        })
    }

    fn classify(&self, url: &Url, error: reqwest::Error) -> CrawlerError {
        if error.is_timeout() {
            CrawlerError::Timeout {
                url: url.to_string(),
                after: self.timeout,
            }
        } else {
            CrawlerError::Transport {
                url: url.to_string(),
                source: error,
            }
        }
    }
}
