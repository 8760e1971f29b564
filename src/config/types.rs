use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Front page of the aggregator polled when no base URL is configured
pub const DEFAULT_BASE_URL: &str = "https://news.ycombinator.com";

/// Main configuration structure for ycrawler
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub source: SourceConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Seconds between two front page polls
    pub poll_interval: u64,

    /// Maximum number of fetches in flight across the whole process
    pub max_concurrent_fetches: u32,

    /// Maximum number of items processed at once within one poll cycle
    pub max_concurrent_items: u32,

    /// Upper bound on a single fetch, body included (seconds)
    pub fetch_timeout: u64,

    /// Upper bound on establishing a connection (seconds)
    pub connect_timeout: u64,

    /// How long in-flight work may keep running after a shutdown signal (seconds)
    pub shutdown_grace: u64,
}

impl CrawlerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            poll_interval: 120,
            max_concurrent_fetches: 8,
            max_concurrent_items: 30,
            fetch_timeout: 10,
            connect_timeout: 5,
            shutdown_grace: 15,
        }
    }
}

/// Where the listing and discussion pages come from
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SourceConfig {
    /// Base URL of the aggregator; the listing is its root page
    pub base_url: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the crawler
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,

    /// URL with information about the crawler (optional)
    pub contact_url: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    ///
    /// Format: `CrawlerName/Version (+ContactURL)`, the parenthesised part only
    /// when a contact URL is configured.
    pub fn header_value(&self) -> String {
        if self.contact_url.is_empty() {
            format!("{}/{}", self.crawler_name, self.crawler_version)
        } else {
            format!(
                "{}/{} (+{})",
                self.crawler_name, self.crawler_version, self.contact_url
            )
        }
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "ycrawler".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: String::new(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Root directory holding one subdirectory per archived item
    pub data_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./news"),
        }
    }
}
