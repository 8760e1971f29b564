//! ycrawler: a periodic link-discovery crawler
//!
//! This crate polls a news aggregator's front page, picks out stories it has not
//! archived yet, and for each of them downloads the linked article together with
//! every external page referenced from the story's discussion thread.

pub mod config;
pub mod crawler;
pub mod item;
pub mod storage;

use std::time::Duration;
use thiserror::Error;

/// Main error type for ycrawler operations
#[derive(Debug, Error)]
pub enum CrawlerError {
    #[error("Unsupported URL scheme for {url}")]
    UnsupportedScheme { url: String },

    #[error("HTTP error for {url}: {source}")]
    Transport { url: String, source: reqwest::Error },

    #[error("Request timeout for {url} after {after:?}")]
    Timeout { url: String, after: Duration },

    #[error("HTTP status {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("HTML parse error for {url}: {message}")]
    Parse { url: String, message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Fetch gate closed before {url} could be admitted")]
    GateClosed { url: String },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

// Re-export commonly used types
pub use config::Config;
pub use crawler::{FetchGate, PollScheduler};
pub use item::{Item, ItemId};
pub use storage::{DirectoryStore, ItemStore};
