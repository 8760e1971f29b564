//! Configuration module for ycrawler
//!
//! This module handles loading, merging and validating configuration. Every
//! setting has a default, an optional TOML file may replace some of them, and
//! command-line values win over both.
//!
//! # Example
//!
//! ```no_run
//! use ycrawler::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("ycrawler.toml")).unwrap();
//! println!("Archiving into {}", config.output.data_dir.display());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, OutputConfig, SourceConfig, UserAgentConfig, DEFAULT_BASE_URL,
};

// Re-export parser functions
pub use parser::{load_config, parse_config, resolve_config, Overrides};
pub use validation::validate;
