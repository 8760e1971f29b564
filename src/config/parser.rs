use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use std::path::{Path, PathBuf};

/// Values given on the command line that take precedence over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub data_dir: Option<PathBuf>,
    pub poll_interval: Option<u64>,
    pub max_concurrent_fetches: Option<u32>,
}

/// Loads and parses a configuration file from the given path
///
/// Missing sections and keys fall back to their defaults.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use ycrawler::config::load_config;
///
/// let config = load_config(Path::new("ycrawler.toml")).unwrap();
/// println!("Polling every {}s", config.crawler.poll_interval);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let config = read_config(path)?;
    validate(&config)?;
    Ok(config)
}

/// Parses a configuration from a TOML string without validating it
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Builds the effective configuration from an optional file and CLI overrides
///
/// Precedence is overrides, then file, then defaults. Validation runs once on
/// the merged result so a file value that the command line replaces is never
/// rejected on its own.
pub fn resolve_config(path: Option<&Path>, overrides: Overrides) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(path) => read_config(path)?,
        None => Config::default(),
    };

    if let Some(data_dir) = overrides.data_dir {
        config.output.data_dir = data_dir;
    }
    if let Some(poll_interval) = overrides.poll_interval {
        config.crawler.poll_interval = poll_interval;
    }
    if let Some(max) = overrides.max_concurrent_fetches {
        config.crawler.max_concurrent_fetches = max;
    }

    validate(&config)?;
    Ok(config)
}

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}
