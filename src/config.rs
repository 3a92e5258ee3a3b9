//! Runtime settings.
//!
//! Resolution order, highest first:
//! 1. Command-line flag
//! 2. Environment variable (read by clap alongside the flag)
//! 3. TOML config file
//! 4. Built-in default

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigError, Result};
use crate::table::DEFAULT_PAGE_SIZE;
use crate::theme::Theme;

pub const DEFAULT_CONFIG_FILE: &str = "lead-insights.toml";
pub const DEFAULT_API_URL: &str = "http://localhost:5000";
pub const DEFAULT_SNAPSHOT: &str = "data/sampleData.json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Shape of `lead-insights.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    api_url: Option<String>,
    snapshot: Option<PathBuf>,
    page_size: Option<usize>,
    timeout_secs: Option<u64>,
    theme: Option<Theme>,
}

/// Values given on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub snapshot: Option<PathBuf>,
    pub page_size: Option<usize>,
    pub theme: Option<Theme>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    pub snapshot: PathBuf,
    pub page_size: usize,
    pub timeout: Duration,
    pub theme: Theme,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            snapshot: PathBuf::from(DEFAULT_SNAPSHOT),
            page_size: DEFAULT_PAGE_SIZE,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            theme: Theme::default(),
        }
    }
}

impl Config {
    /// Resolve settings. An explicit `path` must exist; without one,
    /// `lead-insights.toml` in the working directory is used if present.
    pub fn load(path: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let file = match path {
            Some(path) => read_file(path)?,
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    read_file(fallback)?
                } else {
                    FileConfig::default()
                }
            }
        };

        let defaults = Config::default();
        let config = Config {
            api_url: overrides
                .api_url
                .or(file.api_url)
                .unwrap_or(defaults.api_url),
            snapshot: overrides
                .snapshot
                .or(file.snapshot)
                .unwrap_or(defaults.snapshot),
            page_size: overrides
                .page_size
                .or(file.page_size)
                .unwrap_or(defaults.page_size),
            timeout: file
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            theme: overrides.theme.or(file.theme).unwrap_or(defaults.theme),
        };

        config.validate()?;
        tracing::debug!(
            api_url = %config.api_url,
            snapshot = %config.snapshot.display(),
            page_size = config.page_size,
            "configuration resolved"
        );
        Ok(config)
    }

    fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                key: "api_url",
                value: self.api_url.clone(),
            });
        }
        if self.page_size == 0 {
            return Err(ConfigError::Invalid {
                key: "page_size",
                value: "0".to_string(),
            });
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid {
                key: "timeout_secs",
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

fn read_file(path: &Path) -> std::result::Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}
