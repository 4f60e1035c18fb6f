//! Run configuration.
//!
//! Defaults are overridden by environment variables (a `.env` file is loaded
//! by `main` through `dotenv`), which are in turn overridden by CLI flags.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "https://www.vlr.gg";
pub const DEFAULT_USER_AGENT: &str = "rankforge/0.1 (+dataset builder)";
pub const MAX_CONCURRENCY: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub struct BuildConfig {
    pub base_url: String,
    pub user_agent: String,
    /// Results listing pages to scan.
    pub pages: u32,
    /// Feature window sizes, e.g. recent-5 and recent-10.
    pub windows: Vec<usize>,
    /// Substrings marking a tier-1 event. Empty accepts every event.
    pub tier1_markers: Vec<String>,
    /// Team names that mean "not decided yet".
    pub placeholders: Vec<String>,
    pub delay_ms: u64,
    pub timeout_secs: u64,
    pub concurrency: usize,
    /// Records kept per team history.
    pub history_limit: usize,
    /// Completed-match pages fetched per team.
    pub history_pages: u32,
    /// Rows where either team used fewer records than this are dropped.
    pub min_matches: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            pages: 1,
            windows: vec![5, 10],
            tier1_markers: vec!["Masters".to_string(), "Champions".to_string()],
            placeholders: vec!["TBD".to_string()],
            delay_ms: 500,
            timeout_secs: 20,
            concurrency: 4,
            history_limit: 50,
            history_pages: 1,
            min_matches: 0,
        }
    }
}

impl BuildConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from defaults plus whatever `lookup` returns for each known key.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("SCRAPER_BASE_URL") {
            config.base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("SCRAPER_USER_AGENT") {
            config.user_agent = v;
        }
        if let Some(v) = lookup("SCRAPER_PAGES") {
            config.pages = parse_value("SCRAPER_PAGES", &v)?;
        }
        if let Some(v) = lookup("SCRAPER_WINDOWS") {
            config.windows = parse_list("SCRAPER_WINDOWS", &v)?;
        }
        if let Some(v) = lookup("SCRAPER_TIER1_MARKERS") {
            config.tier1_markers = split_list(&v);
        }
        if let Some(v) = lookup("SCRAPER_PLACEHOLDERS") {
            config.placeholders = split_list(&v);
        }
        if let Some(v) = lookup("SCRAPER_DELAY_MS") {
            config.delay_ms = parse_value("SCRAPER_DELAY_MS", &v)?;
        }
        if let Some(v) = lookup("SCRAPER_TIMEOUT_SECS") {
            config.timeout_secs = parse_value("SCRAPER_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("SCRAPER_CONCURRENCY") {
            config.concurrency = parse_value("SCRAPER_CONCURRENCY", &v)?;
        }
        if let Some(v) = lookup("SCRAPER_HISTORY_LIMIT") {
            config.history_limit = parse_value("SCRAPER_HISTORY_LIMIT", &v)?;
        }
        if let Some(v) = lookup("SCRAPER_HISTORY_PAGES") {
            config.history_pages = parse_value("SCRAPER_HISTORY_PAGES", &v)?;
        }
        if let Some(v) = lookup("SCRAPER_MIN_MATCHES") {
            config.min_matches = parse_value("SCRAPER_MIN_MATCHES", &v)?;
        }

        Ok(config)
    }

    /// Reject configurations that cannot produce a dataset. Called before
    /// the first fetch.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pages == 0 {
            return Err(ConfigError::ZeroPages);
        }
        if self.windows.is_empty() {
            return Err(ConfigError::NoWindows);
        }
        if self.windows.contains(&0) {
            return Err(ConfigError::ZeroWindow);
        }
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(ConfigError::Concurrency {
                got: self.concurrency,
                max: MAX_CONCURRENCY,
            });
        }
        if self.history_limit == 0 {
            return Err(ConfigError::ZeroHistoryLimit);
        }
        if self.history_pages == 0 {
            return Err(ConfigError::ZeroHistoryPages);
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    /// Windows sorted ascending with duplicates removed.
    pub fn normalized_windows(&self) -> Vec<usize> {
        let mut windows = self.windows.clone();
        windows.sort_unstable();
        windows.dedup();
        windows
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

fn parse_value<T: FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key,
        value: raw.to_string(),
    })
}

fn parse_list<T: FromStr>(key: &'static str, raw: &str) -> Result<Vec<T>, ConfigError> {
    split_list(raw)
        .iter()
        .map(|item| parse_value(key, item))
        .collect()
}

/// Comma separated list, blanks dropped.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
