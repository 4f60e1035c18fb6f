use std::fmt;

use thiserror::Error;

/// A document could not be retrieved. Recovered by skipping the match or team.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("fetch failed for {url}: {cause}")]
pub struct FetchError {
    pub url: String,
    pub cause: String,
    /// Set when the stop signal prevented the request from being sent.
    pub cancelled: bool,
}

impl FetchError {
    pub fn new(url: impl Into<String>, cause: impl fmt::Display) -> Self {
        Self {
            url: url.into(),
            cause: cause.to_string(),
            cancelled: false,
        }
    }

    pub fn cancelled(url: impl Into<String>) -> Self {
        Self {
            cancelled: true,
            ..Self::new(url, "cancelled before dispatch")
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// A document was fetched but is structurally unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("extraction failed: {reason}")]
pub struct ExtractionError {
    pub reason: String,
}

impl ExtractionError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A single field of an otherwise usable record could not be parsed.
/// Never escalates; the owning record keeps the field as absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    pub field: &'static str,
    pub raw: String,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unparseable {} '{}'", self.field, self.raw)
    }
}

/// Per-match / per-team failure. Cloneable so a memoised failure can be
/// handed to every waiter on the same team.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("{url}: {source}")]
    Extraction {
        url: String,
        #[source]
        source: ExtractionError,
    },
}

impl PipelineError {
    pub fn extraction(url: impl Into<String>, source: ExtractionError) -> Self {
        Self::Extraction {
            url: url.into(),
            source,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Fetch(e) if e.is_cancelled())
    }
}

/// Invalid configuration. The only fatal class, raised before any fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("at least one listing page must be requested")]
    ZeroPages,
    #[error("at least one feature window is required")]
    NoWindows,
    #[error("feature window sizes must be positive")]
    ZeroWindow,
    #[error("concurrency must be between 1 and {max}, got {got}")]
    Concurrency { got: usize, max: usize },
    #[error("history limit must be positive")]
    ZeroHistoryLimit,
    #[error("history pages must be positive")]
    ZeroHistoryPages,
    #[error("request timeout must be positive")]
    ZeroTimeout,
    #[error("invalid value '{value}' for {key}")]
    InvalidEnv { key: &'static str, value: String },
}
