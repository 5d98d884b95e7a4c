//! Error types for the harvester pipeline

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while harvesting a single test log
#[derive(Debug, Error)]
pub enum HarvestError {
    /// The log URL could not be retrieved
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// Output directory or file could not be written
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A feed payload is not a usable test event
    #[error("malformed test event ({reason}): {payload}")]
    MalformedEvent { payload: String, reason: String },

    /// Sidecar encoding error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Log body could not be decoded for the console dump
    #[error("failed to decode {url}: {reason}")]
    Decode { url: String, reason: String },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// The feed source failed
    #[error("feed error: {0}")]
    Feed(String),
}

impl HarvestError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HarvestError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn fetch(url: impl Into<String>, reason: impl ToString) -> Self {
        HarvestError::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn malformed(payload: impl Into<String>, reason: impl ToString) -> Self {
        HarvestError::MalformedEvent {
            payload: payload.into(),
            reason: reason.to_string(),
        }
    }

    /// Pipeline stage the error belongs to, for log context
    pub fn stage(&self) -> &'static str {
        match self {
            HarvestError::Fetch { .. } => "fetch",
            HarvestError::Io { .. } | HarvestError::Serialization(_) => "write",
            HarvestError::MalformedEvent { .. } => "parse",
            HarvestError::Decode { .. } => "decode",
            HarvestError::Config(_) => "config",
            HarvestError::Feed(_) => "feed",
        }
    }
}

/// Result type alias for harvester operations
pub type HarvestResult<T> = Result<T, HarvestError>;
