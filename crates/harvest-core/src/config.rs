//! Configuration for the harvester

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{HarvestError, HarvestResult};
use crate::feed::Subscription;
use crate::fetch::DEFAULT_FETCH_TIMEOUT;
use crate::filter::FilterConfig;

/// What the driver does when one event fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Log the failure and move on to the next event
    #[default]
    Continue,
    /// Stop harvesting and return the error
    Abort,
}

/// Configuration for a harvester run
#[derive(Debug, Clone)]
pub struct HarvesterConfig {
    /// Feed-side subscription
    pub subscription: Subscription,
    /// Event filter criteria
    pub filter: FilterConfig,
    /// Where logs and sidecars are written
    pub output_dir: PathBuf,
    /// Print each harvested log to stdout
    pub dump_to_console: bool,
    /// HTTP request timeout for log downloads
    pub fetch_timeout: Duration,
    /// Per-event failure handling
    pub error_policy: ErrorPolicy,
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self {
            subscription: Subscription::default(),
            filter: FilterConfig::default(),
            output_dir: PathBuf::from("./logs/"),
            dump_to_console: false,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            error_policy: ErrorPolicy::default(),
        }
    }
}

impl HarvesterConfig {
    /// Create a configuration writing to a custom output directory
    pub fn with_output_dir(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_subscription(mut self, subscription: Subscription) -> Self {
        self.subscription = subscription;
        self
    }

    pub fn with_filter(mut self, filter: FilterConfig) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_console_dump(mut self, enabled: bool) -> Self {
        self.dump_to_console = enabled;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    /// Check the configuration before starting a run
    pub fn validate(&self) -> HarvestResult<()> {
        self.filter.validate()?;
        if self.output_dir.as_os_str().is_empty() {
            return Err(HarvestError::Config("output directory is empty".to_string()));
        }
        if self.fetch_timeout.is_zero() {
            return Err(HarvestError::Config("fetch timeout must be non-zero".to_string()));
        }
        Ok(())
    }
}
