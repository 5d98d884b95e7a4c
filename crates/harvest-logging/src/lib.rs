//! Logging setup for the Pulse log harvester
//!
//! Builds a `tracing` subscriber from a [`LogConfig`]:
//!
//! - **Console output**: pretty human-readable lines (default) or JSONL
//! - **File output**: JSONL files with daily/hourly rotation via tracing-appender
//! - **Env filter**: `RUST_LOG` overrides the configured default level
//!
//! # Quick Start
//!
//! ```ignore
//! use harvest_logging::{HarvestSubscriberBuilder, LogConfig};
//!
//! // Keep the guard alive for the lifetime of the process
//! let _guard = HarvestSubscriberBuilder::new()
//!     .with_config(LogConfig::interactive())
//!     .with_level("debug")
//!     .try_init()?;
//!
//! tracing::info!(builder = "Linux mozilla-central talos", "Harvesting log");
//! ```

pub mod config;

pub use config::{ConsoleConfig, ConsoleFormat, FileConfig, JsonlConfig, LogConfig, RotationStrategy};

use std::fs::{self, File};

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Errors raised while installing the global subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    /// Log file or directory could not be created
    #[error("failed to open log output: {0}")]
    Io(#[from] std::io::Error),

    /// Rolling appender could not be initialized
    #[error("failed to create rolling appender: {0}")]
    Appender(String),

    /// A global subscriber is already installed
    #[error("global subscriber already set: {0}")]
    AlreadyInitialized(String),
}

/// Standard span names for consistency across crates
pub mod spans {
    pub const HARVEST_RUN: &str = "harvest_run";
    pub const HARVEST_EVENT: &str = "harvest_event";
    pub const FETCH_LOG: &str = "fetch_log";
    pub const WRITE_LOG: &str = "write_log";
}

/// Builder for configuring and initializing the harvester's logging subscriber
pub struct HarvestSubscriberBuilder {
    config: LogConfig,
}

impl HarvestSubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    ///
    /// Default: pretty output to console at `info`
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Set the console line format
    pub fn with_console_format(mut self, format: ConsoleFormat) -> Self {
        self.config.console.format = format;
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// The configuration this builder will install
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Install the subscriber globally
    ///
    /// Returns the file writer guard when file output is enabled; it must be
    /// kept alive until the process exits or buffered lines are lost.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.config.default_level));

        let jsonl = &self.config.jsonl;

        let console_layer = if self.config.console.enabled {
            let layer = match self.config.console.format {
                ConsoleFormat::Pretty => tracing_subscriber::fmt::layer()
                    .with_ansi(self.config.console.ansi)
                    .with_target(true)
                    .boxed(),
                ConsoleFormat::Json => tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(jsonl.include_spans)
                    .flatten_event(jsonl.flatten_events)
                    .with_file(jsonl.include_location)
                    .with_line_number(jsonl.include_location)
                    .boxed(),
            };
            Some(layer)
        } else {
            None
        };

        let (file_layer, guard) = match &self.config.file {
            Some(file_config) => {
                let (writer, guard) = create_file_writer(file_config)?;
                let layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(jsonl.include_spans)
                    .flatten_event(jsonl.flatten_events)
                    .with_file(jsonl.include_location)
                    .with_line_number(jsonl.include_location)
                    .with_writer(writer);
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };

        Registry::default()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

        Ok(guard)
    }
}

impl Default for HarvestSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Open the non-blocking writer for file output
///
/// `Never` truncates a single `<prefix>.jsonl`; the rotating strategies append.
fn create_file_writer(file_config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    fs::create_dir_all(&file_config.directory)?;

    let rotation = match file_config.rotation {
        RotationStrategy::Never => {
            let file_path = file_config
                .directory
                .join(format!("{}.jsonl", file_config.prefix));
            let file = File::create(&file_path)?;
            return Ok(tracing_appender::non_blocking(file));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let appender = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(&file_config.prefix)
        .filename_suffix("jsonl")
        .build(&file_config.directory)
        .map_err(|e| LoggingError::Appender(e.to_string()))?;

    Ok(tracing_appender::non_blocking(appender))
}

/// Initialize logging for testing (minimal output)
///
/// Safe to call from many tests; only the first call installs a subscriber.
pub fn init_testing() {
    let _ = HarvestSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}
