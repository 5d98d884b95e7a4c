//! Command-line flags and their translation into harvester configuration

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use harvest_core::{ErrorPolicy, FilterConfig, HarvesterConfig, Subscription, TalosSelection};
use harvest_logging::{ConsoleFormat, FileConfig, LogConfig};

/// Pulse test log harvester
#[derive(Debug, Parser)]
#[command(name = "pulse-harvester")]
#[command(about = "Harvest test logs announced on a build/test message feed")]
#[command(version)]
pub struct Cli {
    /// Comma separated list of trees to watch
    #[arg(long, value_delimiter = ',', default_value = "mozilla-central")]
    pub tree: Vec<String>,

    /// Comma separated list of platforms to watch
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "linux,linux64,win32,win64,macosx,macosx64"
    )]
    pub platforms: Vec<String>,

    /// Comma separated list of build types (opt, debug)
    #[arg(long, value_delimiter = ',', default_value = "debug,opt")]
    pub buildtype: Vec<String>,

    /// Comma separated list of test types to harvest [default: every test type;
    /// pass `--testlist talos` to keep only talos]
    #[arg(long, value_delimiter = ',')]
    pub testlist: Vec<String>,

    /// Skip talos runs
    #[arg(long)]
    pub exclude_talos: bool,

    /// Skip non-talos runs
    #[arg(long)]
    pub exclude_non_talos: bool,

    /// Print each harvested log to stdout
    #[arg(long)]
    pub dump: bool,

    /// Directory that receives logs and sidecars
    #[arg(long, default_value = "./logs/")]
    pub output_dir: PathBuf,

    /// JSON-lines feed to read, `-` for stdin
    #[arg(long, default_value = "-")]
    pub feed: String,

    /// HTTP timeout for log downloads, in seconds
    #[arg(long, default_value_t = 60)]
    pub fetch_timeout_secs: u64,

    /// Stop at the first event that fails instead of moving on
    #[arg(long)]
    pub fail_fast: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Console log format (pretty, json)
    #[arg(long, default_value = "pretty")]
    pub log_format: ConsoleFormat,

    /// Also write JSONL logs to this directory
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Drop blanks left by stray commas
fn clean(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

impl Cli {
    /// Build the harvester configuration from the parsed flags
    pub fn harvester_config(&self) -> HarvesterConfig {
        let talos = if self.exclude_talos {
            TalosSelection::Exclude
        } else if self.exclude_non_talos {
            TalosSelection::Only
        } else {
            TalosSelection::Include
        };

        let subscription = Subscription::all()
            .with_trees(clean(&self.tree))
            .with_platforms(clean(&self.platforms))
            .with_build_types(clean(&self.buildtype))
            .with_talos(talos);

        let filter = FilterConfig::default()
            .with_allowed_test_types(clean(&self.testlist))
            .with_exclude_talos(self.exclude_talos)
            .with_exclude_non_talos(self.exclude_non_talos);

        let error_policy = if self.fail_fast {
            ErrorPolicy::Abort
        } else {
            ErrorPolicy::Continue
        };

        HarvesterConfig::with_output_dir(&self.output_dir)
            .with_subscription(subscription)
            .with_filter(filter)
            .with_console_dump(self.dump)
            .with_fetch_timeout(Duration::from_secs(self.fetch_timeout_secs))
            .with_error_policy(error_policy)
    }

    /// Build the console logging configuration from the parsed flags
    pub fn log_config(&self) -> LogConfig {
        let mut config = LogConfig::interactive();
        config.default_level = self.log_level.clone();
        config.console.format = self.log_format;
        config
    }

    /// JSONL file output requested with `--log-file`
    pub fn log_file_config(&self) -> Option<FileConfig> {
        self.log_file.as_ref().map(|directory| FileConfig {
            directory: directory.clone(),
            ..FileConfig::default()
        })
    }
}
