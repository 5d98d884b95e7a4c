//! Pulse Harvester - collect test logs from a build/test message feed
//!
//! Reads Pulse test-completion messages as JSON lines, keeps the ones
//! matching the configured filter and stores each referenced log under the
//! output directory together with a JSON sidecar.
//!
//! ## Usage
//!
//! ```bash
//! # Harvest talos logs from a bridge writing Pulse messages to stdout
//! pulse-bridge | pulse-harvester --testlist talos
//!
//! # Replay a captured feed, dumping each log to the console
//! pulse-harvester --feed messages.jsonl --dump --output-dir ./logs/
//! ```

mod cli;

use clap::Parser;
use tokio::io::{AsyncBufRead, BufReader};
use tracing::{error, info};

use cli::Cli;
use harvest_core::{Harvester, JsonLinesFeed};
use harvest_logging::HarvestSubscriberBuilder;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut logging = HarvestSubscriberBuilder::new().with_config(cli.log_config());
    if let Some(file) = cli.log_file_config() {
        logging = logging.with_file_output(file);
    }

    let _log_guard = match logging.try_init() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli).await {
        error!("{e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.harvester_config();
    let mut harvester = Harvester::from_config(&config).await?;

    info!(
        trees = ?config.subscription.trees,
        platforms = ?config.subscription.platforms,
        build_types = ?config.subscription.build_types,
        test_types = ?config.filter.allowed_test_types,
        output_dir = %config.output_dir.display(),
        "Harvester started"
    );

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = if cli.feed == "-" {
        Box::new(BufReader::new(tokio::io::stdin()))
    } else {
        let file = tokio::fs::File::open(&cli.feed)
            .await
            .map_err(|e| anyhow::anyhow!("failed to open feed {}: {}", cli.feed, e))?;
        Box::new(BufReader::new(file))
    };

    let mut feed = JsonLinesFeed::new(reader, config.subscription.clone());
    let stats = harvester.run(&mut feed).await?;

    info!(
        received = stats.received,
        persisted = stats.persisted,
        rejected = stats.rejected,
        failed = stats.failed,
        malformed = stats.malformed,
        "Harvest complete"
    );
    Ok(())
}
