//! # Harvest Core
//!
//! Test-log harvesting for build/test message feeds.
//!
//! Test-completion events arrive one at a time from an [`EventFeed`]. Each
//! passes through the [`EventFilter`]; accepted events go to the
//! [`LogPersister`], which downloads the referenced log and writes it to the
//! output directory next to a JSON sidecar describing the event.
//!
//! ## Example
//!
//! ```rust,ignore
//! use harvest_core::{FilterConfig, Harvester, HarvesterConfig, JsonLinesFeed, Subscription};
//!
//! let config = HarvesterConfig::with_output_dir("./logs/")
//!     .with_filter(FilterConfig::default().with_allowed_test_types(["talos"]));
//! let mut harvester = Harvester::from_config(&config).await?;
//!
//! let stdin = tokio::io::BufReader::new(tokio::io::stdin());
//! let mut feed = JsonLinesFeed::new(stdin, Subscription::all());
//! let stats = harvester.run(&mut feed).await?;
//! println!("persisted {} logs", stats.persisted);
//! ```

mod config;
pub mod dump;
mod error;
pub mod event;
pub mod feed;
pub mod fetch;
pub mod filter;
mod harvester;
pub mod persist;

pub use config::{ErrorPolicy, HarvesterConfig};
pub use error::{HarvestError, HarvestResult};
pub use event::TestEvent;
pub use feed::{ChannelFeed, EventFeed, FeedSender, JsonLinesFeed, Subscription, TalosSelection};
pub use fetch::{DEFAULT_FETCH_TIMEOUT, HttpFetcher, LogFetcher};
pub use filter::{EventFilter, FilterConfig, FilterDecision, RejectReason};
pub use harvester::{EventOutcome, HarvestStats, Harvester};
pub use persist::{LogPersister, PersistedLog, sanitize_log_url, sidecar_name};
