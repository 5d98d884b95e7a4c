//! The harvest loop: feed → filter → persist, one event at a time

use harvest_logging::spans;
use serde::Serialize;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::{ErrorPolicy, HarvesterConfig};
use crate::error::{HarvestError, HarvestResult};
use crate::event::TestEvent;
use crate::feed::EventFeed;
use crate::fetch::{HttpFetcher, LogFetcher};
use crate::filter::{EventFilter, FilterDecision, RejectReason};
use crate::persist::{LogPersister, PersistedLog};

/// Counters for one harvester run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HarvestStats {
    /// Feed items seen, malformed ones included; feed source failures are not counted
    pub received: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub persisted: u64,
    /// Accepted events whose fetch or write failed
    pub failed: u64,
    pub malformed: u64,
}

/// What happened to one accepted or rejected event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Persisted(PersistedLog),
    Rejected(RejectReason),
}

/// Single-worker harvester
///
/// Owns its filter and persister; each event is filtered and persisted to
/// completion before the next one is pulled from the feed.
pub struct Harvester<F> {
    filter: EventFilter,
    persister: LogPersister<F>,
    error_policy: ErrorPolicy,
    stats: HarvestStats,
}

impl Harvester<HttpFetcher> {
    /// Build an HTTP-backed harvester from a validated configuration
    ///
    /// Also creates the output directory.
    pub async fn from_config(config: &HarvesterConfig) -> HarvestResult<Self> {
        config.validate()?;

        let fetcher = HttpFetcher::new(config.fetch_timeout)?;
        let persister = LogPersister::new(fetcher, &config.output_dir)
            .with_console_dump(config.dump_to_console);
        let harvester = Harvester::new(
            EventFilter::new(config.filter.clone()),
            persister,
            config.error_policy,
        );
        harvester.prepare().await?;
        Ok(harvester)
    }
}

impl<F: LogFetcher> Harvester<F> {
    pub fn new(filter: EventFilter, persister: LogPersister<F>, error_policy: ErrorPolicy) -> Self {
        Self {
            filter,
            persister,
            error_policy,
            stats: HarvestStats::default(),
        }
    }

    /// Create the output directory
    pub async fn prepare(&self) -> HarvestResult<()> {
        self.persister.prepare().await
    }

    pub fn stats(&self) -> HarvestStats {
        self.stats
    }

    fn stats_json(&self) -> String {
        serde_json::to_string(&self.stats).unwrap_or_else(|_| format!("{:?}", self.stats))
    }

    /// Filter one event and persist it if accepted
    ///
    /// Errors are returned as-is; the error policy is not consulted.
    pub async fn handle(&mut self, event: &TestEvent) -> HarvestResult<EventOutcome> {
        match self.filter.evaluate(event) {
            FilterDecision::Reject(reason) => {
                self.stats.rejected += 1;
                debug!(%reason, "Event rejected");
                Ok(EventOutcome::Rejected(reason))
            }
            FilterDecision::Accept => {
                self.stats.accepted += 1;
                info!(log_url = %event.log_url, "Harvesting log");
                match self.persister.persist(event).await {
                    Ok(persisted) => {
                        self.stats.persisted += 1;
                        info!(
                            path = %persisted.log_path.display(),
                            bytes = persisted.bytes_written,
                            "Log persisted"
                        );
                        Ok(EventOutcome::Persisted(persisted))
                    }
                    Err(e) => {
                        self.stats.failed += 1;
                        Err(e)
                    }
                }
            }
        }
    }

    /// Process one feed item and apply the error policy
    ///
    /// Returns `Ok(None)` for a failed or malformed item that was logged and
    /// skipped. Feed source failures are always returned.
    pub async fn process(
        &mut self,
        item: HarvestResult<TestEvent>,
    ) -> HarvestResult<Option<EventOutcome>> {
        let event = match item {
            Ok(event) => {
                self.stats.received += 1;
                event
            }
            Err(e @ HarvestError::Feed(_)) => return Err(e),
            Err(e) => {
                self.stats.received += 1;
                self.stats.malformed += 1;
                error!(stage = e.stage(), error = %e, "Dropping malformed event");
                return self.apply_policy(e);
            }
        };

        let span = info_span!(
            spans::HARVEST_EVENT,
            builder_name = %event.builder_name,
            test_type = %event.test_type,
        );

        match self.handle(&event).instrument(span).await {
            Ok(outcome) => Ok(Some(outcome)),
            Err(e) => {
                error!(
                    builder_name = %event.builder_name,
                    test_type = %event.test_type,
                    log_url = %event.log_url,
                    stage = e.stage(),
                    error = %e,
                    "Failed to harvest log"
                );
                self.apply_policy(e)
            }
        }
    }

    fn apply_policy(&self, e: HarvestError) -> HarvestResult<Option<EventOutcome>> {
        match self.error_policy {
            ErrorPolicy::Continue => Ok(None),
            ErrorPolicy::Abort => Err(e),
        }
    }

    /// Harvest until the feed ends
    pub async fn run<E: EventFeed + ?Sized>(&mut self, feed: &mut E) -> HarvestResult<HarvestStats> {
        let span = info_span!(spans::HARVEST_RUN, output_dir = %self.persister.output_dir().display());

        async {
            while let Some(item) = feed.next_event().await {
                if let Err(e) = self.process(item).await {
                    warn!(stats = %self.stats_json(), "Harvest aborted");
                    return Err(e);
                }
            }
            info!(stats = %self.stats_json(), "Feed ended");
            Ok(self.stats)
        }
        .instrument(span)
        .await
    }
}
