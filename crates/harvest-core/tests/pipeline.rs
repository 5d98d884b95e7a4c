//! Integration tests for the harvest pipeline
//!
//! Uses an in-memory fetcher so filtering, persistence and the driver loop
//! can be exercised without network access.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use tempfile::TempDir;

use harvest_core::{
    ChannelFeed, ErrorPolicy, EventFilter, EventOutcome, FilterConfig, HarvestError,
    HarvestResult, Harvester, JsonLinesFeed, LogFetcher, LogPersister, RejectReason, Subscription, TestEvent,
};

/// Fetcher serving fixed bodies; unknown URLs fail like a 404
#[derive(Clone, Default)]
struct StaticFetcher {
    bodies: Arc<HashMap<String, Bytes>>,
    calls: Arc<AtomicUsize>,
}

impl StaticFetcher {
    fn with(entries: &[(&str, &[u8])]) -> Self {
        let bodies = entries
            .iter()
            .map(|(url, body)| (url.to_string(), Bytes::copy_from_slice(body)))
            .collect();
        Self {
            bodies: Arc::new(bodies),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LogFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> HarvestResult<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.bodies.get(url).cloned().ok_or_else(|| HarvestError::Fetch {
            url: url.to_string(),
            reason: "HTTP status 404 Not Found".to_string(),
        })
    }
}

fn talos_event(url: &str) -> TestEvent {
    TestEvent::new("talos", true, "Rev3 Fedora 12 mozilla-central talos tp5", url)
}

fn file_count(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

#[tokio::test]
async fn test_talos_scenario_writes_log_and_sidecar() {
    let temp = TempDir::new().unwrap();
    let fetcher = StaticFetcher::with(&[("http://x/log_1.txt", &b"tp5 results"[..])]);
    let persister = LogPersister::new(fetcher, temp.path());
    persister.prepare().await.unwrap();

    let filter = EventFilter::new(FilterConfig::default().with_allowed_test_types(["talos"]));
    let event = talos_event("http://x/log_1.txt");
    assert!(filter.accept(&event));

    let persisted = persister.persist(&event).await.unwrap();
    assert_eq!(persisted.log_path, temp.path().join("http__x_log-1.txt"));
    assert_eq!(persisted.sidecar_path, temp.path().join("http__x_log-1.json"));
    assert_eq!(persisted.bytes_written, 11);

    assert_eq!(std::fs::read(&persisted.log_path).unwrap(), b"tp5 results");

    let sidecar: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&persisted.sidecar_path).unwrap()).unwrap();
    assert_eq!(sidecar["logurl"], "http://x/log_1.txt");
    assert_eq!(sidecar["buildername"], "Rev3 Fedora 12 mozilla-central talos tp5");
    assert_eq!(sidecar["test"], "talos");
    assert_eq!(sidecar["talos"], true);
}

#[tokio::test]
async fn test_persist_twice_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("nested").join("logs");
    let fetcher = StaticFetcher::with(&[("http://x/log_1.txt", &b"same body"[..])]);
    let persister = LogPersister::new(fetcher, &output);

    persister.prepare().await.unwrap();
    persister.prepare().await.unwrap();

    let event = talos_event("http://x/log_1.txt");
    let first = persister.persist(&event).await.unwrap();
    let log_before = std::fs::read(&first.log_path).unwrap();
    let sidecar_before = std::fs::read(&first.sidecar_path).unwrap();

    let second = persister.persist(&event).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(std::fs::read(&second.log_path).unwrap(), log_before);
    assert_eq!(std::fs::read(&second.sidecar_path).unwrap(), sidecar_before);
    assert_eq!(file_count(&output), 2);
}

#[tokio::test]
async fn test_failed_fetch_writes_nothing() {
    let temp = TempDir::new().unwrap();
    let persister = LogPersister::new(StaticFetcher::default(), temp.path());
    persister.prepare().await.unwrap();

    let err = persister
        .persist(&talos_event("http://x/missing.txt"))
        .await
        .unwrap_err();

    assert!(matches!(err, HarvestError::Fetch { .. }));
    assert_eq!(err.stage(), "fetch");
    assert_eq!(file_count(temp.path()), 0);
}

#[tokio::test]
async fn test_unwritable_output_dir_is_io_error() {
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("not-a-dir");
    std::fs::write(&blocker, b"file").unwrap();

    let fetcher = StaticFetcher::with(&[("http://x/log_1.txt", &b"body"[..])]);
    let persister = LogPersister::new(fetcher, blocker.join("logs"));

    let err = persister.prepare().await.unwrap_err();
    assert!(matches!(err, HarvestError::Io { .. }));

    let err = persister
        .persist(&talos_event("http://x/log_1.txt"))
        .await
        .unwrap_err();
    assert_eq!(err.stage(), "write");
}

#[tokio::test]
async fn test_extensionless_url_keeps_log_and_sidecar_apart() {
    let temp = TempDir::new().unwrap();
    let fetcher = StaticFetcher::with(&[("http://localhost/raw", &b"raw log"[..])]);
    let persister = LogPersister::new(fetcher, temp.path());
    persister.prepare().await.unwrap();

    let persisted = persister
        .persist(&talos_event("http://localhost/raw"))
        .await
        .unwrap();

    assert_eq!(persisted.log_path, temp.path().join("http__localhost_raw"));
    assert_eq!(persisted.sidecar_path, temp.path().join("http__localhost_raw.json"));
    assert_eq!(std::fs::read(&persisted.log_path).unwrap(), b"raw log");
}

#[tokio::test]
async fn test_console_dump_leaves_files_untouched() {
    let temp = TempDir::new().unwrap();
    // Not valid gzip: the dump is skipped, the raw bytes are still persisted
    let fetcher = StaticFetcher::with(&[("http://x/log_1.txt.gz", &b"\x1f\x8bbroken"[..])]);
    let persister = LogPersister::new(fetcher, temp.path()).with_console_dump(true);
    persister.prepare().await.unwrap();

    let persisted = persister
        .persist(&talos_event("http://x/log_1.txt.gz"))
        .await
        .unwrap();

    assert_eq!(std::fs::read(&persisted.log_path).unwrap(), b"\x1f\x8bbroken");
    assert_eq!(persisted.sidecar_path, temp.path().join("http__x_log-1.txt.json"));
}

#[tokio::test]
async fn test_run_continues_past_failures() {
    harvest_logging::init_testing();

    let temp = TempDir::new().unwrap();
    let fetcher = StaticFetcher::with(&[
        ("http://x/a.txt", &b"a"[..]),
        ("http://x/c.txt", &b"c"[..]),
    ]);
    let persister = LogPersister::new(fetcher.clone(), temp.path());
    let filter = EventFilter::new(FilterConfig::default().with_exclude_non_talos(true));
    let mut harvester = Harvester::new(filter, persister, ErrorPolicy::Continue);
    harvester.prepare().await.unwrap();

    let (sender, mut feed) = ChannelFeed::channel(16, Subscription::all());
    sender.publish_event(&talos_event("http://x/a.txt")).await.unwrap();
    sender
        .publish_event(&TestEvent::new("mochitest", false, "b", "http://x/b.txt"))
        .await
        .unwrap();
    sender.publish(json!({"test": "talos", "talos": true})).await.unwrap();
    sender.publish_event(&talos_event("http://x/unreachable.txt")).await.unwrap();
    sender.publish_event(&talos_event("http://x/c.txt")).await.unwrap();
    drop(sender);

    let stats = harvester.run(&mut feed).await.unwrap();

    assert_eq!(stats.received, 5);
    assert_eq!(stats.malformed, 1);
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.accepted, 3);
    assert_eq!(stats.persisted, 2);
    assert_eq!(stats.failed, 1);
    // Rejected and malformed events never reach the fetcher
    assert_eq!(fetcher.calls(), 3);
    assert!(temp.path().join("http__x_a.txt").exists());
    assert!(temp.path().join("http__x_c.txt").exists());
}

#[tokio::test]
async fn test_run_continues_past_invalid_utf8_line() {
    let temp = TempDir::new().unwrap();
    let fetcher = StaticFetcher::with(&[
        ("http://x/a.txt", &b"a"[..]),
        ("http://x/c.txt", &b"c"[..]),
    ]);
    let persister = LogPersister::new(fetcher, temp.path());
    let mut harvester = Harvester::new(
        EventFilter::new(FilterConfig::allow_all()),
        persister,
        ErrorPolicy::Continue,
    );
    harvester.prepare().await.unwrap();

    let mut input = serde_json::to_vec(&talos_event("http://x/a.txt")).unwrap();
    input.extend_from_slice(b"\n{\"test\": \"\xff\"}\n");
    input.extend_from_slice(&serde_json::to_vec(&talos_event("http://x/c.txt")).unwrap());
    let mut feed = JsonLinesFeed::new(&input[..], Subscription::all());

    let stats = harvester.run(&mut feed).await.unwrap();

    assert_eq!(stats.received, 3);
    assert_eq!(stats.malformed, 1);
    assert_eq!(stats.persisted, 2);
    assert!(temp.path().join("http__x_c.txt").exists());
    assert_eq!(
        serde_json::to_value(stats).unwrap(),
        json!({
            "received": 3,
            "accepted": 2,
            "rejected": 0,
            "persisted": 2,
            "failed": 0,
            "malformed": 1,
        })
    );
}

#[tokio::test]
async fn test_feed_failure_is_returned_and_not_counted() {
    let temp = TempDir::new().unwrap();
    let persister = LogPersister::new(StaticFetcher::default(), temp.path());
    let mut harvester = Harvester::new(
        EventFilter::new(FilterConfig::allow_all()),
        persister,
        ErrorPolicy::Continue,
    );

    let err = harvester
        .process(Err(HarvestError::Feed("connection reset".to_string())))
        .await
        .unwrap_err();

    assert!(matches!(err, HarvestError::Feed(_)));
    assert_eq!(harvester.stats().received, 0);
    assert_eq!(harvester.stats().malformed, 0);
}

#[tokio::test]
async fn test_abort_policy_stops_at_first_failure() {
    let temp = TempDir::new().unwrap();
    let fetcher = StaticFetcher::with(&[("http://x/later.txt", &b"later"[..])]);
    let persister = LogPersister::new(fetcher.clone(), temp.path());
    let mut harvester = Harvester::new(
        EventFilter::new(FilterConfig::allow_all()),
        persister,
        ErrorPolicy::Abort,
    );
    harvester.prepare().await.unwrap();

    let (sender, mut feed) = ChannelFeed::channel(16, Subscription::all());
    sender.publish_event(&talos_event("http://x/gone.txt")).await.unwrap();
    sender.publish_event(&talos_event("http://x/later.txt")).await.unwrap();
    drop(sender);

    let err = harvester.run(&mut feed).await.unwrap_err();
    assert!(matches!(err, HarvestError::Fetch { .. }));
    assert_eq!(harvester.stats().failed, 1);
    assert_eq!(harvester.stats().persisted, 0);
    assert_eq!(fetcher.calls(), 1);
    assert!(!temp.path().join("http__x_later.txt").exists());
}

#[tokio::test]
async fn test_handle_reports_reject_reason() {
    let temp = TempDir::new().unwrap();
    let fetcher = StaticFetcher::default();
    let persister = LogPersister::new(fetcher.clone(), temp.path());
    let filter = EventFilter::new(
        FilterConfig::default()
            .with_exclude_talos(true)
            .with_exclude_non_talos(true),
    );
    let mut harvester = Harvester::new(filter, persister, ErrorPolicy::Continue);

    for talos in [true, false] {
        let outcome = harvester
            .handle(&TestEvent::new("talos", talos, "b", "http://x/t.txt"))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            EventOutcome::Rejected(RejectReason::TalosExcluded | RejectReason::NonTalosExcluded)
        ));
    }
    assert_eq!(harvester.stats().rejected, 2);
    assert_eq!(fetcher.calls(), 0);
}
