//! Feed of test-completion events
//!
//! The upstream message bus is not part of this crate. A feed is anything
//! that yields decoded [`TestEvent`]s one at a time; the [`Subscription`]
//! narrows it to the trees, platforms and build types being watched.
//!
//! Two local feeds are provided:
//! - [`ChannelFeed`] for embedding, fed raw JSON payloads over an mpsc channel
//! - [`JsonLinesFeed`] reading one Pulse test message per line (stdin or file)

use std::io;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{HarvestError, HarvestResult};
use crate::event::TestEvent;

/// Which side of the talos partition a subscription receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TalosSelection {
    /// Talos and non-talos jobs
    #[default]
    Include,
    /// Non-talos jobs only
    Exclude,
    /// Talos jobs only
    Only,
}

/// Feed-side filter describing what to subscribe to
///
/// Empty lists match anything. A non-empty list does not match an event
/// that lacks the attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub trees: Vec<String>,
    pub platforms: Vec<String>,
    pub build_types: Vec<String>,
    pub talos: TalosSelection,
}

impl Subscription {
    /// Subscription matching every event
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_trees<I, S>(mut self, trees: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trees = trees.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_platforms<I, S>(mut self, platforms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.platforms = platforms.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_build_types<I, S>(mut self, build_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.build_types = build_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_talos(mut self, talos: TalosSelection) -> Self {
        self.talos = talos;
        self
    }

    /// Whether the subscription covers this event
    pub fn matches(&self, event: &TestEvent) -> bool {
        fn listed(list: &[String], value: Option<&String>) -> bool {
            list.is_empty() || value.is_some_and(|v| list.contains(v))
        }

        let talos_ok = match self.talos {
            TalosSelection::Include => true,
            TalosSelection::Exclude => !event.is_talos_run,
            TalosSelection::Only => event.is_talos_run,
        };

        talos_ok
            && listed(&self.trees, event.tree.as_ref())
            && listed(&self.platforms, event.platform.as_ref())
            && listed(&self.build_types, event.build_type.as_ref())
    }
}

/// Source of test events, delivered one at a time in arrival order
#[async_trait]
pub trait EventFeed: Send {
    /// Next event, or `None` once the feed has ended
    ///
    /// A malformed payload is returned as an error item; the feed stays
    /// usable and the following call moves on to the next payload.
    async fn next_event(&mut self) -> Option<HarvestResult<TestEvent>>;
}

/// Decode a payload and apply the subscription; `None` means skipped
fn admit(subscription: &Subscription, value: Value) -> Option<HarvestResult<TestEvent>> {
    match TestEvent::from_value(value) {
        Ok(event) if subscription.matches(&event) => Some(Ok(event)),
        Ok(event) => {
            debug!(
                builder = %event.builder_name,
                tree = ?event.tree,
                platform = ?event.platform,
                "Event outside subscription"
            );
            None
        }
        Err(e) => Some(Err(e)),
    }
}

/// Sending half of a [`ChannelFeed`]
#[derive(Debug, Clone)]
pub struct FeedSender {
    tx: mpsc::Sender<Value>,
}

impl FeedSender {
    /// Publish a raw payload
    pub async fn publish(&self, payload: Value) -> HarvestResult<()> {
        self.tx
            .send(payload)
            .await
            .map_err(|_| HarvestError::Feed("channel feed closed".to_string()))
    }

    /// Publish an already-typed event
    pub async fn publish_event(&self, event: &TestEvent) -> HarvestResult<()> {
        self.publish(serde_json::to_value(event)?).await
    }
}

/// Feed backed by an in-process channel
///
/// Ends once every [`FeedSender`] has been dropped and the buffer drained.
pub struct ChannelFeed {
    rx: mpsc::Receiver<Value>,
    subscription: Subscription,
}

impl ChannelFeed {
    pub fn channel(capacity: usize, subscription: Subscription) -> (FeedSender, ChannelFeed) {
        let (tx, rx) = mpsc::channel(capacity);
        (FeedSender { tx }, ChannelFeed { rx, subscription })
    }
}

#[async_trait]
impl EventFeed for ChannelFeed {
    async fn next_event(&mut self) -> Option<HarvestResult<TestEvent>> {
        while let Some(value) = self.rx.recv().await {
            if let Some(item) = admit(&self.subscription, value) {
                return Some(item);
            }
        }
        None
    }
}

/// Feed reading newline-delimited JSON messages
pub struct JsonLinesFeed<R> {
    lines: Lines<R>,
    subscription: Subscription,
    line_no: u64,
}

impl<R: AsyncBufRead + Unpin + Send> JsonLinesFeed<R> {
    pub fn new(reader: R, subscription: Subscription) -> Self {
        Self {
            lines: reader.lines(),
            subscription,
            line_no: 0,
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> EventFeed for JsonLinesFeed<R> {
    async fn next_event(&mut self) -> Option<HarvestResult<TestEvent>> {
        loop {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                // The reader has consumed the bad line, so the next one can still be read
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    self.line_no += 1;
                    return Some(Err(HarvestError::malformed(
                        "<invalid UTF-8>",
                        format!("line {}: {e}", self.line_no),
                    )));
                }
                Err(e) => {
                    return Some(Err(HarvestError::Feed(format!(
                        "read failed after line {}: {e}",
                        self.line_no
                    ))));
                }
            };
            self.line_no += 1;

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let value: Value = match serde_json::from_str(line) {
                Ok(value) => value,
                Err(e) => {
                    return Some(Err(HarvestError::malformed(
                        line,
                        format!("line {}: {e}", self.line_no),
                    )));
                }
            };

            if let Some(item) = admit(&self.subscription, value) {
                return Some(item);
            }
        }
    }
}
