//! Test-completion events delivered by the feed

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{HarvestError, HarvestResult};

/// One completed test run, as published on the build feed
///
/// The four required fields drive filtering and persistence. Everything
/// else the feed sends is kept in `extra` so the sidecar mirrors the
/// original message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestEvent {
    /// Test suite identifier, e.g. "talos" or "mochitest-1"
    #[serde(rename = "test")]
    pub test_type: String,
    /// Whether the job belongs to the talos partition
    #[serde(rename = "talos")]
    pub is_talos_run: bool,
    /// Human-readable job identifier
    #[serde(rename = "buildername")]
    pub builder_name: String,
    /// Location of the log artifact (gzip-encoded when it ends in `gz`)
    #[serde(rename = "logurl")]
    pub log_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(rename = "buildtype", default, skip_serializing_if = "Option::is_none")]
    pub build_type: Option<String>,
    /// Remaining message keys, preserved verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TestEvent {
    /// Create an event with the required fields only
    pub fn new(
        test_type: impl Into<String>,
        is_talos_run: bool,
        builder_name: impl Into<String>,
        log_url: impl Into<String>,
    ) -> Self {
        Self {
            test_type: test_type.into(),
            is_talos_run,
            builder_name: builder_name.into(),
            log_url: log_url.into(),
            tree: None,
            platform: None,
            build_type: None,
            extra: Map::new(),
        }
    }

    pub fn with_tree(mut self, tree: impl Into<String>) -> Self {
        self.tree = Some(tree.into());
        self
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn with_build_type(mut self, build_type: impl Into<String>) -> Self {
        self.build_type = Some(build_type.into());
        self
    }

    /// Decode a raw feed payload
    ///
    /// Missing or mistyped required fields and non-HTTP log URLs are reported
    /// as [`HarvestError::MalformedEvent`] carrying the payload.
    pub fn from_value(value: Value) -> HarvestResult<Self> {
        let payload = value.to_string();
        let event: TestEvent =
            serde_json::from_value(value).map_err(|e| HarvestError::malformed(&payload, e))?;

        if !(event.log_url.starts_with("http://") || event.log_url.starts_with("https://")) {
            return Err(HarvestError::malformed(
                payload,
                format!("logurl is not an http(s) URL: {}", event.log_url),
            ));
        }

        Ok(event)
    }

    /// Decode one JSON text payload
    pub fn from_json(text: &str) -> HarvestResult<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| HarvestError::malformed(text, e))?;
        Self::from_value(value)
    }
}
