//! Event filter deciding which test events get harvested
//!
//! Rules are evaluated in a fixed order and the first one that fires wins:
//! the talos partition exclusions come before the test-type allow-list.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{HarvestError, HarvestResult};
use crate::event::TestEvent;

/// Inclusion/exclusion criteria, built once at startup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Test types to harvest; empty allows every type
    pub allowed_test_types: BTreeSet<String>,
    /// Reject talos runs
    pub exclude_talos: bool,
    /// Reject non-talos runs
    pub exclude_non_talos: bool,
}

impl FilterConfig {
    /// Config that accepts every event
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Restrict to the given test types
    pub fn with_allowed_test_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_test_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_exclude_talos(mut self, exclude: bool) -> Self {
        self.exclude_talos = exclude;
        self
    }

    pub fn with_exclude_non_talos(mut self, exclude: bool) -> Self {
        self.exclude_non_talos = exclude;
        self
    }

    /// Reject configurations under which no event can pass
    pub fn validate(&self) -> HarvestResult<()> {
        if self.exclude_talos && self.exclude_non_talos {
            return Err(HarvestError::Config(
                "excluding both talos and non-talos runs rejects every event".to_string(),
            ));
        }
        Ok(())
    }
}

/// Which rule rejected an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Talos run while talos runs are excluded
    TalosExcluded,
    /// Non-talos run while non-talos runs are excluded
    NonTalosExcluded,
    /// Test type missing from the allow-list
    TestTypeNotAllowed,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::TalosExcluded => write!(f, "talos runs excluded"),
            RejectReason::NonTalosExcluded => write!(f, "non-talos runs excluded"),
            RejectReason::TestTypeNotAllowed => write!(f, "test type not in allow-list"),
        }
    }
}

/// Outcome of evaluating one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Accept,
    Reject(RejectReason),
}

impl FilterDecision {
    pub fn is_accept(&self) -> bool {
        matches!(self, FilterDecision::Accept)
    }
}

/// Evaluate the filter rules for one event
pub fn evaluate(event: &TestEvent, config: &FilterConfig) -> FilterDecision {
    if event.is_talos_run && config.exclude_talos {
        return FilterDecision::Reject(RejectReason::TalosExcluded);
    }
    if !event.is_talos_run && config.exclude_non_talos {
        return FilterDecision::Reject(RejectReason::NonTalosExcluded);
    }
    if !config.allowed_test_types.is_empty()
        && !config.allowed_test_types.contains(&event.test_type)
    {
        return FilterDecision::Reject(RejectReason::TestTypeNotAllowed);
    }
    FilterDecision::Accept
}

/// Whether an event should be harvested
pub fn accept(event: &TestEvent, config: &FilterConfig) -> bool {
    evaluate(event, config).is_accept()
}

/// Filter bound to its configuration
#[derive(Debug, Clone)]
pub struct EventFilter {
    config: FilterConfig,
}

impl EventFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn evaluate(&self, event: &TestEvent) -> FilterDecision {
        evaluate(event, &self.config)
    }

    pub fn accept(&self, event: &TestEvent) -> bool {
        accept(event, &self.config)
    }
}
