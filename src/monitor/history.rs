//! Fixed-width history of health probe results.
//!
//! Keeps the last [`HISTORY_CAPACITY`] probes in arrival order and exposes
//! them as a constant-width timeline for the status grid. Memory only; the
//! history starts empty every run.

use std::collections::VecDeque;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

/// Number of probes kept (and slots shown in the grid).
pub const HISTORY_CAPACITY: usize = 10;

/// What a probe produced: a decoded body, or the reason the round trip
/// failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeOutcome {
    Response(Value),
    Failed(String),
}

/// A single `/health` probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthProbeResult {
    /// RFC 3339 time the probe completed.
    pub timestamp: String,
    pub healthy: bool,
    pub outcome: ProbeOutcome,
}

impl HealthProbeResult {
    /// Probe that completed the round trip.
    pub fn responded(healthy: bool, payload: Value) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            healthy,
            outcome: ProbeOutcome::Response(payload),
        }
    }

    /// Probe whose round trip failed. Always unhealthy.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            healthy: false,
            outcome: ProbeOutcome::Failed(message.into()),
        }
    }

    pub fn payload(&self) -> Option<&Value> {
        match &self.outcome {
            ProbeOutcome::Response(payload) => Some(payload),
            ProbeOutcome::Failed(_) => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            ProbeOutcome::Response(_) => None,
            ProbeOutcome::Failed(message) => Some(message),
        }
    }
}

/// One cell of the status grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HealthSlot<'a> {
    /// Fewer than [`HISTORY_CAPACITY`] probes have run.
    Empty,
    Probe(&'a HealthProbeResult),
}

#[derive(Debug, Clone, Default)]
pub struct HealthHistory {
    results: VecDeque<HealthProbeResult>,
}

impl HealthHistory {
    pub fn new() -> Self {
        Self {
            results: VecDeque::with_capacity(HISTORY_CAPACITY + 1),
        }
    }

    /// Append a result, dropping the oldest once capacity is exceeded.
    pub fn record(&mut self, result: HealthProbeResult) {
        self.results.push_back(result);
        while self.results.len() > HISTORY_CAPACITY {
            self.results.pop_front();
        }
    }

    /// Exactly [`HISTORY_CAPACITY`] slots: placeholders first, then the
    /// recorded results from oldest to newest.
    pub fn snapshot(&self) -> Vec<HealthSlot<'_>> {
        let padding = HISTORY_CAPACITY - self.results.len();
        std::iter::repeat_n(HealthSlot::Empty, padding)
            .chain(self.results.iter().map(HealthSlot::Probe))
            .collect()
    }

    /// Recorded results, oldest first.
    pub fn results(&self) -> impl Iterator<Item = &HealthProbeResult> {
        self.results.iter()
    }

    pub fn latest(&self) -> Option<&HealthProbeResult> {
        self.results.back()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
