//! Decoding of the service's JSON response envelopes.
//!
//! Every endpoint answers with a top-level `success` flag plus either `data`
//! or `error`/`message`. Login endpoints are inconsistent about where the
//! token lives: the decision service nests it (`data.token`) while older
//! builds of the primary service return it flat. Both shapes are accepted
//! here and normalized into a [`TokenGrant`] so nothing past this module has
//! to care.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ApiResponse;

// ---------------------------------------------------------------------------
// Token envelopes
// ---------------------------------------------------------------------------

/// Outcome of a login round trip once the envelope has been decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenGrant {
    Granted(String),
    /// The reason is the server's `error`/`message` text or the caller's
    /// fallback phrase.
    Rejected(String),
}

/// Locate the token in either envelope shape.
///
/// An object `data` is authoritative and only its string `token` counts. The
/// flat `token` is read only when `data` is absent or null; any other `data`
/// shape yields no token.
fn envelope_token(body: &Value) -> Option<&str> {
    let token = match body.get("data") {
        Some(Value::Object(data)) => data.get("token"),
        None | Some(Value::Null) => body.get("token"),
        Some(_) => None,
    };
    token.and_then(Value::as_str).filter(|t| !t.is_empty())
}

/// Decode a login response into a [`TokenGrant`].
///
/// A grant requires an HTTP success status, `success: true` and a non-empty
/// token in either envelope shape. When `data` is an object, its token is the
/// only one consulted.
pub fn token_grant(response: &ApiResponse, fallback: &str) -> TokenGrant {
    match envelope_token(&response.body) {
        Some(token) if response.ok && reports_success(&response.body) => {
            TokenGrant::Granted(token.to_string())
        }
        _ => TokenGrant::Rejected(failure_reason(&response.body, fallback)),
    }
}

// ---------------------------------------------------------------------------
// Generic envelope helpers
// ---------------------------------------------------------------------------

/// Whether the body reports business-level success.
pub fn reports_success(body: &Value) -> bool {
    body.get("success").and_then(Value::as_bool).unwrap_or(false)
}

/// Pick the most specific failure text: `error`, then `message`, then the
/// fallback.
pub fn failure_reason(body: &Value, fallback: &str) -> String {
    ["error", "message"]
        .iter()
        .find_map(|key| {
            body.get(*key)
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
        })
        .unwrap_or(fallback)
        .to_string()
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

/// Liveness verdict for a `/health` response.
pub fn is_healthy(response: &ApiResponse) -> bool {
    response.ok && response.body.get("status").and_then(Value::as_str) == Some("healthy")
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Runtime counters reported by the userspace scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricSet {
    pub usersched_last_run_at: u64,
    pub nr_queued: u64,
    pub nr_scheduled: u64,
    pub nr_running: u64,
    pub nr_online_cpus: u64,
    pub nr_user_dispatches: u64,
    pub nr_kernel_dispatches: u64,
    pub nr_cancel_dispatches: u64,
    pub nr_bounce_dispatches: u64,
    pub nr_failed_dispatches: u64,
    pub nr_sched_congested: u64,
}

impl MetricSet {
    /// Display label and value for each counter, in display order.
    pub fn labelled(&self) -> [(&'static str, u64); 11] {
        [
            ("UserSched Last Run", self.usersched_last_run_at),
            ("Queued Tasks", self.nr_queued),
            ("Scheduled Tasks", self.nr_scheduled),
            ("Running Tasks", self.nr_running),
            ("Online CPUs", self.nr_online_cpus),
            ("User Dispatches", self.nr_user_dispatches),
            ("Kernel Dispatches", self.nr_kernel_dispatches),
            ("Cancel Dispatches", self.nr_cancel_dispatches),
            ("Bounce Dispatches", self.nr_bounce_dispatches),
            ("Failed Dispatches", self.nr_failed_dispatches),
            ("Scheduler Congested", self.nr_sched_congested),
        ]
    }
}

/// Decoded `/api/v1/metrics` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricsReport {
    Available {
        /// Server timestamp of the snapshot, when reported.
        timestamp: Option<String>,
        metrics: MetricSet,
    },
    /// The service is up but has nothing to report yet.
    Pending(String),
    Failed(String),
}

pub const NO_METRICS_MESSAGE: &str = "No metrics data available";

pub fn metrics_report(response: &ApiResponse) -> MetricsReport {
    let body = &response.body;
    if !response.ok || !reports_success(body) {
        return MetricsReport::Failed(failure_reason(body, "Failed to fetch metrics"));
    }

    match body.get("data") {
        Some(data) if data.is_object() => match MetricSet::deserialize(data) {
            Ok(metrics) => MetricsReport::Available {
                timestamp: ["metrics_timestamp", "timestamp"].iter().find_map(|key| {
                    body.get(*key).and_then(Value::as_str).map(str::to_string)
                }),
                metrics,
            },
            Err(e) => MetricsReport::Failed(format!("Unexpected metrics payload: {e}")),
        },
        _ => MetricsReport::Pending(
            body.get("message")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .unwrap_or(NO_METRICS_MESSAGE)
                .to_string(),
        ),
    }
}
