/// Configuration schema and defaults for schedash.
///
/// Defines the TOML-serializable configuration structure with the sections
/// `[service]`, `[polling]`, `[session]` and `[logging]`.
///
/// Every field has a built-in default matching the standard two-service
/// deployment (dashboard on 8080, decision service on 8082). Users only need
/// to set the values they want to override.
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Minimum auto-refresh interval accepted by the polling scheduler.
pub const MIN_POLL_INTERVAL_MS: u64 = 1000;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level schedash configuration.
///
/// Maps directly to the `~/.schedash/config.toml` and `.schedash.toml` file
/// schemas. All sections and fields are optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashConfig {
    pub service: ServiceConfig,
    pub polling: PollingConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// [service]
// ---------------------------------------------------------------------------

/// Where the primary and decision services live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Origin of the primary service, e.g. `http://10.0.0.5:8080`.
    pub origin: String,
    /// Well-known port the dashboard is normally served from.
    pub dashboard_port: u16,
    /// Port of the decision service when the origin uses `dashboard_port`.
    pub decision_port: u16,
    /// Request timeout in milliseconds. `0` keeps the transport default.
    pub timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            origin: "http://127.0.0.1:8080".to_string(),
            dashboard_port: 8080,
            decision_port: 8082,
            timeout_ms: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// [polling]
// ---------------------------------------------------------------------------

/// Default auto-refresh intervals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub health_interval_ms: u64,
    pub metrics_interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            health_interval_ms: 5000,
            metrics_interval_ms: 5000,
        }
    }
}

// ---------------------------------------------------------------------------
// [session]
// ---------------------------------------------------------------------------

/// Token persistence settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Path to the token file. `~` is expanded to the home directory.
    pub token_path: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token_path: "~/.schedash/session.json".to_string(),
        }
    }
}

impl SessionConfig {
    pub fn resolved_token_path(&self) -> Option<PathBuf> {
        expand_home(&self.token_path)
    }
}

// ---------------------------------------------------------------------------
// [logging]
// ---------------------------------------------------------------------------

/// Activity logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Whether dashboard actions are appended to the activity log.
    pub enabled: bool,
    /// Path to the activity log file. `~` is expanded to the home directory.
    pub path: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "~/.schedash/activity-log.jsonl".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn resolved_path(&self) -> Option<PathBuf> {
        expand_home(&self.path)
    }
}

/// Expand a leading `~` to the home directory.
///
/// Returns `None` only when the path needs the home directory and it cannot
/// be determined.
pub fn expand_home(raw: &str) -> Option<PathBuf> {
    if raw == "~" {
        return dirs::home_dir();
    }
    match raw.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
        None => Some(PathBuf::from(raw)),
    }
}

// ---------------------------------------------------------------------------
// Default TOML content
// ---------------------------------------------------------------------------

impl DashConfig {
    /// Generate the annotated default TOML config file content.
    ///
    /// Used by `schedash config init`.
    pub fn default_toml() -> String {
        r#"# schedash configuration
#
# Configuration hierarchy (highest precedence wins):
#   1. Environment variables (SCHEDASH_*)
#   2. Project config (.schedash.toml in current directory)
#   3. User global config (~/.schedash/config.toml)
#   4. Built-in defaults

[service]
origin = "http://127.0.0.1:8080"      # Primary service (auth, strategies, health)
dashboard_port = 8080                 # Well-known dashboard port
decision_port = 8082                  # Decision service port (token, metrics, pods)
timeout_ms = 0                        # 0 = transport default

[polling]
health_interval_ms = 5000             # Minimum 1000
metrics_interval_ms = 5000            # Minimum 1000, requires login

[session]
token_path = "~/.schedash/session.json"

[logging]
enabled = true
path = "~/.schedash/activity-log.jsonl"
"#
        .to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
