use std::fmt;
use std::fs::{self, OpenOptions, create_dir_all};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::schema::LoggingConfig;

// ---------------------------------------------------------------------------
// Activity log entry (JSONL)
// ---------------------------------------------------------------------------

/// How an action ended. Mirrors the dashboard's result kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Error,
    Info,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single entry in the activity log (`~/.schedash/activity-log.jsonl`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub timestamp: String,
    /// Action name, e.g. `"login"` or `"check_health"`.
    pub action: String,
    pub outcome: Outcome,
    /// The message shown to the operator.
    #[serde(default)]
    pub detail: String,
}

// ---------------------------------------------------------------------------
// Log handle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ActivityLog {
    path: Option<PathBuf>,
    enabled: bool,
}

impl ActivityLog {
    /// Resolve the log location from config. Reading works even when
    /// appending is disabled, so earlier entries stay inspectable.
    pub fn from_config(config: &LoggingConfig) -> Self {
        Self {
            path: config.resolved_path(),
            enabled: config.enabled,
        }
    }

    /// An enabled log at an explicit path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            enabled: true,
        }
    }

    /// A log that neither writes nor reads anything.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled && self.path.is_some()
    }

    /// Append an entry. Best effort: write failures are swallowed.
    pub fn record(&self, action: &str, outcome: Outcome, detail: &str) {
        if !self.enabled {
            return;
        }
        let entry = ActivityEntry {
            timestamp: Utc::now().to_rfc3339(),
            action: action.to_string(),
            outcome,
            detail: detail.to_string(),
        };
        let _ = self.append(&entry);
    }

    /// Read every entry, oldest first.
    ///
    /// Silently skips malformed lines. Returns an empty vec if the file does
    /// not exist or cannot be read.
    pub fn read_all(&self) -> Vec<ActivityEntry> {
        let Some(path) = &self.path else {
            return Vec::new();
        };

        let Ok(file) = fs::File::open(path) else {
            return Vec::new();
        };

        BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter_map(|line| serde_json::from_str::<ActivityEntry>(&line).ok())
            .collect()
    }

    /// The newest `limit` entries, oldest first.
    pub fn read_recent(&self, limit: usize) -> Vec<ActivityEntry> {
        let mut entries = self.read_all();
        let skip = entries.len().saturating_sub(limit);
        entries.drain(..skip);
        entries
    }

    fn append(&self, entry: &ActivityEntry) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let json = serde_json::to_string(entry)?;
        writeln!(file, "{json}")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_appends_jsonl_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = ActivityLog::at(dir.path().join("nested").join("activity.jsonl"));

        log.record("login", Outcome::Success, "Login successful!");
        log.record("check_health", Outcome::Error, "connection refused");

        let entries = log.read_all();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "login");
        assert_eq!(entries[1].outcome, Outcome::Error);

        let raw = fs::read_to_string(log.path().unwrap()).unwrap();
        assert!(raw.lines().next().unwrap().contains(r#""outcome":"success""#));
    }

    #[test]
    fn read_recent_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        let log = ActivityLog::at(dir.path().join("activity.jsonl"));
        for n in 0..5 {
            log.record(&format!("action{n}"), Outcome::Info, "");
        }
        let recent: Vec<_> = log.read_recent(2).into_iter().map(|e| e.action).collect();
        assert_eq!(recent, vec!["action3", "action4"]);
        assert_eq!(log.read_recent(50).len(), 5);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activity.jsonl");
        fs::write(&path, "not json\n").unwrap();
        let log = ActivityLog::at(&path);
        log.record("logout", Outcome::Success, "Authentication token cleared");
        assert_eq!(log.read_all().len(), 1);
    }

    #[test]
    fn disabled_log_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activity.jsonl");
        let log = ActivityLog::from_config(&LoggingConfig {
            enabled: false,
            path: path.to_string_lossy().into_owned(),
        });
        log.record("login", Outcome::Success, "Login successful!");
        assert!(!path.exists());
        assert!(!log.is_enabled());
        assert!(ActivityLog::disabled().read_all().is_empty());
    }
}
