//! Terminal rendering for dashboard state and action results.
//!
//! Everything here builds `String`s; the CLI decides where they go.

use colored::Colorize;

use super::{ActionResult, ResultKind};
use crate::monitor::{HealthHistory, HealthSlot};
use crate::session::Session;
use crate::strategy::{SerializedForm, StrategyForm};

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

pub fn result(result: &ActionResult) -> String {
    let marker = match result.kind {
        ResultKind::Success => "✓".green().bold(),
        ResultKind::Error => "✗".red().bold(),
        ResultKind::Info => "i".cyan().bold(),
    };
    let message = match result.kind {
        ResultKind::Error => result.message.red(),
        _ => result.message.normal(),
    };

    let mut out = format!("{marker} {message}");
    let width = result
        .details
        .iter()
        .map(|(label, _)| label.len())
        .max()
        .unwrap_or(0);
    for (label, value) in &result.details {
        let label = format!("{label:<width$}");
        out.push_str(&format!("\n  {}  {value}", label.bold()));
    }
    if let Some(data) = &result.data {
        let pretty = serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());
        for line in pretty.lines() {
            out.push_str(&format!("\n  {}", line.dimmed()));
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Health grid
// ---------------------------------------------------------------------------

/// Uncolored grid symbol for one slot: `·` no data, `✓` healthy,
/// `✗` unhealthy.
pub fn slot_symbol(slot: &HealthSlot<'_>) -> &'static str {
    match slot {
        HealthSlot::Empty => "·",
        HealthSlot::Probe(probe) if probe.healthy => "✓",
        HealthSlot::Probe(_) => "✗",
    }
}

/// The plain grid, oldest slot first.
pub fn grid_symbols(history: &HealthHistory) -> String {
    history
        .snapshot()
        .iter()
        .map(slot_symbol)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn health_grid(history: &HealthHistory) -> String {
    let cells: Vec<String> = history
        .snapshot()
        .iter()
        .map(|slot| {
            let symbol = slot_symbol(slot);
            match slot {
                HealthSlot::Empty => symbol.dimmed().to_string(),
                HealthSlot::Probe(p) if p.healthy => symbol.green().to_string(),
                HealthSlot::Probe(_) => symbol.red().bold().to_string(),
            }
        })
        .collect();

    let mut out = format!("{} [{}]", "Health".bold(), cells.join(" "));
    if let Some(latest) = history.latest() {
        let detail = match latest.error_message() {
            Some(message) => format!("last {} failed: {message}", latest.timestamp),
            None if latest.healthy => format!("last {} healthy", latest.timestamp),
            None => format!("last {} unhealthy", latest.timestamp),
        };
        out.push_str(&format!("  {}", detail.dimmed()));
    }
    out
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub fn session_banner(session: &Session) -> String {
    if session.authenticated() {
        format!("{} {}", "●".green(), "Authenticated".green().bold())
    } else {
        format!("{} {}", "○".dimmed(), "Not authenticated".yellow())
    }
}

// ---------------------------------------------------------------------------
// Strategy form
// ---------------------------------------------------------------------------

pub fn form(form: &StrategyForm) -> String {
    let mut out = String::new();
    for record in form.strategies() {
        out.push_str(&format!(
            "{} priority={} exec={}ns",
            format!("Strategy #{}", record.id()).bold().cyan(),
            if record.priority { "on" } else { "off" },
            record.execution_time,
        ));
        if !record.pid.is_empty() {
            out.push_str(&format!(" pid={}", record.pid));
        }
        if !record.command_regex.is_empty() {
            out.push_str(&format!(" regex={}", record.command_regex));
        }
        out.push('\n');
        for (index, selector) in record.selectors().iter().enumerate() {
            let pair = if selector.key.is_empty() && selector.value.is_empty() {
                "(empty)".dimmed().to_string()
            } else {
                format!("{}={}", selector.key, selector.value)
            };
            out.push_str(&format!("  [{index}] {pair}\n"));
        }
    }
    out
}

/// The request body a submit would send, plus any substitution notices.
pub fn preview(serialized: &SerializedForm) -> String {
    let mut out = serde_json::to_string_pretty(&serialized.payload)
        .unwrap_or_else(|e| format!("<unserializable: {e}>"));
    for notice in &serialized.substitutions {
        out.push_str(&format!("\n{} {notice}", "!".yellow().bold()));
    }
    out
}
