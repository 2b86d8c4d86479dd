//! CLI command implementations for the scheduling dashboard.
//!
//! Provides subcommand handlers for:
//! - `schedash status`: session, service endpoints, config sources
//! - `schedash login password|key` / `schedash logout`: session management
//! - `schedash health|metrics|pods|strategies`: one-shot probes and fetches
//! - `schedash form`: interactive or scripted strategy editor
//! - `schedash watch`: auto-refresh health and metrics
//! - `schedash log`: recent activity
//! - `schedash config show|init|set|reset`: configuration management

use std::fs;
use std::io::{self, BufRead, BufReader, IsTerminal, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use colored::Colorize;

use crate::activity::{ActivityEntry, ActivityLog, Outcome};
use crate::api::Service;
use crate::config;
use crate::dashboard::{ActionResult, Dashboard, editor, render};
use crate::monitor::ResourceKind;
use crate::session::Credentials;

/// Output format for listing commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl OutputFormat {
    pub fn from_str_opt(s: Option<&str>) -> Self {
        match s {
            Some("json") => Self::Json,
            _ => Self::Table,
        }
    }
}

fn open_dashboard() -> Result<Dashboard> {
    Dashboard::from_config(config::load())
}

/// Print an action result and map it to the process exit code.
fn emit(result: &ActionResult) -> ExitCode {
    println!("{}", render::result(result));
    if result.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

// ---------------------------------------------------------------------------
// schedash status
// ---------------------------------------------------------------------------

/// Show session state, service endpoints and config sources.
pub fn run_status() -> Result<ExitCode> {
    let dashboard = open_dashboard()?;
    let cfg = dashboard.config();

    println!("{}", "Scheduling Dashboard Status".bold().cyan());
    println!("{}", "=".repeat(40));
    println!("  {}", render::session_banner(dashboard.session().session()));
    println!();

    print_status_item(
        "Primary service",
        true,
        dashboard.client().base_url(Service::Primary),
    );
    print_status_item(
        "Decision service",
        true,
        dashboard.client().base_url(Service::Secondary),
    );

    let token_path = cfg.session.resolved_token_path();
    print_status_item(
        "Token file",
        token_path.as_deref().is_some_and(Path::exists),
        &token_path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "home directory unavailable".to_string()),
    );

    print_status_item(
        "Auto-refresh defaults",
        true,
        &format!(
            "health {}s, metrics {}s",
            cfg.polling.health_interval_ms / 1000,
            cfg.polling.metrics_interval_ms / 1000
        ),
    );

    let log = dashboard.activity();
    let entries = log.read_all().len();
    print_status_item(
        "Activity log",
        log.is_enabled(),
        &if log.is_enabled() {
            format!("{entries} entries")
        } else {
            "disabled (set SCHEDASH_LOGGING=1 to enable)".to_string()
        },
    );

    let global_exists = config::global_config_file().is_some_and(|p| p.exists());
    print_status_item(
        "Global config",
        global_exists,
        if global_exists {
            "~/.schedash/config.toml found"
        } else {
            "not found (run `schedash config init` to create)"
        },
    );

    Ok(ExitCode::SUCCESS)
}

fn print_status_item(name: &str, ok: bool, detail: &str) {
    let status = if ok {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };
    println!("  {} {:<25} {}", status, name, detail.dimmed());
}

// ---------------------------------------------------------------------------
// schedash login | logout
// ---------------------------------------------------------------------------

/// Log in with username and password. Prompts for the password on stdin
/// when it is not given.
pub fn run_login_password(username: &str, password: Option<String>) -> Result<ExitCode> {
    let password = match password {
        Some(password) => password,
        None => prompt_line("Password: ")?,
    };
    let mut dashboard = open_dashboard()?;
    Ok(emit(&dashboard.login(&Credentials::Password {
        username: username.to_string(),
        password,
    })))
}

/// Log in by exchanging a PEM public key for a token.
pub fn run_login_key(file: Option<&Path>, key: Option<String>) -> Result<ExitCode> {
    let public_key = match (file, key) {
        (Some(path), _) => fs::read_to_string(path)
            .with_context(|| format!("failed to read public key from {}", path.display()))?,
        (None, Some(key)) => key,
        (None, None) => io::read_to_string(io::stdin()).context("failed to read public key")?,
    };
    let mut dashboard = open_dashboard()?;
    Ok(emit(&dashboard.login(&Credentials::PublicKey { public_key })))
}

pub fn run_logout() -> Result<ExitCode> {
    let mut dashboard = open_dashboard()?;
    Ok(emit(&dashboard.logout()))
}

fn prompt_line(prompt: &str) -> Result<String> {
    eprint!("{prompt}");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

// ---------------------------------------------------------------------------
// schedash health | metrics | pods | strategies
// ---------------------------------------------------------------------------

pub fn run_health() -> Result<ExitCode> {
    let mut dashboard = open_dashboard()?;
    let result = dashboard.check_health();
    println!("{}", render::health_grid(dashboard.history()));
    Ok(emit(&result))
}

pub fn run_metrics() -> Result<ExitCode> {
    let mut dashboard = open_dashboard()?;
    Ok(emit(&dashboard.fetch_metrics()))
}

pub fn run_pods() -> Result<ExitCode> {
    let mut dashboard = open_dashboard()?;
    Ok(emit(&dashboard.fetch_pod_pids()))
}

pub fn run_strategies() -> Result<ExitCode> {
    let mut dashboard = open_dashboard()?;
    Ok(emit(&dashboard.fetch_strategies()))
}

// ---------------------------------------------------------------------------
// schedash form
// ---------------------------------------------------------------------------

/// Edit and submit strategies, from a script file or interactively.
pub fn run_form(script: Option<&Path>) -> Result<ExitCode> {
    let mut dashboard = open_dashboard()?;
    let mut stdout = io::stdout().lock();

    match script {
        Some(path) => {
            let file = fs::File::open(path)
                .with_context(|| format!("failed to open script {}", path.display()))?;
            editor::run(&mut dashboard, BufReader::new(file), &mut stdout, false)?;
        }
        None => {
            let stdin = io::stdin();
            let interactive = stdin.is_terminal();
            if interactive {
                writeln!(stdout, "{}", render::session_banner(dashboard.session().session()))?;
                writeln!(stdout, "{}", "Type 'help' for commands.".dimmed())?;
            }
            editor::run(&mut dashboard, stdin.lock(), &mut stdout, interactive)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

// ---------------------------------------------------------------------------
// schedash watch
// ---------------------------------------------------------------------------

/// Auto-refresh the requested resources. Health is watched when neither
/// flag is given.
pub fn run_watch(
    health: bool,
    metrics: bool,
    interval_secs: Option<u64>,
    rounds: Option<usize>,
) -> Result<ExitCode> {
    let mut dashboard = open_dashboard()?;

    let kinds: Vec<ResourceKind> = match (health, metrics) {
        (false, false) => vec![ResourceKind::Health],
        _ => ResourceKind::ALL
            .into_iter()
            .filter(|kind| match kind {
                ResourceKind::Health => health,
                ResourceKind::Metrics => metrics,
            })
            .collect(),
    };
    let requests: Vec<(ResourceKind, u64)> = kinds
        .into_iter()
        .map(|kind| {
            let interval_ms = interval_secs
                .map(|secs| secs.saturating_mul(1000))
                .unwrap_or_else(|| dashboard.default_interval_ms(kind));
            (kind, interval_ms)
        })
        .collect();

    let mut failed = false;
    dashboard.watch(&requests, rounds, |dash, kind, result| {
        failed |= result.is_error();
        if kind == Some(ResourceKind::Health) {
            println!("{}", render::health_grid(dash.history()));
        }
        println!("{}", render::result(result));
    });

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

// ---------------------------------------------------------------------------
// schedash log
// ---------------------------------------------------------------------------

/// Show the most recent activity log entries.
pub fn run_log(limit: usize, format: OutputFormat) -> Result<ExitCode> {
    let log = ActivityLog::from_config(&config::load().logging);
    let entries = log.read_recent(limit);

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputFormat::Table => print_log_table(&entries),
    }
    Ok(ExitCode::SUCCESS)
}

fn print_log_table(entries: &[ActivityEntry]) {
    if entries.is_empty() {
        println!("{}", "No activity recorded yet.".yellow());
        return;
    }

    println!(
        "  {}",
        format!("{:<26} {:<20} {:<8} {}", "Time", "Action", "Outcome", "Detail").bold()
    );
    println!("  {}", "-".repeat(78));
    for entry in entries {
        let label = format!("{:<8}", entry.outcome);
        let outcome = match entry.outcome {
            Outcome::Success => label.green(),
            Outcome::Error => label.red(),
            Outcome::Info => label.cyan(),
        };
        let time: String = entry.timestamp.chars().take(25).collect();
        let detail = entry.detail.lines().next().unwrap_or_default();
        println!("  {time:<26} {:<20} {outcome} {detail}", entry.action);
    }
}

// ---------------------------------------------------------------------------
// schedash config show | init | set | reset
// ---------------------------------------------------------------------------

/// Show the effective (merged) configuration as TOML.
pub fn run_config_show() -> Result<ExitCode> {
    let toml_str = config::show_effective_config()?;
    println!("{}", "Effective Dashboard Configuration".bold().cyan());
    println!("{}", "=".repeat(50));
    println!();
    println!("{toml_str}");

    let global_exists = config::global_config_file().is_some_and(|p| p.exists());
    let project_exists = config::project_config_file().is_some_and(|p| p.exists());
    println!("{}", "Sources (highest priority last):".dimmed());
    println!("  {} built-in defaults", "·".dimmed());
    if global_exists {
        println!("  {} {}", "✓".green(), "~/.schedash/config.toml".dimmed());
    } else {
        println!(
            "  {} {}",
            "·".dimmed(),
            "~/.schedash/config.toml (not found)".dimmed()
        );
    }
    if project_exists {
        println!("  {} {}", "✓".green(), ".schedash.toml".dimmed());
    } else {
        println!("  {} {}", "·".dimmed(), ".schedash.toml (not found)".dimmed());
    }
    println!(
        "  {} {}",
        "·".dimmed(),
        "SCHEDASH_* environment variables".dimmed()
    );

    Ok(ExitCode::SUCCESS)
}

/// Initialize a default config file at `~/.schedash/config.toml`.
pub fn run_config_init(force: bool) -> Result<ExitCode> {
    let path = config::init_config(force)?;
    println!(
        "{} Config written to {}",
        "✓".green().bold(),
        path.display()
    );
    println!(
        "  {}",
        "Edit the file to point the dashboard at your services.".dimmed()
    );
    Ok(ExitCode::SUCCESS)
}

/// Set a single configuration value in the global config file.
pub fn run_config_set(key: &str, value: &str) -> Result<ExitCode> {
    config::set_config_value(key, value)?;
    println!("{} Set {} = {}", "✓".green().bold(), key.bold(), value);
    Ok(ExitCode::SUCCESS)
}

/// Reset configuration to defaults.
pub fn run_config_reset() -> Result<ExitCode> {
    let path = config::reset_config()?;
    println!(
        "{} Config reset to defaults at {}",
        "✓".green().bold(),
        path.display()
    );
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_defaults_to_table() {
        assert_eq!(OutputFormat::from_str_opt(None), OutputFormat::Table);
        assert_eq!(OutputFormat::from_str_opt(Some("csv")), OutputFormat::Table);
        assert_eq!(OutputFormat::from_str_opt(Some("json")), OutputFormat::Json);
    }
}
