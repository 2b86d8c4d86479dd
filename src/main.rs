use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use schedash::cli;

#[derive(Debug, Parser)]
#[command(name = "schedash")]
#[command(about = "Operator console for the scheduling service")]
struct App {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show session state, service endpoints and config sources
    Status,
    /// Obtain a session token
    Login {
        #[command(subcommand)]
        method: LoginMethod,
    },
    /// Clear the stored session token
    Logout,
    /// Probe the primary service's /health endpoint
    Health,
    /// Fetch scheduler runtime metrics (requires login)
    Metrics,
    /// Fetch pod to PID mappings (requires login)
    Pods,
    /// Fetch the strategies owned by this session (requires login)
    Strategies,
    /// Edit and submit scheduling strategies
    Form {
        /// Read editor commands from a file instead of stdin
        #[arg(long)]
        script: Option<PathBuf>,
    },
    /// Auto-refresh health and/or metrics
    Watch(WatchArgs),
    /// Show recent dashboard activity
    Log {
        /// Number of entries to show
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Output format: table (default), json
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
enum LoginMethod {
    /// Username/password against the primary service
    Password {
        #[arg(long)]
        username: String,
        /// Prompted for on stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// PEM public key exchanged with the decision service
    Key {
        /// Read the key from a file
        #[arg(long, conflicts_with = "key")]
        file: Option<PathBuf>,
        /// Pass the key inline; stdin is read when neither is given
        #[arg(long)]
        key: Option<String>,
    },
}

#[derive(Debug, Args)]
struct WatchArgs {
    /// Watch /health (default when no flag is given)
    #[arg(long)]
    health: bool,
    /// Watch metrics (requires login)
    #[arg(long)]
    metrics: bool,
    /// Refresh interval in seconds (defaults come from config)
    #[arg(long)]
    interval: Option<u64>,
    /// Stop after N probe rounds
    #[arg(long)]
    rounds: Option<usize>,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Write a default config to ~/.schedash/config.toml
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Set a value, e.g. `schedash config set service.origin http://10.0.0.5:8080`
    Set { key: String, value: String },
    /// Reset the global config to defaults
    Reset,
}

fn main() -> Result<ExitCode> {
    let app = App::parse();

    match app.command {
        Commands::Status => cli::run_status(),
        Commands::Login { method } => match method {
            LoginMethod::Password { username, password } => {
                cli::run_login_password(&username, password)
            }
            LoginMethod::Key { file, key } => cli::run_login_key(file.as_deref(), key),
        },
        Commands::Logout => cli::run_logout(),
        Commands::Health => cli::run_health(),
        Commands::Metrics => cli::run_metrics(),
        Commands::Pods => cli::run_pods(),
        Commands::Strategies => cli::run_strategies(),
        Commands::Form { script } => cli::run_form(script.as_deref()),
        Commands::Watch(args) => {
            cli::run_watch(args.health, args.metrics, args.interval, args.rounds)
        }
        Commands::Log { limit, format } => {
            let fmt = cli::OutputFormat::from_str_opt(Some(&format));
            cli::run_log(limit, fmt)
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => cli::run_config_show(),
            ConfigAction::Init { force } => cli::run_config_init(force),
            ConfigAction::Set { key, value } => cli::run_config_set(&key, &value),
            ConfigAction::Reset => cli::run_config_reset(),
        },
    }
}
