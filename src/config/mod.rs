/// Configuration system for schedash.
///
/// Provides a layered configuration hierarchy:
///
/// 1. **Built-in defaults**: hardcoded in [`schema::DashConfig::default()`]
/// 2. **User global config**: `~/.schedash/config.toml`
/// 3. **Project local config**: `.schedash.toml` in the current working directory
/// 4. **Environment variables**: `SCHEDASH_*` overrides (highest precedence)
///
/// # Usage
///
/// ```rust,ignore
/// use schedash::config;
///
/// let cfg = config::load();
/// println!("primary service at {}", cfg.service.origin);
/// ```
pub mod schema;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

pub use schema::DashConfig;

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the fully resolved configuration.
///
/// Merges all layers in order: defaults → global TOML → project TOML → env
/// vars.
pub fn load() -> DashConfig {
    let mut config = load_layers([global_config_path(), project_config_path()]);
    apply_env_overrides(&mut config);
    config
}

/// Merge TOML files key by key, later files winning, then fill the gaps with
/// defaults.
///
/// A file that is missing or does not load as a config on its own is
/// skipped, so a bad edit never locks the operator out of the console.
fn load_layers(paths: impl IntoIterator<Item = Option<PathBuf>>) -> DashConfig {
    let mut merged = toml::Table::new();
    for layer in paths.into_iter().filter_map(load_toml_layer) {
        merge_tables(&mut merged, layer);
    }
    toml::Value::Table(merged).try_into().unwrap_or_default()
}

fn load_toml_layer(path: Option<PathBuf>) -> Option<toml::Table> {
    let path = path?;
    let content = fs::read_to_string(&path).ok()?;
    toml::from_str::<DashConfig>(&content).ok()?;
    toml::from_str(&content).ok()
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(section) if base.get(&key).is_some_and(toml::Value::is_table) => {
                if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                    merge_tables(existing, section);
                }
            }
            value => {
                base.insert(key, value);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// File paths
// ---------------------------------------------------------------------------

fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".schedash").join("config.toml"))
}

fn project_config_path() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .map(|cwd| cwd.join(".schedash.toml"))
}

/// Return the path to the global config file for display/init purposes.
pub fn global_config_file() -> Option<PathBuf> {
    global_config_path()
}

/// Return the path to the project config file for display purposes.
pub fn project_config_file() -> Option<PathBuf> {
    project_config_path()
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides (highest precedence layer).
///
/// Supported variables:
/// - `SCHEDASH_ORIGIN`: primary service origin
/// - `SCHEDASH_DASHBOARD_PORT`: well-known dashboard port
/// - `SCHEDASH_DECISION_PORT`: decision service port
/// - `SCHEDASH_TIMEOUT_MS`: request timeout
/// - `SCHEDASH_HEALTH_INTERVAL_MS` / `SCHEDASH_METRICS_INTERVAL_MS`
/// - `SCHEDASH_TOKEN_PATH`: token file location
/// - `SCHEDASH_LOGGING`: activity log on/off
fn apply_env_overrides(config: &mut DashConfig) {
    if let Ok(val) = std::env::var("SCHEDASH_ORIGIN")
        && !val.is_empty()
    {
        config.service.origin = val;
    }
    if let Ok(val) = std::env::var("SCHEDASH_DASHBOARD_PORT")
        && let Ok(port) = val.parse::<u16>()
    {
        config.service.dashboard_port = port;
    }
    if let Ok(val) = std::env::var("SCHEDASH_DECISION_PORT")
        && let Ok(port) = val.parse::<u16>()
    {
        config.service.decision_port = port;
    }
    if let Ok(val) = std::env::var("SCHEDASH_TIMEOUT_MS")
        && let Ok(ms) = val.parse::<u64>()
    {
        config.service.timeout_ms = ms;
    }

    if let Ok(val) = std::env::var("SCHEDASH_HEALTH_INTERVAL_MS")
        && let Ok(ms) = val.parse::<u64>()
    {
        config.polling.health_interval_ms = ms;
    }
    if let Ok(val) = std::env::var("SCHEDASH_METRICS_INTERVAL_MS")
        && let Ok(ms) = val.parse::<u64>()
    {
        config.polling.metrics_interval_ms = ms;
    }

    if let Ok(val) = std::env::var("SCHEDASH_TOKEN_PATH")
        && !val.is_empty()
    {
        config.session.token_path = val;
    }
    if let Ok(val) = std::env::var("SCHEDASH_LOGGING") {
        config.logging.enabled = is_truthy(&val);
    }
}

/// Check if a string value represents a truthy boolean.
pub(crate) fn is_truthy(val: &str) -> bool {
    matches!(
        val.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

// ---------------------------------------------------------------------------
// Config init / set / reset
// ---------------------------------------------------------------------------

/// Write the default annotated config to `~/.schedash/config.toml`.
///
/// Returns an error if the file already exists and `force` is false.
pub fn init_config(force: bool) -> Result<PathBuf> {
    let path = global_config_path().context("could not determine home directory")?;

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create ~/.schedash/ directory")?;
    }

    fs::write(&path, DashConfig::default_toml()).context("failed to write config file")?;

    Ok(path)
}

/// Set a single config key to a value in the global config file.
///
/// Supports dotted keys like `service.origin`. When no file exists yet the
/// defaults are written first.
pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    let path = global_config_path().context("could not determine home directory")?;

    let content = if path.exists() {
        fs::read_to_string(&path).context("failed to read config file")?
    } else {
        toml::to_string_pretty(&DashConfig::default())
            .context("failed to serialize default config")?
    };

    let mut root: toml::Value =
        toml::from_str(&content).context("failed to parse config as TOML value")?;
    set_toml_value(&mut root, key, value)?;

    // Reject edits that would no longer load as a config.
    let updated = toml::to_string_pretty(&root).context("failed to serialize config")?;
    toml::from_str::<DashConfig>(&updated)
        .with_context(|| format!("'{value}' is not a valid value for '{key}'"))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create config directory")?;
    }
    fs::write(&path, updated).context("failed to write config file")?;

    Ok(())
}

/// Set a value in a TOML value tree using a dotted key path.
fn set_toml_value(root: &mut toml::Value, key: &str, raw_value: &str) -> Result<()> {
    let Some((section_path, leaf)) = key.rsplit_once('.') else {
        anyhow::bail!("config keys take the form <section>.<field>, got '{key}'");
    };

    let mut current = root;
    for part in section_path.split('.') {
        current = current
            .get_mut(part)
            .with_context(|| format!("config key not found: section '{part}' in '{key}'"))?;
    }

    let table = current
        .as_table_mut()
        .with_context(|| format!("expected table at '{section_path}'"))?;

    let new_value = match table.get(leaf) {
        Some(toml::Value::Boolean(_)) => toml::Value::Boolean(is_truthy(raw_value)),
        Some(toml::Value::Integer(_)) => {
            let n: i64 = raw_value
                .parse()
                .with_context(|| format!("expected integer for '{key}', got '{raw_value}'"))?;
            toml::Value::Integer(n)
        }
        Some(toml::Value::String(_)) => toml::Value::String(raw_value.to_string()),
        Some(_) => anyhow::bail!("config key '{key}' cannot be set from the command line"),
        None => anyhow::bail!("config key not found: '{key}'"),
    };

    table.insert(leaf.to_string(), new_value);
    Ok(())
}

/// Reset the global config to defaults (overwrite the file).
pub fn reset_config() -> Result<PathBuf> {
    init_config(true)
}

/// Show the effective (fully resolved) config as TOML.
pub fn show_effective_config() -> Result<String> {
    let config = load();
    toml::to_string_pretty(&config).context("failed to serialize effective config")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
