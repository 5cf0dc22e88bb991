/// Configuration system for botdesk.
///
/// Provides a layered configuration hierarchy:
///
/// 1. **Built-in defaults** — hardcoded in [`BotdeskConfig::default()`]
/// 2. **User config** — `~/.botdesk/config.toml`
/// 3. **Environment variables** — `BOTDESK_*` overrides (highest precedence)
///
/// Later layers override earlier ones at the field level. Missing sections
/// in the TOML file fall back to the previous layer's values.
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default remote API base URL.
const DEFAULT_BASE_URL: &str = "https://serverowned.onrender.com";

/// Default per-request timeout in milliseconds.
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default attempt count for the retrying read fetcher.
const DEFAULT_RETRIES: u32 = 3;

/// Default fixed delay between retry attempts in milliseconds.
const DEFAULT_RETRY_DELAY_MS: u64 = 2_000;

// ---------------------------------------------------------------------------
// Config schema
// ---------------------------------------------------------------------------

/// Top-level botdesk configuration.
///
/// Maps directly to the `~/.botdesk/config.toml` file schema. All sections
/// and fields are optional — missing values fall back to built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotdeskConfig {
    pub api: ApiConfig,
    pub output: OutputConfig,
}

/// `[api]` — remote endpoint and retry behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the chatbot platform API.
    pub base_url: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Attempt count for retried read endpoints (stats, conversations).
    pub retries: u32,
    /// Fixed delay between retry attempts (no backoff), milliseconds.
    pub retry_delay_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retries: DEFAULT_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

/// `[output]` — terminal rendering options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Enable ANSI colors in table output.
    pub color: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { color: true }
    }
}

impl BotdeskConfig {
    /// Annotated default config written by `botdesk config init`.
    pub fn default_toml() -> String {
        format!(
            r#"# botdesk configuration
# Values shown are the built-in defaults.

[api]
# Base URL of the chatbot platform API.
base_url = "{DEFAULT_BASE_URL}"
# Per-request timeout in milliseconds.
timeout_ms = {DEFAULT_TIMEOUT_MS}
# Attempt count for retried read endpoints (stats, conversations).
retries = {DEFAULT_RETRIES}
# Fixed delay between retry attempts in milliseconds.
retry_delay_ms = {DEFAULT_RETRY_DELAY_MS}

[output]
# Enable ANSI colors in table output.
color = true
"#
        )
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the fully resolved botdesk configuration.
///
/// Merges all layers in order: defaults → user TOML → env vars. This is the
/// primary entry point for all modules that need configuration.
pub fn load() -> BotdeskConfig {
    let mut config = BotdeskConfig::default();

    // Layer 2: user config (~/.botdesk/config.toml)
    if let Some(file_cfg) = load_toml_file(config_path()) {
        config = file_cfg;
    }

    // Layer 3: environment variable overrides
    apply_env_overrides(&mut config);

    config
}

/// Load a TOML config file from the given path (if it exists).
///
/// Returns `None` if the path is `None`, the file doesn't exist, or the
/// content is malformed. Malformed files are silently ignored — a broken
/// config file must never make the tool unusable.
fn load_toml_file(path: Option<PathBuf>) -> Option<BotdeskConfig> {
    let path = path?;
    let content = fs::read_to_string(&path).ok()?;
    toml::from_str(&content).ok()
}

// ---------------------------------------------------------------------------
// File paths
// ---------------------------------------------------------------------------

/// Path to the user config: `~/.botdesk/config.toml`.
fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".botdesk").join("config.toml"))
}

/// Return the path to the config file for display/init purposes.
pub fn config_file() -> Option<PathBuf> {
    config_path()
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides (highest precedence layer).
///
/// Supported variables:
/// - `BOTDESK_API_URL` — API base URL
/// - `BOTDESK_TIMEOUT_MS` — per-request timeout
/// - `BOTDESK_RETRIES` — retry attempt count
/// - `BOTDESK_RETRY_DELAY_MS` — delay between retry attempts
/// - `BOTDESK_COLOR` — colored output (`1`/`true`/`yes`/`on`)
fn apply_env_overrides(config: &mut BotdeskConfig) {
    if let Ok(val) = std::env::var("BOTDESK_API_URL")
        && !val.is_empty()
    {
        config.api.base_url = val;
    }
    if let Ok(val) = std::env::var("BOTDESK_TIMEOUT_MS")
        && let Ok(ms) = val.parse::<u64>()
    {
        config.api.timeout_ms = ms;
    }
    if let Ok(val) = std::env::var("BOTDESK_RETRIES")
        && let Ok(n) = val.parse::<u32>()
    {
        config.api.retries = n;
    }
    if let Ok(val) = std::env::var("BOTDESK_RETRY_DELAY_MS")
        && let Ok(ms) = val.parse::<u64>()
    {
        config.api.retry_delay_ms = ms;
    }
    if let Ok(val) = std::env::var("BOTDESK_COLOR") {
        config.output.color = is_truthy(&val);
    }
}

/// Check if a string value represents a truthy boolean.
pub fn is_truthy(val: &str) -> bool {
    matches!(
        val.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

// ---------------------------------------------------------------------------
// Config init / set / reset
// ---------------------------------------------------------------------------

/// Write the default annotated config to `~/.botdesk/config.toml`.
///
/// Creates the `~/.botdesk/` directory if it doesn't exist. Returns an error
/// if the file already exists (use `force = true` to overwrite).
pub fn init_config(force: bool) -> Result<PathBuf> {
    let path = config_path().context("could not determine home directory")?;

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create ~/.botdesk/ directory")?;
    }

    fs::write(&path, BotdeskConfig::default_toml()).context("failed to write config file")?;

    Ok(path)
}

/// Set a single config key to a value in the user config file.
///
/// Reads the current config file (or serialized defaults), updates the
/// specified key, and writes the result back. Supports dotted keys like
/// `api.retries`.
pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    let path = config_path().context("could not determine home directory")?;

    let content = if path.exists() {
        fs::read_to_string(&path).context("failed to read config file")?
    } else {
        toml::to_string_pretty(&BotdeskConfig::default())
            .context("failed to serialize default config")?
    };

    let mut value_table: toml::Value =
        toml::from_str(&content).context("failed to parse config as TOML value")?;

    set_toml_value(&mut value_table, key, value)?;

    let output = toml::to_string_pretty(&value_table).context("failed to serialize config")?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create config directory")?;
    }
    fs::write(&path, output).context("failed to write config file")?;

    Ok(())
}

/// Set a value in a TOML value tree using a dotted key path.
fn set_toml_value(root: &mut toml::Value, key: &str, raw_value: &str) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();
    if parts.is_empty() {
        anyhow::bail!("empty config key");
    }

    // Navigate to the parent table
    let mut current = root;
    for &part in &parts[..parts.len() - 1] {
        current = current
            .get_mut(part)
            .with_context(|| format!("config key not found: section '{part}' in '{key}'"))?;
    }

    let leaf = parts[parts.len() - 1];

    let table = current.as_table_mut().with_context(|| {
        format!(
            "expected table at '{}'",
            key.rsplit_once('.').map(|(s, _)| s).unwrap_or("")
        )
    })?;

    // Determine the type of the existing value to parse correctly
    let existing = table.get(leaf);
    let new_value = match existing {
        Some(toml::Value::Boolean(_)) => toml::Value::Boolean(is_truthy(raw_value)),
        Some(toml::Value::Integer(_)) => {
            let n: i64 = raw_value
                .parse()
                .with_context(|| format!("expected integer for '{key}', got '{raw_value}'"))?;
            toml::Value::Integer(n)
        }
        Some(toml::Value::Float(_)) => {
            let f: f64 = raw_value
                .parse()
                .with_context(|| format!("expected float for '{key}', got '{raw_value}'"))?;
            toml::Value::Float(f)
        }
        _ => toml::Value::String(raw_value.to_string()),
    };

    table.insert(leaf.to_string(), new_value);
    Ok(())
}

/// Reset the user config to defaults (overwrite the file).
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_source_retry_policy() {
        let config = BotdeskConfig::default();
        assert_eq!(config.api.retries, 3);
        assert_eq!(config.api.retry_delay_ms, 2000);
        assert_eq!(config.api.base_url, "https://serverowned.onrender.com");
        assert!(config.output.color);
    }

    #[test]
    fn default_toml_is_parseable() {
        let parsed: BotdeskConfig = toml::from_str(&BotdeskConfig::default_toml()).unwrap();
        assert_eq!(parsed.api.retries, BotdeskConfig::default().api.retries);
    }

    #[test]
    fn is_truthy_accepts_variants() {
        assert!(is_truthy("1"));
        assert!(is_truthy("true"));
        assert!(is_truthy("YES"));
        assert!(is_truthy("on"));
        assert!(!is_truthy("0"));
        assert!(!is_truthy("false"));
        assert!(!is_truthy(""));
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let parsed: BotdeskConfig = toml::from_str("[api]\nretries = 5\n").unwrap();
        assert_eq!(parsed.api.retries, 5);
        assert_eq!(parsed.api.retry_delay_ms, 2000);
        assert!(parsed.output.color);
    }

    #[test]
    fn set_toml_value_updates_integer() {
        let mut root: toml::Value = toml::from_str("[api]\nretries = 3\n").unwrap();
        set_toml_value(&mut root, "api.retries", "5").unwrap();

        let api = root.as_table().unwrap()["api"].as_table().unwrap();
        assert_eq!(api["retries"].as_integer(), Some(5));
    }

    #[test]
    fn set_toml_value_updates_bool() {
        let mut root: toml::Value = toml::from_str("[output]\ncolor = true\n").unwrap();
        set_toml_value(&mut root, "output.color", "off").unwrap();

        let output = root.as_table().unwrap()["output"].as_table().unwrap();
        assert_eq!(output["color"].as_bool(), Some(false));
    }

    #[test]
    fn set_toml_value_rejects_invalid_key() {
        let mut root: toml::Value = toml::from_str("[api]\nretries = 3\n").unwrap();
        assert!(set_toml_value(&mut root, "nonexistent.key", "value").is_err());
    }
}
