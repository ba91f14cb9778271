//! Config loader: reads `~/.aigate/config.json`, merges env vars, and
//! normalizes older layouts.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.aigate/config.json`
//! 3. Environment variables `AIGATE_<SECTION>__<FIELD>` (override JSON)
//! 4. Bare `<PROVIDER>_API_KEYS` / `<PROVIDER>_API_KEY`, only for providers
//!    that are still unconfigured after step 3

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::schema::{Config, ProviderConfig};

/// Provider names paired with their env var stem.
const PROVIDER_ENV: &[(&str, &str)] = &[
    ("groq", "GROQ"),
    ("gemini", "GEMINI"),
    ("openai", "OPENAI"),
    ("openrouter", "OPENROUTER"),
    ("deepseek", "DEEPSEEK"),
];

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the default path + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);
    load_config_from_path(&config_path)
}

fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!(path = %path.display(), "no config file found, using defaults");
        return apply_env_overrides(Config::default());
    }

    debug!(path = %path.display(), "loading config");

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read config file");
            return apply_env_overrides(Config::default());
        }
    };

    let mut raw: serde_json::Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "failed to parse config JSON");
            return apply_env_overrides(Config::default());
        }
    };

    migrate_config(&mut raw);

    let config: Config = match serde_json::from_value(raw) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "failed to deserialize config");
            return apply_env_overrides(Config::default());
        }
    };

    apply_env_overrides(config)
}

/// Save configuration to disk (pretty-printed JSON with camelCase keys).
pub fn save_config(config: &Config, path: Option<&Path>) -> std::io::Result<()> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config).map_err(std::io::Error::other)?;

    std::fs::write(&config_path, json)?;
    debug!(path = %config_path.display(), "config saved");
    Ok(())
}

/// Normalize hand-written layouts into the canonical schema.
///
/// `providers.<name>.apiKeys` given as a JSON array is joined into the
/// comma-separated string form.
fn migrate_config(raw: &mut serde_json::Value) {
    let Some(providers) = raw.get_mut("providers").and_then(|p| p.as_object_mut()) else {
        return;
    };
    for (name, provider) in providers.iter_mut() {
        let Some(keys) = provider.get("apiKeys").and_then(|k| k.as_array()) else {
            continue;
        };
        let joined = keys
            .iter()
            .filter_map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(",");
        provider["apiKeys"] = serde_json::Value::String(joined);
        debug!(provider = %name, "migrated apiKeys array to comma list");
    }
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Env var format: `AIGATE_<SECTION>__<FIELD>` (double underscore as delimiter).
///
/// Supported overrides:
/// - `AIGATE_PROVIDERS__<NAME>__API_KEYS` → `providers.<name>.api_keys`
/// - `AIGATE_PROVIDERS__<NAME>__API_KEY` → `providers.<name>.api_key`
/// - `AIGATE_PROVIDERS__<NAME>__API_BASE` → `providers.<name>.api_base`
/// - `AIGATE_CHAINS__CHAT_FIRST` → `chains.chat_first`
/// - `AIGATE_CHAINS__ANALYSIS_FIRST` → `chains.analysis_first`
/// - `AIGATE_GROUNDING__SITE_BASE_URL` → `grounding.site_base_url`
/// - `AIGATE_GROUNDING__WEB_ENABLED` → `grounding.web_enabled`
/// - `AIGATE_TOOLS__WEB__SEARCH__API_KEY` → `tools.web.search.api_key`
///   (falls back to `BRAVE_API_KEY`)
fn apply_env_overrides(mut config: Config) -> Config {
    for (name, stem) in PROVIDER_ENV {
        let provider = match *name {
            "groq" => &mut config.providers.groq,
            "gemini" => &mut config.providers.gemini,
            "openai" => &mut config.providers.openai,
            "openrouter" => &mut config.providers.openrouter,
            _ => &mut config.providers.deepseek,
        };
        apply_provider_env(provider, stem);
    }

    if let Ok(val) = std::env::var("AIGATE_CHAINS__CHAT_FIRST") {
        config.chains.chat_first = val;
    }
    if let Ok(val) = std::env::var("AIGATE_CHAINS__ANALYSIS_FIRST") {
        config.chains.analysis_first = val;
    }

    if let Ok(val) = std::env::var("AIGATE_GROUNDING__SITE_BASE_URL") {
        config.grounding.site_base_url = val;
    }
    if let Ok(val) = std::env::var("AIGATE_GROUNDING__WEB_ENABLED") {
        config.grounding.web_enabled = val == "true" || val == "1";
    }

    if let Ok(val) = std::env::var("AIGATE_TOOLS__WEB__SEARCH__API_KEY") {
        config.tools.web.search.api_key = val;
    } else if config.tools.web.search.api_key.is_empty() {
        if let Ok(val) = std::env::var("BRAVE_API_KEY") {
            config.tools.web.search.api_key = val;
        }
    }

    config
}

/// Apply env var overrides for a single provider.
fn apply_provider_env(provider: &mut ProviderConfig, stem: &str) {
    if let Ok(val) = std::env::var(format!("AIGATE_PROVIDERS__{stem}__API_KEYS")) {
        provider.api_keys = val;
    }
    if let Ok(val) = std::env::var(format!("AIGATE_PROVIDERS__{stem}__API_KEY")) {
        provider.api_key = val;
    }
    if let Ok(val) = std::env::var(format!("AIGATE_PROVIDERS__{stem}__API_BASE")) {
        provider.api_base = Some(val);
    }

    if provider.is_configured() {
        return;
    }
    if let Ok(val) = std::env::var(format!("{stem}_API_KEYS")) {
        provider.api_keys = val;
    } else if let Ok(val) = std::env::var(format!("{stem}_API_KEY")) {
        provider.api_key = val;
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
