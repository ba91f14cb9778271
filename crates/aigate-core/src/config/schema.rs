//! Configuration schema.
//!
//! Hierarchy: `Config` → `ProvidersConfig`, `ChainsConfig`, `RateLimitConfig`,
//! `ClassifierConfig`, `TimeoutsConfig`, `GroundingConfig`, `ToolsConfig`,
//! `LimitsConfig`.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.
//! Everything is loaded once at startup; there is no runtime mutation API.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::utils::parse_credential_list;

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration: loaded from `~/.aigate/config.json` + env vars.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub providers: ProvidersConfig,
    pub chains: ChainsConfig,
    pub rate_limit: RateLimitConfig,
    pub classifier: ClassifierConfig,
    pub timeouts: TimeoutsConfig,
    pub grounding: GroundingConfig,
    pub tools: ToolsConfig,
    pub limits: LimitsConfig,
}

// ─────────────────────────────────────────────
// Providers
// ─────────────────────────────────────────────

/// Credentials and endpoint settings for a single provider.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    /// Comma-separated credential list, in rotation order.
    #[serde(default)]
    pub api_keys: String,
    /// Single-credential fallback used when `api_keys` is empty.
    #[serde(default)]
    pub api_key: String,
    /// Custom API base URL (overrides provider default).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Extra HTTP headers to send with each request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_headers: Option<HashMap<String, String>>,
}

impl ProviderConfig {
    /// The ordered credential list: `api_keys` if set, else `api_key`.
    pub fn credentials(&self) -> Vec<String> {
        let keys = parse_credential_list(&self.api_keys);
        if !keys.is_empty() {
            return keys;
        }
        parse_credential_list(&self.api_key)
    }

    /// Whether this provider has at least one credential.
    pub fn is_configured(&self) -> bool {
        !self.credentials().is_empty()
    }
}

/// All provider configurations, one per supported backend.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub groq: ProviderConfig,
    #[serde(default)]
    pub gemini: ProviderConfig,
    #[serde(default)]
    pub openai: ProviderConfig,
    #[serde(default)]
    pub openrouter: ProviderConfig,
    #[serde(default)]
    pub deepseek: ProviderConfig,
}

impl ProvidersConfig {
    /// Get a provider config by name (e.g. `"groq"`).
    pub fn get_by_name(&self, name: &str) -> Option<&ProviderConfig> {
        match name {
            "groq" => Some(&self.groq),
            "gemini" => Some(&self.gemini),
            "openai" => Some(&self.openai),
            "openrouter" => Some(&self.openrouter),
            "deepseek" => Some(&self.deepseek),
            _ => None,
        }
    }

    /// Convert to a map keyed by provider name.
    pub fn to_map(&self) -> HashMap<String, ProviderConfig> {
        let entries: &[(&str, &ProviderConfig)] = &[
            ("groq", &self.groq),
            ("gemini", &self.gemini),
            ("openai", &self.openai),
            ("openrouter", &self.openrouter),
            ("deepseek", &self.deepseek),
        ];
        entries
            .iter()
            .map(|(name, config)| (name.to_string(), (*config).clone()))
            .collect()
    }
}

// ─────────────────────────────────────────────
// Fallback chains
// ─────────────────────────────────────────────

/// The two named fallback chains and their per-provider model orderings.
///
/// The chat and analysis chains differ only in which provider is tried first;
/// the remaining providers follow `provider_order`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChainsConfig {
    /// Provider tried first for chat and title requests.
    pub chat_first: String,
    /// Provider tried first for analysis and vision requests.
    pub analysis_first: String,
    /// Order of the remaining providers.
    pub provider_order: Vec<String>,
    /// Text models per provider, in fallback order.
    pub models: HashMap<String, Vec<String>>,
    /// Image-capable models per provider, in fallback order.
    pub vision_models: HashMap<String, Vec<String>>,
}

impl Default for ChainsConfig {
    fn default() -> Self {
        let models = HashMap::from([
            (
                "groq".to_string(),
                vec![
                    "llama-3.3-70b-versatile".to_string(),
                    "llama-3.1-8b-instant".to_string(),
                ],
            ),
            (
                "gemini".to_string(),
                vec![
                    "gemini-2.0-flash".to_string(),
                    "gemini-1.5-flash".to_string(),
                ],
            ),
        ]);
        let vision_models = HashMap::from([
            (
                "groq".to_string(),
                vec!["meta-llama/llama-4-scout-17b-16e-instruct".to_string()],
            ),
            ("gemini".to_string(), vec!["gemini-2.0-flash".to_string()]),
        ]);
        Self {
            chat_first: "groq".to_string(),
            analysis_first: "gemini".to_string(),
            provider_order: vec!["groq".to_string(), "gemini".to_string()],
            models,
            vision_models,
        }
    }
}

// ─────────────────────────────────────────────
// Rate limiting
// ─────────────────────────────────────────────

/// Cooldown durations for the rotation tracker.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateLimitConfig {
    /// Cooldown applied to a rate-limited credential when the provider gives none.
    pub default_cooldown_secs: u64,
    /// How long an exhausted provider is skipped before its pool is re-scanned.
    pub all_blocked_recheck_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            default_cooldown_secs: 3600,
            all_blocked_recheck_secs: 60,
        }
    }
}

// ─────────────────────────────────────────────
// Error classification
// ─────────────────────────────────────────────

/// Substring lookup table used when a provider gives no structured error code.
///
/// Matching is case-insensitive. A rate-limit term matches on its own; a
/// model-unavailable group matches only when every term in it is present.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassifierConfig {
    pub rate_limit_terms: Vec<String>,
    pub model_unavailable_terms: Vec<Vec<String>>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            rate_limit_terms: [
                "rate limit",
                "rate_limit",
                "ratelimit",
                "too many requests",
                "limit",
                "quota",
                "429",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            model_unavailable_terms: vec![
                vec!["model".to_string(), "not found".to_string()],
                vec!["model".to_string(), "does not exist".to_string()],
                vec!["model".to_string(), "decommissioned".to_string()],
            ],
        }
    }
}

// ─────────────────────────────────────────────
// Timeouts
// ─────────────────────────────────────────────

/// Outbound request timeouts.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeoutsConfig {
    /// Provider calls and web search.
    pub text_secs: u64,
    /// Image fetches.
    pub fetch_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            text_secs: 15,
            fetch_secs: 20,
        }
    }
}

// ─────────────────────────────────────────────
// Grounding
// ─────────────────────────────────────────────

/// Grounding (internal content + web search) settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroundingConfig {
    /// Absolute base used to qualify relative content URLs.
    pub site_base_url: String,
    /// Max internal matches per content category.
    pub internal_limit: usize,
    /// Max web results when internal content finds nothing.
    pub web_limit: usize,
    /// Appended to web queries to bias results toward the site's subject.
    pub domain_qualifier: String,
    /// Whether web grounding may be used at all.
    pub web_enabled: bool,
    /// JSON file backing the content repository (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_file: Option<String>,
}

impl Default for GroundingConfig {
    fn default() -> Self {
        Self {
            site_base_url: "https://example.org".to_string(),
            internal_limit: 5,
            web_limit: 3,
            domain_qualifier: "history".to_string(),
            web_enabled: true,
            content_file: None,
        }
    }
}

// ─────────────────────────────────────────────
// Tools
// ─────────────────────────────────────────────

/// External tool configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolsConfig {
    #[serde(default)]
    pub web: WebToolsConfig,
}

/// Web tools configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebToolsConfig {
    #[serde(default)]
    pub search: WebSearchConfig,
}

/// Web search configuration (Brave API).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebSearchConfig {
    /// Brave Search API key. Empty disables web search.
    #[serde(default)]
    pub api_key: String,
    /// Custom endpoint (overrides the public Brave endpoint).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

// ─────────────────────────────────────────────
// Limits
// ─────────────────────────────────────────────

/// Request size limits.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LimitsConfig {
    /// Prior turns kept per request.
    pub max_turns: usize,
    /// Largest image accepted, inline or fetched.
    pub max_image_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_turns: 10,
            max_image_bytes: 10 * 1024 * 1024,
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
