//! Provider registry: static specs for the supported upstream providers.
//!
//! Each `ProviderSpec` describes how to reach one provider: which adapter
//! speaks its API, the default base URL, the env vars operators use for its
//! credentials, and whether its models accept images.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use tracing::debug;

use aigate_core::config::schema::{ProviderConfig, ProvidersConfig};

use crate::gemini::GeminiProvider;
use crate::http_provider::HttpProvider;
use crate::traits::{LlmRequestConfig, ProviderAdapter};

// ─────────────────────────────────────────────
// ProviderSpec: static metadata for one provider
// ─────────────────────────────────────────────

/// Which wire protocol a provider speaks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApiKind {
    /// `POST {base}/chat/completions` with bearer auth.
    OpenAiCompatible,
    /// `POST {base}/models/{model}:generateContent` with `x-goog-api-key`.
    Gemini,
}

#[derive(Clone, Debug)]
pub struct ProviderSpec {
    /// Internal name (e.g. `"groq"`). Used in config, chains, and logs.
    pub name: &'static str,
    /// Human-readable name for logs. E.g. `"Groq"`.
    pub display_name: &'static str,
    /// Env var holding a comma-separated credential list.
    pub env_keys: &'static str,
    /// Env var holding a single credential.
    pub env_key: &'static str,
    /// Default API base URL.
    pub default_api_base: &'static str,
    pub api_kind: ApiKind,
    /// Whether any of this provider's models accept image input.
    pub supports_vision: bool,
}

/// Supported providers, in default display order.
pub static PROVIDERS: &[ProviderSpec] = &[
    ProviderSpec {
        name: "groq",
        display_name: "Groq",
        env_keys: "GROQ_API_KEYS",
        env_key: "GROQ_API_KEY",
        default_api_base: "https://api.groq.com/openai/v1",
        api_kind: ApiKind::OpenAiCompatible,
        supports_vision: true,
    },
    ProviderSpec {
        name: "gemini",
        display_name: "Gemini",
        env_keys: "GEMINI_API_KEYS",
        env_key: "GEMINI_API_KEY",
        default_api_base: "https://generativelanguage.googleapis.com/v1beta",
        api_kind: ApiKind::Gemini,
        supports_vision: true,
    },
    ProviderSpec {
        name: "openai",
        display_name: "OpenAI",
        env_keys: "OPENAI_API_KEYS",
        env_key: "OPENAI_API_KEY",
        default_api_base: "https://api.openai.com/v1",
        api_kind: ApiKind::OpenAiCompatible,
        supports_vision: true,
    },
    ProviderSpec {
        name: "openrouter",
        display_name: "OpenRouter",
        env_keys: "OPENROUTER_API_KEYS",
        env_key: "OPENROUTER_API_KEY",
        default_api_base: "https://openrouter.ai/api/v1",
        api_kind: ApiKind::OpenAiCompatible,
        supports_vision: true,
    },
    ProviderSpec {
        name: "deepseek",
        display_name: "DeepSeek",
        env_keys: "DEEPSEEK_API_KEYS",
        env_key: "DEEPSEEK_API_KEY",
        default_api_base: "https://api.deepseek.com/v1",
        api_kind: ApiKind::OpenAiCompatible,
        supports_vision: false,
    },
];

/// Find a provider spec by its internal name.
pub fn find_by_name(name: &str) -> Option<&'static ProviderSpec> {
    PROVIDERS.iter().find(|s| s.name == name)
}

// ─────────────────────────────────────────────
// Adapter construction
// ─────────────────────────────────────────────

/// Build the adapter for one provider.
pub fn create_adapter(
    spec: &'static ProviderSpec,
    config: &ProviderConfig,
    request: &LlmRequestConfig,
) -> anyhow::Result<Arc<dyn ProviderAdapter>> {
    debug!(
        provider = spec.name,
        api_base = config.api_base.as_deref().unwrap_or(spec.default_api_base),
        "creating provider adapter"
    );

    let adapter: Arc<dyn ProviderAdapter> = match spec.api_kind {
        ApiKind::OpenAiCompatible => Arc::new(HttpProvider::new(config, spec, request.clone())?),
        ApiKind::Gemini => Arc::new(GeminiProvider::new(config, spec, request.clone())?),
    };
    Ok(adapter)
}

/// Build adapters for every configured provider, keyed by provider name.
///
/// Providers without credentials are skipped; the executor treats a missing
/// adapter the same way as an empty pool.
pub fn build_adapters(
    providers: &ProvidersConfig,
    request: &LlmRequestConfig,
) -> anyhow::Result<HashMap<String, Arc<dyn ProviderAdapter>>> {
    let mut adapters = HashMap::new();
    for spec in PROVIDERS {
        let Some(config) = providers.get_by_name(spec.name) else {
            continue;
        };
        if !config.is_configured() {
            debug!(provider = spec.name, "provider not configured, no adapter");
            continue;
        }
        let adapter = create_adapter(spec, config, request)
            .with_context(|| format!("failed to create adapter for {}", spec.name))?;
        adapters.insert(spec.name.to_string(), adapter);
    }
    Ok(adapters)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
