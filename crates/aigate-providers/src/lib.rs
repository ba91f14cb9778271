//! Provider layer for aigate.
//!
//! # Architecture
//!
//! - [`credentials`]: credential pools, one per provider
//! - [`store`] / [`rotation`]: cooldown storage and the round-robin tracker
//! - [`classify`]: maps raw adapter failures onto retry decisions
//! - [`traits::ProviderAdapter`]: trait that every backend implements
//! - [`registry`]: static specs for the supported providers + adapter builder
//! - [`http_provider::HttpProvider`]: OpenAI-compatible HTTP client
//! - [`gemini::GeminiProvider`]: native Gemini `generateContent` client
//! - [`chain`] / [`executor`]: fallback chains and the executor that walks them

pub mod chain;
pub mod classify;
pub mod credentials;
pub mod error;
pub mod executor;
pub mod gemini;
pub mod http_provider;
pub mod registry;
pub mod rotation;
pub mod store;
pub mod traits;

pub use chain::{ChainLink, FallbackChain, FallbackChains};
pub use classify::{ErrorClassifier, FailureClass};
pub use credentials::{Credential, CredentialPool, CredentialPools};
pub use error::ProviderError;
pub use executor::FallbackExecutor;
pub use gemini::GeminiProvider;
pub use http_provider::HttpProvider;
pub use registry::{build_adapters, create_adapter, find_by_name, ApiKind, ProviderSpec, PROVIDERS};
pub use rotation::RotationTracker;
pub use store::{CooldownStore, MemoryCooldownStore};
pub use traits::{LlmRequestConfig, ProviderAdapter, MAX_CONTEXT_TURNS};
