//! Fallback chains: ordered (provider, model) pairs per task type.
//!
//! Chat and analysis chains share the same provider order apart from which
//! provider comes first. The vision chain follows the analysis provider order
//! but uses each provider's image-capable models.

use std::collections::HashMap;

use aigate_core::config::schema::ChainsConfig;
use aigate_core::types::TaskType;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainLink {
    pub provider: String,
    pub model: String,
}

impl ChainLink {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        ChainLink {
            provider: provider.into(),
            model: model.into(),
        }
    }
}

impl std::fmt::Display for ChainLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FallbackChain {
    links: Vec<ChainLink>,
}

impl FallbackChain {
    pub fn new(links: Vec<ChainLink>) -> Self {
        FallbackChain { links }
    }

    pub fn links(&self) -> &[ChainLink] {
        &self.links
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChainLink> {
        self.links.iter()
    }
}

/// The chains selected by [`TaskType`].
#[derive(Clone, Debug, Default)]
pub struct FallbackChains {
    pub chat: FallbackChain,
    pub analysis: FallbackChain,
    pub vision: FallbackChain,
}

impl FallbackChains {
    pub fn from_config(config: &ChainsConfig) -> Self {
        let chat_order = provider_sequence(&config.chat_first, &config.provider_order);
        let analysis_order = provider_sequence(&config.analysis_first, &config.provider_order);

        FallbackChains {
            chat: expand(&chat_order, &config.models),
            analysis: expand(&analysis_order, &config.models),
            vision: expand(&analysis_order, &config.vision_models),
        }
    }

    /// Chat and title share a chain; analysis and vision have their own.
    pub fn for_task(&self, task: TaskType) -> &FallbackChain {
        match task {
            TaskType::Chat | TaskType::Title => &self.chat,
            TaskType::Analysis => &self.analysis,
            TaskType::Vision => &self.vision,
        }
    }
}

/// `first`, then `order` without duplicates.
fn provider_sequence(first: &str, order: &[String]) -> Vec<String> {
    let mut sequence: Vec<String> = Vec::with_capacity(order.len() + 1);
    for name in std::iter::once(first).chain(order.iter().map(String::as_str)) {
        if !name.is_empty() && !sequence.iter().any(|n| n == name) {
            sequence.push(name.to_string());
        }
    }
    sequence
}

fn expand(providers: &[String], models: &HashMap<String, Vec<String>>) -> FallbackChain {
    let links = providers
        .iter()
        .flat_map(|provider| {
            models
                .get(provider)
                .into_iter()
                .flatten()
                .map(move |model| ChainLink::new(provider.clone(), model.clone()))
        })
        .collect();
    FallbackChain::new(links)
}
