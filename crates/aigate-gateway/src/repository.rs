//! Content repository: the internal knowledge base used for grounding.
//!
//! The live repository is an external collaborator; only its search interface
//! is defined here. [`FileContentRepository`] serves deployments that keep
//! their catalogue in a JSON file.

use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Content categories searched for grounding, in output order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentCategory {
    Archive,
    Insight,
    Book,
}

impl ContentCategory {
    pub const ALL: [ContentCategory; 3] = [
        ContentCategory::Archive,
        ContentCategory::Insight,
        ContentCategory::Book,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentCategory::Archive => "archive",
            ContentCategory::Insight => "insight",
            ContentCategory::Book => "book",
        }
    }

    /// Section heading used in grounding context.
    pub fn heading(&self) -> &'static str {
        match self {
            ContentCategory::Archive => "From the archive",
            ContentCategory::Insight => "From insights",
            ContentCategory::Book => "From books",
        }
    }
}

/// One search hit. `url` may be site-relative.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentItem {
    pub title: String,
    pub description: String,
    pub url: String,
}

/// Search restrictions every repository must honour.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchFilter {
    /// Only return items that passed moderation.
    pub approved_only: bool,
}

impl Default for SearchFilter {
    fn default() -> Self {
        SearchFilter {
            approved_only: true,
        }
    }
}

#[async_trait]
pub trait ContentRepository: Send + Sync {
    async fn search(
        &self,
        category: ContentCategory,
        query: &str,
        limit: usize,
        filter: SearchFilter,
    ) -> anyhow::Result<Vec<ContentItem>>;
}

// ─────────────────────────────────────────────
// FileContentRepository
// ─────────────────────────────────────────────

/// A catalogue entry as stored on disk.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoredItem {
    pub category: Option<ContentCategory>,
    pub title: String,
    pub description: String,
    /// Absolute or site-relative link.
    pub url: Option<String>,
    /// Site-relative path, used when `url` is absent.
    pub path: Option<String>,
    pub approved: bool,
}

/// Repository backed by a JSON array of [`StoredItem`]s, loaded once.
///
/// Matching is case-insensitive: an item matches when any query word of four
/// or more characters appears in its title or description. A query with no
/// such word is matched as one whole phrase. Items matching more words rank
/// first.
#[derive(Debug, Default)]
pub struct FileContentRepository {
    items: Vec<StoredItem>,
}

impl FileContentRepository {
    pub fn from_items(items: Vec<StoredItem>) -> Self {
        FileContentRepository { items }
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read content file {}", path.display()))?;
        let items: Vec<StoredItem> = serde_json::from_str(&raw)
            .with_context(|| format!("invalid content file {}", path.display()))?;
        debug!(path = %path.display(), items = items.len(), "content file loaded");
        Ok(Self::from_items(items))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn query_terms(query: &str) -> Vec<String> {
    let words: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();

    let mut terms: Vec<String> = Vec::new();
    for word in &words {
        if word.chars().count() >= 4 && !terms.contains(word) {
            terms.push(word.clone());
        }
    }
    if terms.is_empty() && !words.is_empty() {
        terms.push(words.join(" "));
    }
    terms
}

#[async_trait]
impl ContentRepository for FileContentRepository {
    async fn search(
        &self,
        category: ContentCategory,
        query: &str,
        limit: usize,
        filter: SearchFilter,
    ) -> anyhow::Result<Vec<ContentItem>> {
        let terms = query_terms(query);
        if terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, &StoredItem)> = self
            .items
            .iter()
            .filter(|item| item.category == Some(category))
            .filter(|item| item.approved || !filter.approved_only)
            .filter_map(|item| {
                let haystack = format!("{} {}", item.title, item.description).to_lowercase();
                let score = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
                (score > 0).then_some((score, item))
            })
            .collect();

        // Stable: equal scores keep file order.
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(scored
            .into_iter()
            .filter_map(|(_, item)| {
                let url = item.url.clone().or_else(|| item.path.clone())?;
                Some(ContentItem {
                    title: item.title.clone(),
                    description: item.description.clone(),
                    url,
                })
            })
            .take(limit)
            .collect())
    }
}
