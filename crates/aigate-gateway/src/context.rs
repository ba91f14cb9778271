//! Grounding assembler: builds the context block appended before dispatch.
//!
//! Order of precedence:
//! 1. Internal content, one section per [`ContentCategory`].
//! 2. Web search, only when internal content found nothing and the caller
//!    asked for web grounding. At most one web search per call.
//!
//! A failing source is logged and left out; grounding never fails a request.

use std::sync::Arc;

use tracing::{debug, warn};
use url::Url;

use aigate_core::config::schema::GroundingConfig;
use aigate_core::utils::collapse_whitespace;

use crate::repository::{ContentCategory, ContentItem, ContentRepository, SearchFilter};
use crate::web::{SearchHit, WebSearch};

pub struct GroundingAssembler {
    repository: Option<Arc<dyn ContentRepository>>,
    web: Option<Arc<dyn WebSearch>>,
    site_base: Option<Url>,
    internal_limit: usize,
    web_limit: usize,
    domain_qualifier: String,
    web_enabled: bool,
}

impl GroundingAssembler {
    pub fn new(
        repository: Option<Arc<dyn ContentRepository>>,
        web: Option<Arc<dyn WebSearch>>,
        config: &GroundingConfig,
    ) -> Self {
        let site_base = match Url::parse(&config.site_base_url) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(
                    site_base_url = %config.site_base_url,
                    error = %e,
                    "invalid site base URL, relative links stay relative"
                );
                None
            }
        };

        GroundingAssembler {
            repository,
            web,
            site_base,
            internal_limit: config.internal_limit,
            web_limit: config.web_limit,
            domain_qualifier: config.domain_qualifier.trim().to_string(),
            web_enabled: config.web_enabled,
        }
    }

    pub fn has_repository(&self) -> bool {
        self.repository.is_some()
    }

    pub fn has_web(&self) -> bool {
        self.web_enabled && self.web.is_some()
    }

    /// Context for `query`, or an empty string when nothing relevant was found.
    pub async fn build_context(&self, query: &str, web_grounding: bool) -> String {
        let query = collapse_whitespace(query);
        if query.is_empty() {
            return String::new();
        }

        let mut sections: Vec<String> = Vec::new();

        if let Some(repository) = &self.repository {
            for category in ContentCategory::ALL {
                match repository
                    .search(category, &query, self.internal_limit, SearchFilter::default())
                    .await
                {
                    Ok(items) if !items.is_empty() => {
                        debug!(category = category.as_str(), hits = items.len(), "internal matches");
                        sections.push(self.format_items(category, &items));
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(category = category.as_str(), error = %e, "content search failed, omitting category");
                    }
                }
            }
        }

        if sections.is_empty() && web_grounding && self.web_enabled {
            if let Some(web) = &self.web {
                let web_query = if self.domain_qualifier.is_empty() {
                    query.clone()
                } else {
                    format!("{query} {}", self.domain_qualifier)
                };
                match web.search(&web_query, self.web_limit).await {
                    Ok(hits) if !hits.is_empty() => {
                        debug!(hits = hits.len(), "web matches");
                        sections.push(format_hits(&hits, self.web_limit));
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "web search failed, continuing without it"),
                }
            }
        }

        sections.join("\n\n")
    }

    fn format_items(&self, category: ContentCategory, items: &[ContentItem]) -> String {
        let mut lines = vec![format!("{}:", category.heading())];
        for item in items.iter().take(self.internal_limit) {
            let description = collapse_whitespace(&item.description);
            let url = self.absolute_url(&item.url);
            if description.is_empty() {
                lines.push(format!("- {} ({url})", item.title));
            } else {
                lines.push(format!("- {}: {description} ({url})", item.title));
            }
        }
        lines.join("\n")
    }

    /// Qualify a site-relative link against the configured base.
    fn absolute_url(&self, link: &str) -> String {
        if let Ok(url) = Url::parse(link) {
            return url.to_string();
        }
        match self.site_base.as_ref().and_then(|base| base.join(link).ok()) {
            Some(url) => url.to_string(),
            None => link.to_string(),
        }
    }
}

fn format_hits(hits: &[SearchHit], limit: usize) -> String {
    let mut lines = vec!["From the web:".to_string()];
    for hit in hits.iter().take(limit) {
        let snippet = collapse_whitespace(&hit.snippet);
        if snippet.is_empty() {
            lines.push(format!("- {} ({})", hit.title, hit.url));
        } else {
            lines.push(format!("- {}: {snippet} ({})", hit.title, hit.url));
        }
    }
    lines.join("\n")
}
