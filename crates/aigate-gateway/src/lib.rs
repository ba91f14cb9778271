//! Caller-facing side of aigate.
//!
//! - [`gateway::Gateway`]: the single "ask an AI" entry point
//! - [`context::GroundingAssembler`]: internal content + web snippets for the prompt
//! - [`guard`]: SSRF gate and the guarded image fetcher
//! - [`repository`] / [`web`]: collaborator traits and their bundled backends

pub mod context;
pub mod gateway;
pub mod guard;
pub mod repository;
pub mod web;

pub use context::GroundingAssembler;
pub use gateway::{AskRequest, AskResponse, Gateway, ImageSource};
pub use guard::{is_safe, validate, ResourceFetcher};
pub use repository::{ContentCategory, ContentItem, ContentRepository, FileContentRepository, SearchFilter};
pub use web::{BraveSearch, SearchHit, WebSearch};
