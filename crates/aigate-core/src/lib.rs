//! aigate core: shared types, the error taxonomy, configuration, and helpers.
//!
//! - [`types`]: turns, request envelopes, results, and the OpenAI wire shapes
//! - [`error`]: [`error::GatewayError`], the caller-facing failure taxonomy
//! - [`config`]: JSON config schema, loader, and env overrides
//! - [`utils`]: paths, credential-list parsing, string helpers

pub mod config;
pub mod error;
pub mod types;
pub mod utils;

pub use error::GatewayError;
pub use types::{Attachment, Completion, GatewayResult, RequestEnvelope, Role, TaskType, Turn};
