//! Configuration system: schema, loading, and env var overrides.
//!
//! # Usage
//! ```no_run
//! use aigate_core::config;
//!
//! let cfg = config::load_config(None);
//! println!("Chat chain starts at: {}", cfg.chains.chat_first);
//! ```

pub mod loader;
pub mod schema;

pub use loader::{get_config_path, load_config, save_config};
pub use schema::Config;
