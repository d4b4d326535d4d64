//! Shared types, error model, and configuration for forumharvest.
//!
//! This crate is the foundation depended on by all other forumharvest crates.
//! It provides:
//! - [`ForumHarvestError`] — the unified error type
//! - Domain types ([`Article`], [`Comment`], [`WordFrequency`], [`RunId`])
//! - Configuration ([`AppConfig`], [`ScrapeConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CacheConfig, OutputConfig, ScrapeConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from,
};
pub use error::{ForumHarvestError, Result};
pub use types::{
    ANONYMOUS_USER, Article, Comment, MISSING_COMMENT_TEXT, RunId, UNKNOWN, WordFrequency,
};
