//! Article fetching and content extraction for forum portal pages.
//!
//! This crate provides:
//! - [`extract`] — presence-guarded field and comment extraction
//! - [`engine`] — concurrent fetcher producing per-ID outcomes

pub mod engine;
pub mod extract;

pub use engine::{ArticleFetcher, ScrapeBatch, ScrapeFailure, ScrapeOutcome, ScrapedArticle};
pub use extract::{ExtractedPage, extract_article, extract_comments, extract_page, parse_comment_id};
