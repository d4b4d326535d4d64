//! Core pipeline orchestration for forumharvest.
//!
//! This crate ties together scraping, table output, word counting and the
//! word cache into the end-to-end `run` workflow.

pub mod pipeline;

pub use pipeline::{
    OutputPaths, ProgressReporter, RunConfig, RunResult, RunStats, SilentProgress,
    count_scraped_words, count_words, count_words_from_csv, run_pipeline, viewed_articles,
};
