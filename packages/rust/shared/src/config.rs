//! Application configuration for forumharvest.
//!
//! User config lives at `~/.forumharvest/forumharvest.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ForumHarvestError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "forumharvest.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".forumharvest";

// ---------------------------------------------------------------------------
// Config structs (matching forumharvest.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Which articles to fetch and how.
    #[serde(default)]
    pub scrape: ScrapeConfig,

    /// Where and how tables are written.
    #[serde(default)]
    pub output: OutputConfig,

    /// Word frequency cache.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// `[scrape]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// URL prefix; the article ID is appended verbatim.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// First article ID (inclusive).
    #[serde(default = "default_first_aid")]
    pub first_aid: u32,

    /// Last article ID (inclusive).
    #[serde(default = "default_last_aid")]
    pub last_aid: u32,

    /// Maximum concurrent requests.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Delay in ms taken by each request before it is sent.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_ms: u64,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            first_aid: default_first_aid(),
            last_aid: default_last_aid(),
            concurrency: default_concurrency(),
            rate_limit_ms: default_rate_limit(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://b.cari.com.my/portal.php?mod=view&aid=".into()
}
fn default_first_aid() -> u32 {
    1
}
fn default_last_aid() -> u32 {
    500
}
fn default_concurrency() -> u32 {
    4
}
fn default_rate_limit() -> u64 {
    200
}
fn default_timeout_secs() -> u64 {
    30
}

impl ScrapeConfig {
    /// The inclusive range of article IDs to fetch.
    pub fn aids(&self) -> std::ops::RangeInclusive<u32> {
        self.first_aid..=self.last_aid
    }

    /// Build the fetch URL for one article ID.
    pub fn article_url(&self, aid: u32) -> String {
        format!("{}{aid}", self.base_url)
    }
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving the CSV files.
    #[serde(default = "default_output_dir")]
    pub dir: String,

    /// Replace existing files instead of refusing to write.
    #[serde(default = "default_true")]
    pub overwrite: bool,

    /// Count words from comment text as well as article text.
    #[serde(default)]
    pub include_comment_words: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            overwrite: true,
            include_comment_words: false,
        }
    }
}

fn default_output_dir() -> String {
    "assignData".into()
}
fn default_true() -> bool {
    true
}

/// `[cache]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Path to the libSQL word cache database.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "assignData/word_cache.db".into()
}

impl AppConfig {
    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let scrape = &self.scrape;

        if scrape.first_aid > scrape.last_aid {
            return Err(ForumHarvestError::config(format!(
                "first_aid ({}) is greater than last_aid ({})",
                scrape.first_aid, scrape.last_aid
            )));
        }

        if scrape.concurrency == 0 {
            return Err(ForumHarvestError::config("concurrency must be at least 1"));
        }

        if scrape.timeout_secs == 0 {
            return Err(ForumHarvestError::config("timeout_secs must be at least 1"));
        }

        let url = Url::parse(&scrape.base_url).map_err(|e| {
            ForumHarvestError::config(format!("invalid base_url '{}': {e}", scrape.base_url))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ForumHarvestError::config(format!(
                "base_url must be http or https, got '{}'",
                url.scheme()
            )));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.forumharvest/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ForumHarvestError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.forumharvest/forumharvest.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ForumHarvestError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ForumHarvestError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ForumHarvestError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ForumHarvestError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ForumHarvestError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("base_url"));
        assert!(toml_str.contains("word_cache.db"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.scrape.first_aid, 1);
        assert_eq!(parsed.scrape.last_aid, 500);
        assert!(parsed.output.overwrite);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[scrape]
first_aid = 10
last_aid = 20

[output]
dir = "/tmp/forum-out"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.scrape.aids().count(), 11);
        assert_eq!(config.scrape.concurrency, 4);
        assert_eq!(config.output.dir, "/tmp/forum-out");
        assert!(!config.output.include_comment_words);
        assert_eq!(config.cache.db_path, "assignData/word_cache.db");
    }

    #[test]
    fn article_url_appends_aid() {
        let scrape = ScrapeConfig::default();
        assert_eq!(
            scrape.article_url(42),
            "https://b.cari.com.my/portal.php?mod=view&aid=42"
        );
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());

        config.scrape.first_aid = 9;
        config.scrape.last_aid = 3;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("greater than"));

        let mut config = AppConfig::default();
        config.scrape.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.scrape.timeout_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));

        let mut config = AppConfig::default();
        config.scrape.base_url = "ftp://example.com/aid=".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_config_from_file() {
        let path = std::env::temp_dir().join(format!(
            "fh_config_{}.toml",
            uuid::Uuid::now_v7()
        ));
        std::fs::write(&path, "[cache]\ndb_path = \"/tmp/words.db\"\n").expect("write");
        let config = load_config_from(&path).expect("load");
        assert_eq!(config.cache.db_path, "/tmp/words.db");
        let _ = std::fs::remove_file(&path);
    }
}
