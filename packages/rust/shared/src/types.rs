//! Core domain types for scraped forum data.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Placeholder written for a missing title, date, or publisher.
pub const UNKNOWN: &str = "Unknown";

/// Placeholder written for a comment without an author link.
pub const ANONYMOUS_USER: &str = "Anonymous";

/// Placeholder written for a comment without a body.
pub const MISSING_COMMENT_TEXT: &str = "No comment text";

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for pipeline run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Article
// ---------------------------------------------------------------------------

/// One scraped article page.
///
/// Every extracted field is optional: `None` means the element was absent
/// (or its number did not parse), which is distinct from a present-but-empty
/// or zero value. The `*_or_default` accessors produce the placeholders used
/// in tabular output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// Article ID used to build the fetch URL.
    pub aid: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub views: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Article {
    /// An article with every field absent.
    pub fn empty(aid: u32) -> Self {
        Self {
            aid,
            title: None,
            date: None,
            publisher: None,
            views: None,
            comments_count: None,
            content: None,
        }
    }

    pub fn title_or_default(&self) -> &str {
        self.title.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn date_or_default(&self) -> &str {
        self.date.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn publisher_or_default(&self) -> &str {
        self.publisher.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn views_or_default(&self) -> u64 {
        self.views.unwrap_or(0)
    }

    pub fn comments_count_or_default(&self) -> u64 {
        self.comments_count.unwrap_or(0)
    }

    pub fn content_or_default(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

// ---------------------------------------------------------------------------
// Comment
// ---------------------------------------------------------------------------

/// One comment under an article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Owning article.
    pub aid: u32,
    /// Numeric ID parsed from the element id; `None` when it was not numeric.
    pub comment_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Comment {
    pub fn user_or_default(&self) -> &str {
        self.user.as_deref().unwrap_or(ANONYMOUS_USER)
    }

    pub fn text_or_default(&self) -> &str {
        self.text.as_deref().unwrap_or(MISSING_COMMENT_TEXT)
    }
}

// ---------------------------------------------------------------------------
// WordFrequency
// ---------------------------------------------------------------------------

/// A cleaned token and how often it occurred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordFrequency {
    pub word: String,
    pub frequency: u64,
}
