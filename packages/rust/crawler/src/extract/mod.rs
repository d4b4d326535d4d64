//! Field and comment extraction for forum article pages.
//!
//! Extraction never fails: a lookup whose element is absent yields `None`,
//! gets logged, and is recorded in [`ExtractedPage::missing`].

mod article;
mod comments;

use scraper::{ElementRef, Html, Selector};

use forumharvest_shared::{Article, Comment};

pub use article::extract_article;
pub use comments::{extract_comments, parse_comment_id};

/// Everything pulled out of one article page.
#[derive(Debug, Clone)]
pub struct ExtractedPage {
    pub article: Article,
    pub comments: Vec<Comment>,
    /// Names of article fields that fell back to a placeholder.
    pub missing: Vec<&'static str>,
}

/// Parse an HTML document and extract the article and its comments.
pub fn extract_page(html: &str, aid: u32) -> ExtractedPage {
    let doc = Html::parse_document(html);
    let (article, missing) = extract_article(&doc, aid);
    let comments = extract_comments(&doc, aid);

    ExtractedPage {
        article,
        comments,
        missing,
    }
}

/// Build a selector from a literal that is known to be valid.
pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

/// All text under an element, concatenated and trimmed.
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Text nodes under an element, each trimmed, empties dropped, joined by a space.
///
/// Subtrees matching `skip` contribute nothing.
pub(crate) fn stripped_text(el: ElementRef<'_>, skip: Option<&Selector>) -> String {
    let skipped: Vec<_> = match skip {
        Some(sel) => el.select(sel).map(|q| q.id()).collect(),
        None => Vec::new(),
    };

    el.descendants()
        .filter(|node| !node.ancestors().any(|a| skipped.contains(&a.id())))
        .filter_map(|node| node.value().as_text())
        .map(|text| text.trim())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a displayed count such as `12,345`.
///
/// Thousands separators and whitespace are stripped; anything else that is
/// not an ASCII digit makes the count unparsable.
pub(crate) fn parse_count(raw: &str) -> Option<u64> {
    let digits: String = raw
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
