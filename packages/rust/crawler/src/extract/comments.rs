//! Comment list extraction.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use forumharvest_shared::Comment;

use super::{element_text, selector, stripped_text};

static CONTAINER: LazyLock<Selector> = LazyLock::new(|| selector("div#comment_ul"));
static AUTHOR: LazyLock<Selector> = LazyLock::new(|| selector("a.xi2"));
static BODY: LazyLock<Selector> = LazyLock::new(|| selector("dd"));
static QUOTE: LazyLock<Selector> = LazyLock::new(|| selector("div.quote"));

/// Extract the comments listed directly under the comment container.
///
/// A page without a container has no comments.
pub fn extract_comments(doc: &Html, aid: u32) -> Vec<Comment> {
    let Some(container) = doc.select(&CONTAINER).next() else {
        debug!(aid, "no comment container");
        return Vec::new();
    };

    container
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|el| matches!(el.value().name(), "dl" | "li"))
        .filter_map(|el| el.value().id().map(|id| (el, id)))
        .map(|(el, id)| Comment {
            aid,
            comment_id: parse_comment_id(id),
            user: el.select(&AUTHOR).next().map(element_text),
            // quoted replies belong to other comments
            text: el
                .select(&BODY)
                .next()
                .map(|body| stripped_text(body, Some(&QUOTE))),
        })
        .collect()
}

/// Parse the numeric comment ID out of an element id like `comment_123_456`.
///
/// Returns `None` when the segment after `comment_` is not all digits.
pub fn parse_comment_id(id: &str) -> Option<u64> {
    let rest = id.strip_prefix("comment_").unwrap_or(id);
    let segment = rest.split('_').next().unwrap_or_default();

    if segment.is_empty() || !segment.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_id_parsing() {
        assert_eq!(parse_comment_id("comment_123_456"), Some(123));
        assert_eq!(parse_comment_id("comment_0_1"), Some(0));
        assert_eq!(parse_comment_id("comment_77"), Some(77));
        assert_eq!(parse_comment_id("comment_abc_1"), None);
        assert_eq!(parse_comment_id("comment_"), None);
        assert_eq!(parse_comment_id(""), None);
    }

    #[test]
    fn missing_container_yields_no_comments() {
        let doc = Html::parse_document("<html><body><dl id=\"comment_1_1\"></dl></body></html>");
        assert!(extract_comments(&doc, 1).is_empty());
    }

    #[test]
    fn only_direct_children_are_comments() {
        let doc = Html::parse_document(
            r#"<div id="comment_ul">
                 <li id="comment_5_1"><a class="xi2">ali</a><dd>hi</dd></li>
                 <div><dl id="comment_6_1"><dd>nested</dd></dl></div>
                 <dl><dd>no id</dd></dl>
               </div>"#,
        );
        let comments = extract_comments(&doc, 2);
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].comment_id, Some(5));
        assert_eq!(comments[0].user.as_deref(), Some("ali"));
    }
}
