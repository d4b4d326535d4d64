//! Article field extraction.

use std::sync::LazyLock;

use scraper::{Html, Selector};
use tracing::warn;

use forumharvest_shared::Article;

use super::{element_text, parse_count, selector, stripped_text};

static TITLE: LazyLock<Selector> = LazyLock::new(|| selector("title"));
static DATE_LINE: LazyLock<Selector> = LazyLock::new(|| selector("p.xg1"));
static PUBLISHER: LazyLock<Selector> = LazyLock::new(|| selector("a"));
static VIEWS: LazyLock<Selector> = LazyLock::new(|| selector("em#_viewnum"));
static COMMENT_COUNT: LazyLock<Selector> = LazyLock::new(|| selector("em#_commentnum"));
static CONTENT: LazyLock<Selector> = LazyLock::new(|| selector("td#article_content"));

/// Extract the article fields from a parsed page.
///
/// Returns the article and the names of the fields that were absent.
pub fn extract_article(doc: &Html, aid: u32) -> (Article, Vec<&'static str>) {
    let mut missing = Vec::new();
    let mut check = |field: &'static str, found: bool| {
        if !found {
            warn!(aid, field, "field not found, using placeholder");
            missing.push(field);
        }
    };

    let title = doc.select(&TITLE).next().map(element_text);
    check("title", title.is_some());

    // "<date> | publisher: <a>name</a> | ..."
    let date_line = doc.select(&DATE_LINE).next();
    let date = date_line.map(|el| {
        let text: String = el.text().collect();
        text.split('|').next().unwrap_or_default().trim().to_string()
    });
    check("date", date.is_some());

    let publisher = date_line
        .and_then(|el| el.select(&PUBLISHER).next())
        .map(element_text);
    check("publisher", publisher.is_some());

    let views = doc
        .select(&VIEWS)
        .next()
        .and_then(|el| parse_count(&el.text().collect::<String>()));
    check("views", views.is_some());

    let comments_count = doc
        .select(&COMMENT_COUNT)
        .next()
        .and_then(|el| parse_count(&el.text().collect::<String>()));
    check("comments_count", comments_count.is_some());

    let content = doc
        .select(&CONTENT)
        .next()
        .map(|el| stripped_text(el, None));
    check("content", content.is_some());

    let article = Article {
        aid,
        title,
        date,
        publisher,
        views,
        comments_count,
        content,
    };

    (article, missing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_all_missing() {
        let doc = Html::parse_document("");
        let (article, missing) = extract_article(&doc, 9);
        assert_eq!(article, Article::empty(9));
        assert_eq!(
            missing,
            vec!["title", "date", "publisher", "views", "comments_count", "content"]
        );
    }

    #[test]
    fn date_without_separator_is_whole_line() {
        let doc = Html::parse_document(r#"<p class="xg1"> 2023-12-1 08:00 </p>"#);
        let (article, _) = extract_article(&doc, 1);
        assert_eq!(article.date.as_deref(), Some("2023-12-1 08:00"));
        assert_eq!(article.publisher, None);
    }

    #[test]
    fn empty_content_cell_is_present() {
        let doc = Html::parse_document(
            r#"<table><tr><td id="article_content">   </td></tr></table>"#,
        );
        let (article, missing) = extract_article(&doc, 1);
        assert_eq!(article.content.as_deref(), Some(""));
        assert!(!missing.contains(&"content"));
    }
}
