//! Concurrent article fetcher.
//!
//! Fetches a range of article IDs with bounded concurrency. Every ID yields a
//! [`ScrapeOutcome`]; failures are carried as values so that one bad page
//! never aborts the batch.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use tokio::task::{self, JoinSet};
use tracing::{debug, info, instrument, warn};

use forumharvest_shared::{Article, Comment, ForumHarvestError, Result, ScrapeConfig};

use crate::extract::{ExtractedPage, extract_page};

/// User-Agent string for article requests.
const USER_AGENT: &str = concat!("forumharvest/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// A successfully fetched and extracted article page.
#[derive(Debug, Clone)]
pub struct ScrapedArticle {
    pub page: ExtractedPage,
    /// HTTP status code of the response.
    pub status_code: u16,
    /// Response body length in bytes.
    pub content_len: usize,
}

/// A fetch that failed; the article and its comments are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeFailure {
    pub aid: u32,
    pub error: String,
}

/// Result of scraping a single article ID.
#[derive(Debug, Clone)]
pub enum ScrapeOutcome {
    Scraped(ScrapedArticle),
    Failed(ScrapeFailure),
}

impl ScrapeOutcome {
    pub fn aid(&self) -> u32 {
        match self {
            Self::Scraped(s) => s.page.article.aid,
            Self::Failed(f) => f.aid,
        }
    }
}

/// Accumulated rows of a scrape run.
#[derive(Debug, Clone, Default)]
pub struct ScrapeBatch {
    pub articles: Vec<Article>,
    pub comments: Vec<Comment>,
    pub failures: Vec<ScrapeFailure>,
    /// Total number of article fields that fell back to a placeholder.
    pub missing_fields: usize,
}

impl ScrapeBatch {
    /// Fold one outcome into the batch.
    pub fn push(&mut self, outcome: ScrapeOutcome) {
        match outcome {
            ScrapeOutcome::Scraped(scraped) => {
                let ExtractedPage {
                    article,
                    comments,
                    missing,
                } = scraped.page;
                self.missing_fields += missing.len();
                self.articles.push(article);
                self.comments.extend(comments);
            }
            ScrapeOutcome::Failed(failure) => self.failures.push(failure),
        }
    }

    /// Order everything by article ID. Comments keep their page order.
    fn sort(&mut self) {
        self.articles.sort_by_key(|a| a.aid);
        self.comments.sort_by_key(|c| c.aid);
        self.failures.sort_by_key(|f| f.aid);
    }
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// HTTP fetcher for forum article pages.
pub struct ArticleFetcher {
    config: ScrapeConfig,
    client: Client,
}

impl ArticleFetcher {
    /// Create a fetcher with the given scrape configuration.
    pub fn new(config: ScrapeConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ForumHarvestError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Fetch and extract a single article.
    pub async fn fetch(&self, aid: u32) -> Result<ScrapedArticle> {
        fetch_article(&self.client, &self.config.article_url(aid), aid).await
    }

    /// Fetch every ID in `aids` concurrently.
    ///
    /// At most `concurrency` requests are in flight; IDs are pulled from
    /// `aids` only as slots free up, so the range is never materialized.
    /// `on_outcome` is called on the calling task as each result is collected,
    /// with the number collected so far and the expected total.
    #[instrument(skip_all, fields(base_url = %self.config.base_url))]
    pub async fn scrape<I, F>(&self, aids: I, mut on_outcome: F) -> ScrapeBatch
    where
        I: IntoIterator<Item = u32>,
        F: FnMut(&ScrapeOutcome, usize, usize),
    {
        let limit = self.config.concurrency.max(1) as usize;
        let rate_limit = self.config.rate_limit_ms;

        let mut aids = aids.into_iter();
        let (lower, upper) = aids.size_hint();
        let total = upper.unwrap_or(lower);

        info!(
            total,
            concurrency = limit,
            rate_limit_ms = rate_limit,
            "starting scrape"
        );

        let mut tasks = JoinSet::new();
        let mut in_flight: HashMap<u32, task::Id> = HashMap::with_capacity(limit);
        let mut batch = ScrapeBatch::default();
        let mut collected = 0usize;

        loop {
            while tasks.len() < limit {
                let Some(aid) = aids.next() else { break };
                let client = self.client.clone();
                let url = self.config.article_url(aid);

                let handle = tasks.spawn(async move {
                    if rate_limit > 0 {
                        tokio::time::sleep(Duration::from_millis(rate_limit)).await;
                    }

                    match fetch_article(&client, &url, aid).await {
                        Ok(scraped) => ScrapeOutcome::Scraped(scraped),
                        Err(e) => ScrapeOutcome::Failed(ScrapeFailure {
                            aid,
                            error: e.to_string(),
                        }),
                    }
                });
                in_flight.insert(aid, handle.id());
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };

            let outcome = match joined {
                Ok(outcome) => {
                    in_flight.remove(&outcome.aid());
                    outcome
                }
                Err(e) => {
                    let aid = in_flight
                        .iter()
                        .find(|(_, id)| **id == e.id())
                        .map(|(aid, _)| *aid)
                        .unwrap_or_default();
                    in_flight.remove(&aid);
                    ScrapeOutcome::Failed(ScrapeFailure {
                        aid,
                        error: format!("task failed: {e}"),
                    })
                }
            };

            match &outcome {
                ScrapeOutcome::Scraped(scraped) => debug!(
                    aid = scraped.page.article.aid,
                    status = scraped.status_code,
                    bytes = scraped.content_len,
                    "article collected"
                ),
                ScrapeOutcome::Failed(failure) => {
                    warn!(aid = failure.aid, error = %failure.error, "failed to scrape article")
                }
            }

            collected += 1;
            on_outcome(&outcome, collected, total.max(collected));
            batch.push(outcome);
        }

        batch.sort();

        info!(
            articles = batch.articles.len(),
            comments = batch.comments.len(),
            failures = batch.failures.len(),
            missing_fields = batch.missing_fields,
            "scrape completed"
        );

        batch
    }
}

/// Fetch a single page and extract its content.
async fn fetch_article(client: &Client, url: &str, aid: u32) -> Result<ScrapedArticle> {
    debug!(aid, url, "fetching article");

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ForumHarvestError::Network(format!("aid {aid}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ForumHarvestError::Network(format!(
            "aid {aid}: HTTP {status}"
        )));
    }

    let body = response
        .text()
        .await
        .map_err(|e| ForumHarvestError::Network(format!("aid {aid}: body read failed: {e}")))?;

    let page = extract_page(&body, aid);
    debug!(
        aid,
        comments = page.comments.len(),
        missing = page.missing.len(),
        "article extracted"
    );

    Ok(ScrapedArticle {
        page,
        status_code: status.as_u16(),
        content_len: body.len(),
    })
}

#[cfg(test)]
mod engine_tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn page(title: &str, views: &str, comments: &str) -> String {
        format!(
            r#"<html><head><title>{title}</title></head><body>
                <p class="xg1">2024-5-1 | <a>poster</a></p>
                <em id="_viewnum">{views}</em>
                <table><tr><td id="article_content">Body of {title}</td></tr></table>
                <div id="comment_ul">{comments}</div>
            </body></html>"#
        )
    }

    fn config_for(server: &MockServer, first: u32, last: u32) -> ScrapeConfig {
        ScrapeConfig {
            base_url: format!("{}/portal.php?mod=view&aid=", server.uri()),
            first_aid: first,
            last_aid: last,
            concurrency: 2,
            rate_limit_ms: 0,
            timeout_secs: 5,
        }
    }

    async fn mount_article(server: &MockServer, aid: &str, body: String) {
        Mock::given(method("GET"))
            .and(path("/portal.php"))
            .and(query_param("aid", aid))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn fetch_single_article() {
        let server = MockServer::start().await;
        mount_article(
            &server,
            "7",
            page("Seven", "1,000", r#"<dl id="comment_70_1"><dd>first</dd></dl>"#),
        )
        .await;

        let fetcher = ArticleFetcher::new(config_for(&server, 7, 7)).unwrap();
        let scraped = fetcher.fetch(7).await.unwrap();

        assert_eq!(scraped.status_code, 200);
        assert_eq!(
            scraped.content_len,
            page("Seven", "1,000", r#"<dl id="comment_70_1"><dd>first</dd></dl>"#).len()
        );
        assert_eq!(scraped.page.article.aid, 7);
        assert_eq!(scraped.page.article.title.as_deref(), Some("Seven"));
        assert_eq!(scraped.page.article.views, Some(1000));
        assert_eq!(scraped.page.comments.len(), 1);
        assert_eq!(scraped.page.comments[0].comment_id, Some(70));
    }

    #[tokio::test]
    async fn failed_ids_are_dropped_without_aborting() {
        let server = MockServer::start().await;
        mount_article(
            &server,
            "1",
            page("One", "5", r#"<dl id="comment_10_1"><dd>a</dd></dl>"#),
        )
        .await;
        Mock::given(method("GET"))
            .and(query_param("aid", "2"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        mount_article(
            &server,
            "3",
            page("Three", "9", r#"<dl id="comment_30_1"><dd>c</dd></dl>"#),
        )
        .await;
        // aid 4 has no mock: the server answers 404

        let config = config_for(&server, 1, 4);
        let aids = config.aids();
        let fetcher = ArticleFetcher::new(config).unwrap();

        let mut seen = Vec::new();
        let batch = fetcher
            .scrape(aids, |outcome, done, total| {
                seen.push((outcome.aid(), done, total));
            })
            .await;

        assert_eq!(seen.len(), 4);
        assert!(seen.iter().all(|(_, _, total)| *total == 4));

        let aids: Vec<u32> = batch.articles.iter().map(|a| a.aid).collect();
        assert_eq!(aids, vec![1, 3]);
        assert!(batch.comments.iter().all(|c| c.aid == 1 || c.aid == 3));
        assert_eq!(batch.comments.len(), 2);

        let failed: Vec<u32> = batch.failures.iter().map(|f| f.aid).collect();
        assert_eq!(failed, vec![2, 4]);
        assert!(batch.failures[0].error.contains("HTTP 500"));
    }

    #[tokio::test]
    async fn ids_are_pulled_only_as_slots_free_up() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let server = MockServer::start().await;
        let config = config_for(&server, 1, 8);
        let fetcher = ArticleFetcher::new(config).unwrap();

        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = pulled.clone();
        let aids = (1..=8u32).inspect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let mut max_ahead = 0;
        let batch = fetcher
            .scrape(aids, |_, done, total| {
                assert_eq!(total, 8);
                max_ahead = max_ahead.max(pulled.load(Ordering::SeqCst) - done);
            })
            .await;

        // concurrency is 2 in `config_for`
        assert!(max_ahead <= 2, "pulled {max_ahead} ids ahead of collection");
        assert_eq!(batch.failures.len(), 8);
        let failed: Vec<u32> = batch.failures.iter().map(|f| f.aid).collect();
        assert_eq!(failed, (1..=8).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn unreachable_host_is_a_failure() {
        let config = ScrapeConfig {
            base_url: "http://127.0.0.1:9/portal.php?aid=".into(),
            first_aid: 1,
            last_aid: 1,
            concurrency: 1,
            rate_limit_ms: 0,
            timeout_secs: 2,
        };
        let fetcher = ArticleFetcher::new(config).unwrap();
        let batch = fetcher.scrape([1], |_, _, _| {}).await;

        assert!(batch.articles.is_empty());
        assert_eq!(batch.failures.len(), 1);
        assert!(batch.failures[0].error.starts_with("network error"));
    }
}
