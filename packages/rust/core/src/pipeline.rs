//! End-to-end `run` pipeline: scrape → tables → CSV → word count → cache.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use forumharvest_crawler::{ArticleFetcher, ScrapeFailure, ScrapeOutcome};
use forumharvest_shared::{
    AppConfig, Article, Comment, ForumHarvestError, MISSING_COMMENT_TEXT, Result, RunId,
    ScrapeConfig, UNKNOWN,
};
use forumharvest_storage::Storage;
use forumharvest_table::{Table, WriteMode};
use forumharvest_words::{WordFrequencies, article_text};

/// Rows shown in the debug preview of each table.
const PREVIEW_ROWS: usize = 5;

/// Configuration for the `run` pipeline.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Which articles to fetch and how.
    pub scrape: ScrapeConfig,
    /// Directory receiving the CSV files.
    pub output_dir: PathBuf,
    /// Replace existing output files.
    pub overwrite: bool,
    /// Count comment text alongside article text.
    pub include_comment_words: bool,
}

impl RunConfig {
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            scrape: config.scrape.clone(),
            output_dir: PathBuf::from(&config.output.dir),
            overwrite: config.output.overwrite,
            include_comment_words: config.output.include_comment_words,
        }
    }
}

/// Locations of the files a run writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub articles: PathBuf,
    pub comments: PathBuf,
    pub word_frequencies: PathBuf,
    pub distinct_words: PathBuf,
}

impl OutputPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            articles: dir.join("articles.csv"),
            comments: dir.join("comments.csv"),
            word_frequencies: dir.join("word_frequencies.csv"),
            distinct_words: dir.join("distinct_words.csv"),
        }
    }

    pub fn all(&self) -> [&Path; 4] {
        [
            self.articles.as_path(),
            self.comments.as_path(),
            self.word_frequencies.as_path(),
            self.distinct_words.as_path(),
        ]
    }
}

/// Counters recorded with each run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub requested: usize,
    pub articles: usize,
    pub comments: usize,
    pub failures: usize,
    pub missing_fields: usize,
    /// Articles with a positive view count.
    pub counted_articles: usize,
    pub distinct_words: usize,
    pub total_words: u64,
}

/// Result of the `run` pipeline.
#[derive(Debug)]
pub struct RunResult {
    pub run_id: RunId,
    pub stats: RunStats,
    pub failures: Vec<ScrapeFailure>,
    pub paths: OutputPaths,
    /// Most frequent words first.
    pub top_words: Vec<(String, u64)>,
    pub elapsed: std::time::Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called as each article outcome is collected.
    fn article_scraped(&self, aid: u32, current: usize, total: usize, ok: bool);
    /// Called when the pipeline completes.
    fn done(&self, result: &RunResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn article_scraped(&self, _aid: u32, _current: usize, _total: usize, _ok: bool) {}
    fn done(&self, _result: &RunResult) {}
}

/// What a successful run produced, before it is recorded.
struct RunOutput {
    stats: RunStats,
    failures: Vec<ScrapeFailure>,
    top_words: Vec<(String, u64)>,
}

/// Run the full pipeline.
///
/// 1. Refuse up front if an output file may not be replaced
/// 2. Scrape every article ID in the configured range
/// 3. Write the article and comment tables
/// 4. Count words of articles that have views
/// 5. Write the frequency tables
/// 6. Cache the frequencies and record the run
///
/// A run that fails after it was recorded is finished with its error.
#[instrument(skip_all, fields(first = config.scrape.first_aid, last = config.scrape.last_aid))]
pub async fn run_pipeline(
    config: &RunConfig,
    storage: &Storage,
    progress: &dyn ProgressReporter,
) -> Result<RunResult> {
    let start = Instant::now();
    let run_id = RunId::new();
    let mode = WriteMode::from_overwrite(config.overwrite);
    let paths = OutputPaths::in_dir(&config.output_dir);

    for path in paths.all() {
        mode.check(path)?;
    }

    info!(%run_id, base_url = %config.scrape.base_url, "starting run");

    storage
        .insert_run(
            &run_id,
            &config.scrape.base_url,
            config.scrape.first_aid,
            config.scrape.last_aid,
        )
        .await?;

    let output = match execute(config, &paths, mode, storage, progress).await {
        Ok(output) => output,
        Err(e) => {
            warn!(%run_id, error = %e, "run failed");
            let failed = serde_json::json!({ "error": e.to_string() }).to_string();
            if let Err(mark) = storage.finish_run(&run_id, &failed).await {
                warn!(%run_id, error = %mark, "could not mark run as failed");
            }
            return Err(e);
        }
    };

    let stats_json = serde_json::to_string(&output.stats)
        .map_err(|e| ForumHarvestError::Storage(format!("stats encode: {e}")))?;
    storage.finish_run(&run_id, &stats_json).await?;

    let result = RunResult {
        run_id,
        stats: output.stats,
        failures: output.failures,
        paths,
        top_words: output.top_words,
        elapsed: start.elapsed(),
    };

    progress.done(&result);

    info!(
        run_id = %result.run_id,
        articles = result.stats.articles,
        comments = result.stats.comments,
        failures = result.stats.failures,
        distinct_words = result.stats.distinct_words,
        elapsed_ms = result.elapsed.as_millis(),
        "run complete"
    );

    Ok(result)
}

async fn execute(
    config: &RunConfig,
    paths: &OutputPaths,
    mode: WriteMode,
    storage: &Storage,
    progress: &dyn ProgressReporter,
) -> Result<RunOutput> {
    // --- Phase 1: Scrape ---
    progress.phase("Scraping articles");
    let fetcher = ArticleFetcher::new(config.scrape.clone())?;
    let aids = config.scrape.aids();
    let requested = aids.clone().count();
    let batch = fetcher
        .scrape(aids, |outcome, current, total| {
            let ok = matches!(outcome, ScrapeOutcome::Scraped(_));
            progress.article_scraped(outcome.aid(), current, total, ok);
        })
        .await;

    if batch.articles.is_empty() {
        warn!(requested, "no article was scraped; writing empty tables");
    }

    // --- Phase 2: Article and comment tables ---
    progress.phase("Writing article tables");
    let articles = Table::from_records(&batch.articles);
    let comments = Table::from_records(&batch.comments);
    debug!("articles:\n{}", articles.preview(PREVIEW_ROWS));
    debug!("comments:\n{}", comments.preview(PREVIEW_ROWS));

    articles.write_csv(&paths.articles, mode)?;
    comments.write_csv(&paths.comments, mode)?;

    // --- Phase 3: Word count ---
    progress.phase("Counting words");
    let comment_source = config
        .include_comment_words
        .then_some(batch.comments.as_slice());
    let freqs = count_scraped_words(&batch.articles, comment_source);

    // --- Phase 4: Frequency tables ---
    progress.phase("Writing word tables");
    let sorted = freqs.sorted();
    Table::from_records(&sorted).write_csv(&paths.word_frequencies, mode)?;
    Table::single_column("Cleaned_Word", freqs.distinct()).write_csv(&paths.distinct_words, mode)?;

    // --- Phase 5: Cache ---
    progress.phase("Caching word frequencies");
    storage.save_word_frequencies(&sorted).await?;

    Ok(RunOutput {
        stats: RunStats {
            requested,
            articles: batch.articles.len(),
            comments: batch.comments.len(),
            failures: batch.failures.len(),
            missing_fields: batch.missing_fields,
            counted_articles: batch.articles.iter().filter(|a| has_views(a)).count(),
            distinct_words: freqs.len(),
            total_words: freqs.total(),
        },
        failures: batch.failures,
        top_words: sorted
            .iter()
            .take(10)
            .map(|wf| (wf.word.clone(), wf.frequency))
            .collect(),
    })
}

// ---------------------------------------------------------------------------
// Word counting over scraped records
// ---------------------------------------------------------------------------

fn has_views(article: &Article) -> bool {
    article.views.is_some_and(|v| v > 0)
}

/// Count the words of scraped articles with views and, optionally, comments.
///
/// Only extracted text is counted; absent fields contribute nothing.
pub fn count_scraped_words(articles: &[Article], comments: Option<&[Comment]>) -> WordFrequencies {
    let mut texts: Vec<String> = articles
        .iter()
        .filter(|a| has_views(a))
        .map(|a| {
            article_text(
                a.title.as_deref().unwrap_or_default(),
                a.content.as_deref().unwrap_or_default(),
            )
        })
        .collect();

    if let Some(comments) = comments {
        texts.extend(comments.iter().filter_map(|c| c.text.clone()));
    }

    WordFrequencies::from_texts(texts.iter().map(String::as_str))
}

// ---------------------------------------------------------------------------
// Word counting over tables
// ---------------------------------------------------------------------------

/// Rows of an article table whose `Views` cell is a positive number.
pub fn viewed_articles(articles: &Table) -> Result<Table> {
    let views = column_of(articles, "Views")?;
    Ok(articles.filter(|row| row[views].trim().parse::<u64>().is_ok_and(|v| v > 0)))
}

/// Count the words of an article table and, optionally, a comment table.
///
/// Articles contribute `Title` and `Content`; comments contribute
/// `Comment_Text`. A CSV cell cannot tell a placeholder from real text, so
/// placeholder cells are not counted.
pub fn count_words(articles: &Table, comments: Option<&Table>) -> Result<WordFrequencies> {
    let title = column_of(articles, "Title")?;
    let content = column_of(articles, "Content")?;

    let mut texts: Vec<String> = articles
        .rows()
        .iter()
        .map(|row| article_text(unless(&row[title], UNKNOWN), &row[content]))
        .collect();

    if let Some(comments) = comments {
        let text = column_of(comments, "Comment_Text")?;
        texts.extend(
            comments
                .rows()
                .iter()
                .map(|row| unless(&row[text], MISSING_COMMENT_TEXT).to_string()),
        );
    }

    Ok(WordFrequencies::from_texts(texts.iter().map(String::as_str)))
}

/// Recount words from CSV files written by an earlier run.
pub fn count_words_from_csv(articles: &Path, comments: Option<&Path>) -> Result<WordFrequencies> {
    let articles = viewed_articles(&Table::read_csv(articles)?)?;
    let comments = comments.map(Table::read_csv).transpose()?;
    count_words(&articles, comments.as_ref())
}

fn column_of(table: &Table, name: &str) -> Result<usize> {
    table
        .column_index(name)
        .ok_or_else(|| ForumHarvestError::validation(format!("table has no '{name}' column")))
}

/// `cell`, or empty when it holds `placeholder`.
fn unless<'a>(cell: &'a str, placeholder: &str) -> &'a str {
    if cell == placeholder { "" } else { cell }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn load_fixture(name: &str) -> String {
        let path = format!("../../../fixtures/html/{name}");
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    fn temp_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("fh_{tag}_{}", Uuid::now_v7()))
    }

    fn article(aid: u32, title: Option<&str>, views: Option<u64>, content: &str) -> Article {
        Article {
            title: title.map(String::from),
            views,
            content: Some(content.into()),
            ..Article::empty(aid)
        }
    }

    #[test]
    fn only_viewed_articles_are_counted() {
        let articles = Table::from_records(&[
            article(1, Some("Kereta baru"), Some(10), "kereta laju"),
            article(2, Some("Senyap"), Some(0), "tiada pembaca"),
            article(3, Some("Hilang"), None, "kiraan tiada"),
        ]);

        let viewed = viewed_articles(&articles).unwrap();
        assert_eq!(viewed.len(), 1);

        let freqs = count_words(&viewed, None).unwrap();
        assert_eq!(freqs.get("kereta"), Some(2));
        assert_eq!(freqs.get("senyap"), None);
        // "kereta baru" + "kereta laju"
        assert_eq!(freqs.total(), 4);
    }

    #[test]
    fn csv_placeholder_cells_are_not_counted() {
        let articles = Table::from_records(&[article(1, None, Some(4), "isi sahaja")]);
        let comments = Table::from_records(&[
            Comment {
                aid: 1,
                comment_id: Some(1),
                user: None,
                text: None,
            },
            Comment {
                aid: 1,
                comment_id: None,
                user: Some("ali".into()),
                text: Some("Isi bagus".into()),
            },
        ]);

        let freqs = count_words(&articles, Some(&comments)).unwrap();
        assert_eq!(freqs.get("unknown"), None);
        assert_eq!(freqs.get("comment"), None);
        assert_eq!(freqs.get("isi"), Some(2));
        assert_eq!(freqs.get("bagus"), Some(1));
    }

    #[test]
    fn count_words_requires_columns() {
        let table = Table::single_column("Cleaned_Word", ["a"]);
        assert!(count_words(&table, None).is_err());
        assert!(viewed_articles(&table).is_err());
    }

    #[test]
    fn recount_from_written_csv() {
        let dir = temp_dir("recount");
        let paths = OutputPaths::in_dir(&dir);
        Table::from_records(&[
            article(1, Some("Satu \"dua\""), Some(2), "tiga, empat"),
            article(2, Some("Lima"), Some(0), "enam"),
        ])
        .write_csv(&paths.articles, WriteMode::Overwrite)
        .unwrap();

        let freqs = count_words_from_csv(&paths.articles, None).unwrap();
        assert_eq!(freqs.distinct(), vec!["dua", "empat", "satu", "tiga"]);
    }

    #[tokio::test]
    async fn full_run_against_mock_portal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/portal.php"))
            .and(query_param("aid", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(load_fixture("article.html")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/portal.php"))
            .and(query_param("aid", "2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(load_fixture("article_sparse.html")),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/portal.php"))
            .and(query_param("aid", "3"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let out = temp_dir("run");
        let config = RunConfig {
            scrape: ScrapeConfig {
                base_url: format!("{}/portal.php?mod=view&aid=", server.uri()),
                first_aid: 1,
                last_aid: 3,
                concurrency: 2,
                rate_limit_ms: 0,
                timeout_secs: 5,
            },
            output_dir: out.clone(),
            overwrite: true,
            include_comment_words: false,
        };
        let storage = Storage::open(&out.join("cache.db")).await.unwrap();

        let result = run_pipeline(&config, &storage, &SilentProgress).await.unwrap();

        assert_eq!(result.stats.requested, 3);
        assert_eq!(result.stats.articles, 2);
        assert_eq!(result.stats.comments, 3);
        assert_eq!(result.stats.failures, 1);
        assert_eq!(result.failures[0].aid, 3);
        // the sparse page has no parsable view count
        assert_eq!(result.stats.counted_articles, 1);

        let articles = Table::read_csv(&result.paths.articles).unwrap();
        assert_eq!(articles.column("AID").unwrap(), vec!["1", "2"]);
        assert_eq!(articles.column("Title").unwrap()[1], "Unknown");

        let comments = Table::read_csv(&result.paths.comments).unwrap();
        assert_eq!(comments.column("Comment_ID").unwrap(), vec!["101", "102", ""]);

        let words = Table::read_csv(&result.paths.word_frequencies).unwrap();
        assert_eq!(words.columns(), ["Cleaned_Word", "Frequency"]);
        assert_eq!(words.len(), result.stats.distinct_words);

        let distinct = Table::read_csv(&result.paths.distinct_words).unwrap();
        assert_eq!(distinct.len(), result.stats.distinct_words);

        assert_eq!(storage.get_word_frequency("harga").await.unwrap(), Some(2));
        assert_eq!(storage.word_count().await.unwrap(), result.stats.distinct_words as u64);

        let runs = storage.list_runs(5).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].id, result.run_id.to_string());
        assert!(runs[0].stats_json.as_deref().unwrap().contains("\"failures\":1"));
    }

    #[test]
    fn scraped_text_is_counted_even_when_it_reads_like_a_placeholder() {
        let articles = vec![
            article(1, Some("Unknown"), Some(3), "isi"),
            article(2, None, Some(5), "tanpa tajuk"),
            article(3, Some("Tersembunyi"), None, "tiada"),
        ];
        let comments = vec![
            Comment {
                aid: 1,
                comment_id: Some(9),
                user: None,
                text: Some("No comment text".into()),
            },
            Comment {
                aid: 1,
                comment_id: Some(10),
                user: None,
                text: None,
            },
        ];

        let freqs = count_scraped_words(&articles, Some(comments.as_slice()));
        assert_eq!(freqs.get("unknown"), Some(1));
        assert_eq!(freqs.get("tajuk"), Some(1));
        assert_eq!(freqs.get("tersembunyi"), None);
        assert_eq!(freqs.get("comment"), Some(1));
        assert_eq!(freqs.total(), 7);

        let without_comments = count_scraped_words(&articles, None);
        assert_eq!(without_comments.get("comment"), None);
    }

    fn scrape_config(server: &MockServer, first: u32, last: u32) -> ScrapeConfig {
        ScrapeConfig {
            base_url: format!("{}/portal.php?aid=", server.uri()),
            first_aid: first,
            last_aid: last,
            concurrency: 1,
            rate_limit_ms: 0,
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn existing_output_is_refused_before_any_request() {
        let server = MockServer::start().await;
        let out = temp_dir("no_overwrite");
        std::fs::create_dir_all(&out).unwrap();
        // only a later output exists
        std::fs::write(out.join("comments.csv"), "\"AID\"\n").unwrap();

        let config = RunConfig {
            scrape: scrape_config(&server, 1, 3),
            output_dir: out.clone(),
            overwrite: false,
            include_comment_words: false,
        };
        let storage = Storage::open(&temp_dir("no_overwrite_db").join("cache.db"))
            .await
            .unwrap();

        let err = run_pipeline(&config, &storage, &SilentProgress)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("comments.csv already exists"));

        let requests = server.received_requests().await.unwrap_or_default();
        assert!(requests.is_empty(), "{} requests sent", requests.len());
        assert!(!out.join("articles.csv").exists());
        assert!(storage.list_runs(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_run_is_finished_with_its_error() {
        let server = MockServer::start().await;
        let blocker = temp_dir("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let config = RunConfig {
            scrape: scrape_config(&server, 1, 1),
            // cannot be created: its parent is a file
            output_dir: blocker.join("out"),
            overwrite: true,
            include_comment_words: false,
        };
        let storage = Storage::open(&temp_dir("failed_run_db").join("cache.db"))
            .await
            .unwrap();

        assert!(run_pipeline(&config, &storage, &SilentProgress).await.is_err());

        let runs = storage.list_runs(5).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert!(runs[0].finished_at.is_some());
        assert!(runs[0].stats_json.as_deref().unwrap().contains("\"error\""));
    }
}
