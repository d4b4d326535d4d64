//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use forumharvest_core::pipeline::{
    ProgressReporter, RunConfig, RunResult, count_words_from_csv, run_pipeline,
};
use forumharvest_shared::{AppConfig, init_config, load_config, load_config_from};
use forumharvest_storage::Storage;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// forumharvest — scrape forum articles and count their words.
#[derive(Parser)]
#[command(
    name = "forumharvest",
    version,
    about = "Scrape forum articles and comments into CSV tables and a word frequency cache.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.forumharvest/forumharvest.toml.
    #[arg(long = "config", value_name = "FILE", global = true)]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Scrape an article range, write the tables and cache word counts.
    Run {
        /// First article ID (overrides scrape.first_aid).
        #[arg(long)]
        first: Option<u32>,

        /// Last article ID (overrides scrape.last_aid).
        #[arg(long)]
        last: Option<u32>,

        /// Output directory (overrides output.dir).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Count comment text as well as article text.
        #[arg(long)]
        comment_words: bool,
    },

    /// Recount words from existing CSV output and cache them.
    Words {
        /// Article table written by `run`.
        #[arg(long)]
        articles: PathBuf,

        /// Comment table to count as well.
        #[arg(long)]
        comments: Option<PathBuf>,
    },

    /// Show the most frequent cached words.
    Top {
        /// Number of words to show.
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },

    /// List recorded runs.
    Runs {
        /// Number of runs to show.
        #[arg(short, long, default_value = "10")]
        limit: u32,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "forumharvest=info",
        1 => "forumharvest=debug",
        _ => "forumharvest=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config_path.as_deref();
    match cli.command {
        Command::Run {
            first,
            last,
            out,
            comment_words,
        } => cmd_run(config_path, first, last, out, comment_words).await,
        Command::Words { articles, comments } => {
            cmd_words(config_path, &articles, comments.as_deref()).await
        }
        Command::Top { limit } => cmd_top(config_path, limit).await,
        Command::Runs { limit } => cmd_runs(config_path, limit).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

/// Load the config file given on the command line, or the user's default.
fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

/// Apply `run` flag overrides on top of the loaded config.
fn apply_run_overrides(
    config: &mut AppConfig,
    first: Option<u32>,
    last: Option<u32>,
    out: Option<PathBuf>,
    comment_words: bool,
) {
    if let Some(first) = first {
        config.scrape.first_aid = first;
    }
    if let Some(last) = last {
        config.scrape.last_aid = last;
    }
    if let Some(out) = out {
        config.output.dir = out.to_string_lossy().to_string();
    }
    if comment_words {
        config.output.include_comment_words = true;
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(
    config_path: Option<&Path>,
    first: Option<u32>,
    last: Option<u32>,
    out: Option<PathBuf>,
    comment_words: bool,
) -> Result<()> {
    let mut config = resolve_config(config_path)?;
    apply_run_overrides(&mut config, first, last, out, comment_words);
    config.validate()?;

    info!(
        first = config.scrape.first_aid,
        last = config.scrape.last_aid,
        out = %config.output.dir,
        "starting scrape run"
    );

    let storage = Storage::open(Path::new(&config.cache.db_path)).await?;
    let run_config = RunConfig::from_app(&config);

    let reporter = CliProgress::new();
    let result = run_pipeline(&run_config, &storage, &reporter).await?;

    println!();
    println!("  Run complete!");
    println!("  ID:        {}", result.run_id);
    println!(
        "  Articles:  {} of {} ({} failed)",
        result.stats.articles, result.stats.requested, result.stats.failures
    );
    println!("  Comments:  {}", result.stats.comments);
    println!(
        "  Words:     {} distinct, {} total",
        result.stats.distinct_words, result.stats.total_words
    );
    println!("  Output:    {}", run_config.output_dir.display());
    println!("  Time:      {:.1}s", result.elapsed.as_secs_f64());

    if !result.top_words.is_empty() {
        println!();
        println!("  Top words:");
        for (word, count) in &result.top_words {
            println!("    {count:>6}  {word}");
        }
    }

    if !result.failures.is_empty() {
        println!();
        println!("  Failed articles:");
        for failure in &result.failures {
            println!("    {:>6}  {}", failure.aid, failure.error);
        }
    }
    println!();

    Ok(())
}

async fn cmd_words(
    config_path: Option<&Path>,
    articles: &Path,
    comments: Option<&Path>,
) -> Result<()> {
    let config = resolve_config(config_path)?;

    let freqs = count_words_from_csv(articles, comments)?;
    let sorted = freqs.sorted();

    let storage = Storage::open(Path::new(&config.cache.db_path)).await?;
    let written = storage.save_word_frequencies(&sorted).await?;

    println!(
        "Cached {written} words ({} occurrences) in {}",
        freqs.total(),
        config.cache.db_path
    );
    Ok(())
}

async fn cmd_top(config_path: Option<&Path>, limit: u32) -> Result<()> {
    let config = resolve_config(config_path)?;
    let storage = Storage::open_readonly(Path::new(&config.cache.db_path)).await?;

    let words = storage.top_words(limit).await?;
    if words.is_empty() {
        println!("The word cache is empty. Run `forumharvest run` first.");
        return Ok(());
    }

    let total = storage.word_count().await?;
    println!("Top {} of {total} cached words:", words.len());
    for wf in &words {
        println!("  {:>8}  {}", wf.frequency, wf.word);
    }
    Ok(())
}

async fn cmd_runs(config_path: Option<&Path>, limit: u32) -> Result<()> {
    let config = resolve_config(config_path)?;
    let storage = Storage::open_readonly(Path::new(&config.cache.db_path)).await?;

    let runs = storage.list_runs(limit).await?;
    if runs.is_empty() {
        println!("No runs recorded.");
        return Ok(());
    }

    for run in &runs {
        let status = run.finished_at.as_deref().unwrap_or("unfinished");
        println!(
            "{}  aid {}..={}  started {}  finished {}",
            run.id, run.first_aid, run.last_aid, run.started_at, status
        );
        if let Some(stats) = &run.stats_json {
            let pretty: serde_json::Value = serde_json::from_str(stats)
                .map_err(|e| eyre!("run {} has unreadable stats: {e}", run.id))?;
            println!("    {pretty}");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .map(|s| s.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]))
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn article_scraped(&self, aid: u32, current: usize, total: usize, ok: bool) {
        let mark = if ok { "ok" } else { "failed" };
        self.spinner
            .set_message(format!("Scraping [{current}/{total}] aid {aid} {mark}"));
    }

    fn done(&self, _result: &RunResult) {
        self.spinner.finish_and_clear();
    }
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
