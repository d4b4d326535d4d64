//! SQL migration definitions for the word cache database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: scrape_runs, word_frequencies",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per pipeline run
CREATE TABLE IF NOT EXISTS scrape_runs (
    id          TEXT PRIMARY KEY,
    base_url    TEXT NOT NULL,
    first_aid   INTEGER NOT NULL,
    last_aid    INTEGER NOT NULL,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    stats_json  TEXT
);

-- Token -> count cache
CREATE TABLE IF NOT EXISTS word_frequencies (
    word       TEXT PRIMARY KEY,
    frequency  INTEGER NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_word_frequencies_frequency ON word_frequencies(frequency);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
