//! libSQL storage layer for the word frequency cache.
//!
//! The [`Storage`] struct wraps a local libSQL database holding the
//! token → count cache and the history of pipeline runs.
//!
//! **Access rules:**
//! - `run` / `words`: read-write via [`Storage::open`]
//! - `top` / `runs`: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use chrono::Utc;
use forumharvest_shared::{ForumHarvestError, Result, RunId, WordFrequency};
use libsql::{Connection, Database, params};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

/// A recorded pipeline run.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: String,
    pub base_url: String,
    pub first_aid: u32,
    pub last_aid: u32,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub stats_json: Option<String>,
}

fn storage_err(e: impl std::fmt::Display) -> ForumHarvestError {
    ForumHarvestError::Storage(e.to_string())
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ForumHarvestError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = db.connect().map_err(storage_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ForumHarvestError::Storage(format!(
                "no word cache at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = db.connect().map_err(storage_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        ForumHarvestError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(ForumHarvestError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Run operations
    // -----------------------------------------------------------------------

    /// Record the start of a pipeline run.
    pub async fn insert_run(
        &self,
        run_id: &RunId,
        base_url: &str,
        first_aid: u32,
        last_aid: u32,
    ) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO scrape_runs (id, base_url, first_aid, last_aid, started_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    run_id.to_string(),
                    base_url,
                    first_aid,
                    last_aid,
                    now.as_str()
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Mark a run finished and attach its stats.
    pub async fn finish_run(&self, run_id: &RunId, stats_json: &str) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE scrape_runs SET finished_at = ?1, stats_json = ?2 WHERE id = ?3",
                params![now.as_str(), stats_json, run_id.to_string()],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Most recent runs first.
    pub async fn list_runs(&self, limit: u32) -> Result<Vec<RunRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, base_url, first_aid, last_aid, started_at, finished_at, stats_json
                 FROM scrape_runs ORDER BY started_at DESC, id DESC LIMIT ?1",
                params![limit],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(RunRecord {
                id: row.get::<String>(0).map_err(storage_err)?,
                base_url: row.get::<String>(1).map_err(storage_err)?,
                first_aid: row.get::<u32>(2).map_err(storage_err)?,
                last_aid: row.get::<u32>(3).map_err(storage_err)?,
                started_at: row.get::<String>(4).map_err(storage_err)?,
                finished_at: row.get::<String>(5).ok(),
                stats_json: row.get::<String>(6).ok(),
            });
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Word frequency cache
    // -----------------------------------------------------------------------

    /// Store every (word, frequency) pair. A word already cached is overwritten.
    ///
    /// Returns the number of pairs written.
    pub async fn save_word_frequencies(&self, words: &[WordFrequency]) -> Result<usize> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();

        let tx = self.conn.transaction().await.map_err(storage_err)?;
        for wf in words {
            tx.execute(
                "INSERT INTO word_frequencies (word, frequency, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(word) DO UPDATE SET
                   frequency = excluded.frequency,
                   updated_at = excluded.updated_at",
                params![wf.word.as_str(), wf.frequency as i64, now.as_str()],
            )
            .await
            .map_err(storage_err)?;
        }
        tx.commit().await.map_err(storage_err)?;

        tracing::info!(words = words.len(), "word frequencies cached");
        Ok(words.len())
    }

    /// Cached count for one word.
    pub async fn get_word_frequency(&self, word: &str) -> Result<Option<u64>> {
        let mut rows = self
            .conn
            .query(
                "SELECT frequency FROM word_frequencies WHERE word = ?1",
                params![word],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => {
                let freq: i64 = row.get(0).map_err(storage_err)?;
                Ok(Some(freq as u64))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// The `limit` most frequent cached words; equal counts ordered by word.
    pub async fn top_words(&self, limit: u32) -> Result<Vec<WordFrequency>> {
        let mut rows = self
            .conn
            .query(
                "SELECT word, frequency FROM word_frequencies
                 ORDER BY frequency DESC, word ASC
                 LIMIT ?1",
                params![limit],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let word: String = row.get(0).map_err(storage_err)?;
            let frequency: i64 = row.get(1).map_err(storage_err)?;
            results.push(WordFrequency {
                word,
                frequency: frequency as u64,
            });
        }
        Ok(results)
    }

    /// Number of distinct cached words.
    pub async fn word_count(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM word_frequencies", params![])
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count: i64 = row.get(0).map_err(storage_err)?;
                Ok(count as u64)
            }
            Ok(None) => Ok(0),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// Drop every cached word.
    pub async fn clear_word_frequencies(&self) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute("DELETE FROM word_frequencies", params![])
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}
