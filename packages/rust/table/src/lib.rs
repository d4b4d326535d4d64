//! In-memory tables and their CSV sink.
//!
//! A [`Table`] is a list of named columns and string rows, built from any
//! [`Record`]. Tables are written as UTF-8 CSV with a header row, every field
//! quoted and embedded quotes doubled, and can be read back.

mod csv;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use forumharvest_shared::{Article, Comment, ForumHarvestError, Result, WordFrequency};
use tracing::{debug, info};

/// Width at which [`Table::preview`] truncates cells.
const PREVIEW_CELL_WIDTH: usize = 20;

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// A type that renders as one table row.
pub trait Record {
    /// Column names, in row order.
    const COLUMNS: &'static [&'static str];

    /// Render the row. Must have `COLUMNS.len()` cells.
    fn to_row(&self) -> Vec<String>;
}

impl Record for Article {
    const COLUMNS: &'static [&'static str] = &[
        "AID",
        "Title",
        "Date",
        "Publisher",
        "Views",
        "Comments_Count",
        "Content",
    ];

    fn to_row(&self) -> Vec<String> {
        vec![
            self.aid.to_string(),
            self.title_or_default().to_string(),
            self.date_or_default().to_string(),
            self.publisher_or_default().to_string(),
            self.views_or_default().to_string(),
            self.comments_count_or_default().to_string(),
            self.content_or_default().to_string(),
        ]
    }
}

impl Record for Comment {
    const COLUMNS: &'static [&'static str] = &["AID", "Comment_ID", "User", "Comment_Text"];

    fn to_row(&self) -> Vec<String> {
        vec![
            self.aid.to_string(),
            // an unparsable ID is written empty, not as 0
            self.comment_id.map(|id| id.to_string()).unwrap_or_default(),
            self.user_or_default().to_string(),
            self.text_or_default().to_string(),
        ]
    }
}

impl Record for WordFrequency {
    const COLUMNS: &'static [&'static str] = &["Cleaned_Word", "Frequency"];

    fn to_row(&self) -> Vec<String> {
        vec![self.word.clone(), self.frequency.to_string()]
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// How [`Table::write_csv`] treats an existing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace the file.
    Overwrite,
    /// Refuse to write.
    ErrorIfExists,
}

impl WriteMode {
    pub fn from_overwrite(overwrite: bool) -> Self {
        if overwrite {
            Self::Overwrite
        } else {
            Self::ErrorIfExists
        }
    }

    /// Fail if writing `path` under this mode would be refused.
    pub fn check(self, path: &Path) -> Result<()> {
        if self == Self::ErrorIfExists && path.exists() {
            return Err(ForumHarvestError::validation(format!(
                "{} already exists and overwrite is disabled",
                path.display()
            )));
        }
        Ok(())
    }
}

/// Named columns plus rows of string cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Create a table, checking that every row matches the column count.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(ForumHarvestError::validation(format!(
                "row {i} has {} cells, expected {}",
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Build a table from typed records.
    pub fn from_records<R: Record>(records: &[R]) -> Self {
        Self {
            columns: R::COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: records.iter().map(Record::to_row).collect(),
        }
    }

    /// A one-column table.
    pub fn single_column<I, S>(name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: vec![name.to_string()],
            rows: values.into_iter().map(|v| vec![v.into()]).collect(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the named column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All values of the named column.
    pub fn column(&self, name: &str) -> Result<Vec<&str>> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| ForumHarvestError::validation(format!("no column named '{name}'")))?;
        Ok(self.rows.iter().map(|row| row[idx].as_str()).collect())
    }

    /// Keep only the rows accepted by `keep`.
    pub fn filter<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&[String]) -> bool,
    {
        Self {
            columns: self.columns.clone(),
            rows: self
                .rows
                .iter()
                .filter(|row| keep(row.as_slice()))
                .cloned()
                .collect(),
        }
    }

    /// Render the first `n` rows as a bordered text grid.
    ///
    /// Cells longer than 20 characters are cut and end in `...`.
    pub fn preview(&self, n: usize) -> String {
        let shown: Vec<Vec<String>> = self
            .rows
            .iter()
            .take(n)
            .map(|row| row.iter().map(|c| truncate_cell(c)).collect())
            .collect();
        let header: Vec<String> = self.columns.iter().map(|c| truncate_cell(c)).collect();

        let widths: Vec<usize> = (0..self.columns.len())
            .map(|i| {
                shown
                    .iter()
                    .map(|row| row[i].chars().count())
                    .chain(std::iter::once(header[i].chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let border = {
            let mut line = String::from("+");
            for w in &widths {
                line.push_str(&"-".repeat(*w));
                line.push('+');
            }
            line
        };
        let render = |cells: &[String]| {
            let mut line = String::from("|");
            for (cell, w) in cells.iter().zip(&widths) {
                let pad = w - cell.chars().count();
                line.push_str(&" ".repeat(pad));
                line.push_str(cell);
                line.push('|');
            }
            line
        };

        let mut out = vec![border.clone(), render(header.as_slice()), border.clone()];
        out.extend(shown.iter().map(|row| render(row.as_slice())));
        out.push(border);
        if self.rows.len() > n {
            out.push(format!("only showing top {n} rows"));
        }
        out.join("\n")
    }

    /// Write the table as CSV. Returns the number of data rows written.
    pub fn write_csv(&self, path: &Path, mode: WriteMode) -> Result<usize> {
        mode.check(path)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ForumHarvestError::io(parent, e))?;
        }

        let file = File::create(path).map_err(|e| ForumHarvestError::io(path, e))?;
        let mut w = BufWriter::new(file);

        csv::write_record(&mut w, &self.columns).map_err(|e| ForumHarvestError::io(path, e))?;
        for row in &self.rows {
            csv::write_record(&mut w, row).map_err(|e| ForumHarvestError::io(path, e))?;
        }
        w.flush().map_err(|e| ForumHarvestError::io(path, e))?;

        info!(path = %path.display(), rows = self.rows.len(), "table written");
        Ok(self.rows.len())
    }

    /// Read a CSV file whose first row is the header.
    pub fn read_csv(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ForumHarvestError::io(path, e))?;
        let mut rows = csv::parse_rows(&text);

        if rows.is_empty() {
            return Err(ForumHarvestError::parse(format!(
                "{} has no header row",
                path.display()
            )));
        }
        let columns = rows.remove(0);
        debug!(path = %path.display(), rows = rows.len(), "table read");

        Self::new(columns, rows).map_err(|e| {
            ForumHarvestError::parse(format!("{}: {e}", path.display()))
        })
    }
}

fn truncate_cell(cell: &str) -> String {
    if cell.chars().count() <= PREVIEW_CELL_WIDTH {
        return cell.to_string();
    }
    let head: String = cell.chars().take(PREVIEW_CELL_WIDTH - 3).collect();
    format!("{head}...")
}
