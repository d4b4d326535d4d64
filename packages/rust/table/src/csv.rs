//! CSV codec: every field quoted on write, embedded quotes doubled.

use std::io::{self, Write};
use std::mem::take;

/// Write one record with every field quoted.
pub(crate) fn write_record<W, S>(w: &mut W, fields: &[S]) -> io::Result<()>
where
    W: Write,
    S: AsRef<str>,
{
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            w.write_all(b",")?;
        }
        let escaped = field.as_ref().replace('"', "\"\"");
        write!(w, "\"{escaped}\"")?;
    }
    w.write_all(b"\n")
}

/// Split CSV text into rows of fields.
///
/// Accepts quoted and bare fields, doubled-quote escapes, and CRLF. Blank
/// lines are skipped. An unterminated quote runs to the end of the input.
pub(crate) fn parse_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    // a row made of a single quoted empty field is still a row
    let mut row_quoted = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => {
                in_quotes = true;
                row_quoted = true;
            }
            ',' if !in_quotes => row.push(take(&mut field)),
            '\n' | '\r' if !in_quotes => {
                if ch == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                row.push(take(&mut field));
                flush_row(&mut rows, &mut row, row_quoted);
                row_quoted = false;
            }
            _ => field.push(ch),
        }
    }

    row.push(field);
    flush_row(&mut rows, &mut row, row_quoted);

    rows
}

fn flush_row(rows: &mut Vec<Vec<String>>, row: &mut Vec<String>, quoted: bool) {
    let blank = row.len() == 1 && row[0].is_empty() && !quoted;
    if blank {
        row.clear();
    } else {
        rows.push(take(row));
    }
}
