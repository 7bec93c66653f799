//! # feed::csv
//!
//! แปลง CSV ที่ export จาก Google Sheets เป็น row ดิบ (header → string)
//!
//! Quoting follows RFC 4180: `"` opens/closes a quoted span, `""` inside a
//! span is a literal quote, and commas inside a span are data. Rows may be
//! shorter or longer than the header. Short rows are padded with empty
//! strings, surplus cells are ignored.

use std::collections::HashMap;

use csv::{ReaderBuilder, Trim};

use super::FeedError;

/// One data row keyed by (trimmed) header name.
pub type RawRow = HashMap<String, String>;

/// Parse CSV text into rows.
///
/// Empty or header-only input yields an empty vec, not an error. When a header
/// name repeats, the left-most column wins.
pub fn parse_csv(text: &str) -> Result<Vec<RawRow>, FeedError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| FeedError::Parse(format!("header row: {e}")))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        // +2: 1-based line numbers, plus the header line
        let record = record.map_err(|e| FeedError::Parse(format!("line {}: {e}", idx + 2)))?;

        let mut row = RawRow::with_capacity(headers.len());
        for (col, header) in headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            let value = record.get(col).unwrap_or("");
            row.entry(header.clone()).or_insert_with(|| value.to_string());
        }
        rows.push(row);
    }

    Ok(rows)
}
