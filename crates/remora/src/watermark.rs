//! Incremental-change watermark recovery.
//!
//! Item-oriented content (issues, discussions, wiki pages) is persisted as
//! one markdown file per item, each carrying a `- Updated Time:` line. The
//! watermark for the next sync is the maximum of those timestamps; an empty
//! directory yields the Unix epoch, forcing a full fetch.
//!
//! The marker line is a durable on-disk contract: it is written by the
//! renderers in `sync` and parsed back here on the next run.

use std::io;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};

/// Exact prefix of the marker line, shared by writers and the scanner.
pub const UPDATED_TIME_PREFIX: &str = "- Updated Time: ";

/// Textual timestamp format used in item files.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render a timestamp in the item-file format.
pub fn format_time(t: DateTime<Utc>) -> String {
    t.format(TIME_FORMAT).to_string()
}

/// Parse a timestamp in the item-file format.
pub fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s.trim(), TIME_FORMAT)
        .ok()
        .map(|t| t.and_utc())
}

/// Extract the updated-time marker from one item file's content.
///
/// Only the first marker line counts; lines that fail to parse are skipped
/// rather than treated as fatal.
pub fn extract_marker(content: &str) -> Option<DateTime<Utc>> {
    content
        .lines()
        .find_map(|line| line.strip_prefix(UPDATED_TIME_PREFIX))
        .and_then(parse_time)
}

/// Compute the watermark for a directory of previously persisted items.
///
/// Returns the Unix epoch when the directory holds no markdown files, so
/// that everything is fetched on the first run.
pub fn scan_dir(dir: &Path) -> io::Result<DateTime<Utc>> {
    let mut watermark = DateTime::UNIX_EPOCH;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if !name.to_string_lossy().ends_with(".md") {
            continue;
        }
        let content = std::fs::read_to_string(entry.path())?;
        if let Some(t) = extract_marker(&content) {
            if t > watermark {
                watermark = t;
            }
        }
    }
    Ok(watermark)
}
