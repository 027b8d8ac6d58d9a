//! Delimited-text input loader
//!
//! Reads `text[,frequency]` rows into [`RawEntry`] values. Missing or
//! unreadable files are fatal and reported before any processing starts.
//! Everything below the file level is tolerant: bad rows become entries
//! with empty text and are skipped at ingestion.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::error::SourceError;
use crate::record::{split_subject_terms, RawEntry};

/// First-column labels that mark a header row
const HEADER_LABELS: &[&str] = &["termo", "term", "orientador", "advisor", "nome", "name", "original"];

/// Last-column labels that mark a header row
const COUNT_LABELS: &[&str] = &["freq", "frequencia", "frequência", "frequency", "count", "quantidade", "total"];

/// Loader options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceOptions {
    /// Field delimiter
    pub delimiter: u8,
    /// Split multi-valued keyword cells on `;` into separate entries
    pub split_terms: bool,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            split_terms: false,
        }
    }
}

/// Decode file bytes: UTF-8 (BOM stripped), falling back to Latin-1
pub fn decode(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            debug!("input is not UTF-8, decoding as Latin-1");
            bytes.iter().map(|&b| char::from(b)).collect()
        }
    }
}

/// Load entries from a file
pub fn load_entries(path: &Path, options: SourceOptions) -> Result<Vec<RawEntry>, SourceError> {
    if !path.exists() {
        return Err(SourceError::NotFound(path.display().to_string()));
    }
    let bytes = fs::read(path).map_err(|e| SourceError::Unreadable {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let label = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let entries = parse_entries(&decode(&bytes), &label, options)?;
    info!(path = %path.display(), entries = entries.len(), "loaded input");
    Ok(entries)
}

fn is_count(cell: &str) -> bool {
    let cell = cell.trim();
    !cell.is_empty() && cell.chars().all(|c| c.is_ascii_digit())
}

/// Parse delimited text into entries.
///
/// A row whose last field is a count yields `(text, count)`, where `text`
/// is every earlier field joined by the delimiter. This restores
/// "Surname, Given" names split by an unquoted comma. A row without a
/// trailing count is all text. The first row is dropped as a header when
/// its first or last field is a known column label.
pub fn parse_entries(
    text: &str,
    label: &str,
    options: SourceOptions,
) -> Result<Vec<RawEntry>, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let separator = char::from(options.delimiter).to_string();
    let mut entries = Vec::new();
    let mut first = true;

    for row in reader.records() {
        let row = row?;
        let line = row.position().map_or(0, |p| p.line());
        let fields: Vec<&str> = row.iter().collect();
        if fields.iter().all(|f| f.trim().is_empty()) {
            continue;
        }

        if std::mem::take(&mut first) {
            let lead = fields[0].trim().to_lowercase();
            let tail = fields[fields.len() - 1].trim().to_lowercase();
            if HEADER_LABELS.contains(&lead.as_str()) || COUNT_LABELS.contains(&tail.as_str()) {
                debug!(line, "skipping header row");
                continue;
            }
        }

        let (name, frequency) = match fields.split_last() {
            Some((last, rest)) if !rest.is_empty() && is_count(last) => {
                (rest.join(&separator), Some(last.trim().to_string()))
            }
            _ => (fields.join(&separator), None),
        };

        let source_id = format!("{}:{}", label, line);
        if options.split_terms {
            for term in split_subject_terms(&name) {
                entries.push(RawEntry {
                    text: Some(term),
                    frequency: frequency.clone(),
                    role: None,
                    source_id: Some(source_id.clone()),
                });
            }
        } else {
            entries.push(RawEntry {
                text: Some(name.trim().to_string()),
                frequency,
                role: None,
                source_id: Some(source_id),
            });
        }
    }

    Ok(entries)
}
