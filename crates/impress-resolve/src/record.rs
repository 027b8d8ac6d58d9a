//! Input entries and ingested records
//!
//! A loader hands the engine an ordered sequence of [`RawEntry`] values.
//! [`ingest`] validates them, sums the frequencies of exact duplicates and
//! produces immutable [`Record`]s.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::normalize::{canonical_role, normalize_with_role};

lazy_static! {
    static ref TERM_NOISE: Regex = Regex::new(r"[{}\[\]<>\\/]").unwrap();
}

/// One loosely-typed row as supplied by a loader
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntry {
    /// Surface text; `None` for non-text cells
    pub text: Option<String>,
    /// Frequency cell exactly as read; missing or non-numeric counts as 1
    pub frequency: Option<String>,
    /// Explicit role qualifier, overriding detection from the text
    pub role: Option<String>,
    /// Where the row came from (file, line, harvest id)
    pub source_id: Option<String>,
}

impl RawEntry {
    /// Entry with a known count
    pub fn counted(text: &str, frequency: u64) -> Self {
        Self {
            text: Some(text.to_string()),
            frequency: Some(frequency.to_string()),
            ..Default::default()
        }
    }

    /// Entry with an explicit role qualifier
    pub fn with_role(mut self, role: &str) -> Self {
        self.role = Some(role.to_string());
        self
    }

    /// Entry tagged with its origin
    pub fn with_source(mut self, source_id: &str) -> Self {
        self.source_id = Some(source_id.to_string());
        self
    }
}

/// A validated, immutable record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub raw_text: String,
    pub normalized_key: String,
    pub frequency: u64,
    pub role_tag: Option<String>,
    pub source_id: String,
}

impl Record {
    /// Build a record from surface text. The key is always derived from
    /// `raw_text`, never supplied.
    pub fn new(raw_text: &str, frequency: u64, role: Option<&str>, source_id: &str) -> Self {
        let normalized = normalize_with_role(raw_text);
        let role_tag = role.and_then(canonical_role).or(normalized.role_tag);
        Self {
            raw_text: raw_text.trim().to_string(),
            normalized_key: normalized.key,
            frequency,
            role_tag,
            source_id: source_id.to_string(),
        }
    }

    /// Records with an empty key are never blocked or compared
    pub fn is_comparable(&self) -> bool {
        !self.normalized_key.is_empty()
    }
}

/// Result of ingestion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ingested {
    /// Aggregated comparable records, ordered by raw text
    pub records: Vec<Record>,
    /// Rows seen
    pub raw_rows: usize,
    /// Rows excluded because their key was empty
    pub skipped: usize,
}

/// Parse a frequency cell. Missing, empty, negative or non-numeric cells
/// count as 1; fractional counts are rounded.
pub fn parse_frequency(cell: Option<&str>) -> u64 {
    let Some(cell) = cell.map(str::trim).filter(|c| !c.is_empty()) else {
        return 1;
    };
    if let Ok(n) = cell.parse::<u64>() {
        return n;
    }
    match cell.replace(',', ".").parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 => f.round() as u64,
        _ => 1,
    }
}

/// Validate entries, drop those without a usable key, and sum the
/// frequencies of exact duplicates (same trimmed text and role).
pub fn ingest<I>(entries: I) -> Ingested
where
    I: IntoIterator<Item = RawEntry>,
{
    let mut aggregated: BTreeMap<(String, Option<String>), Record> = BTreeMap::new();
    let mut raw_rows = 0;
    let mut skipped = 0;

    for (row, entry) in entries.into_iter().enumerate() {
        raw_rows += 1;
        let text = entry.text.as_deref().unwrap_or("");
        let frequency = parse_frequency(entry.frequency.as_deref());
        let source_id = entry
            .source_id
            .clone()
            .unwrap_or_else(|| format!("row:{}", row + 1));
        let record = Record::new(text, frequency, entry.role.as_deref(), &source_id);

        if !record.is_comparable() {
            warn!(row = row + 1, text = %text, "skipping record with empty comparison key");
            skipped += 1;
            continue;
        }

        aggregated
            .entry((record.raw_text.clone(), record.role_tag.clone()))
            .and_modify(|existing| existing.frequency += record.frequency)
            .or_insert(record);
    }

    let records: Vec<Record> = aggregated.into_values().collect();
    debug!(raw_rows, records = records.len(), skipped, "ingestion complete");

    Ingested {
        records,
        raw_rows,
        skipped,
    }
}

/// Split a multi-valued keyword cell ("Saúde; Educação; {Brasil}") into
/// individual terms, stripping bracket noise.
pub fn split_subject_terms(cell: &str) -> Vec<String> {
    cell.split(';')
        .map(|t| TERM_NOISE.replace_all(t, "").trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}
