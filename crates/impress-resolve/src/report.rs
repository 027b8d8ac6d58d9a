//! Report emission
//!
//! A [`Report`] holds one [`MappingRow`] per non-canonical member of every
//! multi-member cluster (plus one per recased canonical), one
//! [`ClusterSummary`] per cluster that produced rows, the review-band
//! [`FlaggedPair`]s and run statistics.
//!
//! Sort order is fixed:
//! - summaries by member count descending, aggregate frequency
//!   descending, canonical text ascending; `cluster_id` is the position in
//!   that order, starting at 1;
//! - mapping rows by cluster id, then score descending, then original text;
//! - flagged pairs by score descending, then both texts.

use std::cmp::Ordering;
use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::error::ReportError;
use crate::similarity::MatchMethod;

/// Column order of the mapping table
pub const MAPPING_HEADERS: &[&str] = &[
    "cluster_id",
    "original",
    "canonical",
    "score",
    "method",
    "freq_original",
    "freq_canonical",
    "cluster_frequency",
];

/// One original form and the canonical it maps to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingRow {
    pub cluster_id: usize,
    pub original: String,
    pub canonical: String,
    pub score: f64,
    pub method: MatchMethod,
    pub freq_original: u64,
    pub freq_canonical: u64,
    pub cluster_frequency: u64,
}

/// One merged cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub cluster_id: usize,
    pub canonical: String,
    /// Member forms, canonical first, joined by " | "
    pub members: String,
    pub size: usize,
    pub total_frequency: u64,
    /// Mean score of the non-canonical members
    pub confidence: f64,
}

/// A plausible duplicate left for human review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedPair {
    pub text_a: String,
    pub text_b: String,
    pub score: f64,
    pub method: MatchMethod,
    pub freq_a: u64,
    pub freq_b: u64,
}

/// Counters for one resolution run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionStats {
    /// Input rows seen
    pub raw_rows: usize,
    /// Distinct records after exact-duplicate aggregation
    pub records: usize,
    /// Rows excluded for an empty key
    pub skipped: usize,
    /// Blocks in the first pass
    pub blocks: usize,
    /// Pairs decided, all passes
    pub comparisons: usize,
    /// Pairs whose scoring failed, all passes
    pub skipped_pairs: usize,
    /// Records merged into another, all passes
    pub merges: usize,
    /// Review-band pairs in the report
    pub flagged: usize,
    /// Passes run until convergence
    pub passes: usize,
    /// Canonical forms recased by the grammar method
    pub recased: usize,
}

/// Full output of a resolution run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub rows: Vec<MappingRow>,
    pub clusters: Vec<ClusterSummary>,
    pub flagged: Vec<FlaggedPair>,
    pub stats: ResolutionStats,
}

fn by_score_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

impl Report {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Canonical form an original maps to, if it was merged or recased
    pub fn canonical_of(&self, original: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|r| r.original == original)
            .map(|r| r.canonical.as_str())
    }

    /// Put clusters, rows and flags into their documented order and
    /// renumber cluster ids to match.
    pub fn sort(&mut self) {
        self.clusters.sort_by(|a, b| {
            b.size
                .cmp(&a.size)
                .then_with(|| b.total_frequency.cmp(&a.total_frequency))
                .then_with(|| a.canonical.cmp(&b.canonical))
        });

        let mut renumber = vec![0; self.clusters.len() + 1];
        for (pos, summary) in self.clusters.iter_mut().enumerate() {
            if summary.cluster_id < renumber.len() {
                renumber[summary.cluster_id] = pos + 1;
            }
            summary.cluster_id = pos + 1;
        }
        for row in &mut self.rows {
            if let Some(&id) = renumber.get(row.cluster_id) {
                row.cluster_id = id;
            }
        }

        self.rows.sort_by(|a, b| {
            a.cluster_id
                .cmp(&b.cluster_id)
                .then_with(|| by_score_desc(a.score, b.score))
                .then_with(|| a.original.cmp(&b.original))
        });

        self.flagged.sort_by(|a, b| {
            by_score_desc(a.score, b.score)
                .then_with(|| a.text_a.cmp(&b.text_a))
                .then_with(|| a.text_b.cmp(&b.text_b))
        });
    }

    /// Write the mapping table as delimited text with a header row
    pub fn write_csv<W: Write>(&self, writer: W, delimiter: u8) -> Result<(), ReportError> {
        write_table(writer, delimiter, &self.rows)
    }

    /// Write the cluster summaries as delimited text
    pub fn write_clusters_csv<W: Write>(&self, writer: W, delimiter: u8) -> Result<(), ReportError> {
        write_table(writer, delimiter, &self.clusters)
    }

    /// Write the review-band pairs as delimited text
    pub fn write_flagged_csv<W: Write>(&self, writer: W, delimiter: u8) -> Result<(), ReportError> {
        write_table(writer, delimiter, &self.flagged)
    }

    /// Serialize the whole report as pretty JSON
    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn write_table<W: Write, T: Serialize>(
    writer: W,
    delimiter: u8,
    rows: &[T],
) -> Result<(), ReportError> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}
