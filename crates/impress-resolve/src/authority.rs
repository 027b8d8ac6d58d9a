//! Matching terms against an authority list of official forms.
//!
//! Lookup order for each term: identical key, then the accepted candidates
//! in the term's block (several are tie-broken by canonical selection),
//! then orthographic recasing when enabled. Anything else stays unmatched.

use std::cmp::Ordering;
use std::collections::HashMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::blocking::block_key;
use crate::canonical::{compare_forms, select};
use crate::config::ResolverConfig;
use crate::decision::{Decider, Decision};
use crate::orthography::Recaser;
use crate::record::{ingest, RawEntry, Record};
use crate::similarity::{MatchMethod, PairScore};

/// Resolution of one term
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorityMatch {
    pub term: String,
    /// Official form, `None` when unmatched
    pub official: Option<String>,
    pub score: Option<f64>,
    pub method: Option<MatchMethod>,
    pub frequency: u64,
}

impl AuthorityMatch {
    fn unmatched(record: &Record) -> Self {
        Self {
            term: record.raw_text.clone(),
            official: None,
            score: None,
            method: None,
            frequency: record.frequency,
        }
    }

    fn matched(record: &Record, official: &str, score: PairScore) -> Self {
        Self {
            term: record.raw_text.clone(),
            official: Some(official.to_string()),
            score: Some(score.value),
            method: Some(score.method),
            frequency: record.frequency,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.official.is_some()
    }
}

/// Official forms indexed by key and by block
#[derive(Debug)]
pub struct AuthorityIndex<'a> {
    config: &'a ResolverConfig,
    decider: Decider<'a>,
    recaser: Option<Recaser>,
    forms: Vec<Record>,
    by_key: HashMap<String, usize>,
    blocks: HashMap<String, Vec<usize>>,
}

impl<'a> AuthorityIndex<'a> {
    pub fn new<I>(config: &'a ResolverConfig, official: I) -> Self
    where
        I: IntoIterator<Item = RawEntry>,
    {
        let forms = ingest(official).records;
        let strategy = config.blocking_strategy();

        let mut by_key: HashMap<String, usize> = HashMap::new();
        let mut blocks: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, form) in forms.iter().enumerate() {
            by_key
                .entry(form.normalized_key.clone())
                .and_modify(|best| {
                    if compare_forms(form, &forms[*best], config.length_margin) == Ordering::Greater {
                        *best = idx;
                    }
                })
                .or_insert(idx);
            if let Some(key) = block_key(form, strategy) {
                blocks.entry(key).or_default().push(idx);
            }
        }

        info!(forms = forms.len(), blocks = blocks.len(), "loaded authority list");

        Self {
            config,
            decider: Decider::new(config),
            recaser: config.orthography.then(|| Recaser::new(config)),
            forms,
            by_key,
            blocks,
        }
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }

    /// Resolve one term
    pub fn resolve(&self, term: &Record) -> AuthorityMatch {
        if !term.is_comparable() {
            return AuthorityMatch::unmatched(term);
        }

        if let Some(&idx) = self.by_key.get(&term.normalized_key) {
            let exact = PairScore {
                value: 1.0,
                method: MatchMethod::Exact,
            };
            return AuthorityMatch::matched(term, &self.forms[idx].raw_text, exact);
        }

        let accepted = self.accepted_candidates(term);
        let indices: Vec<usize> = accepted.keys().copied().collect();
        if let Some(best) = select(&self.forms, &indices, self.config.length_margin) {
            if let Some(&score) = accepted.get(&best) {
                return AuthorityMatch::matched(term, &self.forms[best].raw_text, score);
            }
        }

        if let Some(recased) = self.recaser.as_ref().and_then(|r| r.apply(&term.raw_text)) {
            let grammar = PairScore {
                value: 1.0,
                method: MatchMethod::Grammar,
            };
            return AuthorityMatch::matched(term, &recased, grammar);
        }

        AuthorityMatch::unmatched(term)
    }

    fn accepted_candidates(&self, term: &Record) -> HashMap<usize, PairScore> {
        let mut accepted = HashMap::new();
        let Some(key) = block_key(term, self.config.blocking_strategy()) else {
            return accepted;
        };
        let Some(candidates) = self.blocks.get(&key) else {
            return accepted;
        };

        for &idx in candidates {
            match self.decider.decide(term, &self.forms[idx]) {
                Ok(verdict) if verdict.decision == Decision::AutoMerge => {
                    if let Some(score) = verdict.score {
                        accepted.insert(idx, score);
                    }
                }
                Ok(_) => {}
                Err(err) => warn!(
                    term = %term.raw_text,
                    official = %self.forms[idx].raw_text,
                    error = %err,
                    "skipping authority candidate"
                ),
            }
        }
        accepted
    }

    /// Resolve a batch of terms; duplicates are aggregated first and the
    /// output follows ingestion order.
    pub fn resolve_terms<I>(&self, terms: I) -> Vec<AuthorityMatch>
    where
        I: IntoIterator<Item = RawEntry>,
    {
        let records = ingest(terms).records;
        let matches: Vec<AuthorityMatch> = if self.config.parallel {
            records.par_iter().map(|r| self.resolve(r)).collect()
        } else {
            records.iter().map(|r| self.resolve(r)).collect()
        };

        let matched = matches.iter().filter(|m| m.is_matched()).count();
        info!(terms = matches.len(), matched, "resolved against authority list");
        matches
    }
}
