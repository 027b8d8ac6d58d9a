//! Equivalence decisions: turn a scored pair into merge / review / reject.
//!
//! Safety rules run around the score:
//! - differing non-empty role tags never merge, checked before scoring;
//! - denylisted common surnames need `min_shared_initials` matching
//!   given-name initials unless the keys are identical.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::{EntityKind, ResolverConfig};
use crate::error::ScoreError;
use crate::normalize::{normalize, split_name};
use crate::record::Record;
use crate::similarity::{MatchMethod, PairScore, Scorer};

/// Outcome for one pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Merge without review
    AutoMerge,
    /// Plausible duplicate, flagged but not merged
    Review,
    /// Not the same entity
    Reject,
}

/// Safety rule that overrode the score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Guard {
    RoleConflict,
    CommonSurname,
}

/// Decision plus the evidence behind it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub decision: Decision,
    /// `None` when the pair was rejected before scoring
    pub score: Option<PairScore>,
    pub guard: Option<Guard>,
}

impl Verdict {
    fn reject(score: Option<PairScore>, guard: Guard) -> Self {
        Self {
            decision: Decision::Reject,
            score,
            guard: Some(guard),
        }
    }
}

/// Pair decider bound to one run's configuration
#[derive(Debug, Clone)]
pub struct Decider<'a> {
    config: &'a ResolverConfig,
    scorer: Scorer<'a>,
    common_surnames: HashSet<String>,
}

impl<'a> Decider<'a> {
    pub fn new(config: &'a ResolverConfig) -> Self {
        let common_surnames = config
            .common_surname_denylist
            .iter()
            .map(|s| normalize(s))
            .filter(|s| !s.is_empty())
            .collect();
        Self {
            config,
            scorer: Scorer::new(config),
            common_surnames,
        }
    }

    pub fn scorer(&self) -> &Scorer<'a> {
        &self.scorer
    }

    /// Decide whether two records denote the same entity
    pub fn decide(&self, a: &Record, b: &Record) -> Result<Verdict, ScoreError> {
        if let (Some(ra), Some(rb)) = (&a.role_tag, &b.role_tag) {
            if ra != rb {
                return Ok(Verdict::reject(None, Guard::RoleConflict));
            }
        }

        let score = self.scorer.score(&a.normalized_key, &b.normalized_key)?;

        if score.method != MatchMethod::Exact
            && !self.passes_common_surname_guard(&a.normalized_key, &b.normalized_key)
        {
            return Ok(Verdict::reject(Some(score), Guard::CommonSurname));
        }

        Ok(Verdict {
            decision: self.band(score.value),
            score: Some(score),
            guard: None,
        })
    }

    /// Map a score onto the decision bands
    pub fn band(&self, value: f64) -> Decision {
        if value >= self.config.high_confidence_cutoff {
            Decision::AutoMerge
        } else if value >= self.config.similarity_threshold {
            Decision::Review
        } else {
            Decision::Reject
        }
    }

    fn passes_common_surname_guard(&self, a: &str, b: &str) -> bool {
        if self.config.entity != EntityKind::Person {
            return true;
        }
        let pa = split_name(a);
        let pb = split_name(b);
        if !self.common_surnames.contains(&pa.surname) && !self.common_surnames.contains(&pb.surname)
        {
            return true;
        }
        shared_initials(&pa.initials(), &pb.initials()) >= self.config.min_shared_initials
    }
}

/// Leading given-name initials two names agree on
pub fn shared_initials(a: &[char], b: &[char]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}
