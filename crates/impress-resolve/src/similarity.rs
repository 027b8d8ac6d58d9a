//! Similarity scoring for candidate pairs
//!
//! The base score is the Ratcliff/Obershelp matching ratio
//! (`2·M / (|a| + |b|)`, `M` = characters in the recursively found longest
//! common blocks). For person names that fall short of the high-confidence
//! cutoff, an initials-compatibility check can lift the score to a fixed
//! bonus: "Smith, J." vs "Smith, John" has a poor ratio yet is almost
//! certainly the same person.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{EntityKind, ResolverConfig};
use crate::error::ScoreError;
use crate::normalize::{split_name, NameParts};

/// How a pair (or a mapping) was established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMethod {
    /// Identical normalized keys
    Exact,
    /// Character-level similarity ratio
    Fuzzy,
    /// Initials-compatibility heuristic
    Initials,
    /// Orthographic recasing only
    Grammar,
}

impl MatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMethod::Exact => "exact",
            MatchMethod::Fuzzy => "fuzzy",
            MatchMethod::Initials => "initials",
            MatchMethod::Grammar => "grammar",
        }
    }
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite score of one pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairScore {
    /// Duplicate likelihood in `[0, 1]`
    pub value: f64,
    pub method: MatchMethod,
}

/// Ratcliff/Obershelp similarity ratio over characters.
///
/// Order-sensitive. Two empty strings are identical (1.0).
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

/// Characters covered by the recursive longest-common-block alignment
fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, k) = longest_block(a, b, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        matched += k;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            pending.push((i + k, ahi, j + k, bhi));
        }
    }

    matched
}

/// Longest common block in `a[alo..ahi]` × `b[blo..bhi]`; ties go to the
/// smallest start in `a`, then in `b`.
fn longest_block(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let width = bhi - blo + 1;
    let mut prev = vec![0usize; width];
    let mut curr = vec![0usize; width];
    let mut best = (alo, blo, 0);

    for i in alo..ahi {
        for j in blo..bhi {
            let col = j - blo + 1;
            if a[i] == b[j] {
                let k = prev[col - 1] + 1;
                curr[col] = k;
                if k > best.2 {
                    best = (i + 1 - k, j + 1 - k, k);
                }
            } else {
                curr[col] = 0;
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    best
}

/// Check whether two person names agree on surname and given-name initials.
///
/// The shorter given-name list is aligned against a prefix of the longer
/// one. A position matches when the tokens are equal, or when either token
/// is a single letter equal to the other's first letter. Returns the number
/// of aligned positions on success.
pub fn initials_compatibility(a: &NameParts, b: &NameParts) -> Option<usize> {
    if a.surname.is_empty() || a.surname != b.surname {
        return None;
    }

    let (short, long) = if a.given.len() <= b.given.len() {
        (&a.given, &b.given)
    } else {
        (&b.given, &a.given)
    };
    if short.is_empty() {
        return None;
    }

    let all_match = short
        .iter()
        .zip(long.iter())
        .all(|(x, y)| tokens_compatible(x, y));

    all_match.then_some(short.len())
}

fn tokens_compatible(x: &str, y: &str) -> bool {
    if x == y {
        return true;
    }
    let single = |t: &str| t.chars().count() == 1;
    match (x.chars().next(), y.chars().next()) {
        (Some(fx), Some(fy)) => (single(x) || single(y)) && fx == fy,
        _ => false,
    }
}

/// Pair scorer bound to one run's configuration
#[derive(Debug, Clone, Copy)]
pub struct Scorer<'a> {
    config: &'a ResolverConfig,
}

impl<'a> Scorer<'a> {
    pub fn new(config: &'a ResolverConfig) -> Self {
        Self { config }
    }

    /// Score two normalized keys.
    ///
    /// Symmetric: the keys are put in a fixed order before the
    /// order-sensitive ratio is computed.
    pub fn score(&self, a: &str, b: &str) -> Result<PairScore, ScoreError> {
        for key in [a, b] {
            if key.is_empty() {
                return Err(ScoreError::EmptyKey);
            }
            let len = key.chars().count();
            if len > self.config.max_key_chars {
                return Err(ScoreError::KeyTooLong {
                    len,
                    max: self.config.max_key_chars,
                });
            }
        }

        if a == b {
            return Ok(PairScore {
                value: 1.0,
                method: MatchMethod::Exact,
            });
        }

        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let base = sequence_ratio(lo, hi);

        if self.config.entity == EntityKind::Person
            && base < self.config.high_confidence_cutoff
            && self.config.initials_bonus > base
            && initials_compatibility(&split_name(a), &split_name(b)).is_some()
        {
            return Ok(PairScore {
                value: self.config.initials_bonus,
                method: MatchMethod::Initials,
            });
        }

        Ok(PairScore {
            value: base.clamp(0.0, 1.0),
            method: MatchMethod::Fuzzy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;

    fn parts(text: &str) -> NameParts {
        split_name(&normalize(text))
    }

    #[test]
    fn test_sequence_ratio_known_values() {
        assert_eq!(sequence_ratio("abcd", "abcd"), 1.0);
        assert_eq!(sequence_ratio("abcd", "wxyz"), 0.0);
        assert_eq!(sequence_ratio("", ""), 1.0);
        assert_eq!(sequence_ratio("abc", ""), 0.0);
        // difflib: SequenceMatcher(None, "abcd", "bcde").ratio() == 0.75
        assert!((sequence_ratio("abcd", "bcde") - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_sequence_ratio_recursive_blocks() {
        // "carvalho, l" + " r" matched: 13 of 41 chars per side
        let r = sequence_ratio("carvalho, leonardo rodrigues", "carvalho, l r");
        assert!((r - 26.0 / 41.0).abs() < 1e-9);
    }

    #[test]
    fn test_initials_compatible() {
        assert_eq!(
            initials_compatibility(&parts("Silva, J."), &parts("Silva, João")),
            Some(1)
        );
        assert_eq!(
            initials_compatibility(&parts("Carvalho, L. R."), &parts("Carvalho, Leonardo Rodrigues")),
            Some(2)
        );
        assert_eq!(
            initials_compatibility(&parts("João Silva"), &parts("Silva, J.")),
            Some(1)
        );
    }

    #[test]
    fn test_initials_incompatible() {
        assert_eq!(
            initials_compatibility(&parts("Carvalho, Leonardo Rodrigues"), &parts("Carvalho, Leandro")),
            None
        );
        assert_eq!(
            initials_compatibility(&parts("Silva, J."), &parts("Souza, João")),
            None
        );
        assert_eq!(
            initials_compatibility(&parts("Silva, J. P."), &parts("Silva, João Marcos")),
            None
        );
        assert_eq!(
            initials_compatibility(&parts("Silva"), &parts("Silva, João")),
            None
        );
    }

    #[test]
    fn test_score_initials_bonus() {
        let config = ResolverConfig::default();
        let scorer = Scorer::new(&config);
        let s = scorer
            .score(&normalize("Silva, J."), &normalize("Silva, João"))
            .unwrap();
        assert!(s.value >= 0.95);
        assert_eq!(s.method, MatchMethod::Initials);
    }

    #[test]
    fn test_score_exact_after_normalization() {
        let config = ResolverConfig::default();
        let scorer = Scorer::new(&config);
        let s = scorer
            .score(&normalize("JOÃO SILVA"), &normalize("Joao Silva"))
            .unwrap();
        assert_eq!(s.value, 1.0);
        assert_eq!(s.method, MatchMethod::Exact);
    }

    #[test]
    fn test_score_subjects_skip_initials() {
        let config = ResolverConfig::for_subjects();
        let scorer = Scorer::new(&config);
        let s = scorer.score("silva, j", "silva, joao").unwrap();
        assert_eq!(s.method, MatchMethod::Fuzzy);
        assert!(s.value < 0.95);
    }

    #[test]
    fn test_score_errors() {
        let mut config = ResolverConfig::default();
        config.max_key_chars = 5;
        let scorer = Scorer::new(&config);
        assert_eq!(scorer.score("", "abc"), Err(ScoreError::EmptyKey));
        assert_eq!(
            scorer.score("abcdefg", "abc"),
            Err(ScoreError::KeyTooLong { len: 7, max: 5 })
        );
    }

    #[test]
    fn test_score_symmetric() {
        let config = ResolverConfig::default();
        let scorer = Scorer::new(&config);
        let ab = scorer.score("lima, pedro", "lima, pedra").unwrap();
        let ba = scorer.score("lima, pedra", "lima, pedro").unwrap();
        assert_eq!(ab, ba);
    }
}
