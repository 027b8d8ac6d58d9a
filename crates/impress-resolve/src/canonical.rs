//! Canonical form selection for a cluster
//!
//! Rules, each consulted only when the previous one ties:
//!
//! 1. Lexical sovereignty: forms equal up to diacritics, where only one
//!    carries marks, resolve to the accented form. Case must match exactly.
//! 2. Unabbreviated form: a form longer by more than `length_margin`
//!    characters wins.
//! 3. Frequency.
//! 4. Orthographic quality (Title Case > mixed case > single case), then
//!    length, then the lexicographically smaller text.
//!
//! Rule 2 has a margin, so the pairwise relation is not transitive over
//! three or more forms. [`select`] therefore folds a champion over members
//! in a fixed order instead of sorting.

use std::cmp::Ordering;

use crate::normalize::{has_diacritics, strip_diacritics};
use crate::record::Record;

/// Title Case scores 2, other mixed case 1, ALL-CAPS or all-lowercase 0
pub fn orthographic_quality(text: &str) -> u8 {
    if is_title_case(text) {
        return 2;
    }
    let upper = text.chars().any(char::is_uppercase);
    let lower = text.chars().any(char::is_lowercase);
    u8::from(upper && lower)
}

/// Every cased run starts with one uppercase letter followed by lowercase
/// letters, and at least one cased letter exists.
pub fn is_title_case(text: &str) -> bool {
    let mut cased = false;
    let mut in_word = false;
    for c in text.chars() {
        if c.is_uppercase() {
            if in_word {
                return false;
            }
            in_word = true;
            cased = true;
        } else if c.is_lowercase() {
            if !in_word {
                return false;
            }
            in_word = true;
            cased = true;
        } else {
            in_word = false;
        }
    }
    cased
}

fn sovereignty(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let (marked_a, marked_b) = (has_diacritics(a), has_diacritics(b));
    if marked_a == marked_b {
        return Ordering::Equal;
    }
    if strip_diacritics(a) != strip_diacritics(b) {
        return Ordering::Equal;
    }
    marked_a.cmp(&marked_b)
}

fn unabbreviated(a: &str, b: &str, margin: usize) -> Ordering {
    let (la, lb) = (a.chars().count(), b.chars().count());
    if la > lb + margin {
        Ordering::Greater
    } else if lb > la + margin {
        Ordering::Less
    } else {
        Ordering::Equal
    }
}

/// Compare two candidate forms; `Greater` means `a` is the better
/// canonical.
pub fn compare_forms(a: &Record, b: &Record, length_margin: usize) -> Ordering {
    let (ta, tb) = (a.raw_text.as_str(), b.raw_text.as_str());
    sovereignty(ta, tb)
        .then_with(|| unabbreviated(ta, tb, length_margin))
        .then_with(|| a.frequency.cmp(&b.frequency))
        .then_with(|| orthographic_quality(ta).cmp(&orthographic_quality(tb)))
        .then_with(|| ta.chars().count().cmp(&tb.chars().count()))
        .then_with(|| tb.cmp(ta))
        .then_with(|| b.role_tag.cmp(&a.role_tag))
}

/// Pick the canonical among `members` (indices into `records`).
///
/// Returns `None` only for an empty member list.
pub fn select(records: &[Record], members: &[usize], length_margin: usize) -> Option<usize> {
    let mut order = members.to_vec();
    order.sort_by(|&x, &y| {
        records[x]
            .raw_text
            .cmp(&records[y].raw_text)
            .then_with(|| records[x].role_tag.cmp(&records[y].role_tag))
    });

    order.into_iter().reduce(|champion, challenger| {
        match compare_forms(&records[challenger], &records[champion], length_margin) {
            Ordering::Greater => challenger,
            _ => champion,
        }
    })
}
