//! Text normalization for identity comparison
//!
//! - Strips diacritics
//! - Case-folds
//! - Removes punctuation except the comma ("Surname, Given" form)
//! - Collapses whitespace
//! - Detaches a trailing role qualifier such as "(org.)" or "coord."

use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    /// Trailing parenthetical, e.g. "Silva, J. (org.)"
    static ref ROLE_PAREN: Regex = Regex::new(r"\(\s*([^()]{1,40}?)\s*\)\s*$").unwrap();

    /// Trailing bare qualifier, e.g. "Silva, J. coord."
    static ref ROLE_SUFFIX: Regex =
        Regex::new(r"(?i)\s+(orgs?|coords?|comps?|trad|ilust)\.\s*$").unwrap();
}

/// Particles dropped from given names before initials comparison
const NAME_PARTICLES: &[&str] = &["da", "de", "do", "das", "dos", "e", "y", "del", "van", "von"];

/// Generational suffixes kept attached to the surname
const GENERATIONAL_SUFFIXES: &[&str] = &["filho", "neto", "sobrinho", "junior", "jr"];

/// Known role qualifiers and the tag each one maps to
const ROLE_TABLE: &[(&str, &[&str])] = &[
    (
        "org",
        &["org", "orgs", "organizador", "organizadora", "organizadores", "organizadoras", "organizer", "organizers"],
    ),
    (
        "coord",
        &["coord", "coords", "coordenador", "coordenadora", "coordenadores", "coordenadoras", "coordinator"],
    ),
    ("ed", &["ed", "eds", "editor", "editora", "editores", "editors"]),
    ("comp", &["comp", "comps", "compilador", "compiladora", "compiler"]),
    ("trad", &["trad", "tradutor", "tradutora", "translator"]),
    ("ilust", &["il", "ilust", "ilustrador", "ilustradora", "illustrator"]),
    ("rev", &["rev", "revisor", "revisora"]),
];

/// Comparison key plus the role qualifier detached from the raw text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub key: String,
    pub role_tag: Option<String>,
}

/// Surname and ordered given-name tokens of a normalized person key
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NameParts {
    pub surname: String,
    pub given: Vec<String>,
}

impl NameParts {
    /// First letter of every given-name token
    pub fn initials(&self) -> Vec<char> {
        self.given.iter().filter_map(|t| t.chars().next()).collect()
    }
}

/// Map raw text to its comparison key.
///
/// Total and deterministic: empty input yields the empty string. The role
/// qualifier is not part of the key.
pub fn normalize(text: &str) -> String {
    normalize_with_role(text).key
}

/// Normalize raw text and detach its role qualifier
pub fn normalize_with_role(text: &str) -> Normalized {
    let (name, role_tag) = split_role(text);
    Normalized {
        key: fold(name),
        role_tag,
    }
}

/// Map a free-form qualifier ("Org.", "coordenadora") to its role tag.
///
/// Unknown qualifiers are folded and returned as-is so that explicit tags
/// supplied by a loader still partition records.
pub fn canonical_role(qualifier: &str) -> Option<String> {
    let folded = fold(qualifier);
    if folded.is_empty() {
        return None;
    }
    Some(lookup_role(&folded).map(str::to_string).unwrap_or(folded))
}

fn lookup_role(folded: &str) -> Option<&'static str> {
    ROLE_TABLE
        .iter()
        .find(|(_, forms)| forms.contains(&folded))
        .map(|(tag, _)| *tag)
}

/// Split a trailing role qualifier off the raw text.
///
/// Only recognized qualifiers are detached; any other trailing
/// parenthetical stays part of the name.
fn split_role(text: &str) -> (&str, Option<String>) {
    let trimmed = text.trim();

    if let Some(caps) = ROLE_PAREN.captures(trimmed) {
        if let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) {
            if let Some(tag) = lookup_role(&fold(inner.as_str())) {
                let name = trimmed[..whole.start()].trim_end();
                if !name.is_empty() {
                    return (name, Some(tag.to_string()));
                }
            }
        }
    }

    if let Some(caps) = ROLE_SUFFIX.captures(trimmed) {
        if let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) {
            if let Some(tag) = lookup_role(&inner.as_str().to_lowercase()) {
                let name = trimmed[..whole.start()].trim_end();
                if !name.is_empty() {
                    return (name, Some(tag.to_string()));
                }
            }
        }
    }

    (trimmed, None)
}

/// Core folding: decompose, drop marks, lowercase, keep alphanumerics and
/// commas, collapse everything else into single spaces.
fn fold(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for c in text.nfkd().filter(|c| !is_combining_mark(*c)) {
        if c == ',' {
            if !out.is_empty() && !out.ends_with(',') {
                out.push(',');
            }
            pending_space = true;
        } else if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(c.to_lowercase());
        } else {
            pending_space = true;
        }
    }

    if out.ends_with(',') {
        out.pop();
    }
    out
}

/// Split a normalized person key into surname and given-name tokens.
///
/// With a comma the bibliographic convention applies ("surname, given");
/// without one the key is read as "given ... surname".
pub fn split_name(key: &str) -> NameParts {
    if let Some((surname, given)) = key.split_once(',') {
        return NameParts {
            surname: surname.trim().to_string(),
            given: given_tokens(given.split(|c: char| c == ',' || c.is_whitespace())),
        };
    }

    let tokens: Vec<&str> = key.split_whitespace().collect();
    match tokens.len() {
        0 => NameParts::default(),
        1 => NameParts {
            surname: tokens[0].to_string(),
            given: Vec::new(),
        },
        n => {
            let last = tokens[n - 1];
            let (surname, rest) = if GENERATIONAL_SUFFIXES.contains(&last) && n > 2 {
                (format!("{} {}", tokens[n - 2], last), &tokens[..n - 2])
            } else {
                (last.to_string(), &tokens[..n - 1])
            };
            NameParts {
                surname,
                given: given_tokens(rest.iter().copied()),
            }
        }
    }
}

fn given_tokens<'a>(tokens: impl Iterator<Item = &'a str>) -> Vec<String> {
    tokens
        .filter(|t| !t.is_empty() && !NAME_PARTICLES.contains(t))
        .map(str::to_string)
        .collect()
}

/// Remove diacritical marks but keep case and punctuation
pub fn strip_diacritics(text: &str) -> String {
    text.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .nfc()
        .collect()
}

/// Whether the text carries any diacritical mark
pub fn has_diacritics(text: &str) -> bool {
    text.nfd().any(is_combining_mark)
}
