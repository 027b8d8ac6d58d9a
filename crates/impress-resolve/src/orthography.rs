//! Orthographic recasing ("grammar" method)
//!
//! Canonical forms typed in ALL-CAPS or all-lowercase are recased:
//! person names word by word with lowercase particles, subjects in
//! sentence case. Configured acronyms and proper forms are restored
//! verbatim. Output depends only on the lowercase form of the input, so
//! recasing twice is the same as recasing once.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::config::{EntityKind, ResolverConfig};

lazy_static! {
    static ref COLON: Regex = Regex::new(r"\s*:\s*").unwrap();
}

/// Connectives kept lowercase inside a person name
const PARTICLES: &[&str] = &["da", "de", "do", "das", "dos", "e", "y"];

/// Name suffixes with fixed casing
const SUFFIXES: &[&str] = &["ii", "iii", "iv", "v", "vi", "jr", "neto", "filho"];

/// True when every cased letter shares one case
pub fn needs_recase(text: &str) -> bool {
    let mut letters = text.chars().filter(|c| c.is_uppercase() || c.is_lowercase());
    match letters.next() {
        None => false,
        Some(first) => {
            let upper = first.is_uppercase();
            letters.all(|c| c.is_uppercase() == upper)
        }
    }
}

/// Recaser bound to one run's preserved forms
#[derive(Debug, Clone)]
pub struct Recaser {
    entity: EntityKind,
    /// Lowercased single-word form -> preserved spelling
    words: HashMap<String, String>,
    /// Multi-word forms, restored after word-level casing
    phrases: Vec<(Regex, String)>,
}

impl Recaser {
    pub fn new(config: &ResolverConfig) -> Self {
        let mut words = HashMap::new();
        let mut phrases = Vec::new();
        for form in &config.preserved_acronyms {
            let form = form.trim();
            if form.is_empty() {
                continue;
            }
            if form.contains(char::is_whitespace) {
                let pattern = format!(r"(?i)\b{}\b", regex::escape(form));
                if let Ok(re) = Regex::new(&pattern) {
                    phrases.push((re, form.to_string()));
                }
            } else {
                words.insert(form.to_lowercase(), form.to_string());
            }
        }
        Self {
            entity: config.entity,
            words,
            phrases,
        }
    }

    /// Recase `text` when it is single-case; `None` when nothing changes
    pub fn apply(&self, text: &str) -> Option<String> {
        if !needs_recase(text) {
            return None;
        }
        let recased = self.recase(text);
        (recased != text).then_some(recased)
    }

    /// Recase unconditionally
    pub fn recase(&self, text: &str) -> String {
        let mut lowered = text.trim().to_lowercase();
        if self.entity == EntityKind::Subject {
            lowered = COLON.replace_all(&lowered, " : ").into_owned();
        }
        let cased: Vec<String> = lowered
            .split_whitespace()
            .enumerate()
            .map(|(i, word)| self.case_word(i, word))
            .collect();
        let mut out = cased.join(" ");

        for (re, form) in &self.phrases {
            out = re.replace_all(&out, form.as_str()).into_owned();
        }
        out
    }

    fn case_word(&self, position: usize, word: &str) -> String {
        let core: String = word.chars().filter(|c| c.is_alphanumeric()).collect();
        if let Some(form) = self.words.get(&core) {
            return word.replacen(&core, form, 1);
        }

        match self.entity {
            EntityKind::Person => {
                if position > 0 && PARTICLES.contains(&core.as_str()) {
                    word.to_string()
                } else if SUFFIXES.contains(&core.as_str()) && core.chars().count() < 4 {
                    word.to_uppercase()
                } else {
                    capitalize(word)
                }
            }
            EntityKind::Subject => {
                if position == 0 {
                    capitalize(word)
                } else {
                    word.to_string()
                }
            }
        }
    }
}

/// Uppercase the first letter, leave the rest as given
fn capitalize(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut done = false;
    for c in word.chars() {
        if !done && c.is_alphabetic() {
            out.extend(c.to_uppercase());
            done = true;
        } else {
            out.push(c);
        }
    }
    out
}
