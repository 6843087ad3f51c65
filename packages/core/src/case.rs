//! Case translation: the pure function pair every identifier crossing the
//! model↔database boundary goes through.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CasePolicy {
    Snake,
    Pascal,
    Camel,
}

impl CasePolicy {
    /// Parses the CLI/config spelling (`snakecase`/`pascalcase`/`camelcase`,
    /// also accepting the shorter `snake`/`pascal`/`camel`).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "snake" | "snakecase" => Some(Self::Snake),
            "pascal" | "pascalcase" => Some(Self::Pascal),
            "camel" | "camelcase" => Some(Self::Camel),
            _ => None,
        }
    }
}

/// Splits a camelCase/PascalCase identifier into lowercase words, each word
/// starting at an uppercase letter (or the start of the string).
fn split_words(s: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    for ch in s.chars() {
        if ch.is_uppercase() && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        current.extend(ch.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn join_camel(words: &[String]) -> String {
    let mut out = String::new();
    for (i, word) in words.iter().enumerate() {
        if i == 0 {
            out.push_str(word);
        } else {
            capitalize_into(&mut out, word);
        }
    }
    out
}

fn join_pascal(words: &[String]) -> String {
    let mut out = String::new();
    for word in words {
        capitalize_into(&mut out, word);
    }
    out
}

fn capitalize_into(out: &mut String, word: &str) {
    let mut chars = word.chars();
    if let Some(first) = chars.next() {
        out.extend(first.to_uppercase());
        out.push_str(chars.as_str());
    }
}

/// `normalize(camelCase, policy) -> dbIdentifier`.
#[must_use]
pub fn normalize(camel: &str, policy: CasePolicy) -> String {
    let words = split_words(camel);
    match policy {
        CasePolicy::Snake => words.join("_"),
        CasePolicy::Pascal => join_pascal(&words),
        CasePolicy::Camel => join_camel(&words),
    }
}

/// `denormalize(dbId, policy) -> camelCase`.
#[must_use]
pub fn denormalize(db_id: &str, policy: CasePolicy) -> String {
    match policy {
        CasePolicy::Snake => {
            let words: Vec<String> = db_id.split('_').map(str::to_lowercase).collect();
            join_camel(&words)
        }
        CasePolicy::Pascal | CasePolicy::Camel => join_camel(&split_words(db_id)),
    }
}
