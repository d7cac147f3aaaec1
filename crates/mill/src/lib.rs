//
// lib.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

mod stopwords;

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use rust_stemmers::Algorithm;
use rust_stemmers::Stemmer;

static TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w+\b").unwrap());

static ENGLISH_STOPWORDS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| stopwords::ENGLISH.iter().copied().collect());
static SPANISH_STOPWORDS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| stopwords::SPANISH.iter().copied().collect());

static ENGLISH_STEMMER: Lazy<Stemmer> = Lazy::new(|| Stemmer::create(Algorithm::English));
static SPANISH_STEMMER: Lazy<Stemmer> = Lazy::new(|| Stemmer::create(Algorithm::Spanish));

/// Languages with a stopword table and a stemmer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    English,
    Spanish,
}

impl Language {
    /// Resolves a language tag. Unknown tags fall back to English rather than
    /// failing, so a bad tag on a task degrades to default processing.
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_lowercase().as_str() {
            "spanish" | "es" => Language::Spanish,
            _ => Language::English,
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            Language::English => "english",
            Language::Spanish => "spanish",
        }
    }

    fn stopwords(&self) -> &'static HashSet<&'static str> {
        match self {
            Language::English => &ENGLISH_STOPWORDS,
            Language::Spanish => &SPANISH_STOPWORDS,
        }
    }

    fn stemmer(&self) -> &'static Stemmer {
        match self {
            Language::English => &ENGLISH_STEMMER,
            Language::Spanish => &SPANISH_STEMMER,
        }
    }
}

/// Tokenizes, removes stopwords, and stems for the given language.
///
/// The result preserves occurrence order so callers can count multiplicities.
/// Tokens are casefolded, filtered to purely alphabetic words, and reduced by
/// the language's Snowball stemmer.
pub fn normalize(text: &str, language: Language) -> Vec<String> {
    let text = text.to_lowercase();

    let stopwords = language.stopwords();
    let stemmer = language.stemmer();

    TOKEN_PATTERN
        .find_iter(&text)
        .map(|token| token.as_str())
        .filter(|token| !stopwords.contains(token) && token.chars().all(char::is_alphabetic))
        .map(|token| stemmer.stem(token).into_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_stopwords_and_casefolding() {
        let tokens = normalize("The quick brown fox", Language::English);
        assert_eq!(tokens, vec!["quick", "brown", "fox"]);
    }

    #[test]
    fn test_order_and_multiplicity_are_preserved() {
        let tokens = normalize("cat cat dog", Language::English);
        assert_eq!(tokens, vec!["cat", "cat", "dog"]);
    }

    #[test]
    fn test_stemming() {
        assert_eq!(normalize("reporting", Language::English), vec!["report"]);
        assert_eq!(normalize("foxes jumped", Language::English), vec![
            "fox", "jump"
        ]);
    }

    #[test]
    fn test_non_alphabetic_tokens_are_dropped() {
        // `beta_3` survives tokenization as one word-character run, then fails
        // the alphabetic filter
        let tokens = normalize("version v2 100 beta_3 release", Language::English);
        assert_eq!(tokens, vec!["version", "releas"]);
    }

    #[test]
    fn test_spanish() {
        let tokens = normalize("los perros corren", Language::Spanish);
        assert_eq!(tokens, vec!["perr", "corr"]);
    }

    #[test]
    fn test_unknown_language_falls_back_to_english() {
        assert_eq!(Language::from_tag("klingon"), Language::English);
        assert_eq!(Language::from_tag("ES"), Language::Spanish);
        assert_eq!(Language::from_tag("en"), Language::English);
    }

    #[test]
    fn test_empty_input() {
        assert!(normalize("", Language::English).is_empty());
        assert!(normalize("   \n\t ", Language::English).is_empty());
        // Stopwords only
        assert!(normalize("the and of", Language::English).is_empty());
    }

    proptest! {
        // Stemming is a fixed point after one pass: re-normalizing the output
        // never introduces stems that were not already present.
        #[test]
        fn test_stems_are_fixed_points(
            words in proptest::collection::vec(
                proptest::sample::select(vec![
                    "quick", "brown", "foxes", "jumped", "lazy", "dogs",
                    "reporting", "reports", "systems", "running", "indexes",
                    "documents", "connection", "connected",
                ]),
                1..20,
            )
        ) {
            let text = words.join(" ");
            let once = normalize(&text, Language::English);
            let twice = normalize(&once.join(" "), Language::English);

            let first: std::collections::HashSet<_> = once.iter().collect();
            for stem in &twice {
                prop_assert!(first.contains(stem));
            }
        }
    }
}
