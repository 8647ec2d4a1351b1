//! Expansion of abbreviations, numbers and symbols into speakable words.
//!
//! The synthesizer reads the normalized text, so every timing it reports is
//! in normalized offsets. Alongside the text the normalizer records the
//! boundary pairs needed to project those offsets back onto the original.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::numbers::{integer_to_words, number_to_words};
use crate::alignment::OffsetMapping;

static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        \b(?:Dr|Mr|Mrs|Ms|Prof|St|Jr|Sr|Rev|Gen|Capt|Lt|Sgt|Mt|Ft|vs)\.
        | \be\.g\. | \bi\.e\.
        | \$\d{1,3}(?:,\d{3})+(?:\.\d+)? | \$\d+(?:\.\d+)?
        | \d{1,3}(?:,\d{3})+(?:\.\d+)?%? | \d+(?:\.\d+)?%?
        | &
        ",
    )
    .expect("token pattern is valid")
});

static ABBREVIATIONS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("Dr.", "Doctor"),
        ("Mr.", "Mister"),
        ("Mrs.", "Missus"),
        ("Ms.", "Miz"),
        ("Prof.", "Professor"),
        ("St.", "Saint"),
        ("Jr.", "Junior"),
        ("Sr.", "Senior"),
        ("Rev.", "Reverend"),
        ("Gen.", "General"),
        ("Capt.", "Captain"),
        ("Lt.", "Lieutenant"),
        ("Sgt.", "Sergeant"),
        ("Mt.", "Mount"),
        ("Ft.", "Fort"),
        ("vs.", "versus"),
        ("e.g.", "for example"),
        ("i.e.", "that is"),
    ])
});

/// Normalized text plus the mapping back to the text it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedText {
    pub text: String,
    pub mapping: OffsetMapping,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TextNormalizer;

impl TextNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Rewrites `text` for speech. Untouched runs are copied verbatim, so the
    /// mapping is the identity between expansions.
    pub fn normalize(&self, text: &str) -> NormalizedText {
        let mut out = String::with_capacity(text.len() + text.len() / 4);
        let mut boundaries = vec![(0, 0)];
        let mut original_chars = 0;
        let mut normalized_chars = 0;
        let mut copied_to = 0;

        for token in TOKEN.find_iter(text) {
            let Some(replacement) = expand(token.as_str()) else {
                continue;
            };

            let gap = &text[copied_to..token.start()];
            let gap_chars = gap.chars().count();
            out.push_str(gap);
            original_chars += gap_chars;
            normalized_chars += gap_chars;
            push_boundary(&mut boundaries, (original_chars, normalized_chars));

            out.push_str(&replacement);
            original_chars += token.as_str().chars().count();
            normalized_chars += replacement.chars().count();
            push_boundary(&mut boundaries, (original_chars, normalized_chars));

            copied_to = token.end();
        }

        let tail = &text[copied_to..];
        out.push_str(tail);
        let tail_chars = tail.chars().count();
        original_chars += tail_chars;
        normalized_chars += tail_chars;
        push_boundary(&mut boundaries, (original_chars, normalized_chars));

        NormalizedText {
            text: out,
            mapping: OffsetMapping::new(boundaries, original_chars, normalized_chars),
        }
    }
}

fn push_boundary(boundaries: &mut Vec<(usize, usize)>, boundary: (usize, usize)) {
    if boundaries.last() != Some(&boundary) {
        boundaries.push(boundary);
    }
}

fn expand(token: &str) -> Option<String> {
    if let Some(words) = ABBREVIATIONS.get(token) {
        return Some(words.to_string());
    }
    if token == "&" {
        return Some("and".to_string());
    }
    if let Some(amount) = token.strip_prefix('$') {
        return dollars(amount);
    }
    if let Some(value) = token.strip_suffix('%') {
        return number_to_words(value).map(|words| format!("{words} percent"));
    }
    number_to_words(token)
}

fn dollars(amount: &str) -> Option<String> {
    let cleaned: String = amount.chars().filter(|c| *c != ',').collect();
    let (whole, cents) = match cleaned.split_once('.') {
        Some((whole, cents)) if cents.len() == 2 => (whole, Some(cents)),
        Some(_) => return number_to_words(amount).map(|words| format!("{words} dollars")),
        None => (cleaned.as_str(), None),
    };

    let whole: u64 = whole.parse().ok()?;
    let unit = if whole == 1 { "dollar" } else { "dollars" };
    let mut words = format!("{} {unit}", integer_to_words(whole));

    if let Some(cents) = cents {
        let cents: u64 = cents.parse().ok()?;
        if cents > 0 {
            let unit = if cents == 1 { "cent" } else { "cents" };
            words.push_str(&format!(" and {} {unit}", integer_to_words(cents)));
        }
    }
    Some(words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_honorific_expansion_and_mapping() {
        let normalized = TextNormalizer::new().normalize("Dr. Smith arrived.");

        assert_eq!(normalized.text, "Doctor Smith arrived.");
        assert_eq!(normalized.mapping.boundaries(), &[(0, 0), (3, 6), (18, 21)]);
        assert_eq!(normalized.mapping.original_len(), 18);
        assert_eq!(normalized.mapping.normalized_len(), 21);
        assert_eq!(normalized.mapping.to_normalized(4), 7);
    }

    #[rstest]
    #[case("It costs $5.", "It costs five dollars.")]
    #[case("Only $1.25 left", "Only one dollar and twenty five cents left")]
    #[case("Up 12% today", "Up twelve percent today")]
    #[case("About 1,500 people", "About one thousand five hundred people")]
    #[case("Pi is 3.14", "Pi is three point one four")]
    #[case("Salt & pepper", "Salt and pepper")]
    #[case("Cats vs. dogs, e.g. pets", "Cats versus dogs, for example pets")]
    fn test_expansions(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(TextNormalizer::new().normalize(input).text, expected);
    }

    #[test]
    fn test_plain_text_is_identity() {
        let normalized = TextNormalizer::new().normalize("Nothing to see here.");
        assert_eq!(normalized.text, "Nothing to see here.");
        assert_eq!(normalized.mapping.boundaries(), &[(0, 0), (20, 20)]);
    }

    #[test]
    fn test_empty_text() {
        let normalized = TextNormalizer::new().normalize("");
        assert_eq!(normalized.text, "");
        assert_eq!(normalized.mapping.boundaries(), &[(0, 0)]);
    }

    #[test]
    fn test_boundaries_count_chars() {
        let normalized = TextNormalizer::new().normalize("Café 2 olé");
        assert_eq!(normalized.text, "Café two olé");
        assert_eq!(normalized.mapping.boundaries(), &[(0, 0), (5, 5), (6, 8), (10, 12)]);
    }

    #[test]
    fn test_every_boundary_is_monotone() {
        let normalized = TextNormalizer::new().normalize("Mr. & Mrs. Jones paid $2,000 on 3 May.");
        for pair in normalized.mapping.boundaries().windows(2) {
            assert!(pair[0].0 <= pair[1].0);
            assert!(pair[0].1 <= pair[1].1);
        }
        assert!(normalized.text.starts_with("Mister and Missus Jones paid two thousand dollars"));
    }
}
