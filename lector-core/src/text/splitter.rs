//! Sentence splitting for paragraph text.
//!
//! All offsets are counted in `char`s of the paragraph, which is what the
//! highlighting layer indexes by.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::Range;

/// Words that end in a period without ending the sentence. Compared
/// lowercase and without the trailing period.
static ABBREVIATIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // Honorifics and titles
        "dr", "mr", "mrs", "ms", "mx", "prof", "rev", "hon", "sr", "jr", "st", "fr", "gen",
        "col", "capt", "cmdr", "lt", "sgt", "gov", "sen", "rep", "pres", "supt", "mme", "mlle",
        // Common Latin and reference forms
        "e.g", "i.e", "vs", "cf", "al", "approx", "fig", "vol", "ch", "pp",
        // Places and organisations
        "mt", "ft", "ave", "blvd", "inc", "ltd", "co", "corp", "dept", "univ",
    ]
    .into_iter()
    .collect()
});

/// A contiguous sentence of a paragraph together with its character range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    pub text: String,
    pub paragraph_index: usize,
    pub sentence_index: usize,
    /// Half-open range in paragraph characters. Never includes the whitespace
    /// that separates sentences.
    pub original_range: Range<usize>,
}

impl TextChunk {
    pub fn len(&self) -> usize {
        self.original_range.end - self.original_range.start
    }

    pub fn is_empty(&self) -> bool {
        self.original_range.is_empty()
    }
}

/// Splits a paragraph into sentence chunks.
///
/// Terminators are `.`, `!`, `?` and `…`, optionally repeated and followed by
/// closing quotes or brackets. A terminator run only ends a sentence when it
/// is followed by whitespace or the end of the text, and a lone period after a
/// known abbreviation or a single capital initial never does.
pub fn split_sentences(paragraph_index: usize, text: &str) -> Vec<TextChunk> {
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        if !is_terminator(chars[i]) {
            i += 1;
            continue;
        }

        let mut end = i + 1;
        while end < chars.len() && (is_terminator(chars[end]) || is_closer(chars[end])) {
            end += 1;
        }

        let at_boundary = end == chars.len() || chars[end].is_whitespace();
        let lone_period = chars[i] == '.' && !chars[i + 1..end].iter().any(|c| is_terminator(*c));

        if at_boundary && !(lone_period && ends_with_abbreviation(&chars, start, i)) {
            push_trimmed(&mut chunks, paragraph_index, &chars, start, end);
            start = end;
        }
        i = end;
    }

    push_trimmed(&mut chunks, paragraph_index, &chars, start, chars.len());
    chunks
}

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '…')
}

fn is_closer(c: char) -> bool {
    matches!(c, '"' | '\'' | '”' | '’' | ')' | ']' | '»')
}

/// Whether the word immediately before the period at `period` is an
/// abbreviation or an initial.
fn ends_with_abbreviation(chars: &[char], sentence_start: usize, period: usize) -> bool {
    let mut word_start = period;
    while word_start > sentence_start
        && (chars[word_start - 1].is_alphabetic() || chars[word_start - 1] == '.')
    {
        word_start -= 1;
    }

    if word_start == period {
        return false;
    }

    let word: String = chars[word_start..period].iter().collect();
    let mut letters = word.chars();
    if let (Some(first), None) = (letters.next(), letters.next()) {
        if first.is_uppercase() {
            return true;
        }
    }

    ABBREVIATIONS.contains(word.to_lowercase().as_str())
}

fn push_trimmed(
    chunks: &mut Vec<TextChunk>,
    paragraph_index: usize,
    chars: &[char],
    mut start: usize,
    mut end: usize,
) {
    while start < end && chars[start].is_whitespace() {
        start += 1;
    }
    while end > start && chars[end - 1].is_whitespace() {
        end -= 1;
    }
    if start == end {
        return;
    }

    chunks.push(TextChunk {
        text: chars[start..end].iter().collect(),
        paragraph_index,
        sentence_index: chunks.len(),
        original_range: start..end,
    });
}
