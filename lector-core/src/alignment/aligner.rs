//! Builds a [`PhonemeTimeline`] from the phoneme events a synthesizer reports
//! against normalized text.

use std::ops::Range;

use super::error::AlignmentError;
use super::timeline::{PhonemeTimeline, TimedPhoneme, WordBoundary};
use crate::synthesis::PhonemeEvent;
use crate::text::NormalizedText;

/// Aligns one sentence.
///
/// Words are the whitespace-separated tokens of `sentence_text`, with leading
/// quotes and trailing clause punctuation trimmed off. Each word collects the
/// phonemes whose normalized start falls inside the word's normalized span, so
/// "Dr." is timed by all six phonemes of "Doctor".
pub fn align(
    sentence_text: &str,
    normalized: &NormalizedText,
    events: &[PhonemeEvent],
    audio_duration: f64,
) -> Result<PhonemeTimeline, AlignmentError> {
    if events.is_empty() {
        return Err(AlignmentError::NoTiming);
    }

    let mapping = &normalized.mapping;
    let normalized_len = normalized.text.chars().count();
    let mut phonemes = Vec::with_capacity(events.len());
    let mut previous_char_start = 0;

    for (index, event) in events.iter().enumerate() {
        if event.char_start > event.char_end || event.char_end > normalized_len {
            return Err(AlignmentError::RangeOutOfBounds {
                start: event.char_start,
                end: event.char_end,
                len: normalized_len,
            });
        }
        if event.char_start < previous_char_start {
            return Err(AlignmentError::InconsistentTiming {
                index,
                reason: "character offsets go backwards".to_string(),
            });
        }
        previous_char_start = event.char_start;

        phonemes.push(TimedPhoneme {
            symbol: event.symbol.clone(),
            start_time: event.start_time,
            end_time: event.end_time,
            normalized_range: event.char_start..event.char_end,
            original_range: Some(mapping.original_range(event.char_start..event.char_end)),
        });
    }

    let mut words = Vec::new();
    for (word, range) in words_of(sentence_text) {
        let span = mapping.normalized_range(range.clone());
        let mut covering = phonemes
            .iter()
            .filter(|p| span.contains(&p.normalized_range.start));

        let Some(first) = covering.next() else {
            continue;
        };
        let last = covering.last().unwrap_or(first);

        words.push(WordBoundary {
            word,
            start_time: first.start_time,
            end_time: last.end_time.max(first.end_time),
            original_start_offset: range.start,
            original_end_offset: range.end,
        });
    }

    if words.is_empty() {
        return Err(AlignmentError::NoWords);
    }

    PhonemeTimeline::new(
        sentence_text.to_string(),
        normalized.text.clone(),
        phonemes,
        words,
        audio_duration,
    )
}

fn is_leading_trim(c: char) -> bool {
    matches!(c, '"' | '\'' | '“' | '‘' | '(' | '[' | '«')
}

fn is_trailing_trim(c: char) -> bool {
    matches!(c, ',' | ';' | ':' | '!' | '?' | '"' | '\'' | '”' | '’' | ')' | ']' | '»')
}

/// Whitespace-separated words with their char ranges. A trailing period is
/// kept so abbreviations map onto their full expansion.
fn words_of(text: &str) -> Vec<(String, Range<usize>)> {
    let chars: Vec<char> = text.chars().collect();
    let mut words = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i].is_whitespace() {
            i += 1;
            continue;
        }

        let mut start = i;
        while i < chars.len() && !chars[i].is_whitespace() {
            i += 1;
        }
        let mut end = i;

        while start < end && is_leading_trim(chars[start]) {
            start += 1;
        }
        while end > start && is_trailing_trim(chars[end - 1]) {
            end -= 1;
        }
        if start < end {
            words.push((chars[start..end].iter().collect(), start..end));
        }
    }

    words
}
