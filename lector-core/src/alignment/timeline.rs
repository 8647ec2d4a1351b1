use serde::{Deserialize, Serialize};
use std::ops::Range;

use super::error::AlignmentError;

/// One phoneme with its time span (seconds from sentence start) and the
/// characters it was produced from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedPhoneme {
    pub symbol: String,
    pub start_time: f64,
    pub end_time: f64,
    pub normalized_range: Range<usize>,
    /// `None` when the normalized span could not be projected back.
    pub original_range: Option<Range<usize>>,
}

/// A word of the sentence with its time span and original-text offsets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordBoundary {
    pub word: String,
    pub start_time: f64,
    pub end_time: f64,
    pub original_start_offset: usize,
    pub original_end_offset: usize,
}

impl WordBoundary {
    pub fn original_range(&self) -> Range<usize> {
        self.original_start_offset..self.original_end_offset
    }
}

/// Anything with a start and end time that can be located by time.
pub(crate) trait Timed {
    fn start_time(&self) -> f64;
    fn end_time(&self) -> f64;
}

impl Timed for TimedPhoneme {
    fn start_time(&self) -> f64 {
        self.start_time
    }

    fn end_time(&self) -> f64 {
        self.end_time
    }
}

impl Timed for WordBoundary {
    fn start_time(&self) -> f64 {
        self.start_time
    }

    fn end_time(&self) -> f64 {
        self.end_time
    }
}

/// Finds the element playing at `t` in a start-ordered sequence.
///
/// Negative or NaN times give `None`. At or past `duration` the last element
/// is returned. In a gap between elements the preceding one is returned, and
/// before the first element starts there is nothing to return.
pub(crate) fn locate<T: Timed>(items: &[T], duration: f64, t: f64) -> Option<&T> {
    if t.is_nan() || t < 0.0 {
        return None;
    }
    if t >= duration {
        return items.last();
    }

    let idx = items.partition_point(|item| item.start_time() <= t);
    if idx == 0 {
        return None;
    }
    items.get(idx - 1)
}

/// Timing of one synthesized sentence. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhonemeTimeline {
    sentence_text: String,
    normalized_text: String,
    phonemes: Vec<TimedPhoneme>,
    word_boundaries: Vec<WordBoundary>,
    duration: f64,
}

impl PhonemeTimeline {
    /// Validates ordering and builds the timeline. `duration` is raised to the
    /// last phoneme or word end if the audio came up short.
    pub fn new(
        sentence_text: String,
        normalized_text: String,
        phonemes: Vec<TimedPhoneme>,
        word_boundaries: Vec<WordBoundary>,
        duration: f64,
    ) -> Result<Self, AlignmentError> {
        check_spans(&phonemes)?;
        check_spans(&word_boundaries)?;

        let sentence_len = sentence_text.chars().count();
        for (index, pair) in word_boundaries.windows(2).enumerate() {
            if pair[1].original_start_offset < pair[0].original_end_offset {
                return Err(AlignmentError::InconsistentTiming {
                    index: index + 1,
                    reason: "words overlap in the original text".to_string(),
                });
            }
        }
        if let Some(word) = word_boundaries
            .iter()
            .find(|w| w.original_end_offset > sentence_len || w.original_start_offset > w.original_end_offset)
        {
            return Err(AlignmentError::RangeOutOfBounds {
                start: word.original_start_offset,
                end: word.original_end_offset,
                len: sentence_len,
            });
        }

        let last_end = phonemes
            .iter()
            .map(|p| p.end_time)
            .chain(word_boundaries.iter().map(|w| w.end_time))
            .fold(0.0_f64, f64::max);
        let duration = if duration.is_finite() { duration.max(last_end) } else { last_end };

        Ok(Self {
            sentence_text,
            normalized_text,
            phonemes,
            word_boundaries,
            duration,
        })
    }

    pub fn sentence_text(&self) -> &str {
        &self.sentence_text
    }

    pub fn normalized_text(&self) -> &str {
        &self.normalized_text
    }

    pub fn phonemes(&self) -> &[TimedPhoneme] {
        &self.phonemes
    }

    pub fn word_boundaries(&self) -> &[WordBoundary] {
        &self.word_boundaries
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn find_word(&self, t: f64) -> Option<&WordBoundary> {
        locate(&self.word_boundaries, self.duration, t)
    }

    pub fn find_phoneme(&self, t: f64) -> Option<&TimedPhoneme> {
        locate(&self.phonemes, self.duration, t)
    }
}

fn check_spans<T: Timed>(items: &[T]) -> Result<(), AlignmentError> {
    let mut previous_start = 0.0;
    for (index, item) in items.iter().enumerate() {
        let (start, end) = (item.start_time(), item.end_time());
        let reason = if !start.is_finite() || !end.is_finite() {
            Some("non-finite time")
        } else if start < 0.0 {
            Some("negative start time")
        } else if end < start {
            Some("ends before it starts")
        } else if start < previous_start {
            Some("starts before its predecessor")
        } else {
            None
        };

        if let Some(reason) = reason {
            return Err(AlignmentError::InconsistentTiming {
                index,
                reason: reason.to_string(),
            });
        }
        previous_start = start;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, start: f64, end: f64, offsets: Range<usize>) -> WordBoundary {
        WordBoundary {
            word: text.to_string(),
            start_time: start,
            end_time: end,
            original_start_offset: offsets.start,
            original_end_offset: offsets.end,
        }
    }

    fn timeline() -> PhonemeTimeline {
        PhonemeTimeline::new(
            "Hello big world".to_string(),
            "Hello big world".to_string(),
            Vec::new(),
            vec![
                word("Hello", 0.1, 0.4, 0..5),
                word("big", 0.5, 0.7, 6..9),
                word("world", 0.7, 1.1, 10..15),
            ],
            1.0,
        )
        .unwrap()
    }

    #[test]
    fn test_duration_raised_to_last_end() {
        assert_eq!(timeline().duration(), 1.1);
    }

    #[test]
    fn test_find_word_policy() {
        let timeline = timeline();
        let at = |t: f64| timeline.find_word(t).map(|w| w.word.as_str());

        assert_eq!(at(-0.01), None);
        assert_eq!(at(f64::NAN), None);
        assert_eq!(at(0.05), None, "leading silence has no word");
        assert_eq!(at(0.1), Some("Hello"));
        assert_eq!(at(0.39), Some("Hello"));
        assert_eq!(at(0.45), Some("Hello"), "gap keeps the previous word");
        assert_eq!(at(0.7), Some("world"));
        assert_eq!(at(1.1), Some("world"));
        assert_eq!(at(60.0), Some("world"));
    }

    #[test]
    fn test_empty_timeline_finds_nothing() {
        let empty = PhonemeTimeline::new(String::new(), String::new(), vec![], vec![], 0.0).unwrap();
        assert!(empty.find_word(0.0).is_none());
        assert!(empty.find_phoneme(3.0).is_none());
    }

    #[test]
    fn test_rejects_backwards_time() {
        let result = PhonemeTimeline::new(
            "a b".to_string(),
            "a b".to_string(),
            vec![],
            vec![word("a", 0.5, 0.6, 0..1), word("b", 0.2, 0.3, 2..3)],
            1.0,
        );
        assert!(matches!(
            result,
            Err(AlignmentError::InconsistentTiming { index: 1, .. })
        ));
    }

    #[test]
    fn test_rejects_overlapping_words() {
        let result = PhonemeTimeline::new(
            "ab".to_string(),
            "ab".to_string(),
            vec![],
            vec![word("ab", 0.0, 0.2, 0..2), word("b", 0.2, 0.3, 1..2)],
            1.0,
        );
        assert!(matches!(result, Err(AlignmentError::InconsistentTiming { .. })));
    }

    #[test]
    fn test_rejects_word_past_sentence_end() {
        let result = PhonemeTimeline::new(
            "ab".to_string(),
            "ab".to_string(),
            vec![],
            vec![word("abc", 0.0, 0.2, 0..3)],
            1.0,
        );
        assert_eq!(
            result.unwrap_err(),
            AlignmentError::RangeOutOfBounds { start: 0, end: 3, len: 2 }
        );
    }
}
