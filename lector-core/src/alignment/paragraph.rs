use serde::{Deserialize, Serialize};
use std::ops::Range;

use super::timeline::{locate, WordBoundary};
use crate::coordinator::{CoordinatorError, SentenceSynthesisResult};

/// Where one sentence sits in the concatenated paragraph audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceSpan {
    pub sentence_index: usize,
    pub start_time: f64,
    pub end_time: f64,
    pub original_range: Range<usize>,
}

/// The sentences of one paragraph joined end to end. Word times are offset by
/// the audio that precedes them and word offsets are in paragraph characters.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParagraphSynthesisResult {
    pub paragraph_index: usize,
    pub sentences: Vec<SentenceSpan>,
    pub words: Vec<WordBoundary>,
    pub duration: f64,
}

impl ParagraphSynthesisResult {
    pub fn new(paragraph_index: usize) -> Self {
        Self {
            paragraph_index,
            ..Self::default()
        }
    }

    /// Appends the next sentence. Sentences must belong to this paragraph and
    /// arrive in increasing order; skipped (failed) indices are fine.
    pub fn push(&mut self, result: &SentenceSynthesisResult) -> Result<(), CoordinatorError> {
        if result.paragraph_index != self.paragraph_index {
            return Err(CoordinatorError::CacheConsistency(format!(
                "sentence {} belongs to paragraph {}, not {}",
                result.key(),
                result.paragraph_index,
                self.paragraph_index
            )));
        }
        if let Some(last) = self.sentences.last() {
            if result.sentence_index <= last.sentence_index {
                return Err(CoordinatorError::CacheConsistency(format!(
                    "sentence {} appended after sentence {}",
                    result.sentence_index, last.sentence_index
                )));
            }
        }

        let offset_time = self.duration;
        let offset_chars = result.chunk.original_range.start;
        let duration = result.duration();

        if let Some(timeline) = &result.timeline {
            self.words.extend(timeline.word_boundaries().iter().map(|word| WordBoundary {
                word: word.word.clone(),
                start_time: word.start_time + offset_time,
                end_time: word.end_time + offset_time,
                original_start_offset: word.original_start_offset + offset_chars,
                original_end_offset: word.original_end_offset + offset_chars,
            }));
        }

        self.sentences.push(SentenceSpan {
            sentence_index: result.sentence_index,
            start_time: offset_time,
            end_time: offset_time + duration,
            original_range: result.chunk.original_range.clone(),
        });
        self.duration = offset_time + duration;
        Ok(())
    }

    /// Same lookup rules as [`PhonemeTimeline::find_word`](super::PhonemeTimeline::find_word),
    /// over paragraph time.
    pub fn find_word(&self, t: f64) -> Option<&WordBoundary> {
        locate(&self.words, self.duration, t)
    }

    pub fn find_sentence(&self, t: f64) -> Option<&SentenceSpan> {
        if t.is_nan() || t < 0.0 {
            return None;
        }
        if t >= self.duration {
            return self.sentences.last();
        }
        let idx = self.sentences.partition_point(|s| s.start_time <= t);
        idx.checked_sub(1).and_then(|i| self.sentences.get(i))
    }
}
