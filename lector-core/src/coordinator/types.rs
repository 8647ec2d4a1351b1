use serde::{Deserialize, Serialize};
use std::fmt;

use crate::alignment::PhonemeTimeline;
use crate::synthesis::AudioBuffer;
use crate::text::TextChunk;

/// Position of a sentence in the document. Orders by paragraph, then sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SentenceKey {
    pub paragraph: usize,
    pub sentence: usize,
}

impl SentenceKey {
    pub fn new(paragraph: usize, sentence: usize) -> Self {
        Self {
            paragraph,
            sentence,
        }
    }

    pub fn start_of(paragraph: usize) -> Self {
        Self::new(paragraph, 0)
    }

    /// The last possible key of a paragraph, for range eviction.
    pub fn end_of(paragraph: usize) -> Self {
        Self::new(paragraph, usize::MAX)
    }

    pub fn next_sentence(self) -> Self {
        Self::new(self.paragraph, self.sentence + 1)
    }
}

impl fmt::Display for SentenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.paragraph, self.sentence)
    }
}

/// One synthesized sentence. Moved out of the cache when handed to the
/// consumer, never copied. `timeline` is `None` when alignment failed or was
/// not requested; the audio is still playable.
pub struct SentenceSynthesisResult {
    pub chunk: TextChunk,
    pub audio: AudioBuffer,
    pub timeline: Option<PhonemeTimeline>,
    pub paragraph_index: usize,
    pub sentence_index: usize,
}

impl SentenceSynthesisResult {
    pub fn key(&self) -> SentenceKey {
        SentenceKey::new(self.paragraph_index, self.sentence_index)
    }

    /// Playback length of the audio in seconds.
    pub fn duration(&self) -> f64 {
        self.audio.duration()
    }
}

impl fmt::Debug for SentenceSynthesisResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SentenceSynthesisResult")
            .field("key", &self.key())
            .field("text", &self.chunk.text)
            .field("duration", &self.duration())
            .field("has_timeline", &self.timeline.is_some())
            .finish()
    }
}
