use thiserror::Error;

/// Reasons a sentence's timing could not be turned into a timeline. None of
/// these are fatal: the sentence still plays, it just cannot be highlighted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AlignmentError {
    #[error("Synthesizer returned no phoneme timing")]
    NoTiming,

    #[error("Inconsistent timing at phoneme {index}: {reason}")]
    InconsistentTiming { index: usize, reason: String },

    #[error("Range {start}..{end} is outside text of length {len}")]
    RangeOutOfBounds { start: usize, end: usize, len: usize },

    #[error("No words could be aligned")]
    NoWords,
}
