use thiserror::Error;

use super::types::SentenceKey;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("Coordinator has shut down")]
    Closed,

    /// A broken ordering or capacity invariant. Always a bug.
    #[error("Cache consistency violation: {0}")]
    CacheConsistency(String),

    #[error("No synthesizer configured")]
    MissingSynthesizer,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache is full ({capacity} entries)")]
    Full { capacity: usize },

    #[error("Sentence {key} inserted after {last}")]
    OutOfOrder { key: SentenceKey, last: SentenceKey },

    #[error("Sentence {key} would add a third paragraph to the cache")]
    TooManyParagraphs { key: SentenceKey },
}

impl From<CacheError> for CoordinatorError {
    fn from(source: CacheError) -> Self {
        Self::CacheConsistency(source.to_string())
    }
}
