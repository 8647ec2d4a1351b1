pub mod normalizer;
pub mod numbers;
pub mod splitter;

pub use normalizer::{NormalizedText, TextNormalizer};
pub use splitter::{split_sentences, TextChunk};
