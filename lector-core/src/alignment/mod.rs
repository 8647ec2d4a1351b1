pub mod aligner;
pub mod error;
pub mod paragraph;
pub mod remap;
pub mod timeline;

pub use aligner::align;
pub use error::AlignmentError;
pub use paragraph::ParagraphSynthesisResult;
pub use remap::{map_to_normalized, map_to_original, OffsetMapping};
pub use timeline::{PhonemeTimeline, TimedPhoneme, WordBoundary};
