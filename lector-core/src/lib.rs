pub mod alignment;
pub mod coordinator;
pub mod document;
pub mod playback;
pub mod settings;
pub mod synthesis;
pub mod text;

// Entry points most callers need. Everything else is reachable through the
// modules above.
pub use alignment::{align, OffsetMapping, ParagraphSynthesisResult, PhonemeTimeline, WordBoundary};
pub use coordinator::{
    CoordinatorBuilder, CoordinatorEvent, SentenceKey, SentenceStream, SentenceSynthesisResult,
    SynthesisCoordinator,
};
pub use document::Document;
pub use playback::{AudioOutput, PlaybackConsumer, PlaybackEvent};
pub use settings::{Settings, SettingsManager};
pub use synthesis::{create_synthesizer, Synthesizer};
pub use text::{split_sentences, TextChunk, TextNormalizer};
