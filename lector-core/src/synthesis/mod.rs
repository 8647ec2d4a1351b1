pub mod error;
pub mod mock;
pub mod provider;
pub mod sidecar;
pub mod types;

use std::sync::Arc;

pub use error::SynthesisError;
pub use mock::{MockBehavior, MockSynthesizer};
pub use provider::Synthesizer;
pub use sidecar::SidecarSynthesizer;
pub use types::{
    collect_stream, stream_from_batch, AudioBuffer, PhonemeEvent, SynthesisEvent, SynthesisRequest,
    SynthesisStream, SynthesizedAudio,
};

use crate::settings::SynthesizerConfig;

/// Builds the synthesizer described by a settings entry.
pub fn create_synthesizer(config: &SynthesizerConfig) -> anyhow::Result<Arc<dyn Synthesizer>> {
    match config {
        SynthesizerConfig::Sidecar { command } => Ok(Arc::new(SidecarSynthesizer::new(command)?)),
        SynthesizerConfig::Mock { behavior } => Ok(Arc::new(MockSynthesizer::new(behavior.clone()))),
    }
}
