use async_trait::async_trait;

use super::error::SynthesisError;
use super::types::{stream_from_batch, SynthesisRequest, SynthesisStream, SynthesizedAudio};

/// Trait for speech synthesis engines
#[async_trait]
pub trait Synthesizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Synthesize a whole utterance at once
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesizedAudio, SynthesisError>;

    /// Synthesize incrementally. Engines that only work in batch get this
    /// adapter for free.
    async fn synthesize_stream(&self, request: &SynthesisRequest) -> Result<SynthesisStream, SynthesisError> {
        let result = self.synthesize(request).await?;
        Ok(stream_from_batch(result))
    }
}
