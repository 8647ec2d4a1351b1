use anyhow::anyhow;
use thiserror::Error;

/// Failure to synthesize one sentence. The coordinator logs it and skips the
/// sentence.
#[derive(Error, Debug)]
pub enum SynthesisError {
    #[error("Synthesis engine error: {0}")]
    Engine(anyhow::Error),

    #[error("Synthesizer produced no audio")]
    EmptyAudio,

    #[error("Synthesis stream closed before it finished")]
    StreamClosed,

    #[error("Audio format changed mid-stream: {0}")]
    FormatMismatch(String),
}

impl From<serde_json::Error> for SynthesisError {
    fn from(source: serde_json::Error) -> Self {
        Self::Engine(anyhow!(source))
    }
}

impl From<std::io::Error> for SynthesisError {
    fn from(source: std::io::Error) -> Self {
        Self::Engine(anyhow!(source))
    }
}
