use tracing::debug;

use super::types::SentenceSynthesisResult;
use crate::alignment::{align, AlignmentError};
use crate::settings::PlaybackConfig;
use crate::synthesis::{collect_stream, SynthesisError, SynthesisRequest, Synthesizer};
use crate::text::{TextChunk, TextNormalizer};

/// A synthesized sentence and, when highlighting wanted timing but none
/// could be built, the reason.
pub(crate) struct Produced {
    pub result: SentenceSynthesisResult,
    pub alignment_error: Option<AlignmentError>,
}

/// Normalizes, synthesizes and aligns one sentence. Alignment problems are
/// reported alongside the result rather than failing it.
pub(crate) async fn produce_sentence(
    synthesizer: &dyn Synthesizer,
    normalizer: &TextNormalizer,
    playback: &PlaybackConfig,
    chunk: TextChunk,
) -> Result<Produced, SynthesisError> {
    let normalized = normalizer.normalize(&chunk.text);
    let request = SynthesisRequest {
        text: normalized.text.clone(),
        voice: playback.voice.clone(),
        speed: playback.speed,
        want_timing: playback.highlight.needs_timing(),
    };

    let stream = synthesizer.synthesize_stream(&request).await?;
    let synthesized = collect_stream(stream).await?;
    debug!(
        paragraph = chunk.paragraph_index,
        sentence = chunk.sentence_index,
        seconds = synthesized.audio.duration(),
        "Sentence synthesized"
    );

    let (timeline, alignment_error) = match (request.want_timing, synthesized.phonemes) {
        (false, _) => (None, None),
        (true, None) => (None, Some(AlignmentError::NoTiming)),
        (true, Some(events)) => {
            match align(&chunk.text, &normalized, &events, synthesized.audio.duration()) {
                Ok(timeline) => (Some(timeline), None),
                Err(e) => (None, Some(e)),
            }
        }
    };

    Ok(Produced {
        result: SentenceSynthesisResult {
            paragraph_index: chunk.paragraph_index,
            sentence_index: chunk.sentence_index,
            chunk,
            audio: synthesized.audio,
            timeline,
        },
        alignment_error,
    })
}
