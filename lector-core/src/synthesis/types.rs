use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::error::SynthesisError;

/// Interleaved signed 16-bit little-endian PCM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBuffer {
    pub pcm_data: Vec<u8>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioBuffer {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            pcm_data: Vec::new(),
            sample_rate,
            channels,
        }
    }

    pub fn from_samples(samples: &[i16], sample_rate: u32, channels: u16) -> Self {
        Self {
            pcm_data: samples.iter().flat_map(|s| s.to_le_bytes()).collect(),
            sample_rate,
            channels,
        }
    }

    /// A buffer of zeros lasting `seconds`, rounded down to whole frames.
    pub fn silence(seconds: f64, sample_rate: u32, channels: u16) -> Self {
        let frames = (seconds.max(0.0) * sample_rate as f64) as usize;
        Self {
            pcm_data: vec![0; frames * channels as usize * 2],
            sample_rate,
            channels,
        }
    }

    pub fn samples(&self) -> Vec<i16> {
        self.pcm_data
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    }

    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.pcm_data.len() / (2 * self.channels as usize)
    }

    /// Playback length in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.pcm_data.is_empty()
    }

    pub fn same_format(&self, other: &AudioBuffer) -> bool {
        self.sample_rate == other.sample_rate && self.channels == other.channels
    }

    pub fn append(&mut self, other: &AudioBuffer) -> Result<(), SynthesisError> {
        if !self.same_format(other) {
            return Err(SynthesisError::FormatMismatch(format!(
                "{} Hz x{} then {} Hz x{}",
                self.sample_rate, self.channels, other.sample_rate, other.channels
            )));
        }
        self.pcm_data.extend_from_slice(&other.pcm_data);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisRequest {
    /// Normalized text; phoneme offsets refer to its characters.
    pub text: String,
    pub voice: Option<String>,
    pub speed: f32,
    pub want_timing: bool,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: None,
            speed: 1.0,
            want_timing: true,
        }
    }
}

/// A phoneme as the engine reports it: seconds from the start of the
/// utterance and character offsets into the request text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhonemeEvent {
    pub symbol: String,
    pub start_time: f64,
    pub end_time: f64,
    pub char_start: usize,
    pub char_end: usize,
}

#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub audio: AudioBuffer,
    /// `None` when the engine does not report timing.
    pub phonemes: Option<Vec<PhonemeEvent>>,
}

/// Incremental output of a streaming synthesis.
#[derive(Debug, Clone)]
pub enum SynthesisEvent {
    Audio(AudioBuffer),
    Phonemes(Vec<PhonemeEvent>),
    Finished,
}

/// Handle for receiving synthesis output as it is produced
pub struct SynthesisStream {
    receiver: mpsc::UnboundedReceiver<Result<SynthesisEvent, SynthesisError>>,
}

impl SynthesisStream {
    pub fn new(receiver: mpsc::UnboundedReceiver<Result<SynthesisEvent, SynthesisError>>) -> Self {
        Self { receiver }
    }

    /// Receive the next event. Returns None when the producer went away.
    pub async fn recv(&mut self) -> Option<Result<SynthesisEvent, SynthesisError>> {
        self.receiver.recv().await
    }
}

/// Wraps a finished batch result as a stream of events.
pub fn stream_from_batch(result: SynthesizedAudio) -> SynthesisStream {
    let (tx, rx) = mpsc::unbounded_channel();
    let _ = tx.send(Ok(SynthesisEvent::Audio(result.audio)));
    if let Some(phonemes) = result.phonemes {
        let _ = tx.send(Ok(SynthesisEvent::Phonemes(phonemes)));
    }
    let _ = tx.send(Ok(SynthesisEvent::Finished));
    SynthesisStream::new(rx)
}

/// Drains a stream into a single result. Audio chunks must share a format and
/// the stream must end with `Finished`.
pub async fn collect_stream(mut stream: SynthesisStream) -> Result<SynthesizedAudio, SynthesisError> {
    let mut audio: Option<AudioBuffer> = None;
    let mut phonemes: Option<Vec<PhonemeEvent>> = None;

    loop {
        match stream.recv().await {
            Some(Ok(SynthesisEvent::Audio(chunk))) => match audio.as_mut() {
                Some(buffer) => buffer.append(&chunk)?,
                None => audio = Some(chunk),
            },
            Some(Ok(SynthesisEvent::Phonemes(batch))) => {
                phonemes.get_or_insert_with(Vec::new).extend(batch);
            }
            Some(Ok(SynthesisEvent::Finished)) => break,
            Some(Err(e)) => return Err(e),
            None => return Err(SynthesisError::StreamClosed),
        }
    }

    match audio {
        Some(audio) if !audio.is_empty() => Ok(SynthesizedAudio { audio, phonemes }),
        _ => Err(SynthesisError::EmptyAudio),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phoneme(symbol: &str, start: f64) -> PhonemeEvent {
        PhonemeEvent {
            symbol: symbol.to_string(),
            start_time: start,
            end_time: start + 0.1,
            char_start: 0,
            char_end: 1,
        }
    }

    #[test]
    fn test_duration_counts_frames() {
        let stereo = AudioBuffer::from_samples(&[0; 48_000], 24_000, 2);
        assert_eq!(stereo.frames(), 24_000);
        assert_eq!(stereo.duration(), 1.0);
        assert_eq!(AudioBuffer::new(0, 1).duration(), 0.0);
    }

    #[test]
    fn test_samples_are_little_endian() {
        let buffer = AudioBuffer::from_samples(&[1, -2, i16::MAX], 16_000, 1);
        assert_eq!(&buffer.pcm_data[..2], &[1, 0]);
        assert_eq!(buffer.samples(), vec![1, -2, i16::MAX]);
    }

    #[tokio::test]
    async fn test_collect_joins_chunks_and_phonemes() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Ok(SynthesisEvent::Audio(AudioBuffer::silence(0.5, 16_000, 1)))).unwrap();
        tx.send(Ok(SynthesisEvent::Phonemes(vec![phoneme("a", 0.0)]))).unwrap();
        tx.send(Ok(SynthesisEvent::Audio(AudioBuffer::silence(0.25, 16_000, 1)))).unwrap();
        tx.send(Ok(SynthesisEvent::Phonemes(vec![phoneme("b", 0.5)]))).unwrap();
        tx.send(Ok(SynthesisEvent::Finished)).unwrap();

        let result = collect_stream(SynthesisStream::new(rx)).await.unwrap();
        assert_eq!(result.audio.duration(), 0.75);
        assert_eq!(result.phonemes.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_collect_rejects_truncated_stream() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Ok(SynthesisEvent::Audio(AudioBuffer::silence(0.5, 16_000, 1)))).unwrap();
        drop(tx);

        let result = collect_stream(SynthesisStream::new(rx)).await;
        assert!(matches!(result, Err(SynthesisError::StreamClosed)));
    }

    #[tokio::test]
    async fn test_collect_rejects_format_change() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Ok(SynthesisEvent::Audio(AudioBuffer::silence(0.5, 16_000, 1)))).unwrap();
        tx.send(Ok(SynthesisEvent::Audio(AudioBuffer::silence(0.5, 22_050, 1)))).unwrap();
        tx.send(Ok(SynthesisEvent::Finished)).unwrap();

        let result = collect_stream(SynthesisStream::new(rx)).await;
        assert!(matches!(result, Err(SynthesisError::FormatMismatch(_))));
    }

    #[tokio::test]
    async fn test_batch_round_trips_through_stream() {
        let batch = SynthesizedAudio {
            audio: AudioBuffer::silence(0.1, 16_000, 1),
            phonemes: None,
        };
        let result = collect_stream(stream_from_batch(batch)).await.unwrap();
        assert!(result.phonemes.is_none());
        assert_eq!(result.audio.frames(), 1_600);
    }

    #[tokio::test]
    async fn test_empty_audio_is_an_error() {
        let batch = SynthesizedAudio {
            audio: AudioBuffer::new(16_000, 1),
            phonemes: None,
        };
        let result = collect_stream(stream_from_batch(batch)).await;
        assert!(matches!(result, Err(SynthesisError::EmptyAudio)));
    }
}
