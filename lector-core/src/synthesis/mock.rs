use anyhow::anyhow;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::TAU;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};

use super::error::SynthesisError;
use super::provider::Synthesizer;
use super::types::{
    AudioBuffer, PhonemeEvent, SynthesisEvent, SynthesisRequest, SynthesisStream, SynthesizedAudio,
};

pub const MOCK_SAMPLE_RATE: u32 = 16_000;
const PHONEME_SECONDS: f64 = 0.05;
const WORD_GAP_SECONDS: f64 = 0.03;
const TRAILING_PAUSE_SECONDS: f64 = 0.1;

/// Mock behavior for the mock synthesizer
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum MockBehavior {
    /// Audio plus one phoneme per letter or digit
    #[default]
    Success,
    /// Audio without any phoneme timing
    NoTiming,
    /// Phonemes that run backwards in time
    InconsistentTiming,
    /// Fail any request whose text contains `marker`
    FailContaining { marker: String },
    /// Fail every request
    AlwaysFail,
    /// Panic on any request whose text contains `marker`
    PanicContaining { marker: String },
    /// Succeed, but deliver streamed audio in `chunks` pieces
    Streaming { chunks: usize },
    /// Use each behavior once in order, then `Success`
    BehaviorQueue { behaviors: Vec<MockBehavior> },
}

/// Deterministic synthesizer for tests and dry runs.
///
/// A gated mock blocks every request until [`MockSynthesizer::release`] hands
/// out a permit, which lets tests hold a sentence "in flight".
#[derive(Clone)]
pub struct MockSynthesizer {
    behavior: Arc<Mutex<MockBehavior>>,
    requests: Arc<Mutex<Vec<SynthesisRequest>>>,
    gate: Option<Arc<Semaphore>>,
    delay: Duration,
    random_delay: Option<(Arc<Mutex<StdRng>>, Duration)>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockSynthesizer {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior: Arc::new(Mutex::new(behavior)),
            requests: Arc::new(Mutex::new(Vec::new())),
            gate: None,
            delay: Duration::ZERO,
            random_delay: None,
        }
    }

    pub fn gated(behavior: MockBehavior) -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::new(behavior)
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Adds a uniformly random delay of up to `max` per request, reproducible
    /// from `seed`.
    pub fn with_random_delay(mut self, seed: u64, max: Duration) -> Self {
        self.random_delay = Some((Arc::new(Mutex::new(StdRng::seed_from_u64(seed))), max));
        self
    }

    /// Lets `permits` more requests through a gated mock.
    pub fn release(&self, permits: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(permits);
        }
    }

    pub fn set_behavior(&self, behavior: MockBehavior) {
        *lock(&self.behavior) = behavior;
    }

    pub fn requests(&self) -> Vec<SynthesisRequest> {
        lock(&self.requests).clone()
    }

    pub fn request_texts(&self) -> Vec<String> {
        lock(&self.requests).iter().map(|r| r.text.clone()).collect()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Waits until at least `count` requests have arrived.
    pub async fn wait_for_requests(&self, count: usize) {
        while self.request_count() < count {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    fn next_behavior(&self) -> MockBehavior {
        let mut behavior = lock(&self.behavior);
        if let MockBehavior::BehaviorQueue { behaviors } = &mut *behavior {
            if behaviors.is_empty() {
                return MockBehavior::Success;
            }
            return behaviors.remove(0);
        }
        behavior.clone()
    }

    /// Records the request, then waits on the gate and any configured delay.
    async fn admit(&self, request: &SynthesisRequest) -> Result<MockBehavior, SynthesisError> {
        lock(&self.requests).push(request.clone());
        let behavior = self.next_behavior();

        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| SynthesisError::Engine(anyhow!("Mock gate closed: {e}")))?;
            permit.forget();
        }

        let mut delay = self.delay;
        if let Some((rng, max)) = &self.random_delay {
            let max_ms = max.as_millis() as u64;
            if max_ms > 0 {
                delay += Duration::from_millis(lock(rng).gen_range(0..=max_ms));
            }
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        Ok(behavior)
    }
}

/// Renders `text` as a quiet tone with one phoneme per letter or digit.
pub fn render(text: &str, speed: f32) -> Result<SynthesizedAudio, SynthesisError> {
    let speed = if speed.is_finite() && speed > 0.0 { speed as f64 } else { 1.0 };
    let phoneme_len = PHONEME_SECONDS / speed;
    let gap_len = WORD_GAP_SECONDS / speed;

    let mut phonemes = Vec::new();
    let mut t = 0.0;
    for (index, c) in text.chars().enumerate() {
        if c.is_alphanumeric() {
            phonemes.push(PhonemeEvent {
                symbol: c.to_lowercase().to_string(),
                start_time: t,
                end_time: t + phoneme_len,
                char_start: index,
                char_end: index + 1,
            });
            t += phoneme_len;
        } else if c.is_whitespace() {
            t += gap_len;
        }
    }

    if phonemes.is_empty() {
        return Err(SynthesisError::EmptyAudio);
    }

    let total = t + TRAILING_PAUSE_SECONDS / speed;
    let frames = (total * MOCK_SAMPLE_RATE as f64).ceil() as usize;
    let samples: Vec<i16> = (0..frames)
        .map(|n| ((TAU * 220.0 * n as f64 / MOCK_SAMPLE_RATE as f64).sin() * 2_000.0) as i16)
        .collect();

    Ok(SynthesizedAudio {
        audio: AudioBuffer::from_samples(&samples, MOCK_SAMPLE_RATE, 1),
        phonemes: Some(phonemes),
    })
}

fn respond(behavior: &MockBehavior, request: &SynthesisRequest) -> Result<SynthesizedAudio, SynthesisError> {
    match behavior {
        MockBehavior::AlwaysFail => Err(SynthesisError::Engine(anyhow!("Mock synthesis failure"))),
        MockBehavior::FailContaining { marker } if request.text.contains(marker.as_str()) => Err(
            SynthesisError::Engine(anyhow!("Mock synthesis failure for '{marker}'")),
        ),
        MockBehavior::PanicContaining { marker } if request.text.contains(marker.as_str()) => {
            panic!("Mock synthesizer panicked on '{marker}'")
        }
        MockBehavior::NoTiming => {
            let mut result = render(&request.text, request.speed)?;
            result.phonemes = None;
            Ok(result)
        }
        MockBehavior::InconsistentTiming => {
            let mut result = render(&request.text, request.speed)?;
            if let Some(phonemes) = result.phonemes.as_mut() {
                let times: Vec<(f64, f64)> = phonemes.iter().rev().map(|p| (p.start_time, p.end_time)).collect();
                for (phoneme, (start, end)) in phonemes.iter_mut().zip(times) {
                    phoneme.start_time = start;
                    phoneme.end_time = end;
                }
            }
            Ok(result)
        }
        _ => render(&request.text, request.speed),
    }
}

#[async_trait]
impl Synthesizer for MockSynthesizer {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesizedAudio, SynthesisError> {
        let behavior = self.admit(request).await?;
        respond(&behavior, request)
    }

    async fn synthesize_stream(&self, request: &SynthesisRequest) -> Result<SynthesisStream, SynthesisError> {
        let behavior = self.admit(request).await?;
        let result = respond(&behavior, request)?;

        let chunks = match behavior {
            MockBehavior::Streaming { chunks } => chunks.max(1),
            _ => 1,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let frame_bytes = 2 * result.audio.channels as usize;
        let frames_per_chunk = result.audio.frames().div_ceil(chunks);
        for piece in result.audio.pcm_data.chunks((frames_per_chunk * frame_bytes).max(frame_bytes)) {
            let _ = tx.send(Ok(SynthesisEvent::Audio(AudioBuffer {
                pcm_data: piece.to_vec(),
                sample_rate: result.audio.sample_rate,
                channels: result.audio.channels,
            })));
        }
        if let Some(phonemes) = result.phonemes {
            let _ = tx.send(Ok(SynthesisEvent::Phonemes(phonemes)));
        }
        let _ = tx.send(Ok(SynthesisEvent::Finished));
        Ok(SynthesisStream::new(rx))
    }
}
