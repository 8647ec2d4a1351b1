use anyhow::Result;
use lector_core::coordinator::SentenceKey;
use lector_core::playback::{
    AudioOutput, HighlightTarget, PlaybackConsumer, PlaybackEvent, PlaybackHandle, PlaybackOutcome,
};
use lector_core::settings::HighlightGranularity;
use lector_core::synthesis::AudioBuffer;
use std::cell::Cell;
use std::time::Duration;

mod fixture;

use fixture::Fixture;

/// Advances by `step` seconds each time the position is read, so playback
/// runs as fast as the consumer polls. A zero step never finishes.
struct FakeOutput {
    step: f64,
}

struct FakeHandle {
    duration: f64,
    position: Cell<f64>,
    step: f64,
}

impl AudioOutput for FakeOutput {
    type Handle = FakeHandle;

    fn play(&mut self, audio: &AudioBuffer) -> Result<FakeHandle> {
        Ok(FakeHandle {
            duration: audio.duration(),
            position: Cell::new(0.0),
            step: self.step,
        })
    }
}

impl PlaybackHandle for FakeHandle {
    fn elapsed(&self) -> f64 {
        let now = self.position.get();
        self.position.set(now + self.step);
        now
    }

    fn is_finished(&self) -> bool {
        self.step > 0.0 && self.position.get() >= self.duration
    }
}

#[test]
fn test_plays_document_and_follows_words() {
    fixture::run(
        || Fixture::new(&["Dr. Smith arrived. He left.", "Bye now."]),
        |fixture| async move {
            let (consumer, mut events) =
                PlaybackConsumer::new(fixture.coordinator.clone(), FakeOutput { step: 0.02 }, 2);
            let mut consumer = consumer
                .with_highlight(HighlightGranularity::Word)
                .with_poll_interval(Duration::from_millis(1));

            let outcome = consumer.play_from(SentenceKey::start_of(0)).await.unwrap();
            assert_eq!(outcome, PlaybackOutcome::Completed);

            let mut received = Vec::new();
            while let Ok(event) = events.try_recv() {
                received.push(event);
            }

            let words: Vec<(String, std::ops::Range<usize>)> = received
                .iter()
                .filter_map(|e| match e {
                    PlaybackEvent::Highlight(HighlightTarget::Word { word, range, .. }) => {
                        Some((word.clone(), range.clone()))
                    }
                    _ => None,
                })
                .collect();
            assert_eq!(words[0], ("Dr.".to_string(), 0..3));
            assert!(words.contains(&("He".to_string(), 19..21)));
            assert!(words.contains(&("now.".to_string(), 4..8)));

            let finished: Vec<SentenceKey> = received
                .iter()
                .filter_map(|e| match e {
                    PlaybackEvent::SentenceFinished(key) => Some(*key),
                    _ => None,
                })
                .collect();
            assert_eq!(
                finished,
                vec![SentenceKey::new(0, 0), SentenceKey::new(0, 1), SentenceKey::new(1, 0)]
            );
            assert!(received.contains(&PlaybackEvent::ParagraphFinished(1)));
        },
    );
}

#[test]
fn test_reset_interrupts_playing_sentence() {
    fixture::run(
        || Fixture::new(&["One two. Three four."]),
        |fixture| async move {
            let (consumer, mut events) =
                PlaybackConsumer::new(fixture.coordinator.clone(), FakeOutput { step: 0.0 }, 1);
            let mut consumer = consumer
                .with_highlight(HighlightGranularity::Sentence)
                .with_poll_interval(Duration::from_millis(1));

            let playing = tokio::task::spawn_local(async move {
                consumer.play_from(SentenceKey::start_of(0)).await
            });

            loop {
                match events.recv().await {
                    Some(PlaybackEvent::Highlight(HighlightTarget::Sentence { key, range })) => {
                        assert_eq!(key, SentenceKey::new(0, 0));
                        assert_eq!(range, 0..8);
                        break;
                    }
                    Some(_) => continue,
                    None => panic!("Consumer stopped before playing"),
                }
            }

            fixture.coordinator.reset().await.unwrap();

            let outcome = playing.await.unwrap().unwrap();
            assert_eq!(
                outcome,
                PlaybackOutcome::Interrupted {
                    resume_at: Some(SentenceKey::new(0, 0))
                }
            );
        },
    );
}
