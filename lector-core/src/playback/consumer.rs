//! The consumer side of the coordinator: play sentences in order, follow the
//! playing word, and report each sentence back when it is done.

use anyhow::Result;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::coordinator::{SentenceKey, SentenceSynthesisResult, SynthesisCoordinator};
use crate::settings::HighlightGranularity;
use crate::synthesis::AudioBuffer;

/// Something that can play PCM audio.
pub trait AudioOutput {
    type Handle: PlaybackHandle;

    /// Starts playing `audio` and returns immediately.
    fn play(&mut self, audio: &AudioBuffer) -> Result<Self::Handle>;
}

/// A buffer being played. Dropping it stops playback.
pub trait PlaybackHandle {
    /// Seconds of this buffer played so far.
    fn elapsed(&self) -> f64;

    fn is_finished(&self) -> bool;
}

/// What to highlight in the source text. Ranges are paragraph characters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HighlightTarget {
    Paragraph { paragraph: usize },
    Sentence { key: SentenceKey, range: Range<usize> },
    Word { key: SentenceKey, word: String, range: Range<usize> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum PlaybackEvent {
    Highlight(HighlightTarget),
    SentenceFinished(SentenceKey),
    ParagraphFinished(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Played through the last paragraph.
    Completed,
    /// The coordinator was reset or reconfigured mid-way. `resume_at` is the
    /// sentence that was playing, if any.
    Interrupted { resume_at: Option<SentenceKey> },
}

pub struct PlaybackConsumer<O> {
    coordinator: SynthesisCoordinator,
    output: O,
    paragraphs: usize,
    highlight: HighlightGranularity,
    poll_interval: Duration,
    events: mpsc::UnboundedSender<PlaybackEvent>,
}

impl<O: AudioOutput> PlaybackConsumer<O> {
    pub fn new(
        coordinator: SynthesisCoordinator,
        output: O,
        paragraphs: usize,
    ) -> (Self, mpsc::UnboundedReceiver<PlaybackEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                coordinator,
                output,
                paragraphs,
                highlight: HighlightGranularity::default(),
                poll_interval: Duration::from_millis(20),
                events,
            },
            rx,
        )
    }

    pub fn with_highlight(mut self, highlight: HighlightGranularity) -> Self {
        self.highlight = highlight;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Plays from `start` to the end of the document, or until the
    /// coordinator's session changes underneath.
    pub async fn play_from(&mut self, start: SentenceKey) -> Result<PlaybackOutcome> {
        let mut paragraph = start.paragraph;
        let mut sentence = start.sentence;

        while paragraph < self.paragraphs {
            if self.highlight == HighlightGranularity::Paragraph {
                self.emit(PlaybackEvent::Highlight(HighlightTarget::Paragraph { paragraph }));
            }

            let mut stream = self.coordinator.stream_from(paragraph, sentence);
            while let Some(result) = stream.next().await {
                let key = result.key();
                if !self.play_sentence(&result, || stream.is_active()).await? {
                    info!(%key, "Playback interrupted");
                    return Ok(PlaybackOutcome::Interrupted {
                        resume_at: Some(key),
                    });
                }
                stream.report_finished(key.sentence)?;
                self.emit(PlaybackEvent::SentenceFinished(key));
            }

            if !stream.is_active() {
                return Ok(PlaybackOutcome::Interrupted { resume_at: None });
            }

            self.emit(PlaybackEvent::ParagraphFinished(paragraph));
            paragraph += 1;
            sentence = 0;
        }

        Ok(PlaybackOutcome::Completed)
    }

    /// Plays one sentence to the end. Returns false if `active` turned false
    /// first.
    async fn play_sentence(
        &mut self,
        result: &SentenceSynthesisResult,
        active: impl Fn() -> bool,
    ) -> Result<bool> {
        let key = result.key();
        let offset = result.chunk.original_range.start;
        let words = match (&result.timeline, self.highlight) {
            (Some(timeline), HighlightGranularity::Word) => Some(timeline),
            _ => None,
        };

        let sentence_highlight = match self.highlight {
            HighlightGranularity::Sentence => true,
            HighlightGranularity::Word => words.is_none(),
            _ => false,
        };
        if sentence_highlight {
            self.emit(PlaybackEvent::Highlight(HighlightTarget::Sentence {
                key,
                range: result.chunk.original_range.clone(),
            }));
        }

        debug!(%key, seconds = result.duration(), "Playing sentence");
        let handle = self.output.play(&result.audio)?;
        let mut last_word: Option<Range<usize>> = None;

        loop {
            if !active() {
                return Ok(false);
            }

            let position = handle.elapsed();
            if let Some(word) = words.and_then(|timeline| timeline.find_word(position)) {
                let range = word.original_start_offset + offset..word.original_end_offset + offset;
                if last_word.as_ref() != Some(&range) {
                    self.emit(PlaybackEvent::Highlight(HighlightTarget::Word {
                        key,
                        word: word.word.clone(),
                        range: range.clone(),
                    }));
                    last_word = Some(range);
                }
            }

            if handle.is_finished() {
                return Ok(true);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    fn emit(&self, event: PlaybackEvent) {
        let _ = self.events.send(event);
    }
}
