use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::state::Phase;
use super::types::SentenceKey;

/// `CoordinatorEvent`s are the coordinator's output besides the sentences
/// themselves. They are informational: nothing the consumer does depends on
/// reading them, but UIs render progress and errors from them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "data")]
pub enum CoordinatorEvent {
    PhaseChanged(Phase),
    DocumentLoaded {
        document_id: String,
        paragraphs: usize,
    },
    SentenceReady {
        paragraph: usize,
        sentence: usize,
        has_timeline: bool,
    },
    SentenceFailed {
        paragraph: usize,
        sentence: usize,
        error: String,
    },
    /// The sentence will play without word highlighting.
    AlignmentUnavailable {
        paragraph: usize,
        sentence: usize,
        reason: String,
    },
    PrefetchStarted {
        paragraph: usize,
    },
    ParagraphFinished {
        paragraph: usize,
        next: Option<usize>,
    },
    /// Every sentence of a paragraph failed to synthesize.
    PlaybackError {
        paragraph: usize,
        message: String,
    },
    ProductionCancelled,
    ConfigApplied {
        resume: SentenceKey,
    },
}

/// A small wrapper over the event channel. Sends never fail: nobody listening
/// is fine.
#[derive(Clone)]
pub struct EventSender {
    event_tx: mpsc::UnboundedSender<CoordinatorEvent>,
}

impl EventSender {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CoordinatorEvent>) {
        let (event_tx, rx) = mpsc::unbounded_channel();
        (Self { event_tx }, rx)
    }

    pub fn send(&self, event: CoordinatorEvent) {
        let _ = self.event_tx.send(event);
    }
}
