use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use strum::Display;

use super::types::SentenceKey;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    /// Nothing in flight: no document, cache full, lookahead limit reached or
    /// end of document.
    #[default]
    Idle,
    /// One sentence is being synthesized.
    Producing,
    /// Reset by the caller; production resumes on the next start or pull.
    Cancelled,
}

/// Point-in-time view of the coordinator, for UIs and tests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoordinatorSnapshot {
    pub phase: Phase,
    pub session: u64,
    pub document_id: Option<String>,
    pub current_paragraph: usize,
    pub next_sentence_to_produce: SentenceKey,
    pub in_flight: Option<SentenceKey>,
    pub cached: Vec<SentenceKey>,
}

/// Monotonic session counter shared by the handle, the actor and every
/// consumer stream. Bumped before the actor hears about a reset, so a stale
/// stream can notice without a round trip.
#[derive(Debug, Clone, Default)]
pub struct SessionFlag(Arc<AtomicU64>);

impl SessionFlag {
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, session: u64) -> bool {
        self.current() == session
    }

    /// Starts a new session and returns its id.
    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}
