use anyhow::anyhow;
use futures_util::FutureExt;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::cache::SentenceCache;
use super::error::CoordinatorError;
use super::events::{CoordinatorEvent, EventSender};
use super::producer::{produce_sentence, Produced};
use super::state::{CoordinatorSnapshot, Phase, SessionFlag};
use super::stream::SentenceStream;
use super::types::{SentenceKey, SentenceSynthesisResult};
use crate::document::Document;
use crate::settings::{CoordinatorConfig, PlaybackConfig, Settings};
use crate::synthesis::{SynthesisError, Synthesizer};
use crate::text::{split_sentences, TextChunk, TextNormalizer};

/// Input messages to the coordinator actor.
///
/// Messages that come from a consumer stream carry the session the stream was
/// opened in; the actor ignores them once that session is over.
pub(crate) enum CoordinatorMessage {
    Start {
        key: SentenceKey,
        reply: oneshot::Sender<()>,
    },
    Reset {
        reply: oneshot::Sender<()>,
    },
    LoadDocument {
        document: Document,
        reply: oneshot::Sender<()>,
    },
    ApplyConfig {
        config: PlaybackConfig,
        reply: oneshot::Sender<SentenceKey>,
    },
    Take {
        session: u64,
        key: SentenceKey,
        reply: oneshot::Sender<TakeReply>,
    },
    SentenceFinished {
        session: u64,
        key: SentenceKey,
    },
    ParagraphCompleted {
        session: u64,
        paragraph: usize,
    },
    Snapshot {
        reply: oneshot::Sender<CoordinatorSnapshot>,
    },
}

/// Answer to a consumer pulling one sentence.
pub(crate) enum TakeReply {
    Ready(SentenceSynthesisResult),
    /// Synthesis failed; move on to the next sentence.
    Skipped,
    /// No sentence at this index: the paragraph is exhausted.
    End,
    /// The consumer's session is over.
    Cancelled,
}

/// The `SynthesisCoordinator` turns paragraphs into an ordered supply of
/// synthesized sentences.
///
/// All scheduling state lives in one actor task. This handle sends it
/// messages and is cheap to clone. Consumers pull sentences through
/// [`SentenceStream`]s; production runs ahead of them by up to
/// `max_cached_sentences` and at most one paragraph.
///
/// Resets are visible immediately: the session counter is bumped on the
/// calling side before the actor is told, and every stream checks it before
/// and after each pull.
#[derive(Clone)]
pub struct SynthesisCoordinator {
    tx: mpsc::UnboundedSender<CoordinatorMessage>,
    session: SessionFlag,
}

impl SynthesisCoordinator {
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::default()
    }

    /// Restarts production at the first sentence of `paragraph`.
    pub async fn start(&self, paragraph: usize) -> Result<(), CoordinatorError> {
        self.start_at(SentenceKey::start_of(paragraph)).await
    }

    /// Cancels whatever is in flight, waits for it to stop, and restarts
    /// production at `key`. Streams opened earlier end.
    pub async fn start_at(&self, key: SentenceKey) -> Result<(), CoordinatorError> {
        self.session.advance();
        self.request(|reply| CoordinatorMessage::Start { key, reply })
            .await
    }

    /// Cancels production, clears the cache and ends every open stream. A late
    /// result from the cancelled synthesis is discarded.
    pub async fn reset(&self) -> Result<(), CoordinatorError> {
        self.session.advance();
        self.request(|reply| CoordinatorMessage::Reset { reply }).await
    }

    pub async fn cancel(&self) -> Result<(), CoordinatorError> {
        self.reset().await
    }

    /// Replaces the paragraph source. Implies a reset.
    pub async fn load_document(&self, document: Document) -> Result<(), CoordinatorError> {
        self.session.advance();
        self.request(|reply| CoordinatorMessage::LoadDocument { document, reply })
            .await
    }

    /// Switches speed, voice or highlighting by restarting production at the
    /// sentence currently playing. Returns that sentence; the consumer should
    /// resume with [`stream_from`](Self::stream_from) there.
    pub async fn apply_config(&self, config: PlaybackConfig) -> Result<SentenceKey, CoordinatorError> {
        self.session.advance();
        self.request(|reply| CoordinatorMessage::ApplyConfig { config, reply })
            .await
    }

    /// Tells the coordinator a sentence has finished playing so its cache slot
    /// can be reused.
    pub fn on_sentence_finished(&self, paragraph: usize, sentence: usize) -> Result<(), CoordinatorError> {
        self.sentence_finished(self.session.current(), SentenceKey::new(paragraph, sentence))
    }

    /// Sentences of `paragraph` in order, starting at the first.
    pub fn stream(&self, paragraph: usize) -> SentenceStream {
        self.stream_from(paragraph, 0)
    }

    pub fn stream_from(&self, paragraph: usize, sentence: usize) -> SentenceStream {
        SentenceStream::new(self.clone(), paragraph, sentence)
    }

    pub async fn snapshot(&self) -> Result<CoordinatorSnapshot, CoordinatorError> {
        self.request(|reply| CoordinatorMessage::Snapshot { reply }).await
    }

    pub fn session(&self) -> u64 {
        self.session.current()
    }

    pub(crate) fn is_session(&self, session: u64) -> bool {
        self.session.is_current(session)
    }

    pub(crate) async fn take(&self, session: u64, key: SentenceKey) -> Result<TakeReply, CoordinatorError> {
        self.request(|reply| CoordinatorMessage::Take {
            session,
            key,
            reply,
        })
        .await
    }

    pub(crate) fn sentence_finished(&self, session: u64, key: SentenceKey) -> Result<(), CoordinatorError> {
        self.tx
            .send(CoordinatorMessage::SentenceFinished { session, key })
            .map_err(|_| CoordinatorError::Closed)
    }

    pub(crate) fn paragraph_completed(&self, session: u64, paragraph: usize) -> Result<(), CoordinatorError> {
        self.tx
            .send(CoordinatorMessage::ParagraphCompleted { session, paragraph })
            .map_err(|_| CoordinatorError::Closed)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> CoordinatorMessage,
    ) -> Result<T, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(build(reply)).map_err(|_| CoordinatorError::Closed)?;
        rx.await.map_err(|_| CoordinatorError::Closed)
    }
}

#[derive(Default)]
pub struct CoordinatorBuilder {
    synthesizer: Option<Arc<dyn Synthesizer>>,
    normalizer: TextNormalizer,
    document: Option<Document>,
    coordinator: CoordinatorConfig,
    playback: PlaybackConfig,
}

impl CoordinatorBuilder {
    pub fn synthesizer(mut self, synthesizer: Arc<dyn Synthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn normalizer(mut self, normalizer: TextNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn document(mut self, document: Document) -> Self {
        self.document = Some(document);
        self
    }

    pub fn coordinator_config(mut self, config: CoordinatorConfig) -> Self {
        self.coordinator = config;
        self
    }

    pub fn playback_config(mut self, config: PlaybackConfig) -> Self {
        self.playback = config;
        self
    }

    /// Takes both config sections from loaded settings.
    pub fn settings(self, settings: &Settings) -> Self {
        self.coordinator_config(settings.coordinator.clone())
            .playback_config(settings.playback.clone())
    }

    /// Spawns the actor on the current tokio runtime and returns its handle
    /// together with the event stream.
    pub fn build(
        self,
    ) -> Result<(SynthesisCoordinator, mpsc::UnboundedReceiver<CoordinatorEvent>), CoordinatorError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let (job_tx, job_rx) = mpsc::unbounded_channel();
        let (events, event_rx) = EventSender::new();
        let session = SessionFlag::default();

        let state = ActorState::new(self, session.clone(), events, job_tx)?;
        tokio::spawn(run_actor(state, rx, job_rx));

        Ok((SynthesisCoordinator { tx, session }, event_rx))
    }
}

struct InFlight {
    key: SentenceKey,
    handle: JoinHandle<()>,
}

struct PendingTake {
    key: SentenceKey,
    reply: oneshot::Sender<TakeReply>,
}

/// Result of one production job, tagged with the epoch it was started in.
struct JobCompletion {
    epoch: u64,
    key: SentenceKey,
    outcome: Result<Produced, SynthesisError>,
}

struct ActorState {
    synthesizer: Arc<dyn Synthesizer>,
    normalizer: TextNormalizer,
    config: CoordinatorConfig,
    playback: PlaybackConfig,
    document: Option<Document>,
    /// Sentence chunks of paragraphs near the consumer, split on demand.
    chunks: BTreeMap<usize, Arc<Vec<TextChunk>>>,
    cache: SentenceCache,
    phase: Phase,
    consumer_paragraph: usize,
    /// Next sentence to hand to the synthesizer.
    cursor: SentenceKey,
    in_flight: Option<InFlight>,
    /// Bumped whenever production is cancelled; completions from older
    /// epochs are dropped.
    epoch: u64,
    failed: BTreeSet<SentenceKey>,
    succeeded: HashMap<usize, usize>,
    pending_take: Option<PendingTake>,
    playing: Option<SentenceKey>,
    prefetched: BTreeSet<usize>,
    session: SessionFlag,
    events: EventSender,
    job_tx: mpsc::UnboundedSender<JobCompletion>,
}

impl ActorState {
    fn new(
        builder: CoordinatorBuilder,
        session: SessionFlag,
        events: EventSender,
        job_tx: mpsc::UnboundedSender<JobCompletion>,
    ) -> Result<Self, CoordinatorError> {
        let synthesizer = builder.synthesizer.ok_or(CoordinatorError::MissingSynthesizer)?;
        let mut config = builder.coordinator;
        config.max_cached_sentences = config.max_cached_sentences.max(1);

        Ok(Self {
            synthesizer,
            normalizer: builder.normalizer,
            cache: SentenceCache::new(config.max_cached_sentences),
            config,
            playback: builder.playback,
            document: builder.document,
            chunks: BTreeMap::new(),
            phase: Phase::Idle,
            consumer_paragraph: 0,
            cursor: SentenceKey::start_of(0),
            in_flight: None,
            epoch: 0,
            failed: BTreeSet::new(),
            succeeded: HashMap::new(),
            pending_take: None,
            playing: None,
            prefetched: BTreeSet::new(),
            session,
            events,
            job_tx,
        })
    }
}

// Actor implementation as free functions
async fn run_actor(
    mut state: ActorState,
    mut rx: mpsc::UnboundedReceiver<CoordinatorMessage>,
    mut job_rx: mpsc::UnboundedReceiver<JobCompletion>,
) {
    info!(
        max_cached_sentences = state.config.max_cached_sentences,
        lookahead_threshold = state.config.lookahead_threshold,
        "SynthesisCoordinator started"
    );

    loop {
        tokio::select! {
            message = rx.recv() => {
                let Some(message) = message else {
                    break;
                };
                handle_message(&mut state, message).await;
            }

            Some(completion) = job_rx.recv() => {
                handle_completion(&mut state, completion);
            }
        }
    }

    cancel_production(&mut state).await;
    info!("SynthesisCoordinator stopped");
}

async fn handle_message(state: &mut ActorState, message: CoordinatorMessage) {
    match message {
        CoordinatorMessage::Start { key, reply } => {
            info!(%key, "Starting production");
            restart(state, key).await;
            pump(state);
            let _ = reply.send(());
        }
        CoordinatorMessage::Reset { reply } => {
            handle_reset(state).await;
            let _ = reply.send(());
        }
        CoordinatorMessage::LoadDocument { document, reply } => {
            handle_reset(state).await;
            info!(document_id = %document.id, paragraphs = document.len(), "Document loaded");
            state.events.send(CoordinatorEvent::DocumentLoaded {
                document_id: document.id.clone(),
                paragraphs: document.len(),
            });
            state.document = Some(document);
            state.chunks.clear();
            state.cursor = SentenceKey::start_of(0);
            state.consumer_paragraph = 0;
            set_phase(state, Phase::Idle);
            let _ = reply.send(());
        }
        CoordinatorMessage::ApplyConfig { config, reply } => {
            let resume = state
                .playing
                .unwrap_or_else(|| SentenceKey::start_of(state.consumer_paragraph));
            info!(%resume, speed = config.speed, voice = ?config.voice, "Applying playback config");
            state.playback = config;
            restart(state, resume).await;
            pump(state);
            state.events.send(CoordinatorEvent::ConfigApplied { resume });
            let _ = reply.send(resume);
        }
        CoordinatorMessage::Take {
            session,
            key,
            reply,
        } => handle_take(state, session, key, reply).await,
        CoordinatorMessage::SentenceFinished { session, key } => {
            if !state.session.is_current(session) {
                return;
            }
            state.cache.evict_through(key);
            pump(state);
        }
        CoordinatorMessage::ParagraphCompleted { session, paragraph } => {
            if !state.session.is_current(session) {
                debug!(paragraph, "Ignoring completion from a stale session");
                return;
            }
            handle_paragraph_completed(state, paragraph);
        }
        CoordinatorMessage::Snapshot { reply } => {
            let _ = reply.send(snapshot(state));
        }
    }
}

fn snapshot(state: &ActorState) -> CoordinatorSnapshot {
    CoordinatorSnapshot {
        phase: state.phase,
        session: state.session.current(),
        document_id: state.document.as_ref().map(|d| d.id.clone()),
        current_paragraph: state.consumer_paragraph,
        next_sentence_to_produce: state.cursor,
        in_flight: state.in_flight.as_ref().map(|job| job.key),
        cached: state.cache.keys(),
    }
}

fn set_phase(state: &mut ActorState, phase: Phase) {
    if state.phase != phase {
        debug!(from = %state.phase, to = %phase, "Phase changed");
        state.phase = phase;
        state.events.send(CoordinatorEvent::PhaseChanged(phase));
    }
}

/// Stops the in-flight job and waits for it to be gone.
async fn cancel_production(state: &mut ActorState) {
    state.epoch += 1;
    if let Some(job) = state.in_flight.take() {
        debug!(key = %job.key, "Cancelling in-flight synthesis");
        job.handle.abort();
        let _ = job.handle.await;
    }
}

/// Drops the production window and everything derived from it.
async fn clear_window(state: &mut ActorState) {
    cancel_production(state).await;
    state.cache.clear();
    state.failed.clear();
    state.succeeded.clear();
    state.prefetched.clear();
    state.playing = None;
    if let Some(pending) = state.pending_take.take() {
        let _ = pending.reply.send(TakeReply::Cancelled);
    }
}

async fn handle_reset(state: &mut ActorState) {
    clear_window(state).await;
    set_phase(state, Phase::Cancelled);
    state.events.send(CoordinatorEvent::ProductionCancelled);
    info!("Production cancelled");
}

async fn restart(state: &mut ActorState, key: SentenceKey) {
    clear_window(state).await;
    state.cursor = key;
    state.consumer_paragraph = key.paragraph;
    state.chunks.retain(|paragraph, _| *paragraph >= key.paragraph);
    set_phase(state, Phase::Idle);
}

async fn handle_take(
    state: &mut ActorState,
    session: u64,
    key: SentenceKey,
    reply: oneshot::Sender<TakeReply>,
) {
    if !state.session.is_current(session) {
        let _ = reply.send(TakeReply::Cancelled);
        return;
    }

    let count = match &state.document {
        Some(document) if key.paragraph < document.len() => sentence_count(state, key.paragraph),
        _ => 0,
    };
    if key.sentence >= count {
        let _ = reply.send(TakeReply::End);
        return;
    }

    if state.phase == Phase::Cancelled {
        restart(state, key).await;
    }

    if key.paragraph > state.consumer_paragraph {
        state.consumer_paragraph = key.paragraph;
        state.chunks.retain(|paragraph, _| *paragraph >= key.paragraph);
    }
    state.cache.evict_before(key);

    if let Some(result) = state.cache.take(key) {
        state.playing = Some(key);
        let _ = reply.send(TakeReply::Ready(result));
        pump(state);
        return;
    }

    if state.failed.contains(&key) {
        let _ = reply.send(TakeReply::Skipped);
        pump(state);
        return;
    }

    let in_flight = state.in_flight.as_ref().map(|job| job.key) == Some(key);
    if !in_flight && next_production_key(state) != Some(key) {
        debug!(%key, "Consumer moved outside the production window, restarting");
        restart(state, key).await;
    }

    if let Some(previous) = state.pending_take.replace(PendingTake { key, reply }) {
        let _ = previous.reply.send(TakeReply::Cancelled);
    }
    pump(state);
}

fn handle_paragraph_completed(state: &mut ActorState, paragraph: usize) {
    state.cache.evict_through(SentenceKey::end_of(paragraph));
    if state.playing.is_some_and(|key| key.paragraph <= paragraph) {
        state.playing = None;
    }

    let next = first_nonempty_from(state, paragraph + 1);
    if state.consumer_paragraph <= paragraph {
        state.consumer_paragraph = next.unwrap_or(paragraph + 1);
        let consumer = state.consumer_paragraph;
        state.chunks.retain(|p, _| *p >= consumer);
        state.succeeded.retain(|p, _| *p >= consumer);
        state.failed.retain(|key| key.paragraph >= consumer);
    }

    info!(paragraph, ?next, "Paragraph finished");
    state.events.send(CoordinatorEvent::ParagraphFinished { paragraph, next });
    pump(state);
}

fn handle_completion(state: &mut ActorState, completion: JobCompletion) {
    let JobCompletion {
        epoch,
        key,
        outcome,
    } = completion;

    let current = state.in_flight.as_ref().map(|job| job.key);
    if epoch != state.epoch || current != Some(key) {
        debug!(%key, epoch, "Discarding result from cancelled production");
        return;
    }
    state.in_flight = None;

    match outcome {
        Ok(Produced {
            result,
            alignment_error,
        }) => {
            if let Some(e) = alignment_error {
                warn!(%key, error = %e, "Sentence will play without word timing");
                state.events.send(CoordinatorEvent::AlignmentUnavailable {
                    paragraph: key.paragraph,
                    sentence: key.sentence,
                    reason: e.to_string(),
                });
            }
            *state.succeeded.entry(key.paragraph).or_default() += 1;
            let has_timeline = result.timeline.is_some();
            deliver(state, result);
            state.events.send(CoordinatorEvent::SentenceReady {
                paragraph: key.paragraph,
                sentence: key.sentence,
                has_timeline,
            });
        }
        Err(e) => {
            warn!(%key, error = %e, "Sentence synthesis failed, skipping");
            state.failed.insert(key);
            state.events.send(CoordinatorEvent::SentenceFailed {
                paragraph: key.paragraph,
                sentence: key.sentence,
                error: e.to_string(),
            });
            if state.pending_take.as_ref().is_some_and(|p| p.key == key) {
                if let Some(pending) = state.pending_take.take() {
                    let _ = pending.reply.send(TakeReply::Skipped);
                }
            }
        }
    }

    let is_last = key.sentence + 1 >= sentence_count(state, key.paragraph);
    if is_last && state.succeeded.get(&key.paragraph).copied().unwrap_or(0) == 0 {
        error!(paragraph = key.paragraph, "No sentence of the paragraph could be synthesized");
        state.events.send(CoordinatorEvent::PlaybackError {
            paragraph: key.paragraph,
            message: format!("Every sentence of paragraph {} failed to synthesize", key.paragraph),
        });
    }

    pump(state);
}

/// Caches a finished sentence, or hands it straight to a consumer already
/// waiting for it. Either way it occupies a cache slot.
fn deliver(state: &mut ActorState, result: SentenceSynthesisResult) {
    let key = result.key();
    if let Err(e) = state.cache.insert(result) {
        let e = CoordinatorError::from(e);
        error!(%key, error = %e, "Dropping synthesized sentence");
        debug_assert!(false, "{e}");
        return;
    }

    if state.pending_take.as_ref().is_some_and(|p| p.key == key) {
        if let (Some(pending), Some(result)) = (state.pending_take.take(), state.cache.take(key)) {
            state.playing = Some(key);
            let _ = pending.reply.send(TakeReply::Ready(result));
        }
    }
}

/// Starts the next job if the window allows one.
fn pump(state: &mut ActorState) {
    if state.phase == Phase::Cancelled || state.in_flight.is_some() {
        return;
    }

    let Some(key) = next_production_key(state) else {
        set_phase(state, Phase::Idle);
        return;
    };

    let limit = first_nonempty_from(state, state.consumer_paragraph + 1);
    if key.paragraph > state.consumer_paragraph && Some(key.paragraph) != limit {
        debug!(%key, "Lookahead limit reached");
        set_phase(state, Phase::Idle);
        return;
    }

    if !state.cache.admits(key) {
        debug!(%key, cached = state.cache.len(), "Cache full, producer dormant");
        set_phase(state, Phase::Idle);
        return;
    }

    spawn_job(state, key);
}

fn spawn_job(state: &mut ActorState, key: SentenceKey) {
    let Some(chunk) = state
        .chunks
        .get(&key.paragraph)
        .and_then(|chunks| chunks.get(key.sentence))
        .cloned()
    else {
        return;
    };

    state.epoch += 1;
    let epoch = state.epoch;
    let synthesizer = state.synthesizer.clone();
    let normalizer = state.normalizer;
    let playback = state.playback.clone();
    let job_tx = state.job_tx.clone();

    debug!(%key, text = %chunk.text, "Producing sentence");
    let handle = tokio::spawn(async move {
        let production = produce_sentence(synthesizer.as_ref(), &normalizer, &playback, chunk);
        // Every job reports a completion, panics included
        let outcome = match AssertUnwindSafe(production).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_) => {
                error!(%key, "Synthesizer panicked");
                Err(SynthesisError::Engine(anyhow!("Synthesizer panicked")))
            }
        };
        let _ = job_tx.send(JobCompletion {
            epoch,
            key,
            outcome,
        });
    });

    state.in_flight = Some(InFlight { key, handle });
    state.cursor = key.next_sentence();
    set_phase(state, Phase::Producing);
    maybe_announce_prefetch(state);
}

/// Announces the next paragraph once few enough sentences of the current one
/// are left to produce.
fn maybe_announce_prefetch(state: &mut ActorState) {
    let consumer = state.consumer_paragraph;
    let remaining = match state.cursor.paragraph.cmp(&consumer) {
        std::cmp::Ordering::Equal => sentence_count(state, consumer).saturating_sub(state.cursor.sentence),
        std::cmp::Ordering::Greater => 0,
        std::cmp::Ordering::Less => return,
    };
    if remaining > state.config.lookahead_threshold {
        return;
    }

    let Some(next) = first_nonempty_from(state, consumer + 1) else {
        return;
    };
    if state.prefetched.insert(next) {
        info!(paragraph = next, remaining, "Prefetching next paragraph");
        state.events.send(CoordinatorEvent::PrefetchStarted { paragraph: next });
    }
}

/// The production cursor moved past exhausted and empty paragraphs, or
/// `None` at the end of the document.
fn next_production_key(state: &mut ActorState) -> Option<SentenceKey> {
    let paragraphs = state.document.as_ref()?.len();
    let mut cursor = state.cursor;
    if cursor.paragraph < state.consumer_paragraph {
        cursor = SentenceKey::start_of(state.consumer_paragraph);
    }

    while cursor.paragraph < paragraphs {
        if cursor.sentence < sentence_count(state, cursor.paragraph) {
            state.cursor = cursor;
            return Some(cursor);
        }
        cursor = SentenceKey::start_of(cursor.paragraph + 1);
    }

    state.cursor = cursor;
    None
}

fn first_nonempty_from(state: &mut ActorState, paragraph: usize) -> Option<usize> {
    let paragraphs = state.document.as_ref()?.len();
    (paragraph..paragraphs).find(|p| sentence_count(state, *p) > 0)
}

fn sentence_count(state: &mut ActorState, paragraph: usize) -> usize {
    chunks_of(state, paragraph).map_or(0, |chunks| chunks.len())
}

fn chunks_of(state: &mut ActorState, paragraph: usize) -> Option<Arc<Vec<TextChunk>>> {
    if let Some(chunks) = state.chunks.get(&paragraph) {
        return Some(chunks.clone());
    }
    let text = state.document.as_ref()?.paragraph(paragraph)?;
    let chunks = Arc::new(split_sentences(paragraph, text));
    state.chunks.insert(paragraph, chunks.clone());
    Some(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthesis::{MockBehavior, MockSynthesizer};

    struct Harness {
        state: ActorState,
        job_rx: mpsc::UnboundedReceiver<JobCompletion>,
        event_rx: mpsc::UnboundedReceiver<CoordinatorEvent>,
    }

    fn harness(paragraphs: &[&str]) -> Harness {
        let builder = SynthesisCoordinator::builder()
            .synthesizer(Arc::new(MockSynthesizer::new(MockBehavior::Success)))
            .document(Document::new(paragraphs.iter().map(|p| p.to_string()).collect()));
        let (job_tx, job_rx) = mpsc::unbounded_channel();
        let (events, event_rx) = EventSender::new();
        let state = ActorState::new(builder, SessionFlag::default(), events, job_tx).unwrap();
        Harness {
            state,
            job_rx,
            event_rx,
        }
    }

    fn sentence_ready_count(event_rx: &mut mpsc::UnboundedReceiver<CoordinatorEvent>) -> usize {
        let mut count = 0;
        while let Ok(event) = event_rx.try_recv() {
            if matches!(event, CoordinatorEvent::SentenceReady { .. }) {
                count += 1;
            }
        }
        count
    }

    #[tokio::test]
    async fn test_completion_queued_before_reset_is_discarded() {
        let Harness {
            mut state,
            mut job_rx,
            mut event_rx,
        } = harness(&["One. Two."]);

        restart(&mut state, SentenceKey::start_of(0)).await;
        pump(&mut state);
        assert_eq!(state.in_flight.as_ref().map(|job| job.key), Some(SentenceKey::new(0, 0)));

        // The job has finished and its result waits on the channel
        let completion = job_rx.recv().await.unwrap();
        handle_reset(&mut state).await;
        handle_completion(&mut state, completion);

        assert!(state.cache.is_empty());
        assert!(state.in_flight.is_none());
        assert_eq!(state.phase, Phase::Cancelled);
        assert_eq!(sentence_ready_count(&mut event_rx), 0);
    }

    #[tokio::test]
    async fn test_completion_queued_before_restart_is_discarded() {
        let Harness {
            mut state,
            mut job_rx,
            mut event_rx,
        } = harness(&["One. Two."]);

        restart(&mut state, SentenceKey::start_of(0)).await;
        pump(&mut state);
        let stale = job_rx.recv().await.unwrap();

        // A restart at the same key puts an identical key back in flight
        restart(&mut state, SentenceKey::start_of(0)).await;
        pump(&mut state);
        handle_completion(&mut state, stale);
        assert!(state.cache.is_empty());
        assert_eq!(sentence_ready_count(&mut event_rx), 0);

        let fresh = job_rx.recv().await.unwrap();
        handle_completion(&mut state, fresh);
        assert_eq!(state.cache.keys()[0], SentenceKey::new(0, 0));
        assert_eq!(sentence_ready_count(&mut event_rx), 1);
    }
}
