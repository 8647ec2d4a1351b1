use futures_util::StreamExt;
use lector_core::{
    coordinator::{CoordinatorEvent, SentenceSynthesisResult, SynthesisCoordinator},
    document::Document,
    settings::{CoordinatorConfig, PlaybackConfig},
    synthesis::{MockBehavior, MockSynthesizer},
};
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct Fixture {
    pub coordinator: SynthesisCoordinator,
    pub event_rx: mpsc::UnboundedReceiver<CoordinatorEvent>,
    pub mock: MockSynthesizer,
}

impl Fixture {
    #[allow(dead_code)]
    pub fn new(paragraphs: &[&str]) -> Self {
        Self::with_mock_behavior(paragraphs, MockBehavior::Success)
    }

    #[allow(dead_code)]
    pub fn with_mock_behavior(paragraphs: &[&str], behavior: MockBehavior) -> Self {
        Self::with_mock(paragraphs, MockSynthesizer::new(behavior), CoordinatorConfig::default())
    }

    pub fn with_mock(paragraphs: &[&str], mock: MockSynthesizer, config: CoordinatorConfig) -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let document = Document::new(paragraphs.iter().map(|p| p.to_string()).collect());

        // Clones of the mock share its request log and gate
        let (coordinator, event_rx) = SynthesisCoordinator::builder()
            .synthesizer(Arc::new(mock.clone()))
            .document(document)
            .coordinator_config(config)
            .playback_config(PlaybackConfig::default())
            .build()
            .unwrap();

        Fixture {
            coordinator,
            event_rx,
            mock,
        }
    }

    /// Pulls a whole paragraph, reporting each sentence finished as soon as it
    /// arrives.
    #[allow(dead_code)]
    pub async fn collect_paragraph(&self, paragraph: usize) -> Vec<SentenceSynthesisResult> {
        let mut stream = self.coordinator.stream(paragraph);
        let mut results = Vec::new();
        while let Some(result) = stream.next().await {
            stream.report_finished(result.sentence_index).unwrap();
            results.push(result);
        }
        results
    }

    /// Reads events until one matches, panicking if the channel closes first.
    #[allow(dead_code)]
    pub async fn wait_for_event(
        &mut self,
        matches: impl Fn(&CoordinatorEvent) -> bool,
    ) -> CoordinatorEvent {
        loop {
            match self.event_rx.recv().await {
                Some(event) if matches(&event) => return event,
                Some(_) => continue,
                None => panic!("Event channel closed while waiting"),
            }
        }
    }

    #[allow(dead_code)]
    pub fn drain_events(&mut self) -> Vec<CoordinatorEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Runs `test_fn` on a fresh single-threaded runtime. The fixture is built
/// inside the runtime because building spawns the coordinator actor.
#[allow(dead_code)]
pub fn run<S, F, Fut>(setup: S, test_fn: F)
where
    S: FnOnce() -> Fixture,
    F: FnOnce(Fixture) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    use tokio::time::{timeout, Duration};

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to create tokio runtime");

    let local = tokio::task::LocalSet::new();

    runtime.block_on(local.run_until(async {
        let fixture = setup();
        let test_future = test_fn(fixture);
        timeout(Duration::from_secs(30), test_future)
            .await
            .expect("Test timed out after 30 seconds");
    }));
}
