use futures_util::StreamExt;
use lector_core::coordinator::{CoordinatorEvent, Phase};
use lector_core::settings::CoordinatorConfig;
use lector_core::synthesis::{MockBehavior, MockSynthesizer};
use std::time::Duration;

mod fixture;

use fixture::Fixture;

fn gated_fixture(paragraphs: &'static [&'static str]) -> impl FnOnce() -> Fixture {
    move || {
        Fixture::with_mock(
            paragraphs,
            MockSynthesizer::gated(MockBehavior::Success),
            CoordinatorConfig::default(),
        )
    }
}

#[test]
fn test_reset_ends_waiting_consumer() {
    fixture::run(gated_fixture(&["One. Two. Three."]), |mut fixture| async move {
        let mut stream = fixture.coordinator.stream(0);
        let waiting = tokio::task::spawn_local(async move { stream.next().await });

        // The first sentence is now stuck in the synthesizer
        fixture.mock.wait_for_requests(1).await;
        fixture.coordinator.reset().await.unwrap();

        assert!(waiting.await.unwrap().is_none());

        let snapshot = fixture.coordinator.snapshot().await.unwrap();
        assert_eq!(snapshot.phase, Phase::Cancelled);
        assert_eq!(snapshot.in_flight, None);
        assert!(snapshot.cached.is_empty());

        let events = fixture.drain_events();
        assert!(events.contains(&CoordinatorEvent::ProductionCancelled));
        assert!(!events
            .iter()
            .any(|e| matches!(e, CoordinatorEvent::ParagraphFinished { .. })));
    });
}

#[test]
fn test_late_result_after_reset_is_discarded() {
    fixture::run(gated_fixture(&["One. Two. Three."]), |mut fixture| async move {
        fixture.coordinator.start(0).await.unwrap();
        fixture.mock.wait_for_requests(1).await;

        let stale = fixture.coordinator.stream(0);
        fixture.coordinator.reset().await.unwrap();
        assert!(!stale.is_active());

        // Let the cancelled request finish if it still could
        fixture.mock.release(1);
        tokio::time::sleep(Duration::from_millis(30)).await;

        let snapshot = fixture.coordinator.snapshot().await.unwrap();
        assert!(snapshot.cached.is_empty());
        assert_eq!(snapshot.in_flight, None);
        assert!(!fixture
            .drain_events()
            .iter()
            .any(|e| matches!(e, CoordinatorEvent::SentenceReady { .. })));
    });
}

#[test]
fn test_result_finishing_as_reset_arrives_is_discarded() {
    fixture::run(gated_fixture(&["One. Two. Three."]), |mut fixture| async move {
        fixture.coordinator.start(0).await.unwrap();
        fixture.mock.wait_for_requests(1).await;
        fixture.drain_events();

        // The sentence can complete before or after the actor sees the reset
        fixture.mock.release(1);
        fixture.coordinator.reset().await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let events = fixture.drain_events();
        let cancelled = events
            .iter()
            .position(|e| *e == CoordinatorEvent::ProductionCancelled)
            .unwrap();
        assert!(!events[cancelled..]
            .iter()
            .any(|e| matches!(e, CoordinatorEvent::SentenceReady { .. })));

        let snapshot = fixture.coordinator.snapshot().await.unwrap();
        assert!(snapshot.cached.is_empty());
        assert_eq!(snapshot.in_flight, None);
        assert_eq!(snapshot.phase, Phase::Cancelled);
    });
}

#[test]
fn test_consumer_restarts_after_reset() {
    fixture::run(gated_fixture(&["One. Two. Three."]), |fixture| async move {
        fixture.coordinator.start(0).await.unwrap();
        fixture.mock.wait_for_requests(1).await;
        fixture.coordinator.reset().await.unwrap();

        fixture.mock.release(10);
        let results = fixture.collect_paragraph(0).await;
        let texts: Vec<&str> = results.iter().map(|r| r.chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["One.", "Two.", "Three."]);

        // One was requested twice: before the reset and after it
        let requested = fixture.mock.request_texts();
        assert_eq!(requested.iter().filter(|t| t.as_str() == "One.").count(), 2);
    });
}

#[test]
fn test_reset_many_times_in_a_row() {
    fixture::run(gated_fixture(&["One. Two.", "Three."]), |fixture| async move {
        for paragraph in [0, 1, 0, 1, 0] {
            fixture.coordinator.start(paragraph).await.unwrap();
            fixture.coordinator.reset().await.unwrap();
        }

        let snapshot = fixture.coordinator.snapshot().await.unwrap();
        assert_eq!(snapshot.phase, Phase::Cancelled);
        assert_eq!(snapshot.in_flight, None);
        assert_eq!(snapshot.session, fixture.coordinator.session());

        fixture.mock.release(10);
        assert_eq!(fixture.collect_paragraph(1).await.len(), 1);
    });
}
