use async_stream::stream;
use futures_util::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::{debug, warn};

use super::actor::{SynthesisCoordinator, TakeReply};
use super::error::CoordinatorError;
use super::types::{SentenceKey, SentenceSynthesisResult};

/// Ordered, lazy sentences of one paragraph.
///
/// Nothing is requested until the stream is polled. It ends quietly when the
/// paragraph is exhausted, in which case the coordinator is told the paragraph
/// is done, or when the session it was opened in is reset, in which case it
/// is not. Failed sentences are skipped.
pub struct SentenceStream {
    inner: Pin<Box<dyn Stream<Item = SentenceSynthesisResult> + Send>>,
    coordinator: SynthesisCoordinator,
    session: u64,
    paragraph: usize,
}

impl SentenceStream {
    pub(crate) fn new(coordinator: SynthesisCoordinator, paragraph: usize, first_sentence: usize) -> Self {
        let session = coordinator.session();
        let handle = coordinator.clone();

        let inner = Box::pin(stream! {
            let mut key = SentenceKey::new(paragraph, first_sentence);
            loop {
                if !handle.is_session(session) {
                    debug!(%key, "Session ended, closing sentence stream");
                    break;
                }

                match handle.take(session, key).await {
                    Ok(TakeReply::Ready(result)) => {
                        if !handle.is_session(session) {
                            break;
                        }
                        key = key.next_sentence();
                        yield result;
                    }
                    Ok(TakeReply::Skipped) => {
                        key = key.next_sentence();
                    }
                    Ok(TakeReply::End) => {
                        if handle.is_session(session) {
                            if let Err(e) = handle.paragraph_completed(session, paragraph) {
                                warn!(error = %e, paragraph, "Could not report paragraph completion");
                            }
                        }
                        break;
                    }
                    Ok(TakeReply::Cancelled) | Err(_) => break,
                }
            }
        });

        Self {
            inner,
            coordinator,
            session,
            paragraph,
        }
    }

    pub fn paragraph(&self) -> usize {
        self.paragraph
    }

    /// Whether the session this stream belongs to is still current.
    pub fn is_active(&self) -> bool {
        self.coordinator.is_session(self.session)
    }

    /// Reports that `sentence` of this paragraph finished playing. Ignored by
    /// the coordinator if the stream's session is over.
    pub fn report_finished(&self, sentence: usize) -> Result<(), CoordinatorError> {
        self.coordinator
            .sentence_finished(self.session, SentenceKey::new(self.paragraph, sentence))
    }
}

impl Stream for SentenceStream {
    type Item = SentenceSynthesisResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}
