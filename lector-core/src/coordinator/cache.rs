use std::collections::VecDeque;

use super::error::CacheError;
use super::types::{SentenceKey, SentenceSynthesisResult};

enum Slot {
    Ready(SentenceSynthesisResult),
    /// Handed to the consumer and probably playing. Keeps its place in the
    /// bound until the consumer reports it finished.
    Delivered,
}

/// Bounded, strictly ordered store of synthesized sentences. Spans at most
/// two paragraphs: the one being consumed and the one being prefetched.
pub struct SentenceCache {
    entries: VecDeque<(SentenceKey, Slot)>,
    capacity: usize,
}

impl SentenceCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn keys(&self) -> Vec<SentenceKey> {
        self.entries.iter().map(|(key, _)| *key).collect()
    }

    pub fn contains(&self, key: SentenceKey) -> bool {
        self.entries.iter().any(|(k, _)| *k == key)
    }

    /// Why `key` could not be inserted right now, if anything.
    fn check(&self, key: SentenceKey) -> Result<(), CacheError> {
        if self.is_full() {
            return Err(CacheError::Full {
                capacity: self.capacity,
            });
        }

        let (Some((first, _)), Some((last, _))) = (self.entries.front(), self.entries.back()) else {
            return Ok(());
        };

        if key <= *last {
            return Err(CacheError::OutOfOrder { key, last: *last });
        }
        if key.paragraph != last.paragraph && first.paragraph != last.paragraph {
            return Err(CacheError::TooManyParagraphs { key });
        }
        Ok(())
    }

    pub fn admits(&self, key: SentenceKey) -> bool {
        self.check(key).is_ok()
    }

    pub fn insert(&mut self, result: SentenceSynthesisResult) -> Result<(), CacheError> {
        let key = result.key();
        self.check(key)?;
        self.entries.push_back((key, Slot::Ready(result)));
        Ok(())
    }

    /// Moves a ready result out, leaving a delivered marker behind.
    pub fn take(&mut self, key: SentenceKey) -> Option<SentenceSynthesisResult> {
        let (_, slot) = self.entries.iter_mut().find(|(k, _)| *k == key)?;
        match std::mem::replace(slot, Slot::Delivered) {
            Slot::Ready(result) => Some(result),
            Slot::Delivered => None,
        }
    }

    /// Drops every entry strictly older than `key`.
    pub fn evict_before(&mut self, key: SentenceKey) -> usize {
        self.evict_while(|k| k < key)
    }

    /// Drops `key` and every entry older than it.
    pub fn evict_through(&mut self, key: SentenceKey) -> usize {
        self.evict_while(|k| k <= key)
    }

    fn evict_while(&mut self, pred: impl Fn(SentenceKey) -> bool) -> usize {
        let mut evicted = 0;
        while let Some((key, _)) = self.entries.front() {
            if !pred(*key) {
                break;
            }
            self.entries.pop_front();
            evicted += 1;
        }
        evicted
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthesis::AudioBuffer;
    use crate::text::TextChunk;

    fn result(paragraph: usize, sentence: usize) -> SentenceSynthesisResult {
        SentenceSynthesisResult {
            chunk: TextChunk {
                text: format!("Sentence {sentence}."),
                paragraph_index: paragraph,
                sentence_index: sentence,
                original_range: 0..11,
            },
            audio: AudioBuffer::silence(0.1, 16_000, 1),
            timeline: None,
            paragraph_index: paragraph,
            sentence_index: sentence,
        }
    }

    fn key(paragraph: usize, sentence: usize) -> SentenceKey {
        SentenceKey::new(paragraph, sentence)
    }

    #[test]
    fn test_bound_is_enforced() {
        let mut cache = SentenceCache::new(2);
        cache.insert(result(0, 0)).unwrap();
        cache.insert(result(0, 1)).unwrap();

        assert!(cache.is_full());
        assert_eq!(cache.insert(result(0, 2)), Err(CacheError::Full { capacity: 2 }));
    }

    #[test]
    fn test_out_of_order_insert_is_rejected() {
        let mut cache = SentenceCache::new(5);
        cache.insert(result(0, 3)).unwrap();

        assert_eq!(
            cache.insert(result(0, 1)),
            Err(CacheError::OutOfOrder {
                key: key(0, 1),
                last: key(0, 3)
            })
        );
        assert!(cache.insert(result(0, 3)).is_err());
    }

    #[test]
    fn test_at_most_two_paragraphs() {
        let mut cache = SentenceCache::new(7);
        cache.insert(result(0, 0)).unwrap();
        cache.insert(result(1, 0)).unwrap();
        cache.insert(result(1, 1)).unwrap();

        assert!(!cache.admits(key(2, 0)));
        assert_eq!(
            cache.insert(result(2, 0)),
            Err(CacheError::TooManyParagraphs { key: key(2, 0) })
        );

        cache.evict_through(SentenceKey::end_of(0));
        assert!(cache.admits(key(2, 0)));
    }

    #[test]
    fn test_take_leaves_delivered_slot() {
        let mut cache = SentenceCache::new(3);
        cache.insert(result(0, 0)).unwrap();
        cache.insert(result(0, 1)).unwrap();

        let taken = cache.take(key(0, 0)).unwrap();
        assert_eq!(taken.key(), key(0, 0));
        assert!(cache.take(key(0, 0)).is_none());
        assert_eq!(cache.len(), 2, "delivered sentence still counts");

        assert_eq!(cache.evict_through(key(0, 0)), 1);
        assert_eq!(cache.keys(), vec![key(0, 1)]);
    }

    #[test]
    fn test_evict_before_keeps_key() {
        let mut cache = SentenceCache::new(4);
        for sentence in 0..4 {
            cache.insert(result(0, sentence)).unwrap();
        }

        assert_eq!(cache.evict_before(key(0, 2)), 2);
        assert_eq!(cache.keys(), vec![key(0, 2), key(0, 3)]);
        assert_eq!(cache.evict_before(key(0, 0)), 0);
    }
}
