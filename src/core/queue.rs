//! Ordered track queue for one playback session.
//!
//! The queue never holds the track that is currently playing; the session moves a
//! track out of the queue when it starts it. Indices exposed to users are 1-based.

use crate::{
    core::track::{Track, total_duration},
    errors::{Error, Result},
};
use rand::{Rng, seq::SliceRandom};
use std::{collections::VecDeque, time::Duration};

/// Insertion-ordered queue of upcoming tracks. Duplicates are allowed.
#[derive(Debug, Default)]
pub struct TrackQueue {
    tracks: VecDeque<Track>,
}

impl TrackQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one track and returns its 1-based position.
    pub fn enqueue(&mut self, track: Track) -> usize {
        self.tracks.push_back(track);
        self.tracks.len()
    }

    /// Appends a batch in input order and returns how many were added.
    pub fn enqueue_many(&mut self, tracks: impl IntoIterator<Item = Track>) -> usize {
        let before = self.tracks.len();
        self.tracks.extend(tracks);
        self.tracks.len() - before
    }

    /// Takes the next track, if any.
    pub fn try_dequeue_front(&mut self) -> Option<Track> {
        self.tracks.pop_front()
    }

    /// Puts a track taken with [`Self::try_dequeue_front`] back where it was.
    pub fn restore_front(&mut self, track: Track) {
        self.tracks.push_front(track);
    }

    /// Uniformly permutes the queued tracks.
    pub fn shuffle(&mut self) {
        self.shuffle_with(&mut rand::thread_rng());
    }

    /// Uniformly permutes the queued tracks using `rng`.
    pub fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.tracks.make_contiguous().shuffle(rng);
    }

    /// Removes the tracks at 1-based positions `start..=end`.
    ///
    /// The queue is left untouched when either index is outside `1..=len` or when
    /// `end < start`.
    pub fn remove_range(&mut self, start: usize, end: usize) -> Result<Vec<Track>> {
        let len = self.tracks.len();
        for index in [start, end] {
            if index < 1 || index > len {
                return Err(Error::OutOfRange {
                    value: i64::try_from(index).unwrap_or(i64::MAX),
                    min: 1,
                    max: i64::try_from(len).unwrap_or(i64::MAX),
                });
            }
        }
        if end < start {
            return Err(Error::InvalidRange { start, end });
        }

        Ok(self.tracks.drain(start - 1..end).collect())
    }

    /// Empties the queue and returns how many tracks were dropped.
    pub fn clear(&mut self) -> usize {
        let removed = self.tracks.len();
        self.tracks.clear();
        removed
    }

    /// Number of queued tracks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Clones the first `n` tracks for display.
    #[must_use]
    pub fn peek(&self, n: usize) -> Vec<Track> {
        self.tracks.iter().take(n).cloned().collect()
    }

    /// Combined length of every queued track.
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        total_duration(&self.tracks)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::{sample_track, sample_tracks};
    use rand::{SeedableRng, rngs::StdRng};

    fn titles(queue: &TrackQueue) -> Vec<String> {
        queue
            .peek(queue.len())
            .into_iter()
            .map(|track| track.info.title)
            .collect()
    }

    fn queue_of(count: usize) -> TrackQueue {
        let mut queue = TrackQueue::new();
        queue.enqueue_many(sample_tracks(count));
        queue
    }

    #[test]
    fn test_enqueue_preserves_admission_order() {
        let mut queue = TrackQueue::new();
        assert_eq!(queue.enqueue(sample_track("a", 10)), 1);
        assert_eq!(queue.enqueue_many(vec![sample_track("b", 10), sample_track("c", 10)]), 2);
        assert_eq!(queue.enqueue(sample_track("d", 10)), 4);

        assert_eq!(titles(&queue), vec!["a", "b", "c", "d"]);
        assert_eq!(queue.try_dequeue_front().unwrap().info.title, "a");
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_duplicates_are_kept() {
        let mut queue = TrackQueue::new();
        queue.enqueue(sample_track("same", 10));
        queue.enqueue(sample_track("same", 10));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_dequeue_from_empty_queue() {
        let mut queue = TrackQueue::new();
        assert!(queue.try_dequeue_front().is_none());
    }

    #[test]
    fn test_remove_range_removes_inclusive_span() -> Result<()> {
        let mut queue = queue_of(6);

        let removed = queue.remove_range(2, 4)?;

        assert_eq!(removed.len(), 3);
        assert_eq!(titles(&queue), vec!["track 1", "track 5", "track 6"]);
        Ok(())
    }

    #[test]
    fn test_remove_single_index() -> Result<()> {
        let mut queue = queue_of(3);

        let removed = queue.remove_range(3, 3)?;

        assert_eq!(removed[0].info.title, "track 3");
        assert_eq!(titles(&queue), vec!["track 1", "track 2"]);
        Ok(())
    }

    #[test]
    fn test_remove_range_rejects_out_of_bounds() {
        let mut queue = queue_of(3);

        assert!(matches!(
            queue.remove_range(0, 2),
            Err(Error::OutOfRange { value: 0, min: 1, max: 3 })
        ));
        assert!(matches!(
            queue.remove_range(2, 4),
            Err(Error::OutOfRange { value: 4, .. })
        ));
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_remove_range_rejects_reversed_range() {
        let mut queue = queue_of(5);

        assert!(matches!(
            queue.remove_range(4, 2),
            Err(Error::InvalidRange { start: 4, end: 2 })
        ));
        assert_eq!(queue.len(), 5);
    }

    #[test]
    fn test_shuffle_is_a_permutation() {
        let mut queue = queue_of(20);
        let mut before = titles(&queue);

        queue.shuffle_with(&mut StdRng::seed_from_u64(7));

        let mut after = titles(&queue);
        assert_eq!(after.len(), 20);
        before.sort();
        after.sort();
        assert_eq!(before, after);
    }

    #[test]
    fn test_shuffle_reaches_every_position() {
        // The first track must be able to land anywhere in a 3-track queue.
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen = [false; 3];
        for _ in 0..200 {
            let mut queue = queue_of(3);
            queue.shuffle_with(&mut rng);
            let position = titles(&queue)
                .iter()
                .position(|title| title == "track 1")
                .unwrap();
            seen[position] = true;
        }
        assert_eq!(seen, [true, true, true]);
    }

    #[test]
    fn test_clear_reports_removed_count() {
        let mut queue = queue_of(4);
        assert_eq!(queue.clear(), 4);
        assert!(queue.is_empty());
        assert_eq!(queue.clear(), 0);
    }

    #[test]
    fn test_total_duration_and_peek() {
        let mut queue = TrackQueue::new();
        queue.enqueue(sample_track("a", 30));
        queue.enqueue(sample_track("b", 90));

        assert_eq!(queue.total_duration(), Duration::from_secs(120));
        assert_eq!(queue.peek(1).len(), 1);
        assert_eq!(queue.peek(10).len(), 2);
    }
}
