//! Vote-to-skip aggregation for the current track.

use crate::core::types::UserId;
use std::collections::HashSet;

/// Result of casting a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteResult {
    /// The vote was counted
    Added,
    /// The voter had already voted; nothing changed
    AlreadyVoted,
}

/// Distinct voters who want the current track skipped.
///
/// The owning session resets the set whenever the current track changes.
#[derive(Debug, Default)]
pub struct VoteSet {
    voters: HashSet<UserId>,
}

impl VoteSet {
    /// Creates an empty vote set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a vote from `voter`.
    pub fn try_add_vote(&mut self, voter: UserId) -> VoteResult {
        if self.voters.insert(voter) {
            VoteResult::Added
        } else {
            VoteResult::AlreadyVoted
        }
    }

    /// Withdraws `voter`'s vote, returning whether there was one.
    pub fn remove(&mut self, voter: UserId) -> bool {
        self.voters.remove(&voter)
    }

    /// Number of distinct voters.
    #[must_use]
    pub fn count(&self) -> usize {
        self.voters.len()
    }

    /// Whether `voter` already voted.
    #[must_use]
    pub fn contains(&self, voter: UserId) -> bool {
        self.voters.contains(&voter)
    }

    /// Votes needed out of `eligible` listeners: half, rounded up, at least one.
    #[must_use]
    pub const fn threshold(eligible: usize) -> usize {
        let half = eligible.div_ceil(2);
        if half == 0 { 1 } else { half }
    }

    /// Whether the recorded votes meet the threshold for `eligible` listeners.
    #[must_use]
    pub fn has_quorum(&self, eligible: usize) -> bool {
        self.count() >= Self::threshold(eligible)
    }

    /// Forgets every vote.
    pub fn reset(&mut self) {
        self.voters.clear();
    }
}
