//! Playable track handles issued by the audio node.

use crate::core::types::UserId;
use std::time::Duration;

/// Opaque handle to a playable item plus the metadata needed for display.
///
/// The `encoded` blob is owned by the audio node; the session only passes it back
/// when asking the node to play the track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// Node-issued handle
    pub encoded: String,
    /// Display metadata
    pub info: TrackInfo,
    /// User that queued the track
    pub requester: Option<UserId>,
}

/// Display metadata for a [`Track`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrackInfo {
    /// Track title
    pub title: String,
    /// Uploader or artist
    pub author: String,
    /// Link to the source page
    pub uri: Option<String>,
    /// Thumbnail link
    pub artwork_url: Option<String>,
    /// Total length, zero for live streams
    pub duration: Duration,
    /// Live streams cannot be seeked
    pub is_stream: bool,
}

impl Track {
    /// Builds a track from a node handle and its metadata.
    #[must_use]
    pub const fn new(encoded: String, info: TrackInfo) -> Self {
        Self {
            encoded,
            info,
            requester: None,
        }
    }

    /// Returns the same track attributed to `user`.
    #[must_use]
    pub fn requested_by(mut self, user: UserId) -> Self {
        self.requester = Some(user);
        self
    }

    /// Total length of the track.
    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.info.duration
    }

    /// Two handles refer to the same playable item.
    #[must_use]
    pub fn is_same_item(&self, other: &Self) -> bool {
        self.encoded == other.encoded
    }
}

/// Sums the durations of `tracks`.
#[must_use]
pub fn total_duration<'a>(tracks: impl IntoIterator<Item = &'a Track>) -> Duration {
    tracks.into_iter().map(Track::duration).sum()
}
