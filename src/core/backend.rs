//! Boundary with the external audio node.
//!
//! The session issues requests through [`AudioBackend`]; the node reports track
//! lifecycle events back through the session registry.

use crate::{
    core::{
        track::Track,
        types::{ChannelId, GuildId},
    },
    errors::{BackendResult, Error, Result},
};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Where a query is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum SearchProvider {
    /// The query is passed as-is (links, node-specific identifiers)
    #[serde(rename = "direct")]
    Direct,
    /// YouTube keyword search
    #[serde(rename = "youtube")]
    YouTube,
    /// YouTube Music keyword search
    #[serde(rename = "youtube_music")]
    YouTubeMusic,
    /// SoundCloud keyword search
    #[serde(rename = "soundcloud")]
    SoundCloud,
}

impl SearchProvider {
    /// Identifier prefix understood by the node for this provider.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Direct => "",
            Self::YouTube => "ytsearch:",
            Self::YouTubeMusic => "ytmsearch:",
            Self::SoundCloud => "scsearch:",
        }
    }
}

/// What the node returned for one lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchResult {
    /// A single track was resolved
    Track(Track),
    /// A named collection was resolved
    Playlist {
        /// Collection name
        name: String,
        /// Tracks in collection order
        tracks: Vec<Track>,
    },
    /// Keyword search hits, best first
    Search(Vec<Track>),
    /// Nothing matched
    Empty,
    /// The node failed to load the query
    LoadFailed {
        /// Node's description of the failure
        message: String,
    },
}

/// A query resolved to something playable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// One track to enqueue
    Single(Track),
    /// A batch to enqueue in order
    Playlist {
        /// Collection name
        name: String,
        /// Tracks in collection order, never empty
        tracks: Vec<Track>,
    },
}

/// Why the node stopped playing a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackEndReason {
    /// The track played to its end
    Finished,
    /// The track could not be loaded
    LoadFailed,
    /// An explicit stop ended the track
    Stopped,
    /// Another track replaced it
    Replaced,
    /// The node cleaned up the player
    Cleanup,
}

/// Requests the playback core issues to the audio node.
///
/// Every call is request/response; timeouts are the implementation's concern.
#[async_trait]
pub trait AudioBackend: Send + Sync {
    /// Connects the guild's player to a voice channel.
    async fn join(&self, guild: GuildId, channel: ChannelId) -> BackendResult<()>;

    /// Disconnects and destroys the guild's player.
    async fn leave(&self, guild: GuildId) -> BackendResult<()>;

    /// Looks a query up with one provider.
    async fn search(
        &self,
        provider: SearchProvider,
        query: &str,
    ) -> BackendResult<SearchResult>;

    /// Starts `track`, replacing whatever is playing.
    async fn play(&self, guild: GuildId, track: &Track) -> BackendResult<()>;

    /// Replaces the current track with `next`.
    async fn skip(&self, guild: GuildId, next: &Track) -> BackendResult<()> {
        self.play(guild, next).await
    }

    /// Pauses playback.
    async fn pause(&self, guild: GuildId) -> BackendResult<()>;

    /// Resumes paused playback.
    async fn resume(&self, guild: GuildId) -> BackendResult<()>;

    /// Stops the current track.
    async fn stop(&self, guild: GuildId) -> BackendResult<()>;

    /// Moves the playhead of the current track.
    async fn seek(&self, guild: GuildId, position: Duration) -> BackendResult<()>;

    /// Sets the player volume (percent).
    async fn set_volume(&self, guild: GuildId, level: u16) -> BackendResult<()>;
}

/// Lifecycle notifications the audio node delivers, routed by guild.
#[async_trait]
pub trait BackendEvents: Send + Sync {
    /// A track began playing.
    async fn track_started(&self, guild: GuildId, track: Track);

    /// A track stopped playing.
    async fn track_ended(&self, guild: GuildId, track: Track, reason: TrackEndReason);

    /// Periodic playhead report.
    async fn player_update(&self, guild: GuildId, position: Duration);
}

/// Resolves `query` by trying each provider in order.
///
/// A provider that errors, fails to load or finds nothing hands over to the next;
/// [`Error::NoMatches`] is reported only once every provider was tried.
pub async fn resolve(
    backend: &dyn AudioBackend,
    providers: &[SearchProvider],
    query: &str,
) -> Result<Resolved> {
    let query = query.trim();
    if query.is_empty() {
        return Err(Error::NoMatches {
            query: String::new(),
        });
    }

    for &provider in providers {
        let result = match backend.search(provider, query).await {
            Ok(result) => result,
            Err(e) => {
                warn!(?provider, "search failed: {e}");
                continue;
            }
        };

        match result {
            SearchResult::Track(track) => return Ok(Resolved::Single(track)),
            SearchResult::Search(tracks) => {
                if let Some(track) = tracks.into_iter().next() {
                    return Ok(Resolved::Single(track));
                }
            }
            SearchResult::Playlist { name, tracks } if !tracks.is_empty() => {
                return Ok(Resolved::Playlist { name, tracks });
            }
            SearchResult::Playlist { .. } | SearchResult::Empty => {
                debug!(?provider, "no matches");
            }
            SearchResult::LoadFailed { message } => {
                debug!(?provider, "load failed: {message}");
            }
        }
    }

    Err(Error::NoMatches {
        query: query.to_string(),
    })
}
