//! Lavalink v4 wire types, client side.

#![allow(missing_docs)]

use crate::core::{
    backend::{SearchResult, TrackEndReason},
    track::{Track, TrackInfo},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A track as the node serializes it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTrack {
    /// Base64 handle the node expects back on play
    pub encoded: String,
    /// Track metadata
    pub info: ApiTrackInfo,
}

/// Metadata block of an [`ApiTrack`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiTrackInfo {
    pub identifier: String,
    pub is_seekable: bool,
    pub author: String,
    /// Length in milliseconds
    pub length: u64,
    pub is_stream: bool,
    /// Position in milliseconds
    pub position: u64,
    pub title: String,
    pub uri: Option<String>,
    pub artwork_url: Option<String>,
    pub source_name: String,
}

impl From<ApiTrack> for Track {
    fn from(track: ApiTrack) -> Self {
        let info = track.info;
        Self::new(
            track.encoded,
            TrackInfo {
                title: info.title,
                author: info.author,
                uri: info.uri,
                artwork_url: info.artwork_url,
                duration: Duration::from_millis(info.length),
                is_stream: info.is_stream,
            },
        )
    }
}

/// Response of `GET /v4/loadtracks`.
#[derive(Debug, Deserialize)]
#[serde(tag = "loadType", content = "data", rename_all = "camelCase")]
pub enum LoadResult {
    /// A single track was loaded.
    Track(ApiTrack),
    /// A playlist was loaded.
    Playlist(PlaylistData),
    /// A search returned results.
    Search(Vec<ApiTrack>),
    /// No matches found.
    Empty {},
    /// An error occurred during loading.
    Error(LoadError),
}

/// Playlist payload of a [`LoadResult`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistData {
    pub info: PlaylistInfo,
    pub tracks: Vec<ApiTrack>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistInfo {
    pub name: String,
    #[serde(default)]
    pub selected_track: i64,
}

/// Why a load failed.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadError {
    pub message: Option<String>,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub cause: String,
}

impl From<LoadResult> for SearchResult {
    fn from(result: LoadResult) -> Self {
        match result {
            LoadResult::Track(track) => Self::Track(track.into()),
            LoadResult::Playlist(playlist) => Self::Playlist {
                name: playlist.info.name,
                tracks: playlist.tracks.into_iter().map(Track::from).collect(),
            },
            LoadResult::Search(tracks) => Self::Search(tracks.into_iter().map(Track::from).collect()),
            LoadResult::Empty {} => Self::Empty,
            LoadResult::Error(error) => Self::LoadFailed {
                message: error.message.unwrap_or(error.cause),
            },
        }
    }
}

/// Body of `PATCH /v4/sessions/{session}/players/{guild}`. Unset fields are left
/// alone by the node.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<UpdateTrack>,
    /// Position in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<VoiceState>,
}

/// Track selector of a [`PlayerUpdate`]; `None` stops the player.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTrack {
    pub encoded: Option<String>,
}

/// Voice server credentials handed from the chat gateway to the node.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceState {
    pub token: String,
    pub endpoint: String,
    pub session_id: String,
}

/// Error body the node returns with a non-success status.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

/// Messages received over the node's WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum IncomingMessage {
    Ready {
        #[serde(default)]
        resumed: bool,
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    PlayerUpdate {
        #[serde(rename = "guildId")]
        guild_id: String,
        state: PlayerState,
    },
    Event(NodeEvent),
    #[serde(other)]
    Other,
}

/// Periodic player report.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PlayerState {
    pub time: u64,
    /// Position in milliseconds
    pub position: u64,
    pub connected: bool,
    pub ping: i64,
}

/// Payload of an `event` message.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum NodeEvent {
    #[serde(rename = "TrackStartEvent")]
    TrackStart {
        #[serde(rename = "guildId")]
        guild_id: String,
        track: ApiTrack,
    },
    #[serde(rename = "TrackEndEvent")]
    TrackEnd {
        #[serde(rename = "guildId")]
        guild_id: String,
        track: ApiTrack,
        reason: TrackEndReason,
    },
    #[serde(other)]
    Other,
}
