//! Unified error types for the playback bot.
//!
//! Session operations report their failures through [`Error`] so the chat layer can
//! render each kind on its own. Failures raised by the audio node client are kept in
//! [`BackendError`] and folded into [`Error::ConnectFailure`] at the session boundary.

use thiserror::Error;

/// Every failure a command or session operation can produce.
#[derive(Debug, Error)]
pub enum Error {
    /// The bot already holds a voice connection to another channel in this guild.
    #[error("already connected to voice channel {channel}")]
    AlreadyConnected {
        /// Raw id of the channel the bot is connected to
        channel: u64,
    },

    /// The requesting user is not in a voice channel.
    #[error("no voice channel to join")]
    NoVoiceTarget,

    /// The audio node rejected or failed a request.
    #[error("audio node request failed: {message}")]
    ConnectFailure {
        /// Message reported by the audio node client
        message: String,
    },

    /// No playback session exists for the guild.
    #[error("not connected to a voice channel")]
    NotConnected,

    /// The operation needs an actively playing track.
    #[error("nothing is playing")]
    NotPlaying,

    /// The operation needs a paused track.
    #[error("playback is not paused")]
    NotPaused,

    /// There is no track to stop or describe.
    #[error("nothing to stop")]
    NothingPlaying,

    /// Every search provider came back empty.
    #[error("no matches for `{query}`")]
    NoMatches {
        /// The query as typed by the user
        query: String,
    },

    /// A numeric argument fell outside its accepted bounds.
    #[error("{value} is outside {min}..={max}")]
    OutOfRange {
        /// Offending value
        value: i64,
        /// Smallest accepted value
        min: i64,
        /// Largest accepted value
        max: i64,
    },

    /// The end of a range precedes its start.
    #[error("invalid range {start}..={end}")]
    InvalidRange {
        /// First index
        start: usize,
        /// Last index
        end: usize,
    },

    /// The voter already voted to skip this track.
    #[error("already voted to skip")]
    DuplicateVote,

    /// The voter is not listening in the bot's voice channel.
    #[error("voter is not in the voice channel")]
    NotInChannel,

    /// The queue has nothing to operate on.
    #[error("the queue is empty")]
    QueueEmpty,

    /// A timestamp argument could not be parsed.
    #[error("`{input}` is not a timestamp")]
    InvalidTimestamp {
        /// The argument as typed by the user
        input: String,
    },

    /// Settings could not be loaded or failed validation.
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable description
        message: String,
    },

    /// A required environment variable is missing.
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serenity/Poise failure while talking to the chat gateway.
    #[error("Serenity/Poise framework error: {0}")]
    Framework(Box<poise::serenity_prelude::Error>),
}

impl From<poise::serenity_prelude::Error> for Error {
    fn from(value: poise::serenity_prelude::Error) -> Self {
        Self::Framework(Box::new(value))
    }
}

impl From<std::fmt::Error> for Error {
    fn from(value: std::fmt::Error) -> Self {
        Self::Config {
            message: format!("formatting failed: {value}"),
        }
    }
}

impl From<BackendError> for Error {
    fn from(value: BackendError) -> Self {
        Self::ConnectFailure {
            message: value.to_string(),
        }
    }
}

/// Failures raised by an audio node client.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// WebSocket transport failure.
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    /// A payload could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The node answered with a non-success status.
    #[error("node returned {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Error message from the node, if any
        message: String,
    },

    /// The voice handshake with the chat gateway failed.
    #[error("voice connection failed: {0}")]
    Voice(String),

    /// The node has not completed its WebSocket handshake yet.
    #[error("audio node session is not ready")]
    NotReady,
}

impl From<tokio_tungstenite::tungstenite::Error> for BackendError {
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(value))
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

/// `Result` type of audio node requests
pub type BackendResult<T> = std::result::Result<T, BackendError>;
