//! Playback core - framework-agnostic session management.
//!
//! Nothing in here knows about the chat gateway or the audio node's wire format;
//! the bot layer converts its ids into [`types`] and the node client implements
//! [`backend::AudioBackend`].

/// Collaborator traits for the audio node and the search fallback chain
pub mod backend;
/// Ordered queue of upcoming tracks
pub mod queue;
/// Guild to session mapping
pub mod registry;
/// Per-guild playback aggregate and its state machine
pub mod session;
/// Generation-counted idle auto-leave timer
pub mod timer;
/// Playable track handles and metadata
pub mod track;
/// Id newtypes shared across the crate
pub mod types;
/// Skip vote bookkeeping
pub mod votes;
