//! Identifier types shared by the playback core.
//!
//! The core never depends on the chat framework's id types; the bot layer converts
//! at the boundary.

use std::fmt;

/// A chat server, the unit of session scoping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GuildId(pub u64);

/// A voice or text channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u64);

/// A chat user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub u64);

macro_rules! display_raw {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        })*
    };
}

display_raw!(GuildId, ChannelId, UserId);

/// One occupant of the bot's voice channel, as seen when a vote is cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMember {
    /// The member's user id
    pub id: UserId,
    /// Bots never count toward a skip quorum
    pub is_bot: bool,
}

impl ChannelMember {
    /// A human listener.
    #[must_use]
    pub const fn listener(id: u64) -> Self {
        Self {
            id: UserId(id),
            is_bot: false,
        }
    }

    /// A bot account sharing the channel.
    #[must_use]
    pub const fn bot(id: u64) -> Self {
        Self {
            id: UserId(id),
            is_bot: true,
        }
    }
}
