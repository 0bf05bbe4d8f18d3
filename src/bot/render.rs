//! User-facing text and embeds.
//!
//! The core reports failures as [`Error`] kinds and outcomes as plain structs; this
//! module turns both into chat replies. Timestamps typed by users are parsed here
//! too since the format only exists at the chat surface.

use crate::{
    core::{
        session::{Enqueued, NowPlaying, QueueSnapshot, VoteOutcome},
        track::Track,
    },
    errors::{Error, Result},
};
use poise::serenity_prelude as serenity;
use std::{fmt::Write, time::Duration};

/// Accent of every playback reply.
pub const MUSIC_COLOR: u32 = 0x009B_59B6;

/// Accent of error replies.
pub const ERROR_COLOR: u32 = 0x00E7_4C3C;

/// Formats a duration as `mm:ss`, or `h:mm:ss` from one hour up.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total / 60) % 60, total % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

/// Parses `ss`, `mm:ss` or `hh:mm:ss`.
///
/// A negative timestamp is reported as [`Error::OutOfRange`] so the caller can
/// tell it apart from garbage input.
pub fn parse_timestamp(input: &str) -> Result<Duration> {
    let trimmed = input.trim();
    if let Some(rest) = trimmed.strip_prefix('-') {
        let magnitude = parse_unsigned(rest).ok_or_else(|| invalid_timestamp(input))?;
        let seconds = i64::try_from(magnitude.as_secs()).unwrap_or(i64::MAX);
        return Err(Error::OutOfRange {
            value: -seconds,
            min: 0,
            max: i64::MAX,
        });
    }
    parse_unsigned(trimmed).ok_or_else(|| invalid_timestamp(input))
}

fn parse_unsigned(input: &str) -> Option<Duration> {
    let parts: Vec<&str> = input.split(':').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }

    let mut seconds = 0u64;
    for (index, part) in parts.iter().enumerate() {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let value: u64 = part.parse().ok()?;
        // Only the leading component may exceed its unit.
        if index > 0 && value >= 60 {
            return None;
        }
        seconds = seconds.checked_mul(60)?.checked_add(value)?;
    }
    Some(Duration::from_secs(seconds))
}

fn invalid_timestamp(input: &str) -> Error {
    Error::InvalidTimestamp {
        input: input.to_string(),
    }
}

/// Reply text for a failed command.
#[must_use]
pub fn describe_error(error: &Error) -> String {
    match error {
        Error::AlreadyConnected { channel } => {
            format!("I'm already connected to <#{channel}>.")
        }
        Error::NoVoiceTarget => "You must be connected to a voice channel.".to_string(),
        Error::ConnectFailure { message } => {
            format!("The audio node refused the request: {message}")
        }
        Error::NotConnected => "I'm not connected to a voice channel.".to_string(),
        Error::NotPlaying => "I'm not playing anything.".to_string(),
        Error::NotPaused => "Playback is not paused.".to_string(),
        Error::NothingPlaying => "Not currently playing anything.".to_string(),
        Error::NoMatches { query } => format!("I wasn't able to find anything for `{query}`."),
        Error::OutOfRange { value, min, .. } if value < min => {
            format!("The minimum is {min}.")
        }
        Error::OutOfRange { max, .. } => format!("The maximum is {max}."),
        Error::InvalidRange { .. } => "The end index must not come before the start index.".to_string(),
        Error::DuplicateVote => "You can't vote again.".to_string(),
        Error::NotInChannel => "You're not in the channel.".to_string(),
        Error::QueueEmpty => "No tracks are in queue.".to_string(),
        Error::InvalidTimestamp { input } => {
            format!("`{input}` is not a timestamp. Use `ss`, `mm:ss` or `hh:mm:ss`.")
        }
        Error::Config { .. } | Error::EnvVar(_) | Error::Io(_) | Error::Framework(_) => {
            "Something went wrong on my end.".to_string()
        }
    }
}

/// `[title](uri)` when the track has a link, the bare title otherwise.
#[must_use]
pub fn track_link(track: &Track) -> String {
    match &track.info.uri {
        Some(uri) => format!("[{}]({uri})", track.info.title),
        None => track.info.title.clone(),
    }
}

/// A one-line playback reply.
pub fn music_embed(message: impl Into<String>) -> serenity::CreateEmbed {
    serenity::CreateEmbed::default()
        .color(MUSIC_COLOR)
        .description(message)
}

/// A one-line error reply.
pub fn error_embed(message: impl Into<String>) -> serenity::CreateEmbed {
    serenity::CreateEmbed::default()
        .color(ERROR_COLOR)
        .description(message)
}

/// Card for a single track, titled `heading`.
pub fn track_embed(heading: &str, track: &Track, footer: String) -> serenity::CreateEmbed {
    let mut embed = serenity::CreateEmbed::default()
        .title(heading)
        .color(MUSIC_COLOR)
        .description(track_link(track))
        .footer(serenity::CreateEmbedFooter::new(footer));
    if let Some(artwork) = &track.info.artwork_url {
        embed = embed.thumbnail(artwork);
    }
    embed
}

/// Reply to a play request.
pub fn enqueued_embed(enqueued: &Enqueued, requester: &str) -> serenity::CreateEmbed {
    match enqueued {
        Enqueued::Track { track, position } => track_embed(
            "Added to queue.",
            track,
            format!(
                "Queued by {requester} • Position {position} • Duration: {}",
                track_length(track)
            ),
        ),
        Enqueued::Playlist {
            name,
            count,
            total_duration,
            first,
        } => {
            let mut embed = serenity::CreateEmbed::default()
                .title(format!("Added {count} tracks to queue."))
                .color(MUSIC_COLOR)
                .description(format!("From **{name}**"))
                .footer(serenity::CreateEmbedFooter::new(format!(
                    "Queued by {requester} • Total duration: {}",
                    format_duration(*total_duration)
                )));
            if let Some(artwork) = &first.info.artwork_url {
                embed = embed.thumbnail(artwork);
            }
            embed
        }
    }
}

/// Card for the current track with its playhead.
pub fn now_playing_embed(now: &NowPlaying) -> serenity::CreateEmbed {
    let heading = if now.paused { "Paused:" } else { "Now Playing:" };
    let footer = if now.track.info.is_stream {
        "Live stream".to_string()
    } else {
        format!(
            "Duration: {} / {}",
            format_duration(now.position),
            format_duration(now.track.duration())
        )
    };
    track_embed(heading, &now.track, footer)
}

/// Queue listing for the voice channel called `channel_name`.
pub fn queue_embed(channel_name: &str, snapshot: &QueueSnapshot) -> serenity::CreateEmbed {
    let mut embed = serenity::CreateEmbed::default()
        .title(format!("Queue for {channel_name}"))
        .color(MUSIC_COLOR);

    if let Some(now) = &snapshot.now_playing {
        if let Some(artwork) = &now.track.info.artwork_url {
            embed = embed.thumbnail(artwork);
        }
        embed = embed.field(
            format!("Now Playing: {}", now.track.info.title),
            format!(
                "{} / {} - {}",
                format_duration(now.position),
                format_duration(now.track.duration()),
                link_or_dash(&now.track)
            ),
            false,
        );
    }

    for (index, track) in snapshot.upcoming.iter().enumerate() {
        embed = embed.field(
            format!("{}. {}", index + 1, track.info.title),
            format!(
                "Duration: {} - {}",
                track_length(track),
                link_or_dash(track)
            ),
            false,
        );
    }

    let mut footer = String::new();
    if snapshot.hidden > 0 {
        let _ = write!(footer, "Plus {} more tracks • ", snapshot.hidden);
    }
    let _ = write!(
        footer,
        "Total duration: {}",
        format_duration(snapshot.remaining)
    );
    embed.footer(serenity::CreateEmbedFooter::new(footer))
}

/// Reply to a skip vote.
#[must_use]
pub fn vote_message(outcome: &VoteOutcome) -> String {
    match outcome {
        VoteOutcome::Pending { votes, needed } => format!("{votes} / {needed} votes to skip."),
        VoteOutcome::Skipped {
            skipped,
            next: Some(next),
        } => format!(
            "Skipped {}. Now playing: {}",
            skipped.info.title,
            track_link(next)
        ),
        VoteOutcome::Skipped {
            skipped,
            next: None,
        } => format!("Skipped {}. The queue is empty.", skipped.info.title),
    }
}

/// `"s"` unless `count` is one.
#[must_use]
pub const fn plural(count: usize) -> &'static str {
    if count == 1 { "" } else { "s" }
}

fn track_length(track: &Track) -> String {
    if track.info.is_stream {
        "live".to_string()
    } else {
        format_duration(track.duration())
    }
}

fn link_or_dash(track: &Track) -> String {
    track
        .info
        .uri
        .as_ref()
        .map_or_else(|| "-".to_string(), |uri| format!("[Link]({uri})"))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::{sample_track, sample_tracks};

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::ZERO), "00:00");
        assert_eq!(format_duration(Duration::from_secs(75)), "01:15");
        assert_eq!(format_duration(Duration::from_millis(59_999)), "00:59");
        assert_eq!(format_duration(Duration::from_secs(3600)), "1:00:00");
        assert_eq!(format_duration(Duration::from_secs(3 * 3600 + 62)), "3:01:02");
    }

    #[test]
    fn test_parse_timestamp_forms() {
        assert_eq!(parse_timestamp("45").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_timestamp("1:30").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_timestamp(" 01:02:03 ").unwrap(), Duration::from_secs(3723));
        assert_eq!(parse_timestamp("90").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_timestamp("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_timestamp_rejects_negative() {
        match parse_timestamp("-5") {
            Err(Error::OutOfRange { value, min, .. }) => {
                assert_eq!(value, -5);
                assert_eq!(min, 0);
            }
            other => panic!("expected out of range, got {other:?}"),
        }
        assert!(matches!(
            parse_timestamp("-1:00"),
            Err(Error::OutOfRange { value: -60, .. })
        ));
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        for input in ["", "abc", "1:2:3:4", "1:60", "1::2", "+5", "1.5", "-x"] {
            assert!(
                matches!(parse_timestamp(input), Err(Error::InvalidTimestamp { .. })),
                "accepted {input:?}"
            );
        }
    }

    #[test]
    fn test_describe_error_messages() {
        assert_eq!(
            describe_error(&Error::AlreadyConnected { channel: 42 }),
            "I'm already connected to <#42>."
        );
        assert_eq!(
            describe_error(&Error::NoMatches {
                query: "nothing".to_string()
            }),
            "I wasn't able to find anything for `nothing`."
        );
        assert_eq!(
            describe_error(&Error::OutOfRange {
                value: 151,
                min: 0,
                max: 150
            }),
            "The maximum is 150."
        );
        assert_eq!(
            describe_error(&Error::OutOfRange {
                value: -1,
                min: 0,
                max: 150
            }),
            "The minimum is 0."
        );
        assert_eq!(
            describe_error(&Error::Config {
                message: "secret path".to_string()
            }),
            "Something went wrong on my end."
        );
    }

    #[test]
    fn test_track_link() {
        let mut track = sample_track("lofi beats", 120);
        assert_eq!(
            track_link(&track),
            "[lofi beats](https://example.com/lofi-beats)"
        );

        track.info.uri = None;
        assert_eq!(track_link(&track), "lofi beats");
    }

    #[test]
    fn test_vote_message() {
        assert_eq!(
            vote_message(&VoteOutcome::Pending {
                votes: 1,
                needed: 2
            }),
            "1 / 2 votes to skip."
        );

        let tracks = sample_tracks(2);
        assert_eq!(
            vote_message(&VoteOutcome::Skipped {
                skipped: tracks[0].clone(),
                next: None,
            }),
            "Skipped track 1. The queue is empty."
        );
    }

    #[test]
    fn test_queue_embed_footer_counts_hidden_tracks() {
        let tracks = sample_tracks(3);
        let snapshot = QueueSnapshot {
            now_playing: None,
            upcoming: tracks[..2].to_vec(),
            hidden: 1,
            remaining: Duration::from_secs(180),
        };

        let json = serde_json::to_value(queue_embed("Lounge", &snapshot)).unwrap();

        assert_eq!(json["title"], "Queue for Lounge");
        assert_eq!(json["fields"].as_array().unwrap().len(), 2);
        assert_eq!(
            json["footer"]["text"],
            "Plus 1 more tracks • Total duration: 03:00"
        );
    }
}
