//! General commands - ping, help, and other utility commands.
//! These don't touch any playback session.

/// Group of commands shown by `help <category>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum HelpCategory {
    /// Voice and player controls
    #[name = "playback"]
    Playback,
    /// Queue listing and edits
    #[name = "queue"]
    Queue,
    /// Ping and help
    #[name = "utility"]
    Utility,
}

impl HelpCategory {
    const ALL: [Self; 3] = [Self::Playback, Self::Queue, Self::Utility];

    const fn title(self) -> &'static str {
        match self {
            Self::Playback => "Playback",
            Self::Queue => "Queue",
            Self::Utility => "Utility",
        }
    }

    // (usage, space-separated aliases, summary)
    const fn commands(self) -> &'static [(&'static str, &'static str, &'static str)] {
        match self {
            Self::Playback => &[
                ("join", "", "Joins your voice channel."),
                (
                    "play <link or search>",
                    "",
                    "Queues a track or playlist, joining you if needed.",
                ),
                ("pause", "", "Pauses the current track."),
                ("resume", "", "Resumes a paused track."),
                ("stop", "stfu", "Stops playback and clears the queue."),
                ("skip", "", "Votes to skip; half of the listeners must agree."),
                ("volume <0-150>", "vol v", "Changes the volume."),
                (
                    "seek <timestamp>",
                    "goto",
                    "Jumps to `ss`, `mm:ss` or `hh:mm:ss`.",
                ),
                ("forward [seconds]", "", "Moves forward through the track."),
                ("reverse [seconds]", "", "Moves back through the track."),
                (
                    "nowplaying",
                    "np song track",
                    "Shows the current track.",
                ),
                ("leave", "gtfo", "Leaves the voice channel."),
            ],
            Self::Queue => &[
                ("queue", "q", "Lists upcoming tracks."),
                ("remove <start> [end]", "", "Removes tracks by position."),
                ("shuffle", "", "Shuffles upcoming tracks."),
                ("clear", "", "Removes every upcoming track."),
            ],
            Self::Utility => &[
                ("ping", "", "Checks if the bot is responsive."),
                ("help [category]", "", "Shows this help message."),
            ],
        }
    }
}

fn category_section(prefix: &str, category: HelpCategory) -> String {
    let mut section = format!("**{}**\n", category.title());
    for (usage, aliases, summary) in category.commands() {
        section.push_str(&format!("• `/{usage}` - {summary}"));
        if !aliases.is_empty() {
            let aliases: Vec<String> = aliases
                .split_whitespace()
                .map(|a| format!("`{prefix}{a}`"))
                .collect();
            section.push_str(&format!(" Also {}.", aliases.join(", ")));
        }
        section.push('\n');
    }
    section
}

/// Builds the help message, limited to `category` when one is given.
#[must_use]
pub fn help_text(prefix: &str, category: Option<HelpCategory>) -> String {
    let mut text = String::from("**GrooveBuddy Help**\n");
    match category {
        Some(category) => text.push_str(&category_section(prefix, category)),
        None => {
            text.push_str(&format!(
                "Every command works as a slash command or with the `{prefix}` prefix.\n\n"
            ));
            for category in HelpCategory::ALL {
                text.push_str(&category_section(prefix, category));
                text.push('\n');
            }
            text.push_str("I leave on my own after sitting idle for a while.");
        }
    }
    text
}

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use super::{HelpCategory, help_text};
    use crate::{
        bot::BotData,
        errors::{Error, Result},
    };

    /// Responds with "Pong!" to test bot connectivity.
    #[poise::command(slash_command, prefix_command)]
    pub async fn ping(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        ctx.say("Pong!").await?;
        Ok(())
    }

    /// Displays help information about available commands.
    #[poise::command(slash_command, prefix_command)]
    pub async fn help(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Only show one group of commands"] category: Option<HelpCategory>,
    ) -> Result<()> {
        let prefix = &ctx.data().settings.bot.prefix;
        ctx.say(help_text(prefix, category)).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_help_lists_every_category() {
        let text = help_text("!", None);
        assert!(text.contains("`!` prefix"));
        assert!(text.contains("**Playback**"));
        assert!(text.contains("**Queue**"));
        assert!(text.contains("**Utility**"));
        assert!(text.ends_with("sitting idle for a while."));
    }

    #[test]
    fn test_category_help_shows_only_that_group() {
        let text = help_text("!", Some(HelpCategory::Queue));
        assert!(text.contains("**Queue**"));
        assert!(text.contains("`/remove <start> [end]`"));
        assert!(text.contains("Also `!q`."));
        assert!(!text.contains("**Playback**"));
        assert!(!text.contains("/ping"));
    }

    #[test]
    fn test_aliases_use_configured_prefix() {
        let text = help_text("?", Some(HelpCategory::Playback));
        assert!(text.contains("Also `?vol`, `?v`."));
        assert!(text.contains("Also `?np`, `?song`, `?track`."));
        assert!(!text.contains("/queue"));
    }
}
