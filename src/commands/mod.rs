//! Slash and prefix commands

mod mail;
mod moderation;
mod notes;

pub use mail::close;
pub use moderation::{ban, history, kick, mute, pardon, selfhistory, strike, unmute, warn};
pub use notes::note;

use crate::{Context, Data, Error};

/// Discord rejects messages longer than this
pub const MESSAGE_LIMIT: usize = 2000;

/// Every command the bot registers
#[must_use]
pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![
        warn(),
        strike(),
        history(),
        selfhistory(),
        pardon(),
        mute(),
        unmute(),
        kick(),
        ban(),
        note(),
        close(),
    ]
}

/// Split text on line boundaries into messages Discord will accept
#[must_use]
pub fn chunk_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        let mut line = line;
        // Lines that can't fit on their own are cut
        while line.chars().count() > limit {
            let cut = line
                .char_indices()
                .nth(limit)
                .map_or(line.len(), |(i, _)| i);
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            chunks.push(line[..cut].to_string());
            line = &line[cut..];
        }

        let needed = if current.is_empty() {
            line.chars().count()
        } else {
            current.chars().count() + 1 + line.chars().count()
        };
        if needed > limit {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Reply with text of any length
async fn say_long(ctx: Context<'_>, text: &str) -> Result<(), Error> {
    for chunk in chunk_message(text, MESSAGE_LIMIT) {
        ctx.say(chunk).await?;
    }
    Ok(())
}

/// React to a prefix invocation, or reply to a slash one
async fn acknowledge(ctx: Context<'_>) -> Result<(), Error> {
    match ctx {
        poise::Context::Prefix(prefix) => {
            prefix.msg.react(ctx.serenity_context(), '👍').await?;
        }
        poise::Context::Application(_) => {
            ctx.say("👍").await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_commands_are_guild_only() {
        let commands = all();
        assert_eq!(commands.len(), 11);
        for command in &commands {
            assert!(command.guild_only, "{} should be guild only", command.name);
            assert!(command.create_as_slash_command().is_some());
        }
    }

    #[test]
    fn test_chunk_message() {
        assert_eq!(chunk_message("a\nb", 10), vec!["a\nb"]);
        assert_eq!(chunk_message("aaaa\nbbbb\ncc", 9), vec!["aaaa\nbbbb", "cc"]);
        assert_eq!(chunk_message("abcdefgh", 3), vec!["abc", "def", "gh"]);
        assert!(chunk_message("", 10).is_empty());
    }
}
