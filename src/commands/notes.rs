use super::say_long;
use crate::{Context, Error};
use chrono::{DateTime, Utc};
use poise::serenity_prelude as serenity;
use std::fmt::Write as _;

/// Private notes about members
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    subcommands("add", "list", "remove"),
    subcommand_required,
    required_permissions = "MODERATE_MEMBERS",
    default_member_permissions = "MODERATE_MEMBERS"
)]
pub async fn note(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Write a note about a member
#[poise::command(prefix_command, slash_command, guild_only)]
async fn add(
    ctx: Context<'_>,
    #[description = "Member the note is about"] user: serenity::User,
    #[description = "Note text"]
    #[rest]
    content: String,
) -> Result<(), Error> {
    let note = ctx
        .data()
        .notes
        .add(user.id.get(), ctx.author().id.get(), content)
        .await?;
    ctx.say(format!("Added note {} about {}.", note.id, user.name))
        .await?;
    Ok(())
}

/// List the notes about a member
#[poise::command(prefix_command, slash_command, guild_only)]
async fn list(
    ctx: Context<'_>,
    #[description = "Member to look up"] user: serenity::User,
) -> Result<(), Error> {
    let notes = ctx.data().notes.for_user(user.id.get()).await?;
    if notes.is_empty() {
        ctx.say(format!("No notes about {}.", user.name)).await?;
        return Ok(());
    }

    let mut text = format!("Notes about {}\n", user.name);
    for note in notes {
        let date = DateTime::<Utc>::from_timestamp(note.date, 0)
            .map_or_else(|| note.date.to_string(), |d| d.format("%Y-%m-%d").to_string());
        let _ = writeln!(
            text,
            "- `{}` {date} by <@{}>: {}",
            note.id, note.moderator, note.content
        );
    }
    say_long(ctx, &text).await
}

/// Delete a note by its ID
#[poise::command(prefix_command, slash_command, guild_only)]
async fn remove(ctx: Context<'_>, #[description = "Note ID"] id: String) -> Result<(), Error> {
    let reply = if ctx.data().notes.remove(id.trim()).await? {
        format!("Removed note {id}.")
    } else {
        format!("There is no note {id}.")
    };
    ctx.say(reply).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_subcommands() {
        let cmd = note();
        let names: Vec<_> = cmd.subcommands.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["add", "list", "remove"]);
        assert!(cmd.subcommand_required);
        assert!(cmd.subcommands.iter().all(|c| c.guild_only));
    }
}
