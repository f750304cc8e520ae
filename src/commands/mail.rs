use crate::{Context, Error};
use poise::serenity_prelude as serenity;

/// Close a mail room, this channel unless another is given
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "MODERATE_MEMBERS",
    default_member_permissions = "MODERATE_MEMBERS"
)]
pub async fn close(
    ctx: Context<'_>,
    #[description = "Mail room to close"] channel: Option<serenity::ChannelId>,
) -> Result<(), Error> {
    let mail = &ctx.data().mail;
    let here = ctx.channel_id();
    let target = channel.unwrap_or(here);

    if mail.room_for_channel(target.get()).await?.is_none() {
        ctx.say(mail.config().unknown_room.clone()).await?;
        return Ok(());
    }

    if target == here {
        // Reply first, the channel is gone afterwards
        ctx.say("Closing this conversation.").await?;
        mail.close(target.get()).await?;
    } else {
        mail.close(target.get()).await?;
        ctx.say(format!("Closed <#{target}>.")).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use poise::serenity_prelude::Permissions;

    #[test]
    fn test_close_definition() {
        let cmd = close();
        assert_eq!(cmd.name, "close");
        assert!(cmd.guild_only);
        assert_eq!(cmd.parameters.len(), 1);
        assert_eq!(cmd.parameters[0].name, "channel");
        assert!(!cmd.parameters[0].required);
        assert_eq!(cmd.required_permissions, Permissions::MODERATE_MEMBERS);
    }
}
