use super::{acknowledge, say_long};
use crate::models::InfractionKind;
use crate::moderation::{Escalation, audit_log};
use crate::time::{format_duration, split_leading_duration};
use crate::{Context, Error};
use poise::serenity_prelude as serenity;

/// Reply describing what an infraction led to
#[must_use]
pub fn describe(name: &str, kind: InfractionKind, escalation: Escalation) -> String {
    let mut reply = match kind {
        InfractionKind::Warn => format!("Warned {name}."),
        InfractionKind::Strike => format!("Gave a strike to {name}."),
    };
    match escalation {
        Escalation::None => {}
        Escalation::Mute(duration) => {
            reply.push_str(&format!(" Muted for {}.", format_duration(duration)));
        }
        Escalation::AutoStrike(mute) => {
            reply.push_str(" Their warnings added up to a strike.");
            if let Some(duration) = mute {
                reply.push_str(&format!(" Muted for {}.", format_duration(duration)));
            }
        }
        Escalation::Ban => reply.push_str(" That was their last strike, they have been banned."),
    }
    reply
}

async fn infraction(
    ctx: Context<'_>,
    kind: InfractionKind,
    user: serenity::User,
    reason: Option<String>,
) -> Result<(), Error> {
    let data = ctx.data();
    let escalation = data
        .infractions
        .issue(kind, user.id.get(), ctx.author().id.get(), reason.clone())
        .await?;

    audit_log(
        data.actions.as_ref(),
        data.config.log_channel_id,
        match kind {
            InfractionKind::Warn => "Member warned",
            InfractionKind::Strike => "Member struck",
        },
        format!(
            "<@{}> by <@{}>: {}",
            user.id,
            ctx.author().id,
            reason.as_deref().unwrap_or("No reason given")
        ),
    )
    .await;

    ctx.say(describe(&user.name, kind, escalation)).await?;
    Ok(())
}

/// Warn a member
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "MODERATE_MEMBERS",
    default_member_permissions = "MODERATE_MEMBERS"
)]
pub async fn warn(
    ctx: Context<'_>,
    #[description = "Member to warn"] user: serenity::User,
    #[description = "Why they are warned"]
    #[rest]
    reason: Option<String>,
) -> Result<(), Error> {
    infraction(ctx, InfractionKind::Warn, user, reason).await
}

/// Give a member a strike
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "MODERATE_MEMBERS",
    default_member_permissions = "MODERATE_MEMBERS"
)]
pub async fn strike(
    ctx: Context<'_>,
    #[description = "Member to strike"] user: serenity::User,
    #[description = "Why they get a strike"]
    #[rest]
    reason: Option<String>,
) -> Result<(), Error> {
    infraction(ctx, InfractionKind::Strike, user, reason).await
}

/// Show a member's infractions
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "MODERATE_MEMBERS",
    default_member_permissions = "MODERATE_MEMBERS"
)]
pub async fn history(
    ctx: Context<'_>,
    #[description = "Member to look up"] user: serenity::User,
) -> Result<(), Error> {
    let history = ctx.data().infractions.history(user.id.get()).await?;
    let text = format!(
        "{}\nAccount created: {}",
        history.render(&user.name, true),
        user.id.created_at()
    );
    say_long(ctx, &text).await
}

/// Show your own infractions
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn selfhistory(ctx: Context<'_>) -> Result<(), Error> {
    let author = ctx.author();
    let history = ctx.data().infractions.history(author.id.get()).await?;
    say_long(ctx, &history.render(&author.name, false)).await
}

/// Remove every infraction of a member
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "MODERATE_MEMBERS",
    default_member_permissions = "MODERATE_MEMBERS"
)]
pub async fn pardon(
    ctx: Context<'_>,
    #[description = "Member to pardon"] user: serenity::User,
) -> Result<(), Error> {
    let data = ctx.data();
    let removed = data.infractions.pardon(user.id.get()).await?;
    audit_log(
        data.actions.as_ref(),
        data.config.log_channel_id,
        "Member pardoned",
        format!("<@{}> by <@{}>, {removed} infractions removed", user.id, ctx.author().id),
    )
    .await;
    ctx.say(format!("Removed {removed} infractions from {}.", user.name))
        .await?;
    Ok(())
}

/// Mute a member, optionally for a while (e.g. "1h 30m spamming")
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "MODERATE_MEMBERS",
    default_member_permissions = "MODERATE_MEMBERS"
)]
pub async fn mute(
    ctx: Context<'_>,
    #[description = "Member to mute"] user: serenity::User,
    #[description = "Optional duration such as \"1h 30m\", then the reason"]
    #[rest]
    details: Option<String>,
) -> Result<(), Error> {
    let data = ctx.data();
    let (duration, reason) = details
        .as_deref()
        .map_or((None, None), split_leading_duration);
    data.mutes
        .mute(user.id.get(), duration, reason.clone())
        .await?;

    let length = duration.map_or_else(|| "indefinitely".to_string(), format_duration);
    audit_log(
        data.actions.as_ref(),
        data.config.log_channel_id,
        "Member muted",
        format!(
            "<@{}> by <@{}> ({length}): {}",
            user.id,
            ctx.author().id,
            reason.as_deref().unwrap_or("No reason given")
        ),
    )
    .await;
    ctx.say(format!("Muted {} ({length}).", user.name)).await?;
    Ok(())
}

/// Lift a member's mute
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "MODERATE_MEMBERS",
    default_member_permissions = "MODERATE_MEMBERS"
)]
pub async fn unmute(
    ctx: Context<'_>,
    #[description = "Member to unmute"] user: serenity::User,
) -> Result<(), Error> {
    let data = ctx.data();
    data.mutes.unmute(user.id.get()).await?;
    audit_log(
        data.actions.as_ref(),
        data.config.log_channel_id,
        "Member unmuted",
        format!("<@{}> by <@{}>", user.id, ctx.author().id),
    )
    .await;
    ctx.say(format!("Unmuted {}.", user.name)).await?;
    Ok(())
}

/// Kick a member
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "KICK_MEMBERS",
    default_member_permissions = "KICK_MEMBERS"
)]
pub async fn kick(
    ctx: Context<'_>,
    #[description = "Member to kick"] user: serenity::User,
    #[description = "Why they are kicked"]
    #[rest]
    reason: Option<String>,
) -> Result<(), Error> {
    let data = ctx.data();
    data.actions.kick(user.id.get(), reason.clone()).await?;
    audit_log(
        data.actions.as_ref(),
        data.config.log_channel_id,
        "Member kicked",
        format!(
            "<@{}> by <@{}>: {}",
            user.id,
            ctx.author().id,
            reason.as_deref().unwrap_or("No reason given")
        ),
    )
    .await;
    acknowledge(ctx).await
}

/// Ban a member
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "BAN_MEMBERS",
    default_member_permissions = "BAN_MEMBERS"
)]
pub async fn ban(
    ctx: Context<'_>,
    #[description = "Member to ban"] user: serenity::User,
    #[description = "Why they are banned"]
    #[rest]
    reason: Option<String>,
) -> Result<(), Error> {
    let data = ctx.data();
    data.actions.ban(user.id.get(), reason.clone()).await?;
    audit_log(
        data.actions.as_ref(),
        data.config.log_channel_id,
        "Member banned",
        format!(
            "<@{}> by <@{}>: {}",
            user.id,
            ctx.author().id,
            reason.as_deref().unwrap_or("No reason given")
        ),
    )
    .await;
    acknowledge(ctx).await
}
