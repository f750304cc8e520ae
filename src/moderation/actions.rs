//! Discord operations used by the moderation services
//!
//! The services only see [`GuildActions`]; [`DiscordGuild`] is the serenity
//! implementation bound to the community's guild.

use crate::moderation::ModerationResult;
use async_trait::async_trait;
use poise::serenity_prelude::{
    ChannelId, ChannelType, CreateChannel, GetMessages, GuildId, Http, MessageId, RoleId,
    UserId,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Operations against the guild
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GuildActions: Send + Sync {
    async fn add_role(&self, user: u64, role: u64, reason: Option<String>) -> ModerationResult<()>;

    async fn remove_role(&self, user: u64, role: u64) -> ModerationResult<()>;

    async fn kick(&self, user: u64, reason: Option<String>) -> ModerationResult<()>;

    async fn ban(&self, user: u64, reason: Option<String>) -> ModerationResult<()>;

    /// Send a direct message to a user
    async fn direct_message(&self, user: u64, content: String) -> ModerationResult<()>;

    /// Send a message to a guild channel
    async fn send_message(&self, channel: u64, content: String) -> ModerationResult<()>;

    /// Create a staff channel for a mail room, returning its ID
    async fn create_mail_channel(&self, name: String) -> ModerationResult<u64>;

    async fn delete_channel(&self, channel: u64) -> ModerationResult<()>;

    async fn delete_message(&self, channel: u64, message: u64) -> ModerationResult<()>;

    /// Unix time of the newest message in a channel, `None` if it is empty
    async fn last_activity(&self, channel: u64) -> ModerationResult<Option<i64>>;
}

/// [`GuildActions`] over the Discord HTTP API
pub struct DiscordGuild {
    http: Arc<Http>,
    guild_id: GuildId,
    mail_category: Option<ChannelId>,
}

impl DiscordGuild {
    #[must_use]
    pub fn new(http: Arc<Http>, guild_id: u64, mail_category: Option<u64>) -> Self {
        Self {
            http,
            guild_id: GuildId::new(guild_id),
            mail_category: mail_category.map(ChannelId::new),
        }
    }
}

#[async_trait]
impl GuildActions for DiscordGuild {
    async fn add_role(&self, user: u64, role: u64, reason: Option<String>) -> ModerationResult<()> {
        self.http
            .add_member_role(
                self.guild_id,
                UserId::new(user),
                RoleId::new(role),
                reason.as_deref(),
            )
            .await?;
        Ok(())
    }

    async fn remove_role(&self, user: u64, role: u64) -> ModerationResult<()> {
        self.http
            .remove_member_role(self.guild_id, UserId::new(user), RoleId::new(role), None)
            .await?;
        Ok(())
    }

    async fn kick(&self, user: u64, reason: Option<String>) -> ModerationResult<()> {
        match reason {
            Some(reason) => {
                self.guild_id
                    .kick_with_reason(&*self.http, UserId::new(user), &reason)
                    .await?;
            }
            None => self.guild_id.kick(&*self.http, UserId::new(user)).await?,
        }
        Ok(())
    }

    async fn ban(&self, user: u64, reason: Option<String>) -> ModerationResult<()> {
        match reason {
            Some(reason) => {
                self.guild_id
                    .ban_with_reason(&*self.http, UserId::new(user), 0, reason)
                    .await?;
            }
            None => self.guild_id.ban(&*self.http, UserId::new(user), 0).await?,
        }
        Ok(())
    }

    async fn direct_message(&self, user: u64, content: String) -> ModerationResult<()> {
        let channel = UserId::new(user).create_dm_channel(&*self.http).await?;
        channel.id.say(&*self.http, content).await?;
        Ok(())
    }

    async fn send_message(&self, channel: u64, content: String) -> ModerationResult<()> {
        ChannelId::new(channel).say(&*self.http, content).await?;
        Ok(())
    }

    async fn create_mail_channel(&self, name: String) -> ModerationResult<u64> {
        let mut builder = CreateChannel::new(name).kind(ChannelType::Text);
        if let Some(category) = self.mail_category {
            builder = builder.category(category);
        }
        let channel = self.guild_id.create_channel(&*self.http, builder).await?;
        Ok(channel.id.get())
    }

    async fn delete_channel(&self, channel: u64) -> ModerationResult<()> {
        ChannelId::new(channel).delete(&*self.http).await?;
        Ok(())
    }

    async fn delete_message(&self, channel: u64, message: u64) -> ModerationResult<()> {
        ChannelId::new(channel)
            .delete_message(&*self.http, MessageId::new(message))
            .await?;
        Ok(())
    }

    async fn last_activity(&self, channel: u64) -> ModerationResult<Option<i64>> {
        let messages = ChannelId::new(channel)
            .messages(&*self.http, GetMessages::new().limit(1))
            .await?;
        Ok(messages.first().map(|m| m.timestamp.unix_timestamp()))
    }
}

/// Post an audit line to the log channel, if one is configured. Failures are
/// logged and swallowed.
pub async fn audit_log(actions: &dyn GuildActions, channel: Option<u64>, title: &str, body: String) {
    info!(action = %title, details = %body, "Audit");
    if let Some(channel) = channel {
        if let Err(e) = actions
            .send_message(channel, format!("**{title}**\n{body}"))
            .await
        {
            warn!("Failed to post audit message to {channel}: {e}");
        }
    }
}
