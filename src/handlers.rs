use crate::moderation::{CachedMessage, ChannelSummary, MemberEvent, UserSummary, VoiceSummary};
use crate::{Data, ERROR_TARGET, EVENT_TARGET, Error};
use poise::serenity_prelude::{
    self as serenity, ChannelId, Context, EventHandler, GuildChannel, GuildId,
    GuildMemberUpdateEvent, Member, Message, MessageId, MessageUpdateEvent, ReactionType, Ready,
    User, VoiceState,
};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

const CONFIRM: &str = "✅";
const DECLINE: &str = "❎";

/// How a user answered the prompt to open a mail room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Open,
    Declined,
    Expired,
    Unrecognized,
}

impl Confirmation {
    #[must_use]
    pub fn from_reaction(emoji: Option<&ReactionType>) -> Self {
        match emoji {
            None => Self::Expired,
            Some(emoji) if emoji.unicode_eq(CONFIRM) => Self::Open,
            Some(emoji) if emoji.unicode_eq(DECLINE) => Self::Declined,
            Some(_) => Self::Unrecognized,
        }
    }
}

fn user_summary(user: &User) -> UserSummary {
    UserSummary {
        id: user.id.get(),
        name: user.name.clone(),
        bot: user.bot,
    }
}

fn channel_summary(channel: &GuildChannel) -> ChannelSummary {
    ChannelSummary {
        id: channel.id.get(),
        name: channel.name.clone(),
        topic: channel.topic.clone(),
        kind: channel.kind.name().to_string(),
        overwrites: channel.permission_overwrites.len(),
        parent: channel.parent_id.map(ChannelId::get),
    }
}

pub struct Handler {
    data: Data,
    restored: AtomicBool,
}

impl Handler {
    #[must_use]
    pub const fn new(data: Data) -> Self {
        Self {
            data,
            restored: AtomicBool::new(false),
        }
    }

    /// Re-arm persisted timers. Only the first `ready` does this; later ones
    /// are reconnects.
    async fn restore(&self) {
        if self.restored.swap(true, Ordering::SeqCst) {
            return;
        }
        match self.data.mutes.restore().await {
            Ok(count) => info!(target: EVENT_TARGET, count, "Mute timers restored"),
            Err(e) => error!(target: ERROR_TARGET, error = %e, "Failed to restore mutes"),
        }
        match self.data.mail.restore().await {
            Ok(count) => info!(target: EVENT_TARGET, count, "Mail rooms restored"),
            Err(e) => error!(target: ERROR_TARGET, error = %e, "Failed to restore mail rooms"),
        }
    }

    fn is_home(&self, guild: Option<GuildId>) -> bool {
        guild.is_some_and(|g| g.get() == self.data.config.guild_id)
    }

    async fn route(&self, ctx: &Context, msg: &Message) -> Result<(), Error> {
        if msg.author.bot {
            return Ok(());
        }
        let attachments: Vec<String> = msg.attachments.iter().map(|a| a.url.clone()).collect();

        match msg.guild_id {
            None if msg.content.starts_with(&self.data.config.command_prefix) => Ok(()),
            None => self.direct_message(ctx, msg, &attachments).await,
            guild if self.is_home(guild) => self.guild_message(msg, &attachments).await,
            Some(_) => Ok(()),
        }
    }

    async fn guild_message(&self, msg: &Message, attachments: &[String]) -> Result<(), Error> {
        let channel = msg.channel_id.get();
        let blocked = self
            .data
            .filter
            .screen(
                channel,
                msg.id.get(),
                msg.author.id.get(),
                &msg.content,
                msg.mentions.len(),
            )
            .await?;
        if let Some(violation) = blocked {
            debug!(target: EVENT_TARGET, channel = %msg.channel_id, ?violation, "Message filtered");
            return Ok(());
        }

        self.data.events.message_created(
            channel,
            CachedMessage {
                id: msg.id.get(),
                author: msg.author.id.get(),
                content: msg.content.clone(),
                attachments: msg.attachments.len(),
                timestamp: msg.timestamp.unix_timestamp(),
            },
        );

        if msg.content.starts_with(&self.data.config.command_prefix) {
            return Ok(());
        }
        let relayed = self
            .data
            .mail
            .relay_from_staff(channel, &msg.content, attachments)
            .await?;
        if relayed {
            debug!(target: EVENT_TARGET, channel = %msg.channel_id, "Staff reply relayed");
        }
        Ok(())
    }

    async fn direct_message(
        &self,
        ctx: &Context,
        msg: &Message,
        attachments: &[String],
    ) -> Result<(), Error> {
        let mail = &self.data.mail;
        let user = msg.author.id.get();

        if mail.is_confirming(user) {
            return Ok(());
        }
        if mail.relay_from_user(user, &msg.content, attachments).await? {
            msg.react(ctx, '📨').await?;
            return Ok(());
        }
        if !mail.begin_confirmation(user) {
            return Ok(());
        }

        let answer = self.confirm(ctx, msg).await;
        mail.end_confirmation(user);

        if answer? == Confirmation::Open {
            mail.open(user, &msg.author.name, &msg.content, attachments)
                .await?;
            msg.react(ctx, '📨').await?;
        }
        Ok(())
    }

    async fn confirm(&self, ctx: &Context, msg: &Message) -> Result<Confirmation, Error> {
        let config = self.data.mail.config();
        let prompt = msg
            .channel_id
            .say(ctx, config.confirmation_message.clone())
            .await?;
        prompt.react(ctx, ReactionType::Unicode(CONFIRM.to_string())).await?;
        prompt.react(ctx, ReactionType::Unicode(DECLINE.to_string())).await?;

        let reaction = prompt
            .await_reaction(ctx)
            .author_id(msg.author.id)
            .timeout(config.confirm_patience())
            .await;
        let answer = Confirmation::from_reaction(reaction.as_ref().map(|r| &r.emoji));

        let reply = match answer {
            Confirmation::Open => None,
            Confirmation::Declined => Some(&config.ending_conv),
            Confirmation::Expired => Some(&config.confirm_expired),
            Confirmation::Unrecognized => Some(&config.bad_reaction),
        };
        if let Some(reply) = reply {
            msg.channel_id.say(ctx, reply.clone()).await?;
        }
        info!(target: EVENT_TARGET, user = %msg.author.id, ?answer, "Mail confirmation answered");
        Ok(answer)
    }
}

#[serenity::async_trait]
impl EventHandler for Handler {
    /// Called when the bot is ready, but the cache may not be fully populated yet.
    async fn ready(&self, ctx: Context, ready: Ready) {
        let user_name = ready.user.name.clone();
        let shard_id = ctx.shard_id;
        info!(target: EVENT_TARGET, "Connected as {user_name}, shard {shard_id}");
        self.restore().await;
    }

    /// Called when the cache is fully populated.
    async fn cache_ready(&self, ctx: Context, guilds: Vec<GuildId>) {
        let guild_id = GuildId::new(self.data.config.guild_id);
        if !guilds.contains(&guild_id) {
            warn!(target: EVENT_TARGET, "Not a member of the configured guild {guild_id}");
        }
        info!(
            target: EVENT_TARGET,
            "Cache ready! The bot is in {} guild(s)",
            ctx.cache.guild_count()
        );
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if let Err(e) = self.route(&ctx, &msg).await {
            error!(
                target: ERROR_TARGET,
                channel = %msg.channel_id,
                user = %msg.author.id,
                error = %e,
                "Failed to handle message"
            );
        }
    }

    async fn message_update(
        &self,
        _ctx: Context,
        _old_if_available: Option<Message>,
        _new: Option<Message>,
        event: MessageUpdateEvent,
    ) {
        if !self.is_home(event.guild_id) || event.author.as_ref().is_some_and(|a| a.bot) {
            return;
        }
        let Some(content) = event.content else {
            return;
        };
        self.data
            .events
            .message_edited(
                event.channel_id.get(),
                event.id.get(),
                event.author.as_ref().map(|a| a.id.get()),
                content,
                event.attachments.as_ref().map_or(0, Vec::len),
            )
            .await;
    }

    async fn message_delete(
        &self,
        _ctx: Context,
        channel_id: ChannelId,
        deleted_message_id: MessageId,
        guild_id: Option<GuildId>,
    ) {
        if self.is_home(guild_id) {
            self.data
                .events
                .message_deleted(channel_id.get(), deleted_message_id.get())
                .await;
        }
    }

    async fn guild_member_addition(&self, _ctx: Context, new_member: Member) {
        if self.is_home(Some(new_member.guild_id)) {
            self.data
                .events
                .member(MemberEvent::Joined, &user_summary(&new_member.user))
                .await;
        }
    }

    async fn guild_member_removal(
        &self,
        _ctx: Context,
        guild_id: GuildId,
        user: User,
        _member_data_if_available: Option<Member>,
    ) {
        if self.is_home(Some(guild_id)) {
            self.data
                .events
                .member(MemberEvent::Left, &user_summary(&user))
                .await;
        }
    }

    async fn guild_member_update(
        &self,
        _ctx: Context,
        _old_if_available: Option<Member>,
        _new: Option<Member>,
        event: GuildMemberUpdateEvent,
    ) {
        if self.is_home(Some(event.guild_id)) {
            let roles: Vec<u64> = event.roles.iter().map(|r| r.get()).collect();
            self.data
                .events
                .member_updated(&user_summary(&event.user), &roles, event.nick.as_deref())
                .await;
        }
    }

    async fn guild_ban_addition(&self, _ctx: Context, guild_id: GuildId, banned_user: User) {
        if self.is_home(Some(guild_id)) {
            self.data
                .events
                .member(MemberEvent::Banned, &user_summary(&banned_user))
                .await;
        }
    }

    async fn guild_ban_removal(&self, _ctx: Context, guild_id: GuildId, unbanned_user: User) {
        if self.is_home(Some(guild_id)) {
            self.data
                .events
                .member(MemberEvent::Unbanned, &user_summary(&unbanned_user))
                .await;
        }
    }

    async fn channel_create(&self, _ctx: Context, channel: GuildChannel) {
        if self.is_home(Some(channel.guild_id)) {
            self.data
                .events
                .channel_created(&channel_summary(&channel))
                .await;
        }
    }

    async fn channel_update(&self, _ctx: Context, old: Option<GuildChannel>, new: GuildChannel) {
        if self.is_home(Some(new.guild_id)) {
            let old = old.as_ref().map(channel_summary);
            self.data
                .events
                .channel_updated(old.as_ref(), &channel_summary(&new))
                .await;
        }
    }

    async fn channel_delete(
        &self,
        _ctx: Context,
        channel: GuildChannel,
        _messages: Option<Vec<Message>>,
    ) {
        if self.is_home(Some(channel.guild_id)) {
            self.data
                .events
                .channel_deleted(&channel_summary(&channel))
                .await;
        }
    }

    async fn voice_state_update(&self, _ctx: Context, _old: Option<VoiceState>, new: VoiceState) {
        if self.is_home(new.guild_id) {
            self.data
                .events
                .voice_changed(VoiceSummary {
                    user: new.user_id.get(),
                    channel: new.channel_id.map(ChannelId::get),
                    deaf: new.deaf || new.self_deaf,
                    mute: new.mute || new.self_mute,
                })
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_implements_event_handler() {
        fn assert_impl<T: EventHandler>() {}
        assert_impl::<Handler>();
    }

    #[test]
    fn test_summaries() {
        let mut channel = GuildChannel::default();
        channel.id = ChannelId::new(3);
        channel.name = "general".to_string();
        channel.parent_id = Some(ChannelId::new(9));
        let summary = channel_summary(&channel);
        assert_eq!(summary.name, "general");
        assert_eq!(summary.kind, "text");
        assert_eq!(summary.parent, Some(9));
        assert_eq!(summary.overwrites, 0);

        let mut user = User::default();
        user.name = "owl".to_string();
        user.bot = true;
        assert_eq!(
            user_summary(&user),
            UserSummary { id: user.id.get(), name: "owl".to_string(), bot: true }
        );
    }

    #[test]
    fn test_confirmation_from_reaction() {
        let confirm = ReactionType::Unicode(CONFIRM.to_string());
        let decline = ReactionType::Unicode(DECLINE.to_string());
        let other = ReactionType::Unicode("🦉".to_string());

        assert_eq!(Confirmation::from_reaction(Some(&confirm)), Confirmation::Open);
        assert_eq!(Confirmation::from_reaction(Some(&decline)), Confirmation::Declined);
        assert_eq!(Confirmation::from_reaction(Some(&other)), Confirmation::Unrecognized);
        assert_eq!(Confirmation::from_reaction(None), Confirmation::Expired);
    }
}
