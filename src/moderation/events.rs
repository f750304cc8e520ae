//! Guild event log: message edits and deletions, member, ban, channel and
//! voice changes posted to the log channel

use crate::config::EventLogConfig;
use crate::moderation::{GuildActions, audit_log};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// What the log remembers about a guild message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedMessage {
    pub id: u64,
    pub author: u64,
    pub content: String,
    pub attachments: usize,
    /// Unix time it was sent or last edited
    pub timestamp: i64,
}

/// Recent messages per channel, oldest evicted first
#[derive(Clone)]
pub struct MessageCache {
    channels: Arc<DashMap<u64, VecDeque<CachedMessage>>>,
    capacity: usize,
}

impl MessageCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            capacity,
        }
    }

    /// Store a message, replacing an earlier version with the same ID
    pub fn remember(&self, channel: u64, message: CachedMessage) {
        if self.capacity == 0 {
            return;
        }
        let mut messages = self.channels.entry(channel).or_default();
        messages.retain(|m| m.id != message.id);
        messages.push_back(message);
        while messages.len() > self.capacity {
            messages.pop_front();
        }
    }

    #[must_use]
    pub fn get(&self, channel: u64, id: u64) -> Option<CachedMessage> {
        self.channels
            .get(&channel)?
            .iter()
            .find(|m| m.id == id)
            .cloned()
    }

    /// Remove and return a message
    pub fn take(&self, channel: u64, id: u64) -> Option<CachedMessage> {
        let mut messages = self.channels.get_mut(&channel)?;
        let index = messages.iter().position(|m| m.id == id)?;
        messages.remove(index)
    }

    #[must_use]
    pub fn len(&self, channel: u64) -> usize {
        self.channels.get(&channel).map_or(0, |m| m.len())
    }
}

/// User fields shown in member and ban entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSummary {
    pub id: u64,
    pub name: String,
    pub bot: bool,
}

/// Channel fields shown in channel entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSummary {
    pub id: u64,
    pub name: String,
    pub topic: Option<String>,
    pub kind: String,
    pub overwrites: usize,
    pub parent: Option<u64>,
}

/// Voice channel and flags of a member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceSummary {
    pub user: u64,
    pub channel: Option<u64>,
    pub deaf: bool,
    pub mute: bool,
}

/// Member and ban events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberEvent {
    Joined,
    Left,
    Banned,
    Unbanned,
}

impl MemberEvent {
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Joined => "Member joined",
            Self::Left => "Member left",
            Self::Banned => "Member banned",
            Self::Unbanned => "Member unbanned",
        }
    }
}

type Part = Vec<(&'static str, String)>;

/// `**Key:** value` lines, blank line between parts
fn render(parts: &[Part]) -> String {
    parts
        .iter()
        .map(|part| {
            part.iter()
                .map(|(key, value)| format!("**{key}:** {value}"))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn iso(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map_or_else(|| timestamp.to_string(), |t| t.to_rfc3339())
}

fn message_part(label: &str, message: &CachedMessage) -> Part {
    vec![
        ("Message", label.to_string()),
        ("Content", message.content.clone()),
        ("Attachments", message.attachments.to_string()),
        ("Timestamp", iso(message.timestamp)),
    ]
}

fn channel_part(label: &str, channel: &ChannelSummary) -> Part {
    vec![
        ("Channel", label.to_string()),
        ("Name", channel.name.clone()),
        ("Topic", channel.topic.clone().unwrap_or_else(|| "none".to_string())),
        ("Type", channel.kind.clone()),
        ("Overwrites", channel.overwrites.to_string()),
        (
            "Parent",
            channel
                .parent
                .map_or_else(|| "none".to_string(), |p| format!("<#{p}>")),
        ),
    ]
}

#[must_use]
pub fn deleted_body(channel: u64, cached: Option<&CachedMessage>) -> String {
    let part = match cached {
        Some(m) => vec![
            ("Channel", format!("<#{channel}>")),
            ("Author", format!("<@{}>", m.author)),
            ("Content", m.content.clone()),
            ("Attachments", m.attachments.to_string()),
            ("Timestamp", iso(m.timestamp)),
        ],
        None => vec![
            ("Status", "Message not cached".to_string()),
            ("Channel", format!("<#{channel}>")),
        ],
    };
    render(&[part])
}

#[must_use]
pub fn edited_body(channel: u64, old: Option<&CachedMessage>, new: &CachedMessage) -> String {
    let mut parts = vec![vec![
        ("Channel", format!("<#{channel}>")),
        ("Author", format!("<@{}>", new.author)),
    ]];
    if let Some(old) = old {
        parts.push(message_part("old", old));
    }
    parts.push(message_part("new", new));
    render(&parts)
}

#[must_use]
pub fn member_body(user: &UserSummary) -> String {
    render(&[vec![
        ("Name", user.name.clone()),
        ("Is bot", user.bot.to_string()),
        ("User id", user.id.to_string()),
    ]])
}

#[must_use]
pub fn member_update_body(user: &UserSummary, roles: &[u64], nick: Option<&str>) -> String {
    let roles = if roles.is_empty() {
        "none".to_string()
    } else {
        roles
            .iter()
            .map(|r| format!("<@&{r}>"))
            .collect::<Vec<_>>()
            .join(", ")
    };
    render(&[vec![
        ("User", format!("<@{}>", user.id)),
        ("Is bot", user.bot.to_string()),
        ("Roles", roles),
        ("Nick", nick.unwrap_or("none").to_string()),
    ]])
}

#[must_use]
pub fn channel_body(old: Option<&ChannelSummary>, new: &ChannelSummary, deleted: bool) -> String {
    let mut parts = Vec::new();
    if let Some(old) = old {
        parts.push(channel_part("old", old));
    }
    parts.push(channel_part(if deleted { "deleted" } else { "new" }, new));
    render(&parts)
}

/// Voice entry, `None` when nothing worth logging happened
#[must_use]
pub fn voice_body(previous: Option<u64>, state: &VoiceSummary) -> Option<String> {
    let (label, channel) = match (previous, state.channel) {
        (None, None) => return None,
        (None, Some(channel)) => ("Joined", channel),
        (Some(_), Some(channel)) => ("Status update", channel),
        (Some(channel), None) => ("Left", channel),
    };
    Some(render(&[vec![
        ("State", label.to_string()),
        ("Channel", format!("<#{channel}>")),
        ("User", format!("<@{}>", state.user)),
        ("Is deaf", state.deaf.to_string()),
        ("Is mute", state.mute.to_string()),
    ]]))
}

/// Posts guild events to the log channel according to the enabled toggles
#[derive(Clone)]
pub struct EventLog {
    config: Arc<EventLogConfig>,
    actions: Arc<dyn GuildActions>,
    log_channel: Option<u64>,
    messages: MessageCache,
    /// Voice channel each member is connected to
    voice: Arc<DashMap<u64, u64>>,
}

impl EventLog {
    #[must_use]
    pub fn new(
        config: EventLogConfig,
        actions: Arc<dyn GuildActions>,
        log_channel: Option<u64>,
    ) -> Self {
        Self {
            messages: MessageCache::new(config.max_message_cache),
            config: Arc::new(config),
            actions,
            log_channel,
            voice: Arc::new(DashMap::new()),
        }
    }

    #[must_use]
    pub fn messages(&self) -> &MessageCache {
        &self.messages
    }

    async fn post(&self, title: &str, body: String) {
        audit_log(self.actions.as_ref(), self.log_channel, title, body).await;
    }

    pub fn message_created(&self, channel: u64, message: CachedMessage) {
        self.messages.remember(channel, message);
    }

    /// Log an edit. `author` may be unknown on partial updates, in which case
    /// the cached author is used.
    pub async fn message_edited(
        &self,
        channel: u64,
        id: u64,
        author: Option<u64>,
        content: String,
        attachments: usize,
    ) {
        let old = self.messages.get(channel, id);
        let Some(author) = author.or_else(|| old.as_ref().map(|m| m.author)) else {
            debug!(channel, id, "Edit of an unknown message skipped");
            return;
        };
        let new = CachedMessage {
            id,
            author,
            content,
            attachments,
            timestamp: Utc::now().timestamp(),
        };
        self.messages.remember(channel, new.clone());

        // Embed unfurls arrive as edits with the same text
        let unchanged = old
            .as_ref()
            .is_some_and(|o| o.content == new.content && o.attachments == new.attachments);
        if self.config.message_edit && !unchanged {
            self.post("Message edited", edited_body(channel, old.as_ref(), &new))
                .await;
        }
    }

    pub async fn message_deleted(&self, channel: u64, id: u64) {
        let cached = self.messages.take(channel, id);
        if self.config.message_delete {
            self.post("Message deleted", deleted_body(channel, cached.as_ref()))
                .await;
        }
    }

    pub async fn member(&self, event: MemberEvent, user: &UserSummary) {
        let enabled = match event {
            MemberEvent::Joined => self.config.member_join,
            MemberEvent::Left => self.config.member_leave,
            MemberEvent::Banned | MemberEvent::Unbanned => self.config.bans,
        };
        if enabled {
            self.post(event.title(), member_body(user)).await;
        }
    }

    pub async fn member_updated(&self, user: &UserSummary, roles: &[u64], nick: Option<&str>) {
        if self.config.member_update {
            self.post("Member updated", member_update_body(user, roles, nick))
                .await;
        }
    }

    pub async fn channel_created(&self, channel: &ChannelSummary) {
        if self.config.channels {
            self.post("Channel created", channel_body(None, channel, false))
                .await;
        }
    }

    pub async fn channel_updated(&self, old: Option<&ChannelSummary>, new: &ChannelSummary) {
        if self.config.channels {
            self.post("Channel updated", channel_body(old, new, false)).await;
        }
    }

    pub async fn channel_deleted(&self, channel: &ChannelSummary) {
        if self.config.channels {
            self.post("Channel deleted", channel_body(None, channel, true))
                .await;
        }
    }

    pub async fn voice_changed(&self, state: VoiceSummary) {
        let previous = match state.channel {
            Some(channel) => self.voice.insert(state.user, channel),
            None => self.voice.remove(&state.user).map(|(_, channel)| channel),
        };
        if !self.config.voice {
            return;
        }
        if let Some(body) = voice_body(previous, &state) {
            self.post("Voice state", body).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moderation::MockGuildActions;

    const LOG: u64 = 900;

    fn message(id: u64, content: &str) -> CachedMessage {
        CachedMessage {
            id,
            author: 7,
            content: content.to_string(),
            attachments: 0,
            timestamp: 0,
        }
    }

    fn owl() -> UserSummary {
        UserSummary {
            id: 7,
            name: "owl".to_string(),
            bot: false,
        }
    }

    #[test]
    fn test_message_cache_is_bounded_per_channel() {
        let cache = MessageCache::new(2);
        cache.remember(1, message(1, "a"));
        cache.remember(1, message(2, "b"));
        cache.remember(1, message(3, "c"));
        cache.remember(2, message(4, "d"));
        assert_eq!(cache.len(1), 2);
        assert!(cache.get(1, 1).is_none());

        cache.remember(1, message(2, "b edited"));
        assert_eq!(cache.len(1), 2);
        assert_eq!(cache.get(1, 2).unwrap().content, "b edited");

        assert_eq!(cache.take(2, 4), Some(message(4, "d")));
        assert_eq!(cache.len(2), 0);
        assert!(cache.take(3, 1).is_none());
    }

    #[test]
    fn test_zero_capacity_cache_keeps_nothing() {
        let cache = MessageCache::new(0);
        cache.remember(1, message(1, "a"));
        assert!(cache.get(1, 1).is_none());
    }

    #[test]
    fn test_deleted_body() {
        assert_eq!(
            deleted_body(5, Some(&message(1, "hello"))),
            "**Channel:** <#5>\n**Author:** <@7>\n**Content:** hello\n\
             **Attachments:** 0\n**Timestamp:** 1970-01-01T00:00:00+00:00"
        );
        assert_eq!(
            deleted_body(5, None),
            "**Status:** Message not cached\n**Channel:** <#5>"
        );
    }

    #[test]
    fn test_edited_body_shows_both_versions() {
        let body = edited_body(5, Some(&message(1, "helo")), &message(1, "hello"));
        let parts: Vec<_> = body.split("\n\n").collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[1].contains("**Message:** old\n**Content:** helo"));
        assert!(parts[2].contains("**Message:** new\n**Content:** hello"));

        assert_eq!(edited_body(5, None, &message(1, "hello")).split("\n\n").count(), 2);
    }

    #[test]
    fn test_member_bodies() {
        assert_eq!(
            member_body(&owl()),
            "**Name:** owl\n**Is bot:** false\n**User id:** 7"
        );
        assert_eq!(
            member_update_body(&owl(), &[1, 2], None),
            "**User:** <@7>\n**Is bot:** false\n**Roles:** <@&1>, <@&2>\n**Nick:** none"
        );
    }

    #[test]
    fn test_channel_body() {
        let general = ChannelSummary {
            id: 3,
            name: "general".to_string(),
            topic: None,
            kind: "text".to_string(),
            overwrites: 2,
            parent: Some(9),
        };
        let renamed = ChannelSummary {
            name: "chat".to_string(),
            ..general.clone()
        };
        let body = channel_body(Some(&general), &renamed, false);
        assert!(body.starts_with("**Channel:** old\n**Name:** general"));
        assert!(body.contains("**Channel:** new\n**Name:** chat\n**Topic:** none"));
        assert!(body.ends_with("**Parent:** <#9>"));
        assert!(channel_body(None, &general, true).starts_with("**Channel:** deleted"));
    }

    #[test]
    fn test_voice_body() {
        let state = |channel| VoiceSummary {
            user: 7,
            channel,
            deaf: false,
            mute: true,
        };
        assert!(voice_body(None, &state(Some(4))).unwrap().starts_with("**State:** Joined\n**Channel:** <#4>"));
        assert!(voice_body(Some(4), &state(Some(4))).unwrap().starts_with("**State:** Status update"));
        assert!(voice_body(Some(4), &state(None)).unwrap().starts_with("**State:** Left\n**Channel:** <#4>"));
        assert!(voice_body(None, &state(None)).is_none());
    }

    #[tokio::test]
    async fn test_edit_and_delete_use_cached_message() {
        let mut actions = MockGuildActions::new();
        actions
            .expect_send_message()
            .withf(|channel, content| {
                *channel == LOG
                    && content.starts_with("**Message edited**")
                    && content.contains("**Content:** first")
                    && content.contains("**Content:** second")
            })
            .times(1)
            .returning(|_, _| Ok(()));
        actions
            .expect_send_message()
            .withf(|channel, content| {
                *channel == LOG
                    && content.starts_with("**Message deleted**")
                    && content.contains("**Content:** second")
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let log = EventLog::new(EventLogConfig::default(), Arc::new(actions), Some(LOG));
        log.message_created(5, message(1, "first"));
        log.message_edited(5, 1, None, "second".to_string(), 0).await;
        // An unfurl with identical text is not logged again
        log.message_edited(5, 1, None, "second".to_string(), 0).await;
        log.message_deleted(5, 1).await;
        assert_eq!(log.messages().len(5), 0);
    }

    #[tokio::test]
    async fn test_disabled_events_are_not_posted() {
        let mut actions = MockGuildActions::new();
        actions.expect_send_message().never();

        let config = EventLogConfig {
            message_delete: false,
            member_join: false,
            voice: false,
            ..EventLogConfig::default()
        };
        let log = EventLog::new(config, Arc::new(actions), Some(LOG));
        log.message_deleted(5, 1).await;
        log.member(MemberEvent::Joined, &owl()).await;
        log.voice_changed(VoiceSummary {
            user: 7,
            channel: Some(4),
            deaf: false,
            mute: false,
        })
        .await;
        // Voice state is still tracked while logging is off
        assert_eq!(log.voice.get(&7).map(|c| *c), Some(4));
    }

    #[tokio::test]
    async fn test_ban_and_voice_posted() {
        let mut actions = MockGuildActions::new();
        actions
            .expect_send_message()
            .withf(|_, content| content.starts_with("**Member banned**\n**Name:** owl"))
            .times(1)
            .returning(|_, _| Ok(()));
        actions
            .expect_send_message()
            .withf(|_, content| content.starts_with("**Voice state**\n**State:** Left"))
            .times(1)
            .returning(|_, _| Ok(()));

        let log = EventLog::new(EventLogConfig::default(), Arc::new(actions), Some(LOG));
        log.member(MemberEvent::Banned, &owl()).await;
        log.voice.insert(7, 4);
        log.voice_changed(VoiceSummary {
            user: 7,
            channel: None,
            deaf: false,
            mute: false,
        })
        .await;
    }
}
