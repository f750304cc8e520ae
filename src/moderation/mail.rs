//! Mail rooms: a user's DMs relayed into a private staff channel

use crate::config::MailConfig;
use crate::models::{MailRoom, Table};
use crate::moderation::{GuildActions, ModerationResult, Timers, audit_log};
use chrono::Utc;
use dashmap::DashSet;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Relay text for a message and its attachment URLs
#[must_use]
pub fn relay_text(content: &str, attachments: &[String]) -> String {
    let mut text = if content.trim().is_empty() {
        "<No message>".to_string()
    } else {
        content.to_string()
    };
    if !attachments.is_empty() {
        text.push_str("\n\nAttachments:");
        for url in attachments {
            text.push_str("\n- ");
            text.push_str(url);
        }
    }
    text
}

/// Discord-safe channel name for a user's room
#[must_use]
pub fn channel_name(name: &str, user: u64) -> String {
    let mut slug = String::new();
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        format!("mail-{user}")
    } else {
        format!("mail-{slug}")
    }
}

#[derive(Clone)]
pub struct MailRooms {
    table: Table<MailRoom>,
    actions: Arc<dyn GuildActions>,
    config: Arc<MailConfig>,
    log_channel: Option<u64>,
    /// Expiry timers keyed by room channel
    timers: Timers,
    /// Channels recently found not to be rooms, oldest first
    misses: Arc<Mutex<VecDeque<u64>>>,
    confirming: Arc<DashSet<u64>>,
}

impl MailRooms {
    #[must_use]
    pub fn new(
        table: Table<MailRoom>,
        actions: Arc<dyn GuildActions>,
        config: MailConfig,
        log_channel: Option<u64>,
    ) -> Self {
        Self {
            table,
            actions,
            config: Arc::new(config),
            log_channel,
            timers: Timers::new(),
            misses: Arc::new(Mutex::new(VecDeque::new())),
            confirming: Arc::new(DashSet::new()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &MailConfig {
        &self.config
    }

    /// # Errors
    /// Propagates store failures.
    pub async fn room_for_channel(&self, channel: u64) -> ModerationResult<Option<MailRoom>> {
        if self.misses.lock().await.contains(&channel) {
            return Ok(None);
        }

        let room = self.table.first(MailRoom::CHANNEL.equals(channel)).await?;
        if room.is_none() && self.config.max_cache > 0 {
            let mut misses = self.misses.lock().await;
            misses.push_back(channel);
            while misses.len() > self.config.max_cache {
                misses.pop_front();
            }
        }
        Ok(room)
    }

    /// # Errors
    /// Propagates store failures.
    pub async fn room_for_user(&self, user: u64) -> ModerationResult<Option<MailRoom>> {
        Ok(self.table.get(user).await?)
    }

    /// Create the staff channel and record the room
    ///
    /// # Errors
    /// Fails if the channel can't be created or used, or the row can't be
    /// stored.
    pub async fn open(
        &self,
        user: u64,
        name: &str,
        content: &str,
        attachments: &[String],
    ) -> ModerationResult<MailRoom> {
        let channel = self
            .actions
            .create_mail_channel(channel_name(name, user))
            .await?;
        let room = match self.record_room(user, name, channel, content, attachments).await {
            Ok(room) => room,
            Err(e) => {
                if let Err(cleanup) = self.actions.delete_channel(channel).await {
                    warn!("Could not delete orphaned room channel {channel}: {cleanup}");
                }
                return Err(e);
            }
        };
        self.misses.lock().await.retain(|c| *c != channel);
        self.schedule_expiry(room.clone(), self.config.expiration());

        info!(user, channel, "Mail room opened");
        audit_log(
            self.actions.as_ref(),
            self.log_channel,
            "Mail room opened",
            format!("<@{user}> opened <#{channel}>"),
        )
        .await;
        Ok(room)
    }

    /// Post the opening message into a fresh channel and store the room row
    async fn record_room(
        &self,
        user: u64,
        name: &str,
        channel: u64,
        content: &str,
        attachments: &[String],
    ) -> ModerationResult<MailRoom> {
        let message = relay_text(content, attachments);
        self.actions
            .send_message(
                channel,
                format!("Conversation opened by <@{user}> ({name})\n\n{message}"),
            )
            .await?;

        let room = MailRoom {
            user,
            channel,
            date: Utc::now().timestamp(),
            message,
        };
        self.table.insert(&room).await?;
        Ok(room)
    }

    /// Forward a DM into the user's room. Returns `false` if they have none.
    ///
    /// # Errors
    /// Fails on store or Discord errors.
    pub async fn relay_from_user(
        &self,
        user: u64,
        content: &str,
        attachments: &[String],
    ) -> ModerationResult<bool> {
        let Some(room) = self.room_for_user(user).await? else {
            return Ok(false);
        };
        self.actions
            .send_message(room.channel, relay_text(content, attachments))
            .await?;
        self.schedule_expiry(room, self.config.expiration());
        Ok(true)
    }

    /// Forward a staff message from a room channel to its user. Returns
    /// `false` if the channel is not a room.
    ///
    /// # Errors
    /// Fails on store or Discord errors.
    pub async fn relay_from_staff(
        &self,
        channel: u64,
        content: &str,
        attachments: &[String],
    ) -> ModerationResult<bool> {
        let Some(room) = self.room_for_channel(channel).await? else {
            return Ok(false);
        };
        self.actions
            .direct_message(room.user, relay_text(content, attachments))
            .await?;
        Ok(true)
    }

    /// Tear a room down. Does not touch its timer.
    ///
    /// # Errors
    /// Propagates store failures; Discord failures are only logged.
    pub async fn expire(&self, room: &MailRoom) -> ModerationResult<()> {
        self.table.delete_row(room).await?;

        if let Err(e) = self
            .actions
            .direct_message(room.user, self.config.closing_message.clone())
            .await
        {
            warn!("Could not tell {} their room closed: {e}", room.user);
        }
        if let Err(e) = self.actions.delete_channel(room.channel).await {
            warn!("Could not delete room channel {}: {e}", room.channel);
        }

        info!(user = room.user, channel = room.channel, "Mail room closed");
        audit_log(
            self.actions.as_ref(),
            self.log_channel,
            "Mail room closed",
            format!("Conversation with <@{}> ended", room.user),
        )
        .await;
        Ok(())
    }

    /// Close the room behind `channel` now. Returns `false` if it isn't one.
    ///
    /// # Errors
    /// See [`MailRooms::expire`].
    pub async fn close(&self, channel: u64) -> ModerationResult<bool> {
        let Some(room) = self.room_for_channel(channel).await? else {
            return Ok(false);
        };
        self.timers.cancel(channel);
        self.expire(&room).await?;
        Ok(true)
    }

    /// Re-arm expiry for rooms stored before a restart, based on each
    /// channel's last message. Returns how many rooms are still open.
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn restore(&self) -> ModerationResult<usize> {
        let now = Utc::now().timestamp();
        let expiration = i64::try_from(self.config.expiration).unwrap_or(i64::MAX);
        let mut open = 0;

        for room in self.table.find_all().await? {
            let last = match self.actions.last_activity(room.channel).await {
                Ok(last) => last.unwrap_or(room.date),
                Err(e) => {
                    warn!("Room channel {} is gone ({e}), dropping room", room.channel);
                    self.table.delete_row(&room).await?;
                    continue;
                }
            };

            let remaining = last.saturating_add(expiration).saturating_sub(now);
            if remaining <= 0 {
                if let Err(e) = self.expire(&room).await {
                    error!("Failed to expire room {}: {e}", room.channel);
                }
            } else {
                self.schedule_expiry(room, Duration::from_secs(remaining.unsigned_abs()));
                open += 1;
            }
        }

        info!(open, "Mail rooms restored");
        Ok(open)
    }

    /// Mark a user as answering the confirmation prompt. Returns `false` if
    /// they already are.
    pub fn begin_confirmation(&self, user: u64) -> bool {
        self.confirming.insert(user)
    }

    pub fn end_confirmation(&self, user: u64) {
        self.confirming.remove(&user);
    }

    #[must_use]
    pub fn is_confirming(&self, user: u64) -> bool {
        self.confirming.contains(&user)
    }

    #[must_use]
    pub fn is_scheduled(&self, channel: u64) -> bool {
        self.timers.is_scheduled(channel)
    }

    fn schedule_expiry(&self, room: MailRoom, delay: Duration) {
        debug!(channel = room.channel, ?delay, "Room expiry scheduled");
        let this = self.clone();
        self.timers.schedule(room.channel, delay, async move {
            if let Err(e) = this.expire(&room).await {
                error!("Failed to expire room {}: {e}", room.channel);
            }
        });
    }
}
