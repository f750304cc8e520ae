use std::{ops::Deref, sync::Arc};

use crate::config::BotConfig;
use crate::models::Models;
use crate::moderation::{
    EventLog, Filter, GuildActions, Infractions, MailRooms, ModerationResult, Mutes, Notes,
};

/// Centralized data structure for the bot
#[derive(Clone)]
pub struct Data(pub Arc<DataInner>);

impl std::fmt::Debug for Data {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Data")
            .field("config", &self.config)
            .field("models", &self.models)
            .finish_non_exhaustive()
    }
}

impl Deref for Data {
    type Target = DataInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Data {
    /// Wire the services on top of opened tables
    ///
    /// # Errors
    /// Fails if a filter pattern does not compile.
    pub fn new(
        config: BotConfig,
        models: Models,
        actions: Arc<dyn GuildActions>,
    ) -> ModerationResult<Self> {
        Ok(Self(Arc::new(DataInner::new(config, models, actions)?)))
    }
}

/// Shared state behind [`Data`]
pub struct DataInner {
    pub config: BotConfig,
    pub models: Models,
    pub actions: Arc<dyn GuildActions>,
    pub infractions: Infractions,
    pub notes: Notes,
    pub mutes: Mutes,
    pub mail: MailRooms,
    pub filter: Filter,
    pub events: EventLog,
}

impl DataInner {
    /// # Errors
    /// See [`Data::new`].
    pub fn new(
        config: BotConfig,
        models: Models,
        actions: Arc<dyn GuildActions>,
    ) -> ModerationResult<Self> {
        let mutes = Mutes::new(
            models.mutes.clone(),
            Arc::clone(&actions),
            config.mute_role_id,
        );
        let infractions = Infractions::new(
            models.infractions.clone(),
            config.infractions.clone(),
            Arc::clone(&actions),
            mutes.clone(),
        );
        let notes = Notes::new(models.notes.clone());
        let mail = MailRooms::new(
            models.mail_rooms.clone(),
            Arc::clone(&actions),
            config.mail.clone(),
            config.log_channel_id,
        );
        let filter = Filter::new(
            config.filter.clone(),
            Arc::clone(&actions),
            config.log_channel_id,
        )?;
        let events = EventLog::new(
            config.event_log.clone(),
            Arc::clone(&actions),
            config.log_channel_id,
        );

        Ok(Self {
            config,
            models,
            actions,
            infractions,
            notes,
            mutes,
            mail,
            filter,
            events,
        })
    }
}
