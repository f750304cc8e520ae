//! Moderation services built on the table mapper
//!
//! Every service talks to Discord only through [`GuildActions`], so the
//! policies can be exercised against an in-memory store and a mock guild.

mod actions;
mod error;
mod events;
mod filter;
mod infractions;
mod mail;
mod mutes;
mod notes;
mod timers;

#[cfg(test)]
pub use actions::MockGuildActions;
pub use actions::{DiscordGuild, GuildActions, audit_log};
pub use error::{ModerationError, ModerationResult};
pub use events::{
    CachedMessage, ChannelSummary, EventLog, MemberEvent, MessageCache, UserSummary, VoiceSummary,
};
pub use filter::{Filter, MessageFilter, Violation};
pub use infractions::{Escalation, History, Infractions};
pub use mail::{MailRooms, channel_name, relay_text};
pub use mutes::Mutes;
pub use notes::Notes;
pub use timers::Timers;
