pub mod commands;
pub mod config;
pub mod data;
pub mod handlers;
pub mod logging;
pub mod models;
pub mod moderation;
pub mod time;

pub const BOT_NAME: &str = "hoot";
pub const COMMAND_TARGET: &str = "hoot::command";
pub const ERROR_TARGET: &str = "hoot::error";
pub const EVENT_TARGET: &str = "hoot::handlers";
pub const MODEL_TARGET: &str = "hoot::models";
pub const CONSOLE_TARGET: &str = "hoot";

pub use config::BotConfig;
pub use data::{Data, DataInner};
pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
