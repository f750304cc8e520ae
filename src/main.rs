use std::{env, sync::Arc};

use hoot::config::BotConfig;
use hoot::handlers::Handler;
use hoot::models::{Models, SqliteStore, Store};
use hoot::moderation::{DiscordGuild, GuildActions};
use hoot::{BOT_NAME, Data, Error, commands, logging};
use poise::serenity_prelude::{self as serenity, GatewayIntents, Http};
use tracing::{error, info};

/// Main function to run the bot
async fn async_main() -> Result<(), Error> {
    logging::init()?;

    let token = env::var("DISCORD_TOKEN").map_err(|_| "DISCORD_TOKEN must be set")?;
    let config = BotConfig::from_env().await?;

    let store: Arc<dyn Store> = Arc::new(SqliteStore::connect(&config.database_url).await?);
    let models = Models::open(store).await?;

    let http = Arc::new(Http::new(&token));
    let actions: Arc<dyn GuildActions> = Arc::new(DiscordGuild::new(
        http,
        config.guild_id,
        config.mail.category_id,
    ));
    let prefix = config.command_prefix.clone();
    let guild_id = serenity::GuildId::new(config.guild_id);
    let data = Data::new(config, models, actions)?;

    let framework_data = data.clone();
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(prefix),
                ..Default::default()
            },
            pre_command: |ctx| {
                Box::pin(async move {
                    logging::log_command_start(ctx);
                })
            },
            post_command: |ctx| {
                Box::pin(async move {
                    logging::log_command_end(ctx);
                })
            },
            on_error: |error| Box::pin(logging::on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                logging::log_console(format!("Registering commands in guild {guild_id}"));
                poise::builtins::register_in_guild(ctx, &framework.options().commands, guild_id)
                    .await?;
                Ok(framework_data)
            })
        })
        .build();

    let intents = GatewayIntents::non_privileged()
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::DIRECT_MESSAGE_REACTIONS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::GUILD_MESSAGE_REACTIONS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MODERATION
        | GatewayIntents::GUILD_VOICE_STATES;
    let mut client = serenity::ClientBuilder::new(token, intents)
        .event_handler(Handler::new(data))
        .framework(framework)
        .await?;

    info!("Starting {BOT_NAME}...");
    client.start().await?;
    Ok(())
}

fn main() {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Failed to start the runtime: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(async_main()) {
        error!("Fatal: {err}");
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
