use std::env;
use std::sync::Arc;

use chat_autoreply::config::{CONFIG_FILE, PluginInfo};
use chat_autoreply::data::SETTINGS_FILE;
use chat_autoreply::handlers::{DiscordHost, Handler};
use chat_autoreply::settings::SettingsStore;
use chat_autoreply::update::GithubTags;
use chat_autoreply::{AutoReplyPlugin, Data, Error, commands, logging};
use poise::serenity_prelude::{self as serenity};
use serenity::GatewayIntents;
use tracing::{error, info};

/// Main function to run the bot
async fn async_main() -> Result<(), Error> {
    // Initialize logging
    logging::init()?;

    // Load environment variables
    let token = env::var("DISCORD_TOKEN").map_err(|_| "DISCORD_TOKEN must be set")?;

    let info = PluginInfo::load(CONFIG_FILE).await;
    let settings =
        SettingsStore::load(SETTINGS_FILE, &AutoReplyPlugin::default_settings()).await?;

    let host = Arc::new(DiscordHost::new(
        Arc::new(serenity::Http::new(&token)),
        settings.clone(),
    ));
    let plugin = AutoReplyPlugin::new(host.clone(), info, Arc::new(GithubTags::default()));
    plugin.init();

    // Set up the bot's data
    let data = Data::new(settings, SETTINGS_FILE, plugin.clone());
    let shutdown_data = data.clone();

    // Configure the Poise framework
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                commands::ping(),
                commands::replies(),
                commands::set_replies(),
                commands::check_update(),
            ],
            pre_command: |ctx| {
                Box::pin(async move {
                    // Log the start of command execution
                    logging::log_command_start(ctx);
                })
            },
            post_command: |ctx| {
                Box::pin(async move {
                    // Log the end of command execution
                    logging::log_command_end(ctx);
                })
            },
            on_error: |error| {
                Box::pin(async move {
                    // Log the error using our logging system
                    logging::log_command_error(&error);
                })
            },
            ..Default::default()
        })
        .setup(|ctx, _ready, framework| {
            Box::pin(async move {
                logging::log_console("Registering commands");
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                // Register the bot's data
                Ok(data)
            })
        })
        .build();

    // Configure the Serenity client
    let intents = GatewayIntents::non_privileged()
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::DIRECT_MESSAGES;
    let mut client = serenity::ClientBuilder::new(token, intents)
        .event_handler(Handler {
            host,
            plugin: plugin.clone(),
        })
        .framework(framework)
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down...");
            shard_manager.shutdown_all().await;
        }
    });

    info!("Starting bot...");
    // Start the bot
    if let Err(err) = client.start().await {
        error!("Error starting the bot: {err}");
    }

    plugin.disable().await;
    shutdown_data.save_settings().await?;
    Ok(())
}

fn main() {
    // Run the async main function
    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(Error::from)
        .and_then(|runtime| runtime.block_on(async_main()));

    // Handle any errors that occurred during execution
    if let Err(err) = result {
        eprintln!("Error: {err}");
    }
}
