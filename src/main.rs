use anyhow::Result;
use serenity::prelude::*;
use std::sync::Arc;
use tracing::{info, error};

mod bot;
mod commands;
mod config;
mod data;
mod database;
mod dates;
mod handler;
mod immersion;
mod scheduler;
mod streaks;
mod utils;

use bot::Bot;
use config::Config;
use database::Database;
use dates::SystemClock;
use handler::Handler;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize logging with environment-based configuration
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "immersion_streak_bot=info,serenity=warn".to_string())
        )
        .init();

    info!("Starting Immersion Streak Bot...");

    let config = Config::from_env()?;
    info!("Loaded configuration: {:?}", config);

    let db = Database::connect(&config.database_url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open database {}: {}", config.database_url, e))?;
    db.init_schema().await?;

    let bot = Bot::new(db, &config, Arc::new(SystemClock));
    let handler = Handler::new(bot.data.clone(), bot.refresh_scheduler(&config));

    let intents = GatewayIntents::GUILDS;

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Discord client: {}", e))?;

    info!("Bot initialized successfully, connecting to Discord...");

    if let Err(why) = client.start().await {
        error!("Discord client error: {}", why);
        return Err(anyhow::anyhow!("Discord client failed: {}", why));
    }

    Ok(())
}
