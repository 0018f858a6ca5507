use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use teacher_poll::bot;
use teacher_poll::config::{BotConfig, LogFormat};
use teacher_poll::db::{self, PgPollRepository};
use teacher_poll::localization::init_localization;
use teacher_poll::poll_service::PollService;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("teacher_poll=info,teloxide=warn,sqlx=warn"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(false),
            )
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let mut config = BotConfig::from_env()?;
    init_tracing(config.log_format);

    info!("Starting Teacher Poll Telegram Bot");

    init_localization(&config.locales_dir, &config.default_language)?;

    info!("Connecting to database");
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    // Initialize database schema
    db::init_database_schema(&pool).await?;

    // Initialize the bot
    let bot = Bot::new(config.bot_token.clone());
    if config.bot_username.is_none() {
        let me = bot.get_me().await.context("Failed to query bot identity")?;
        config.bot_username = Some(me.username().to_string());
    }
    info!(username = ?config.bot_username, "Bot initialized, starting dispatcher");

    let repository = Arc::new(PgPollRepository::new(pool));
    let service = Arc::new(PollService::new(
        repository.clone(),
        repository.clone(),
        repository,
    ));
    let config = Arc::new(config);

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(bot::message_handler))
        .branch(Update::filter_callback_query().endpoint(bot::callback_handler));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![service, config])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
