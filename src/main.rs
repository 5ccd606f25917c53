use anyhow::{Context, Result};
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::info;

use skinbot::bot::{inbound_from_telegram, HandlerSettings, RequestHandler, TelegramDelivery};
use skinbot::config::BotConfig;
use skinbot::detector::YoloDetector;
use skinbot::localization::init_localization;
use skinbot::logging::init_logging;
use skinbot::session::SessionStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = BotConfig::from_env()?;
    init_logging(&config.log)?;

    info!("Starting Skin Analyzer Telegram Bot");
    info!(config = ?config, "Configuration loaded");

    init_localization()?;

    std::fs::create_dir_all(&config.scratch_dir).with_context(|| {
        format!(
            "failed to create scratch directory {}",
            config.scratch_dir.display()
        )
    })?;

    let detector = YoloDetector::load(config.detector.clone())
        .await
        .context("failed to load detection model")?;

    let bot = Bot::new(config.telegram_token.clone());
    let me = bot.get_me().await.context("failed to reach the Telegram API")?;
    info!(username = ?me.username, "Bot initialized, starting dispatcher");

    let delivery = TelegramDelivery::new(bot.clone(), config.delivery.clone())?;
    let handler = Arc::new(RequestHandler::new(
        Arc::new(delivery),
        Arc::new(detector),
        Arc::new(SessionStore::new()),
        HandlerSettings::from_config(&config),
    ));

    let schema = dptree::entry().branch(Update::filter_message().endpoint({
        let handler = Arc::clone(&handler);
        move |msg: Message| {
            let handler = Arc::clone(&handler);
            async move {
                handler.handle(inbound_from_telegram(&msg)).await;
                Ok::<(), anyhow::Error>(())
            }
        }
    }));

    Dispatcher::builder(bot, schema)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Bot stopped");
    Ok(())
}
