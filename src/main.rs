use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use teloxide::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fitcoach::bot::{self, BotContext, Collaborators, TelegramTransport};
use fitcoach::config::AppConfig;
use fitcoach::localization::init_localization;
use fitcoach::openai::OpenAiClient;
use fitcoach::orchestrator::Orchestrator;
use fitcoach::payment::StripeClient;

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Periodically drop sessions idle for longer than the configured TTL
fn spawn_session_sweeper(orchestrator: Arc<Orchestrator>, ttl: Duration) {
    let period = (ttl / 4).max(Duration::from_secs(60));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            orchestrator.evict_idle_sessions();
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    init_tracing(config.json_logs);

    info!("Starting fitness intake bot");

    init_localization().context("Failed to initialize localization")?;

    let bot = Bot::new(config.telegram_token.clone());

    let orchestrator = Arc::new(Orchestrator::new(config.dialog.clone()));
    if let Some(ttl) = config.dialog.session_ttl {
        info!(ttl_secs = ttl.as_secs(), "Session expiry enabled");
        spawn_session_sweeper(Arc::clone(&orchestrator), ttl);
    }
    if config.dialog.enable_debug_commands {
        warn!("Debug commands are enabled");
    }

    let collaborators = Collaborators {
        transport: Arc::new(TelegramTransport::new(bot.clone(), config.recovery.clone())),
        completion: Arc::new(OpenAiClient::new(
            config.openai.clone(),
            config.recovery.clone(),
        )?),
        payment: Arc::new(StripeClient::new(config.payment.clone(), &config.recovery)?),
    };
    let ctx = BotContext::new(orchestrator, collaborators);

    info!("Bot initialized, starting dispatcher");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(bot::message_handler))
        .branch(Update::filter_callback_query().endpoint(bot::callback_handler));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![ctx])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
