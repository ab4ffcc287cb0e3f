//! Callback Handler module for processing inline keyboard callback queries

use anyhow::Result;
use teloxide::prelude::*;
use tracing::{debug, error};

use crate::orchestrator::{EventKind, InboundEvent};
use crate::session::Identity;

use super::effect_runner::{dispatch_reply, BotContext};

/// Handle callback queries from inline keyboards
pub async fn callback_handler(bot: Bot, q: CallbackQuery, ctx: BotContext) -> Result<()> {
    let identity = Identity(q.from.id.0 as i64);
    let event_id = format!("cb:{}", q.id.0);
    let token = q.data.clone().unwrap_or_default();
    let language_code = q.from.language_code.clone();

    debug!(user_id = %identity, token = %token, "Received callback query from user");

    // Stop the client's loading spinner whatever happens next
    bot.answer_callback_query(q.id).await?;

    let event = InboundEvent::new(event_id, identity, EventKind::Callback, token)
        .with_language(language_code.as_deref());

    if let Some(reply) = ctx.orchestrator.handle_event(event).await {
        if let Err(e) = dispatch_reply(&ctx, identity, reply).await {
            error!(user_id = %identity, error = %e, "Failed to deliver callback reply");
        }
    }

    Ok(())
}
