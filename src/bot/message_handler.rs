//! Message Handler module for processing incoming Telegram messages

use anyhow::Result;
use teloxide::prelude::*;
use tracing::{debug, error};

use crate::localization::t_lang;
use crate::orchestrator::{EventKind, InboundEvent};
use crate::session::Identity;

use super::effect_runner::{dispatch_reply, BotContext};

/// Classify message text as a command or a plain answer
pub fn event_kind_for_text(text: &str) -> EventKind {
    if text.trim_start().starts_with('/') {
        EventKind::Command
    } else {
        EventKind::Text
    }
}

/// Event id for a Telegram message (unique per chat)
pub fn message_event_id(chat_id: ChatId, message_id: i32) -> String {
    format!("msg:{}:{}", chat_id.0, message_id)
}

async fn handle_text_message(bot: &Bot, msg: &Message, ctx: &BotContext, text: &str) -> Result<()> {
    let Some(user) = msg.from.as_ref() else {
        debug!(chat_id = %msg.chat.id, "Ignoring message without sender");
        return Ok(());
    };

    let identity = Identity(user.id.0 as i64);
    let language_code = user.language_code.as_deref();
    let kind = event_kind_for_text(text);

    debug!(user_id = %identity, kind = ?kind, message_length = text.len(), "Received text message from user");

    let event = InboundEvent::new(message_event_id(msg.chat.id, msg.id.0), identity, kind, text)
        .with_language(language_code);

    let Some(reply) = ctx.orchestrator.handle_event(event).await else {
        return Ok(());
    };

    if let Err(e) = dispatch_reply(ctx, identity, reply).await {
        error!(user_id = %identity, error = %e, "Failed to deliver reply");
        bot.send_message(msg.chat.id, t_lang("delivery-failed", language_code))
            .await?;
    }
    Ok(())
}

async fn handle_unsupported_message(bot: &Bot, msg: &Message) -> Result<()> {
    let language_code = msg
        .from
        .as_ref()
        .and_then(|user| user.language_code.as_deref());

    debug!(user_id = %msg.chat.id, "Received unsupported message type from user");

    bot.send_message(msg.chat.id, t_lang("unsupported-message", language_code))
        .await?;
    Ok(())
}

pub async fn message_handler(bot: Bot, msg: Message, ctx: BotContext) -> Result<()> {
    match msg.text() {
        Some(text) => handle_text_message(&bot, &msg, &ctx, text).await,
        None => handle_unsupported_message(&bot, &msg).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_for_text() {
        assert_eq!(event_kind_for_text("/start"), EventKind::Command);
        assert_eq!(event_kind_for_text("  /pay"), EventKind::Command);
        assert_eq!(event_kind_for_text("70"), EventKind::Text);
        assert_eq!(event_kind_for_text("what about /pay?"), EventKind::Text);
    }

    #[test]
    fn test_message_event_id_is_chat_scoped() {
        assert_eq!(message_event_id(ChatId(5), 10), "msg:5:10");
        assert_ne!(message_event_id(ChatId(5), 10), message_event_id(ChatId(6), 10));
    }
}
