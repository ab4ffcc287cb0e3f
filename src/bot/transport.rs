//! Telegram-backed implementation of the outbound transport.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, MessageId};
use tracing::{debug, warn};

use crate::choice_token::ChoiceSet;
use crate::collaborators::Transport;
use crate::config::RecoveryConfig;
use crate::errors::DownstreamError;
use crate::session::{Identity, MessageHandle};

use super::ui_builder::create_choice_keyboard;

/// Telegram rejects messages longer than this many characters
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Exponential backoff with up to 25% random jitter, capped at the configured maximum
pub fn calculate_retry_delay(attempt: u32, config: &RecoveryConfig) -> Duration {
    let exponential = config
        .base_retry_delay_ms
        .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
    let capped = exponential.min(config.max_retry_delay_ms);
    let jitter = if capped >= 4 {
        rand::thread_rng().gen_range(0..=capped / 4)
    } else {
        0
    };
    Duration::from_millis(capped.saturating_add(jitter).min(config.max_retry_delay_ms))
}

/// Split long text on line boundaries so every chunk fits in one message
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.split_inclusive('\n') {
        if current.chars().count() + line.chars().count() > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if line.chars().count() > max_chars {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

pub struct TelegramTransport {
    bot: Bot,
    recovery: RecoveryConfig,
}

impl TelegramTransport {
    pub fn new(bot: Bot, recovery: RecoveryConfig) -> Self {
        Self { bot, recovery }
    }

    /// Private chats share the user's id
    fn chat_id(identity: Identity) -> ChatId {
        ChatId(identity.0)
    }

    async fn send_with_retry(
        &self,
        identity: Identity,
        text: &str,
        choices: Option<&ChoiceSet>,
    ) -> Result<MessageHandle, DownstreamError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut request = self.bot.send_message(Self::chat_id(identity), text);
            if let Some(choices) = choices {
                request = request.reply_markup(create_choice_keyboard(choices));
            }

            match request.await {
                Ok(message) => return Ok(MessageHandle(message.id.0)),
                Err(e) if attempt <= self.recovery.max_retries => {
                    let delay = calculate_retry_delay(attempt, &self.recovery);
                    warn!(
                        user_id = %identity,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Message delivery failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(DownstreamError::Delivery(format!(
                        "Failed after {attempt} attempts: {e}"
                    )))
                }
            }
        }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn deliver(
        &self,
        identity: Identity,
        text: &str,
        choices: Option<&ChoiceSet>,
    ) -> Result<MessageHandle, DownstreamError> {
        let chunks = split_message(text, MAX_MESSAGE_CHARS);
        let last = chunks.len().saturating_sub(1);
        let mut handle = None;

        // Buttons go on the last chunk
        for (index, chunk) in chunks.iter().enumerate() {
            let markup = if index == last { choices } else { None };
            handle = Some(self.send_with_retry(identity, chunk, markup).await?);
        }

        debug!(user_id = %identity, chunks = chunks.len(), "Message delivered");
        handle.ok_or_else(|| DownstreamError::Delivery("Nothing to deliver".to_string()))
    }

    async fn clear_choices(
        &self,
        identity: Identity,
        message: MessageHandle,
    ) -> Result<(), DownstreamError> {
        self.bot
            .edit_message_reply_markup(Self::chat_id(identity), MessageId(message.0))
            .await
            .map(|_| ())
            .map_err(|e| DownstreamError::Delivery(format!("Failed to clear keyboard: {e}")))
    }

    async fn show_typing(&self, identity: Identity) -> Result<(), DownstreamError> {
        self.bot
            .send_chat_action(Self::chat_id(identity), ChatAction::Typing)
            .await
            .map(|_| ())
            .map_err(|e| DownstreamError::Delivery(format!("Failed to send chat action: {e}")))
    }
}
