//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `message_handler`: turns incoming text messages into dialog events
//! - `callback_handler`: turns inline keyboard presses into dialog events
//! - `effect_runner`: delivers replies and performs requested side effects
//! - `transport`: Telegram delivery with retries
//! - `ui_builder`: creates inline keyboards

pub mod callback_handler;
pub mod effect_runner;
pub mod message_handler;
pub mod transport;
pub mod ui_builder;

// Re-export main handler functions for use in main.rs
pub use callback_handler::callback_handler;
pub use message_handler::message_handler;

pub use effect_runner::{dispatch_reply, process_payment_confirmation, BotContext, Collaborators};
pub use transport::TelegramTransport;
pub use ui_builder::create_choice_keyboard;
