//! # Fitness Intake Bot
//!
//! A Telegram bot that walks a user through a fitness questionnaire, gates the
//! personalised programme behind a payment, then answers follow-up questions.
//!
//! The dialog core (`dialogue`, `choice_token`, `session`, `session_store`,
//! `dedup`, `orchestrator`) performs no I/O. It returns replies and side-effect
//! requests that the `bot` layer carries out through the `collaborators` traits.

pub mod bot;
pub mod choice_token;
pub mod circuit_breaker;
pub mod collaborators;
pub mod config;
pub mod dedup;
pub mod dialogue;
pub mod effect;
pub mod errors;
pub mod localization;
pub mod openai;
pub mod orchestrator;
pub mod payment;
pub mod profile;
pub mod session;
pub mod session_store;
pub mod topics;
