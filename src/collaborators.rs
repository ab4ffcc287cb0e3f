//! Narrow interfaces to the services the dialog core depends on.
//!
//! The core never calls these itself; it emits [`SideEffect`](crate::effect::SideEffect)
//! requests and the bot layer performs them through these traits.

use async_trait::async_trait;

use crate::choice_token::ChoiceSet;
use crate::errors::DownstreamError;
use crate::session::{Identity, MessageHandle};

/// Outbound chat transport
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver a message, optionally with buttons, returning its handle
    async fn deliver(
        &self,
        identity: Identity,
        text: &str,
        choices: Option<&ChoiceSet>,
    ) -> Result<MessageHandle, DownstreamError>;

    /// Remove the buttons from a previously delivered message
    async fn clear_choices(
        &self,
        identity: Identity,
        message: MessageHandle,
    ) -> Result<(), DownstreamError>;

    /// Show a "typing" indicator while a slow side effect runs
    async fn show_typing(&self, _identity: Identity) -> Result<(), DownstreamError> {
        Ok(())
    }
}

/// Natural-language completion service
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, DownstreamError>;
}

/// Result of asking the payment provider about a checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentVerification {
    pub confirmed: bool,
    /// Identity recorded on the checkout, if it could be parsed
    pub identity: Option<Identity>,
    /// Provider's reference for the payment
    pub reference: String,
}

/// Checkout link creation and verification
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_payment_link(&self, identity: Identity) -> Result<String, DownstreamError>;

    async fn verify_payment(&self, token: &str) -> Result<PaymentVerification, DownstreamError>;
}
