//! Delivers orchestrator replies and performs the side effects they request.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::{debug, error, info, warn};

use crate::choice_token::{choices_for_state, ChoiceSet};
use crate::collaborators::{CompletionProvider, PaymentProvider, Transport};
use crate::dialogue::DialogState;
use crate::effect::{Reply, SideEffect};
use crate::errors::DownstreamError;
use crate::localization::{t_args_lang, t_lang};
use crate::orchestrator::Orchestrator;
use crate::session::Identity;

/// External services used to carry out replies
#[derive(Clone)]
pub struct Collaborators {
    pub transport: Arc<dyn Transport>,
    pub completion: Arc<dyn CompletionProvider>,
    pub payment: Arc<dyn PaymentProvider>,
}

/// Shared handler state
#[derive(Clone)]
pub struct BotContext {
    pub orchestrator: Arc<Orchestrator>,
    pub collaborators: Collaborators,
}

impl BotContext {
    pub fn new(orchestrator: Arc<Orchestrator>, collaborators: Collaborators) -> Self {
        Self {
            orchestrator,
            collaborators,
        }
    }
}

/// Deliver text, remembering the message when it carries buttons
async fn deliver_and_remember(
    ctx: &BotContext,
    identity: Identity,
    text: &str,
    choices: Option<&ChoiceSet>,
) -> Result<(), DownstreamError> {
    let handle = ctx.collaborators.transport.deliver(identity, text, choices).await?;
    if choices.is_some() {
        ctx.orchestrator.remember_choice_message(identity, handle).await;
    }
    Ok(())
}

/// Send a reply to `identity` and run its side effect, if any
pub async fn dispatch_reply(ctx: &BotContext, identity: Identity, reply: Reply) -> Result<()> {
    let transport = &ctx.collaborators.transport;
    let lang = reply.language_code.as_deref();

    if let Some(stale) = reply.clear_choices {
        // The message may be deleted or too old to edit
        if let Err(e) = transport.clear_choices(identity, stale).await {
            debug!(user_id = %identity, error = %e, "Could not clear previous keyboard");
        }
    }

    if !reply.text.is_empty() {
        deliver_and_remember(ctx, identity, &reply.text, reply.choices.as_ref()).await?;
    }

    match reply.effect {
        None => {}
        Some(SideEffect::CreatePaymentLink) => {
            match ctx.collaborators.payment.create_payment_link(identity).await {
                Ok(url) => {
                    info!(user_id = %identity, "Payment link created");
                    transport
                        .deliver(identity, &t_args_lang("payment-link", &[("url", &url)], lang), None)
                        .await?;
                }
                Err(e) => {
                    error!(user_id = %identity, error = %e, "Failed to create payment link");
                    transport
                        .deliver(identity, &t_lang("payment-link-failed", lang), None)
                        .await?;
                }
            }
        }
        Some(SideEffect::RequestCompletion { prompt }) => {
            if let Err(e) = transport.show_typing(identity).await {
                debug!(user_id = %identity, error = %e, "Failed to show typing indicator");
            }
            let text = match ctx.collaborators.completion.complete(&prompt).await {
                Ok(answer) => answer,
                Err(e) if e.is_rate_limited() => {
                    warn!(user_id = %identity, "Completion rate limited");
                    t_lang("completion-rate-limited", lang)
                }
                Err(e) => {
                    warn!(user_id = %identity, error = %e, "Completion failed");
                    t_lang("completion-failed", lang)
                }
            };
            transport.deliver(identity, &text, None).await?;
        }
        Some(SideEffect::SendPlan { prompt }) => {
            if let Err(e) = transport.show_typing(identity).await {
                debug!(user_id = %identity, error = %e, "Failed to show typing indicator");
            }
            match ctx.collaborators.completion.complete(&prompt).await {
                Ok(plan) => {
                    info!(user_id = %identity, plan_len = plan.len(), "Sending workout plan");
                    transport.deliver(identity, &plan, None).await?;
                    let topics = choices_for_state(DialogState::Complete, lang);
                    deliver_and_remember(ctx, identity, &t_lang("plan-followup", lang), topics.as_ref())
                        .await?;
                }
                Err(e) => {
                    error!(user_id = %identity, error = %e, "Failed to generate workout plan");
                    transport
                        .deliver(identity, &t_lang("plan-failed", lang), None)
                        .await?;
                }
            }
        }
    }

    Ok(())
}

/// Verify a checkout with the payment provider and complete the matching session.
///
/// Called by whatever receives the provider's out-of-band notification.
pub async fn process_payment_confirmation(ctx: &BotContext, token: &str) -> Result<()> {
    info!(token, "Processing payment confirmation");

    let verification = ctx
        .collaborators
        .payment
        .verify_payment(token)
        .await
        .map_err(|e| anyhow!("Payment verification failed: {e}"))?;

    let identity = verification.identity;
    let reply = ctx
        .orchestrator
        .confirm_payment(verification)
        .await
        .map_err(|e| anyhow!("Payment confirmation rejected: {e}"))?;

    match (identity, reply) {
        (Some(identity), Some(reply)) => dispatch_reply(ctx, identity, reply).await,
        _ => Ok(()),
    }
}
