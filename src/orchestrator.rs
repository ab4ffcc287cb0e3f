//! # Dialog Orchestrator
//!
//! Entry point for every inbound event. Composes the deduplicator, the session
//! store, the token translator and the state machine, and hands back the reply
//! plus any side-effect request for the bot layer to perform.
//!
//! An event holds its session lock from lookup to reply, so two events for the
//! same identity never interleave their mutations. Payment finalization takes
//! the same lock.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::choice_token::{choices_for_state, translate, TokenAction};
use crate::collaborators::PaymentVerification;
use crate::config::DialogConfig;
use crate::dedup::EventDeduplicator;
use crate::dialogue::{advance, DialogState, Input, PAY_COMMAND};
use crate::effect::{Reply, SideEffect};
use crate::errors::DialogError;
use crate::localization::{detect_language, t_lang};
use crate::profile::ProfileData;
use crate::session::{Identity, MessageHandle, Session};
use crate::session_store::SessionStore;
use crate::topics;

/// How an inbound event reached the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Text starting with `/`
    Command,
    Text,
    /// Button press carrying a choice token
    Callback,
}

#[derive(Debug, Clone)]
pub struct InboundEvent {
    /// Transport-level id, unique per delivery
    pub event_id: String,
    pub identity: Identity,
    pub kind: EventKind,
    pub payload: String,
    pub language_code: Option<String>,
}

impl InboundEvent {
    pub fn new(event_id: impl Into<String>, identity: Identity, kind: EventKind, payload: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            identity,
            kind,
            payload: payload.into(),
            language_code: None,
        }
    }

    pub fn with_language(mut self, language_code: Option<&str>) -> Self {
        self.language_code = language_code.map(str::to_string);
        self
    }
}

/// Reference recorded when the debug command stands in for a real payment
pub fn manual_payment_reference(identity: Identity) -> String {
    format!("cs_test_manual_{}_{}", identity, Utc::now().timestamp())
}

/// Prompt sent to the completion service for a free-text question
pub fn completion_prompt(profile: &ProfileData, question: &str, language_code: Option<&str>) -> String {
    format!(
        "User data:\n{}\n\nUser message: {}\n\nReply in the user's language ({}).",
        profile.to_json(),
        question,
        detect_language(language_code)
    )
}

/// Prompt asking the completion service for the personalised programme
pub fn plan_prompt(profile: &ProfileData, language_code: Option<&str>) -> String {
    format!(
        "Create a detailed personalized two-week workout program based on the following user data:\n\
         {}\n\n\
         The program must include:\n\
         1. A weekly training plan with days, workout types and duration\n\
         2. A detailed description of each workout with exercises, sets and repetitions\n\
         3. Nutrition recommendations\n\
         4. Progress tracking recommendations\n\
         5. Additional advice based on the user's personal data\n\n\
         Take diabetes into account and adapt the program accordingly.\n\
         Reply in the user's language ({}).",
        profile.to_json(),
        detect_language(language_code)
    )
}

pub struct Orchestrator {
    store: SessionStore,
    dedup: EventDeduplicator,
    config: DialogConfig,
}

impl Orchestrator {
    pub fn new(config: DialogConfig) -> Self {
        Self {
            store: SessionStore::new(),
            dedup: EventDeduplicator::new(&config),
            config,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.store
    }

    pub fn config(&self) -> &DialogConfig {
        &self.config
    }

    /// Copy of the current session for `identity`, if one exists
    pub async fn snapshot(&self, identity: Identity) -> Option<Session> {
        let handle = self.store.get(identity)?;
        let session = handle.lock().await;
        Some(session.clone())
    }

    /// Handle one inbound event. Returns `None` when the event is a duplicate.
    pub async fn handle_event(&self, event: InboundEvent) -> Option<Reply> {
        if self.dedup.seen(&event.event_id) {
            return None;
        }

        let handle = self.store.get_or_create(event.identity);
        let mut session = handle.lock().await;
        session.touch();
        if session.language_code.is_none() {
            session.language_code = event.language_code.clone();
        }

        let payload = event.payload.trim();
        let state_before = session.state;

        let reply = match event.kind {
            EventKind::Command => {
                if self.dedup.is_duplicate_command(&mut session, payload) {
                    return None;
                }
                self.handle_command(&mut session, payload)
            }
            EventKind::Callback => {
                if self.dedup.is_duplicate_callback(&mut session, payload) {
                    return None;
                }
                self.handle_callback(&mut session, payload)
            }
            EventKind::Text => self.handle_text(&mut session, payload),
        };

        debug!(
            user_id = %event.identity,
            event_id = %event.event_id,
            kind = ?event.kind,
            from = ?state_before,
            state = ?session.state,
            "Event handled"
        );

        Some(Self::strip_stale_choices(&mut session, reply))
    }

    /// The previous keyboard is stale once anything new is sent
    fn strip_stale_choices(session: &mut Session, mut reply: Reply) -> Reply {
        reply.clear_choices = session.last_choice_message.take();
        reply
    }

    fn handle_command(&self, session: &mut Session, payload: &str) -> Reply {
        let lang = session.language_code.clone();
        let lang = lang.as_deref();

        // "/start@my_bot extra" -> "/start"
        let command = payload
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .split('@')
            .next()
            .unwrap_or_default();

        match command {
            "/start" => {
                info!(user_id = %session.identity, "Restarting dialogue");
                session.reset();
                advance(session, &Input::Text(""))
            }
            "/help" => Reply::text(t_lang("help", lang)).in_language(lang),
            "/pay" => self.pay(session),
            "/plan" | "/get_plan" => match session.state {
                DialogState::Complete => Reply::text(t_lang("plan-generating", lang))
                    .with_effect(SideEffect::SendPlan {
                        prompt: plan_prompt(&session.profile, lang),
                    })
                    .in_language(lang),
                _ => Reply::text(t_lang("plan-not-ready", lang)).in_language(lang),
            },
            "/complete_payment" if self.config.enable_debug_commands => {
                if session.state != DialogState::Payment {
                    return Reply::text(t_lang("debug-payment-wrong-state", lang)).in_language(lang);
                }
                let reference = manual_payment_reference(session.identity);
                warn!(user_id = %session.identity, reference = %reference, "Completing payment through debug command");
                Self::finalize_locked(session, &reference)
            }
            _ => {
                debug!(user_id = %session.identity, command, "Unknown command");
                Reply::text(t_lang("unknown-command", lang)).in_language(lang)
            }
        }
    }

    fn pay(&self, session: &mut Session) -> Reply {
        let lang = session.language_code.clone();
        let lang = lang.as_deref();
        match session.state {
            DialogState::Payment => advance(session, &Input::Text(PAY_COMMAND)),
            DialogState::Complete => Reply::text(t_lang("already-complete", lang))
                .with_choices(choices_for_state(DialogState::Complete, lang))
                .in_language(lang),
            _ => Reply::text(t_lang("pay-not-ready", lang)).in_language(lang),
        }
    }

    fn handle_text(&self, session: &mut Session, text: &str) -> Reply {
        if session.state != DialogState::Complete {
            return advance(session, &Input::Text(text));
        }

        let lang = session.language_code.clone();
        let lang = lang.as_deref();

        if !session.try_count_completion_request(self.config.max_completion_requests) {
            info!(user_id = %session.identity, limit = self.config.max_completion_requests, "Completion request limit reached");
            return Reply::text(t_lang("completion-limit", lang)).in_language(lang);
        }

        Reply::text("")
            .with_effect(SideEffect::RequestCompletion {
                prompt: completion_prompt(&session.profile, text, lang),
            })
            .in_language(lang)
    }

    fn handle_callback(&self, session: &mut Session, token: &str) -> Reply {
        let lang = session.language_code.clone();
        let lang = lang.as_deref();

        let action = match translate(token) {
            Ok(action) => action,
            Err(e) => {
                let err = DialogError::from(e);
                warn!(user_id = %session.identity, token, error = %err, "Rejected choice token");
                return Reply::text(t_lang("unknown-token", lang)).in_language(lang);
            }
        };

        match action {
            TokenAction::Pay => self.pay(session),
            TokenAction::FollowUp(topic) => match session.state {
                DialogState::Complete => Reply::text(topics::answer(topic, &session.profile, lang))
                    .with_choices(choices_for_state(DialogState::Complete, lang))
                    .in_language(lang),
                _ => Reply::text(t_lang("plan-not-ready", lang)).in_language(lang),
            },
            TokenAction::Field(update) => advance(session, &Input::Choice(update)),
        }
    }

    /// Move a locked session to `Complete` and request the programme.
    fn finalize_locked(session: &mut Session, reference: &str) -> Reply {
        session.finalize_payment(reference);
        info!(
            user_id = %session.identity,
            reference = session.profile.payment_reference.as_deref().unwrap_or_default(),
            "Payment finalized"
        );
        let lang = session.language_code.clone();
        let lang = lang.as_deref();
        Reply::text(t_lang("payment-success", lang))
            .with_effect(SideEffect::SendPlan {
                prompt: plan_prompt(&session.profile, lang),
            })
            .in_language(lang)
    }

    /// Record a confirmed payment for `identity` and move its session to `Complete`.
    ///
    /// Repeating it is harmless: the first reference and timestamp are kept.
    pub async fn finalize(&self, identity: Identity, reference: &str) {
        let handle = self.store.get_or_create(identity);
        let mut session = handle.lock().await;
        Self::finalize_locked(&mut session, reference);
    }

    /// Apply an out-of-band payment confirmation.
    ///
    /// Returns the reply to send (with a `SendPlan` request), or `None` when the
    /// session had already been completed by an earlier confirmation.
    pub async fn confirm_payment(
        &self,
        verification: PaymentVerification,
    ) -> Result<Option<Reply>, DialogError> {
        if !verification.confirmed {
            return Err(DialogError::PaymentNotConfirmed(verification.reference));
        }
        let identity = verification
            .identity
            .ok_or_else(|| DialogError::InvalidIdentity(verification.reference.clone()))?;

        let handle = self.store.get_or_create(identity);
        let mut session = handle.lock().await;
        if session.state == DialogState::Complete {
            debug!(user_id = %identity, reference = %verification.reference, "Payment already finalized");
            return Ok(None);
        }

        let reply = Self::finalize_locked(&mut session, &verification.reference);
        Ok(Some(Self::strip_stale_choices(&mut session, reply)))
    }

    /// Remember the message that now carries the session's choice keyboard
    pub async fn remember_choice_message(&self, identity: Identity, message: MessageHandle) {
        if let Some(handle) = self.store.get(identity) {
            handle.lock().await.last_choice_message = Some(message);
        }
    }

    /// Evict sessions idle longer than the configured TTL, if any
    pub fn evict_idle_sessions(&self) -> usize {
        match self.config.session_ttl {
            Some(ttl) => self.store.evict_idle(ttl),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_reference_format() {
        let reference = manual_payment_reference(Identity(77));
        assert!(reference.starts_with("cs_test_manual_77_"));
        let suffix = reference.trim_start_matches("cs_test_manual_77_");
        assert!(suffix.parse::<i64>().is_ok());
    }

    #[test]
    fn test_plan_prompt_embeds_profile() {
        let mut profile = ProfileData::default();
        profile.weight_kg = Some(82);
        let prompt = plan_prompt(&profile, Some("ru-RU"));
        assert!(prompt.contains("workout program"));
        assert!(prompt.contains("\"weight_kg\": 82"));
        assert!(prompt.contains("(ru)"));
    }

    #[test]
    fn test_completion_prompt_carries_question() {
        let prompt = completion_prompt(&ProfileData::default(), "How often should I run?", None);
        assert!(prompt.contains("How often should I run?"));
        assert!(prompt.contains("(en)"));
    }
}
