//! Replies and side-effect requests produced by the dialog core

use crate::choice_token::ChoiceSet;
use crate::session::MessageHandle;

/// Work the core asks an external collaborator to perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    /// Create a checkout link for the user and send it
    CreatePaymentLink,

    /// Answer a free-text question through the completion service
    RequestCompletion { prompt: String },

    /// Generate and send the personalised programme
    SendPlan { prompt: String },
}

/// Outgoing response for one handled event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Text to deliver first; empty when only the side effect produces output
    pub text: String,
    pub choices: Option<ChoiceSet>,
    pub effect: Option<SideEffect>,
    /// Previous choice message whose keyboard is now stale
    pub clear_choices: Option<MessageHandle>,
    pub language_code: Option<String>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            choices: None,
            effect: None,
            clear_choices: None,
            language_code: None,
        }
    }

    pub fn with_choices(mut self, choices: Option<ChoiceSet>) -> Self {
        self.choices = choices;
        self
    }

    pub fn with_effect(mut self, effect: SideEffect) -> Self {
        self.effect = Some(effect);
        self
    }

    pub fn in_language(mut self, language_code: Option<&str>) -> Self {
        self.language_code = language_code.map(str::to_string);
        self
    }
}
