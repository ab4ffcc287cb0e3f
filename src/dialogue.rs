//! Intake dialogue state machine.
//!
//! `advance` is the only input-driven way to move a session forward. It never
//! fails: malformed numeric answers re-issue the same question with a format
//! hint, and anything unexpected re-issues the current prompt.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::choice_token::choices_for_state;
use crate::effect::{Reply, SideEffect};
use crate::localization::{t_args_lang, t_lang};
use crate::profile::{Answer, FieldUpdate, ProfileField};
use crate::session::Session;

pub const PAY_COMMAND: &str = "/pay";

lazy_static! {
    /// A whole number, optionally followed by a unit ("70", "70 kg", "180см")
    static ref NUMERIC_ANSWER: Regex = Regex::new(
        r"(?i)^\s*(\d{1,6})\s*(?:kg|kgs|cm|y|yo|yrs?|years?|кг|см|лет|года?)?\.?\s*$"
    )
    .expect("numeric answer pattern is valid");
}

/// Position in the onboarding sequence
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DialogState {
    #[default]
    Initial,
    AskSex,
    AskAge,
    AskHeight,
    AskWeight,
    AskDiabetes,
    AskLevel,
    AskGoal,
    AskType,
    Payment,
    Complete,
}

impl DialogState {
    /// Next state reached by answering this one. `Payment` only leaves
    /// through payment finalization, `Complete` is a sink.
    pub fn next(self) -> Self {
        match self {
            DialogState::Initial => DialogState::AskSex,
            DialogState::AskSex => DialogState::AskAge,
            DialogState::AskAge => DialogState::AskHeight,
            DialogState::AskHeight => DialogState::AskWeight,
            DialogState::AskWeight => DialogState::AskDiabetes,
            DialogState::AskDiabetes => DialogState::AskLevel,
            DialogState::AskLevel => DialogState::AskGoal,
            DialogState::AskGoal => DialogState::AskType,
            DialogState::AskType => DialogState::Payment,
            DialogState::Payment => DialogState::Payment,
            DialogState::Complete => DialogState::Complete,
        }
    }

    /// Profile field answered at this state
    pub fn expected_field(self) -> Option<ProfileField> {
        match self {
            DialogState::AskSex => Some(ProfileField::Sex),
            DialogState::AskAge => Some(ProfileField::Age),
            DialogState::AskHeight => Some(ProfileField::Height),
            DialogState::AskWeight => Some(ProfileField::Weight),
            DialogState::AskDiabetes => Some(ProfileField::Diabetes),
            DialogState::AskLevel => Some(ProfileField::Level),
            DialogState::AskGoal => Some(ProfileField::Goal),
            DialogState::AskType => Some(ProfileField::WorkoutType),
            DialogState::Initial | DialogState::Payment | DialogState::Complete => None,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            DialogState::AskAge | DialogState::AskHeight | DialogState::AskWeight
        )
    }

    pub fn prompt_key(self) -> &'static str {
        match self {
            DialogState::Initial => "prompt-opening",
            DialogState::AskSex => "prompt-sex",
            DialogState::AskAge => "prompt-age",
            DialogState::AskHeight => "prompt-height",
            DialogState::AskWeight => "prompt-weight",
            DialogState::AskDiabetes => "prompt-diabetes",
            DialogState::AskLevel => "prompt-level",
            DialogState::AskGoal => "prompt-goal",
            DialogState::AskType => "prompt-type",
            DialogState::Payment => "payment-intro",
            DialogState::Complete => "already-complete",
        }
    }

    /// Re-prompt with a format hint after an invalid numeric answer
    pub fn retry_key(self) -> &'static str {
        match self {
            DialogState::AskAge => "retry-age",
            DialogState::AskHeight => "retry-height",
            DialogState::AskWeight => "retry-weight",
            other => other.prompt_key(),
        }
    }
}

/// Input fed to the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input<'a> {
    /// Typed text (or a command)
    Text(&'a str),
    /// A translated button press
    Choice(FieldUpdate),
}

/// Validate a numeric answer (age, height, weight)
pub fn validate_numeric_answer(input: &str) -> Result<u32, &'static str> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err("empty");
    }

    let digits = NUMERIC_ANSWER
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .ok_or("not_a_number")?;

    match digits.as_str().parse::<u32>() {
        Ok(0) => Err("not_positive"),
        Ok(value) => Ok(value),
        Err(_) => Err("not_a_number"),
    }
}

/// Prompt for the session's current state, with its buttons
pub fn current_prompt(session: &Session) -> Reply {
    let lang = session.language();
    let text = match session.state {
        DialogState::Payment => t_args_lang(
            "payment-intro",
            &[("summary", &session.profile.summary(lang))],
            lang,
        ),
        state => t_lang(state.prompt_key(), lang),
    };
    let choices = match session.state {
        DialogState::Initial => None,
        state => choices_for_state(state, lang),
    };
    Reply::text(text).with_choices(choices).in_language(lang)
}

/// Turn typed text into the update for a question state
fn text_update(state: DialogState, text: &str) -> Option<FieldUpdate> {
    let update = match state {
        DialogState::AskAge => FieldUpdate::Age(validate_numeric_answer(text).ok()?),
        DialogState::AskHeight => FieldUpdate::Height(validate_numeric_answer(text).ok()?),
        DialogState::AskWeight => FieldUpdate::Weight(validate_numeric_answer(text).ok()?),
        _ if text.trim().is_empty() => return None,
        DialogState::AskSex => FieldUpdate::Sex(Answer::from_text(text)),
        DialogState::AskDiabetes => FieldUpdate::Diabetes(Answer::from_text(text)),
        DialogState::AskLevel => FieldUpdate::Level(Answer::from_text(text)),
        DialogState::AskGoal => FieldUpdate::Goal(Answer::from_text(text)),
        DialogState::AskType => FieldUpdate::WorkoutType(Answer::from_text(text)),
        DialogState::Initial | DialogState::Payment | DialogState::Complete => return None,
    };
    Some(update)
}

fn record(session: &mut Session, update: FieldUpdate) -> Reply {
    if session.profile.apply(update) {
        let from = session.state;
        session.state = from.next();
        debug!(user_id = %session.identity, from = ?from, to = ?session.state, "Dialogue advanced");
    }
    current_prompt(session)
}

/// Advance the dialogue by one input.
///
/// At `Complete` this is a no-op that returns the "already complete" notice;
/// routing free text elsewhere is the caller's job.
pub fn advance(session: &mut Session, input: &Input<'_>) -> Reply {
    let state = session.state;

    match (state, input) {
        (DialogState::Initial, _) => {
            session.state = DialogState::AskSex;
            let lang = session.language();
            Reply::text(t_lang("prompt-opening", lang))
                .with_choices(choices_for_state(DialogState::AskSex, lang))
                .in_language(lang)
        }
        (DialogState::Complete, _) => current_prompt(session),
        (DialogState::Payment, Input::Text(text)) if text.trim() == PAY_COMMAND => {
            let lang = session.language();
            Reply::text(t_lang("payment-link-preparing", lang))
                .with_effect(SideEffect::CreatePaymentLink)
                .in_language(lang)
        }
        (DialogState::Payment, _) => current_prompt(session),
        (state, Input::Choice(update)) => {
            if Some(update.field()) == state.expected_field() {
                record(session, update.clone())
            } else {
                debug!(
                    user_id = %session.identity,
                    state = ?state,
                    field = ?update.field(),
                    "Ignoring answer for a different question"
                );
                current_prompt(session)
            }
        }
        (state, Input::Text(text)) => match text_update(state, text) {
            Some(update) => record(session, update),
            None if state.is_numeric() => {
                let lang = session.language();
                Reply::text(t_lang(state.retry_key(), lang)).in_language(lang)
            }
            None => current_prompt(session),
        },
    }
}
