//! # Choice Token Translator
//!
//! Button payloads are short tokens: a category prefix followed by the
//! canonical value code (`sex:male`, `gol:weight_loss`). Two special forms
//! bypass field mapping: the bare `pay` token and the `ask:<topic>` family.
//!
//! Translation always produces the canonical stored value, whatever language
//! the button label was rendered in.

use tracing::debug;

use crate::dialogue::DialogState;
use crate::errors::TokenError;
use crate::localization::t_lang;
use crate::profile::{
    Answer, ChoiceValue, DiabetesStatus, FieldUpdate, FitnessLevel, Goal, Sex, WorkoutType,
};
use crate::topics::Topic;

pub const SEX_PREFIX: &str = "sex:";
pub const DIABETES_PREFIX: &str = "dia:";
pub const LEVEL_PREFIX: &str = "lvl:";
pub const GOAL_PREFIX: &str = "gol:";
pub const TYPE_PREFIX: &str = "typ:";
pub const ASK_PREFIX: &str = "ask:";
pub const PAY_TOKEN: &str = "pay";

/// Every field prefix has this length; shorter tokens cannot carry a value
pub const MIN_TOKEN_LEN: usize = 4;

/// What a button press asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenAction {
    /// Answer the current question
    Field(FieldUpdate),
    /// Same as the `/pay` command
    Pay,
    /// Answer a follow-up topic after completion
    FollowUp(Topic),
}

/// Look up `value` in the category's closed table
fn choice<T: ChoiceValue>(prefix: &str, value: &str) -> Result<Answer<T>, TokenError> {
    T::from_code(value)
        .map(Answer::Choice)
        .ok_or_else(|| TokenError::UnknownValue {
            prefix: prefix.to_string(),
            value: value.to_string(),
        })
}

/// Translate a button token into a semantic action
pub fn translate(token: &str) -> Result<TokenAction, TokenError> {
    if token == PAY_TOKEN {
        return Ok(TokenAction::Pay);
    }

    if let Some(topic) = token.strip_prefix(ASK_PREFIX) {
        return Topic::from_code(topic)
            .map(TokenAction::FollowUp)
            .ok_or_else(|| TokenError::UnknownValue {
                prefix: ASK_PREFIX.to_string(),
                value: topic.to_string(),
            });
    }

    if token.len() < MIN_TOKEN_LEN {
        return Err(TokenError::Malformed(token.to_string()));
    }

    let (prefix, value) = match token.find(':') {
        Some(idx) => token.split_at(idx + 1),
        None => return Err(TokenError::UnknownPrefix(token.to_string())),
    };

    let update = match prefix {
        SEX_PREFIX => FieldUpdate::Sex(choice::<Sex>(prefix, value)?),
        DIABETES_PREFIX => FieldUpdate::Diabetes(choice::<DiabetesStatus>(prefix, value)?),
        LEVEL_PREFIX => FieldUpdate::Level(choice::<FitnessLevel>(prefix, value)?),
        GOAL_PREFIX => FieldUpdate::Goal(choice::<Goal>(prefix, value)?),
        TYPE_PREFIX => FieldUpdate::WorkoutType(choice::<WorkoutType>(prefix, value)?),
        _ => return Err(TokenError::UnknownPrefix(prefix.to_string())),
    };

    debug!(token, update = ?update, "Translated choice token");
    Ok(TokenAction::Field(update))
}

/// One button: localized label plus the token it sends back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceButton {
    pub label: String,
    pub token: String,
}

/// Rows of buttons attached to a prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceSet {
    pub rows: Vec<Vec<ChoiceButton>>,
}

impl ChoiceSet {
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .flat_map(|row| row.iter().map(|button| button.token.as_str()))
    }
}

fn value_rows<T: ChoiceValue>(prefix: &str, per_row: usize, language_code: Option<&str>) -> Vec<Vec<ChoiceButton>> {
    T::all()
        .chunks(per_row)
        .map(|chunk| {
            chunk
                .iter()
                .map(|value| ChoiceButton {
                    label: value.label(language_code),
                    token: format!("{prefix}{}", value.code()),
                })
                .collect()
        })
        .collect()
}

/// Buttons offered with the prompt of `state`, if it has any
pub fn choices_for_state(state: DialogState, language_code: Option<&str>) -> Option<ChoiceSet> {
    let rows = match state {
        DialogState::AskSex => value_rows::<Sex>(SEX_PREFIX, 2, language_code),
        DialogState::AskDiabetes => value_rows::<DiabetesStatus>(DIABETES_PREFIX, 2, language_code),
        DialogState::AskLevel => value_rows::<FitnessLevel>(LEVEL_PREFIX, 1, language_code),
        DialogState::AskGoal => value_rows::<Goal>(GOAL_PREFIX, 1, language_code),
        DialogState::AskType => value_rows::<WorkoutType>(TYPE_PREFIX, 2, language_code),
        DialogState::Payment => vec![vec![ChoiceButton {
            label: t_lang("button-pay", language_code),
            token: PAY_TOKEN.to_string(),
        }]],
        DialogState::Complete => topic_rows(language_code),
        DialogState::Initial
        | DialogState::AskAge
        | DialogState::AskHeight
        | DialogState::AskWeight => return None,
    };
    Some(ChoiceSet { rows })
}

fn topic_rows(language_code: Option<&str>) -> Vec<Vec<ChoiceButton>> {
    Topic::ALL
        .chunks(2)
        .map(|chunk| {
            chunk
                .iter()
                .map(|topic| ChoiceButton {
                    label: topic.label(language_code),
                    token: format!("{ASK_PREFIX}{}", topic.code()),
                })
                .collect()
        })
        .collect()
}
