//! UI Builder module for creating inline keyboards

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::choice_token::ChoiceSet;

/// Telegram limits callback data to 64 bytes
const MAX_CALLBACK_DATA_LEN: usize = 64;

/// Create an inline keyboard from a choice set, one keyboard row per choice row
pub fn create_choice_keyboard(choices: &ChoiceSet) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = choices
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .filter(|button| button.token.len() <= MAX_CALLBACK_DATA_LEN)
                .map(|button| InlineKeyboardButton::callback(button.label.clone(), button.token.clone()))
                .collect::<Vec<_>>()
        })
        .filter(|row| !row.is_empty())
        .collect();

    InlineKeyboardMarkup::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::choice_token::choices_for_state;
    use crate::dialogue::DialogState;

    #[test]
    fn test_keyboard_mirrors_choice_rows() {
        let choices = choices_for_state(DialogState::AskType, Some("en")).unwrap();
        let keyboard = create_choice_keyboard(&choices);
        assert_eq!(keyboard.inline_keyboard.len(), choices.rows.len());
        let total: usize = keyboard.inline_keyboard.iter().map(Vec::len).sum();
        assert_eq!(total, choices.tokens().count());
    }
}
