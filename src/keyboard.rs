//! Keyboard rendering and callback payloads
//!
//! Rendering here is transport-agnostic: a `KeyboardGrid` describes rows of
//! buttons, which option is selected and what each button sends back. The
//! Telegram layer turns the grid into an inline keyboard and localizes labels.

use serde::{Deserialize, Serialize};

use crate::poll_model::{AnswerOptions, AnswerVector, Category, QuestionId, RowLayout};

/// Payload attached to every inline button
///
/// Answers serialize as a compact array `[question_id, row, option]`, where
/// `option` is `null` on row-label buttons. Category choices serialize as the
/// category tag string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CallbackData {
    Answer(QuestionId, usize, Option<u8>),
    Category(Category),
}

impl CallbackData {
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn parse(data: &str) -> Option<Self> {
        serde_json::from_str(data).ok()
    }
}

/// What a button shows, resolved to text by the UI layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonLabel {
    Option { options: AnswerOptions, value: u8 },
    /// Non-selectable caption in front of a row of a split question
    Role { row: usize },
    Category(Category),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyboardButton {
    pub label: ButtonLabel,
    pub selected: bool,
    pub callback: CallbackData,
}

pub type KeyboardGrid = Vec<Vec<KeyboardButton>>;

/// Buttons per row on the category keyboard
pub const CATEGORY_ROW_WIDTH: usize = 2;

/// Render the answer keyboard of one question.
///
/// The answer vector already carries the scale and the row layout chosen for
/// the question under the active category, so the output depends only on the
/// current answers. An option is marked selected exactly when it equals the
/// value stored in its row.
pub fn render_question(question_id: QuestionId, answers: &AnswerVector) -> KeyboardGrid {
    let options = answers.options();
    let split = answers.layout() == RowLayout::Split;

    answers
        .slots()
        .iter()
        .enumerate()
        .map(|(row, slot)| {
            let chosen = slot.value();
            let mut buttons = Vec::with_capacity(options.count() as usize + 1);
            if split {
                buttons.push(KeyboardButton {
                    label: ButtonLabel::Role { row },
                    selected: false,
                    callback: CallbackData::Answer(question_id, row, None),
                });
            }
            buttons.extend(options.values().map(|value| KeyboardButton {
                label: ButtonLabel::Option { options, value },
                selected: chosen == Some(value),
                callback: CallbackData::Answer(question_id, row, Some(value)),
            }));
            buttons
        })
        .collect()
}

/// Render the teacher-type choice keyboard
pub fn render_categories(choices: &[Category]) -> KeyboardGrid {
    choices
        .chunks(CATEGORY_ROW_WIDTH)
        .map(|chunk| {
            chunk
                .iter()
                .map(|&category| KeyboardButton {
                    label: ButtonLabel::Category(category),
                    selected: false,
                    callback: CallbackData::Category(category),
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selected(grid: &KeyboardGrid) -> Vec<(usize, CallbackData)> {
        grid.iter()
            .enumerate()
            .flat_map(|(row, buttons)| {
                buttons
                    .iter()
                    .filter(|button| button.selected)
                    .map(move |button| (row, button.callback.clone()))
            })
            .collect()
    }

    #[test]
    fn test_single_row_five_point() {
        let answers = AnswerVector::new(AnswerOptions::FivePoint, RowLayout::Single);
        let grid = render_question(3, &answers);

        assert_eq!(grid.len(), 1);
        assert_eq!(grid[0].len(), 5);
        assert!(selected(&grid).is_empty());
        assert_eq!(grid[0][4].callback, CallbackData::Answer(3, 0, Some(4)));
    }

    #[test]
    fn test_split_rows_have_role_labels() {
        let answers = AnswerVector::new(AnswerOptions::YesNo, RowLayout::Split);
        let grid = render_question(9, &answers);

        assert_eq!(grid.len(), 2);
        for (row, buttons) in grid.iter().enumerate() {
            assert_eq!(buttons.len(), 3);
            assert_eq!(buttons[0].label, ButtonLabel::Role { row });
            assert_eq!(buttons[0].callback, CallbackData::Answer(9, row, None));
        }
    }

    #[test]
    fn test_marks_exactly_the_stored_value_per_row() {
        let mut answers = AnswerVector::new(AnswerOptions::FivePoint, RowLayout::Split);
        answers.set(0, 2);
        answers.set(1, 4);
        let grid = render_question(5, &answers);

        assert_eq!(
            selected(&grid),
            vec![
                (0, CallbackData::Answer(5, 0, Some(2))),
                (1, CallbackData::Answer(5, 1, Some(4))),
            ]
        );

        // Overwriting moves the mark
        answers.set(0, 0);
        let grid = render_question(5, &answers);
        assert_eq!(selected(&grid)[0], (0, CallbackData::Answer(5, 0, Some(0))));
        assert_eq!(render_question(5, &answers), grid);
    }

    #[test]
    fn test_category_keyboard_layout() {
        let grid = render_categories(&Category::SELECTABLE);
        assert_eq!(grid.len(), 2);
        assert_eq!(grid[0].len(), 2);
        assert_eq!(grid[1].len(), 1);
        assert_eq!(
            grid[1][0].callback,
            CallbackData::Category(Category::LectorPractice)
        );
    }

    #[test]
    fn test_callback_payload_format() {
        assert_eq!(CallbackData::Answer(5, 1, Some(3)).encode(), "[5,1,3]");
        assert_eq!(CallbackData::Answer(5, 0, None).encode(), "[5,0,null]");
        assert_eq!(CallbackData::Category(Category::Lector).encode(), "\"LECTOR\"");

        assert_eq!(
            CallbackData::parse("[5,1,3]"),
            Some(CallbackData::Answer(5, 1, Some(3)))
        );
        assert_eq!(
            CallbackData::parse("\"PRACTIC\""),
            Some(CallbackData::Category(Category::Practice))
        );
        assert_eq!(CallbackData::parse("[5,1]"), None);
        assert_eq!(CallbackData::parse("edit_3"), None);
        assert_eq!(CallbackData::parse("\"UNKNOWN\""), None);
    }
}
