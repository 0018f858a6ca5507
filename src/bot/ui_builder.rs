//! UI Builder module for creating keyboards and formatting messages

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use teloxide::utils::html;

// Import localization
use crate::localization::{t_args_lang, t_lang};

use crate::deep_link::{start_link, DeepLink};
use crate::keyboard::{render_categories, render_question, ButtonLabel, KeyboardGrid};
use crate::poll_model::{AnswerOptions, AnswerVector, Category, GroupRoster, Question, QuestionId, SubjectRef};

/// Captions of the five-point scale
pub const FIVE_POINT_LABELS: [&str; 5] = ["1️⃣", "2️⃣", "3️⃣", "4️⃣", "5️⃣"];

/// Prefix of the selected option
pub const SELECTED_MARK: &str = "✅";

/// Zero-width character used as the text of the hidden photo link
const HIDDEN_LINK_TEXT: &str = "\u{200b}";

/// Caption of a single button
pub fn button_text(label: ButtonLabel, selected: bool, language_code: Option<&str>) -> String {
    let text = match label {
        ButtonLabel::Option {
            options: AnswerOptions::FivePoint,
            value,
        } => FIVE_POINT_LABELS
            .get(usize::from(value))
            .map(|label| label.to_string())
            .unwrap_or_else(|| (value + 1).to_string()),
        ButtonLabel::Option {
            options: AnswerOptions::YesNo,
            value,
        } => {
            let key = if value == 0 { "answer-no" } else { "answer-yes" };
            t_lang(key, language_code)
        }
        ButtonLabel::Role { row: 0 } => t_lang("role-lecturer", language_code),
        ButtonLabel::Role { .. } => t_lang("role-practice", language_code),
        ButtonLabel::Category(category) => t_lang(category.label_key(), language_code),
    };

    if selected {
        format!("{SELECTED_MARK}{text}")
    } else {
        text
    }
}

/// Convert a rendered grid into a Telegram inline keyboard
pub fn inline_keyboard(grid: &KeyboardGrid, language_code: Option<&str>) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = grid
        .iter()
        .map(|row| {
            row.iter()
                .map(|button| {
                    InlineKeyboardButton::callback(
                        button_text(button.label, button.selected, language_code),
                        button.callback.encode(),
                    )
                })
                .collect()
        })
        .collect();

    InlineKeyboardMarkup::new(rows)
}

/// Answer keyboard of a question with the user's current choices marked
pub fn question_keyboard(
    question_id: QuestionId,
    answers: &AnswerVector,
    language_code: Option<&str>,
) -> InlineKeyboardMarkup {
    inline_keyboard(&render_question(question_id, answers), language_code)
}

/// Teacher-type choice keyboard
pub fn category_keyboard(choices: &[Category], language_code: Option<&str>) -> InlineKeyboardMarkup {
    inline_keyboard(&render_categories(choices), language_code)
}

/// Question text in bold with the hint in italics below it (HTML)
pub fn format_question(question: &Question) -> String {
    let mut text = html::bold(&html::escape(&question.text));
    if !question.hint.trim().is_empty() {
        text.push_str("\n\n");
        text.push_str(&html::italic(&html::escape(&question.hint)));
    }
    text
}

/// Teacher card shown on entry (HTML)
///
/// The photo is attached as an invisible link so Telegram renders its preview
/// above the text.
pub fn format_subject_card(subject: &SubjectRef, language_code: Option<&str>) -> String {
    let name = html::escape(&subject.teacher_name);
    let text = t_args_lang("teacher-text", &[("teacher", name.as_str())], language_code);

    match subject.teacher_photo.as_deref().filter(|url| !url.trim().is_empty()) {
        Some(photo) => format!("{}{}", html::link(photo, HIDDEN_LINK_TEXT), text),
        None => text,
    }
}

/// Group header followed by one poll link per teacher (HTML)
pub fn format_group_roster(roster: &GroupRoster, bot_username: &str, language_code: Option<&str>) -> String {
    let group = html::escape(&roster.group_name);
    let mut lines = vec![t_args_lang("group-teachers", &[("group", group.as_str())], language_code)];

    lines.extend(roster.teachers.iter().map(|teacher| {
        let url = start_link(
            bot_username,
            &DeepLink::Teacher {
                teacher_id: teacher.teacher_id,
                group_id: roster.group_id,
            },
        );
        format!("• {}", html::link(&url, &html::escape(&teacher.name)))
    }));

    lines.join("\n")
}
