//! Telegram presenter: delivers poll effects to a chat

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{ForceReply, MessageId, ParseMode};
use teloxide::{ApiError, RequestError};
use tracing::debug;

use crate::collaborators::Presenter;
use crate::localization::t_lang;
use crate::state_machine::Effect;

use super::ui_builder::{
    category_keyboard, format_group_roster, format_question, format_subject_card, question_keyboard,
};

pub struct TelegramPresenter {
    bot: Bot,
    chat_id: ChatId,
    /// Message the triggering callback came from; keyboards are refreshed there
    message_id: Option<MessageId>,
    language_code: Option<String>,
    bot_username: String,
    question_delay: Duration,
}

impl TelegramPresenter {
    pub fn new(
        bot: Bot,
        chat_id: ChatId,
        language_code: Option<String>,
        bot_username: String,
        question_delay: Duration,
    ) -> Self {
        Self {
            bot,
            chat_id,
            message_id: None,
            language_code,
            bot_username,
            question_delay,
        }
    }

    pub fn for_message(mut self, message_id: MessageId) -> Self {
        self.message_id = Some(message_id);
        self
    }

    fn lang(&self) -> Option<&str> {
        self.language_code.as_deref()
    }
}

#[async_trait]
impl Presenter for TelegramPresenter {
    async fn present(&self, effect: Effect) -> Result<()> {
        match effect {
            Effect::Notify(notice) => {
                self.bot
                    .send_message(self.chat_id, t_lang(notice.key(), self.lang()))
                    .await?;
            }
            Effect::ShowSubject(subject) => {
                self.bot
                    .send_message(self.chat_id, format_subject_card(&subject, self.lang()))
                    .parse_mode(ParseMode::Html)
                    .await?;
            }
            Effect::ShowGroup(roster) => {
                self.bot
                    .send_message(
                        self.chat_id,
                        format_group_roster(&roster, &self.bot_username, self.lang()),
                    )
                    .parse_mode(ParseMode::Html)
                    .await?;
            }
            Effect::AskCategory(choices) => {
                self.bot
                    .send_message(self.chat_id, t_lang("choose-teacher-type", self.lang()))
                    .reply_markup(category_keyboard(&choices, self.lang()))
                    .await?;
            }
            Effect::SendQuestion { question, answers } => {
                self.bot
                    .send_message(self.chat_id, format_question(&question))
                    .parse_mode(ParseMode::Html)
                    .reply_markup(question_keyboard(question.id, &answers, self.lang()))
                    .await?;
                tokio::time::sleep(self.question_delay).await;
            }
            Effect::RefreshKeyboard {
                question_id,
                answers,
            } => {
                let Some(message_id) = self.message_id else {
                    debug!(chat_id = %self.chat_id, question_id, "No message to refresh");
                    return Ok(());
                };
                let result = self
                    .bot
                    .edit_message_reply_markup(self.chat_id, message_id)
                    .reply_markup(question_keyboard(question_id, &answers, self.lang()))
                    .await;
                match result {
                    Ok(_) => {}
                    // Same selection tapped twice
                    Err(RequestError::Api(ApiError::MessageNotModified)) => {
                        debug!(chat_id = %self.chat_id, question_id, "Keyboard unchanged");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Effect::AskOpenAnswer => {
                self.bot
                    .send_message(self.chat_id, t_lang("open-question", self.lang()))
                    .reply_markup(ForceReply::new())
                    .await?;
            }
        }
        Ok(())
    }
}
