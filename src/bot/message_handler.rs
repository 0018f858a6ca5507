//! Message Handler module for processing incoming Telegram messages

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::debug;

// Import localization
use crate::localization::t_lang;

use crate::config::BotConfig;
use crate::poll_model::TelegramId;
use crate::poll_service::{Outcome, PollService};
use crate::state_machine::{Notice, TransitionError};

use super::presenter::TelegramPresenter;

/// Split `/start [payload]` into its payload
///
/// Returns `None` for anything that is not a `/start` command and
/// `Some(None)` for a bare `/start`. A `@botname` suffix is accepted.
pub fn parse_start_command(text: &str) -> Option<Option<&str>> {
    let text = text.trim();
    let (command, rest) = match text.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (text, ""),
    };
    let command = command.split('@').next().unwrap_or_default();
    if command != "/start" {
        return None;
    }
    Some(Some(rest).filter(|payload| !payload.is_empty()))
}

pub(crate) fn presenter_for(bot: &Bot, chat_id: ChatId, language_code: Option<&str>, config: &BotConfig) -> TelegramPresenter {
    TelegramPresenter::new(
        bot.clone(),
        chat_id,
        language_code.map(str::to_string),
        config.bot_username.clone().unwrap_or_default(),
        config.question_send_delay,
    )
}

async fn handle_text_message(
    bot: &Bot,
    msg: &Message,
    text: &str,
    service: &PollService,
    config: &BotConfig,
) -> Result<()> {
    let Some(user) = msg.from.as_ref() else {
        debug!(chat_id = %msg.chat.id, "Ignoring message without sender");
        return Ok(());
    };
    let user_id = user.id.0 as TelegramId;
    debug!(user_id, message_length = text.len(), "Received text message from user");

    // Extract user's language code from Telegram
    let language_code = user.language_code.as_deref();
    let presenter = presenter_for(bot, msg.chat.id, language_code, config);

    let outcome = match parse_start_command(text) {
        Some(token) => service.start(user_id, token, &presenter).await?,
        None => service.open_text(user_id, text, &presenter).await?,
    };

    if let Outcome::Ignored(err) = outcome {
        let notice = match err {
            TransitionError::NoSession => Notice::NoActivePoll,
            _ => Notice::UseButtons,
        };
        bot.send_message(msg.chat.id, t_lang(notice.key(), language_code))
            .await?;
    }

    Ok(())
}

async fn handle_unsupported_message(bot: &Bot, msg: &Message) -> Result<()> {
    let language_code = msg
        .from
        .as_ref()
        .and_then(|user| user.language_code.as_deref());

    bot.send_message(msg.chat.id, t_lang("unsupported-message", language_code))
        .await?;
    Ok(())
}

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    service: Arc<PollService>,
    config: Arc<BotConfig>,
) -> Result<()> {
    if let Some(text) = msg.text() {
        handle_text_message(&bot, &msg, text, &service, &config).await?;
    } else {
        handle_unsupported_message(&bot, &msg).await?;
    }

    Ok(())
}
