//! Callback Handler module for processing inline keyboard callback queries

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{debug, warn};

use crate::config::BotConfig;
use crate::keyboard::CallbackData;
use crate::poll_model::TelegramId;
use crate::poll_service::{Outcome, PollService};

use super::message_handler::presenter_for;

/// Handle callback queries from inline keyboards
pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    service: Arc<PollService>,
    config: Arc<BotConfig>,
) -> Result<()> {
    let user_id = q.from.id.0 as TelegramId;
    debug!(user_id, "Received callback query from user");

    // Stop the client-side spinner whatever happens next
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        warn!(user_id, error = %e, "Failed to answer callback query");
    }

    let Some(msg) = q.message.as_ref() else {
        debug!(user_id, "Callback without message");
        return Ok(());
    };
    let data = q.data.as_deref().unwrap_or_default();
    let Some(callback) = CallbackData::parse(data) else {
        warn!(user_id, data, "Unparseable callback payload");
        return Ok(());
    };

    let language_code = q.from.language_code.as_deref();
    let chat_id = msg.chat().id;
    let presenter = presenter_for(&bot, chat_id, language_code, &config);

    let outcome = match callback {
        CallbackData::Category(category) => {
            // The choice is made once; its keyboard goes away
            if let Err(e) = bot.delete_message(chat_id, msg.id()).await {
                warn!(user_id, error = %e, "Failed to delete category message");
            }
            service.choose_category(user_id, category, &presenter).await?
        }
        CallbackData::Answer(question_id, row, option) => {
            let presenter = presenter.for_message(msg.id());
            service
                .select_answer(user_id, question_id, row, option, &presenter)
                .await?
        }
    };

    if let Outcome::Ignored(err) = outcome {
        debug!(user_id, error = %err, "Callback ignored");
    }

    Ok(())
}
