//! Trait seams between the poll core and the outside world
//!
//! The database layer implements the lookup and storage traits; the Telegram
//! layer implements `Presenter`. Tests plug in in-memory doubles.

use async_trait::async_trait;

use crate::deep_link::DeepLink;
use crate::poll_model::{Category, Question, ResolvedSubject, Response, SubjectRef, TelegramId};
use crate::state_machine::Effect;

/// Resolves decoded deep links to teachers or groups
#[async_trait]
pub trait SubjectResolver: Send + Sync {
    /// `Ok(None)` when the link names nothing known
    async fn resolve(&self, link: &DeepLink) -> anyhow::Result<Option<ResolvedSubject>>;
}

/// Source of poll questions
#[async_trait]
pub trait QuestionProvider: Send + Sync {
    /// Ordered questions that apply to `category`
    async fn questions_for_category(&self, category: Category) -> anyhow::Result<Vec<Question>>;

    fn requires_two_rows(&self, question: &Question, category: Category) -> bool {
        question.requires_two_rows(category)
    }
}

/// Durable storage for finished polls
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Whether the user already completed a poll for this subject
    async fn has_response(&self, user_id: TelegramId, subject: &SubjectRef) -> anyhow::Result<bool>;

    /// Store a finished poll atomically; called at most once per session
    async fn save(&self, response: &Response) -> anyhow::Result<()>;
}

/// Delivers effects to the user's chat
#[async_trait]
pub trait Presenter: Send + Sync {
    async fn present(&self, effect: Effect) -> anyhow::Result<()>;
}
