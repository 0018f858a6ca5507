//! Poll orchestration
//!
//! `PollService` wires the pure state machine to the session store and the
//! collaborators. Every event for a user runs as one atomic update of that
//! user's session, and its effects are delivered before the user's next event
//! is applied. The finished poll, if any, is stored exactly once after the
//! user's turn ends.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::collaborators::{Presenter, QuestionProvider, ResultStore, SubjectResolver};
use crate::deep_link;
use crate::dialogue::{Session, SessionStore, UserTurn};
use crate::poll_errors::PollError;
use crate::poll_model::{
    Category, CategoryPlan, PlannedQuestion, QuestionId, ResolvedSubject, Response, RowLayout,
    TelegramId,
};
use crate::state_machine::{transition, Effect, Event, Notice, TransitionError};

/// How an inbound event was handled
#[derive(Debug, PartialEq)]
pub enum Outcome {
    /// The event advanced or updated the poll
    Accepted,
    /// The entry link was unusable; the user was told so
    Rejected,
    /// The event did not fit the session; nothing changed
    Ignored(TransitionError),
}

pub struct PollService {
    sessions: SessionStore,
    subjects: Arc<dyn SubjectResolver>,
    questions: Arc<dyn QuestionProvider>,
    results: Arc<dyn ResultStore>,
}

impl PollService {
    pub fn new(
        subjects: Arc<dyn SubjectResolver>,
        questions: Arc<dyn QuestionProvider>,
        results: Arc<dyn ResultStore>,
    ) -> Self {
        Self {
            sessions: SessionStore::new(),
            subjects,
            questions,
            results,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Handle `/start` with an optional deep-link token
    pub async fn start(
        &self,
        user_id: TelegramId,
        token: Option<&str>,
        presenter: &dyn Presenter,
    ) -> Result<Outcome, PollError> {
        let resolved = match self.resolve(token.unwrap_or_default()).await {
            Ok(resolved) => resolved,
            Err(err @ (PollError::InvalidToken(_) | PollError::SubjectNotFound)) => {
                warn!(user_id, error = %err, "Rejected poll entry");
                present(presenter, Effect::Notify(Notice::InvalidSubject)).await?;
                return Ok(Outcome::Rejected);
            }
            Err(err) => return Err(err),
        };

        let subject = match resolved {
            ResolvedSubject::Group(roster) => {
                info!(
                    user_id,
                    group_id = roster.group_id,
                    teachers = roster.teachers.len(),
                    "Showing group roster"
                );
                present(presenter, Effect::ShowGroup(roster)).await?;
                return Ok(Outcome::Accepted);
            }
            ResolvedSubject::Teacher(subject) => subject,
        };

        let repeated = self
            .results
            .has_response(user_id, &subject)
            .await
            .map_err(PollError::Collaborator)?;
        let preset = match subject.fixed_category {
            Some(category) => Some(self.plan(category).await?),
            None => None,
        };

        info!(
            user_id,
            teacher_id = subject.teacher_id,
            group_id = subject.group_id,
            repeated,
            "Starting poll"
        );
        let turn = self.sessions.begin_turn(user_id).await;
        self.sessions.create_or_reset(user_id, subject.clone()).await;
        self.apply(
            turn,
            Event::Entry {
                subject,
                repeated,
                preset,
            },
            presenter,
        )
        .await
    }

    /// Handle a teacher-type choice
    pub async fn choose_category(
        &self,
        user_id: TelegramId,
        category: Category,
        presenter: &dyn Presenter,
    ) -> Result<Outcome, PollError> {
        let plan = self.plan(category).await?;
        let turn = self.sessions.begin_turn(user_id).await;
        self.apply(turn, Event::CategoryChosen(plan), presenter).await
    }

    /// Handle a tap on a question keyboard
    pub async fn select_answer(
        &self,
        user_id: TelegramId,
        question_id: QuestionId,
        row: usize,
        option: Option<u8>,
        presenter: &dyn Presenter,
    ) -> Result<Outcome, PollError> {
        let turn = self.sessions.begin_turn(user_id).await;
        self.apply(
            turn,
            Event::AnswerSelected {
                question_id,
                row,
                option,
            },
            presenter,
        )
        .await
    }

    /// Handle free text, including `/skip` and `/confirm`
    pub async fn open_text(
        &self,
        user_id: TelegramId,
        text: &str,
        presenter: &dyn Presenter,
    ) -> Result<Outcome, PollError> {
        let turn = self.sessions.begin_turn(user_id).await;
        self.apply(turn, Event::Text(text.to_string()), presenter)
            .await
    }

    async fn resolve(&self, token: &str) -> Result<ResolvedSubject, PollError> {
        let link = deep_link::decode(token)?;
        debug!(kind = link.kind().tag(), ids = ?link.ids(), "Decoded deep link");
        self.subjects
            .resolve(&link)
            .await
            .map_err(PollError::Collaborator)?
            .ok_or(PollError::SubjectNotFound)
    }

    async fn plan(&self, category: Category) -> Result<CategoryPlan, PollError> {
        let questions = self
            .questions
            .questions_for_category(category)
            .await
            .map_err(PollError::Collaborator)?;
        let questions = questions
            .into_iter()
            .map(|question| PlannedQuestion {
                layout: RowLayout::from_two_rows(
                    self.questions.requires_two_rows(&question, category),
                ),
                question,
            })
            .collect();
        Ok(CategoryPlan {
            category,
            questions,
        })
    }

    /// Run one transition and deliver its effects within the user's turn
    async fn apply(
        &self,
        turn: UserTurn<'_>,
        event: Event,
        presenter: &dyn Presenter,
    ) -> Result<Outcome, PollError> {
        let user_id = turn.user_id();
        let event_name = event.name();
        let result = self
            .sessions
            .update(user_id, |slot| {
                let session: &Session = slot.as_ref().ok_or(TransitionError::NoSession)?;
                let result = transition(session, event)?;
                // Writing `None` clears the session together with the terminal transition
                *slot = result.session.clone();
                Ok::<_, TransitionError>(result)
            })
            .await;

        let result = match result {
            Ok(result) => result,
            Err(err) => {
                match &err {
                    TransitionError::UnknownQuestionOrRow { .. }
                    | TransitionError::UnselectableCategory(_) => {
                        warn!(user_id, event = event_name, error = %err, "Ignored poll event")
                    }
                    _ => debug!(user_id, event = event_name, error = %err, "Ignored poll event"),
                }
                return Ok(Outcome::Ignored(err));
            }
        };

        debug!(
            user_id,
            event = event_name,
            state = %result.state_tag(),
            effects = result.effects.len(),
            "Applied poll event"
        );

        for effect in result.effects {
            present(presenter, effect).await?;
        }
        drop(turn);

        if let Some(response) = result.completed {
            self.persist(&response, presenter).await?;
        }
        Ok(Outcome::Accepted)
    }

    async fn persist(&self, response: &Response, presenter: &dyn Presenter) -> Result<(), PollError> {
        match self.results.save(response).await {
            Ok(()) => {
                info!(
                    user_id = response.user_id,
                    teacher_id = response.subject.teacher_id,
                    group_id = response.subject.group_id,
                    category = %response.category,
                    "Poll result saved"
                );
                present(presenter, Effect::Notify(Notice::SaveSucceeded)).await
            }
            Err(err) => {
                error!(
                    user_id = response.user_id,
                    teacher_id = response.subject.teacher_id,
                    error = %err,
                    "Failed to save poll result"
                );
                present(presenter, Effect::Notify(Notice::SaveFailed)).await?;
                Err(PollError::Persist(err))
            }
        }
    }
}

async fn present(presenter: &dyn Presenter, effect: Effect) -> Result<(), PollError> {
    presenter
        .present(effect)
        .await
        .map_err(PollError::Presentation)
}
