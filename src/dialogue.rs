//! Poll dialogue state and the per-user session store.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::poll_model::{AnswerSheet, Category, OpenAnswer, SubjectRef, TelegramId};

/// Conversation state of a poll. Data only exists in the states that use it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum PollState {
    #[default]
    AwaitingEntry,
    AwaitingTeacherType,
    AnsweringQuestions {
        category: Category,
        answers: AnswerSheet,
    },
    AwaitingOpenAnswer {
        category: Category,
        answers: AnswerSheet,
        open_answer: OpenAnswer,
    },
}

/// Data-free state label, used for logging and assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateTag {
    AwaitingEntry,
    AwaitingTeacherType,
    AnsweringQuestions,
    AwaitingOpenAnswer,
    /// Terminal; the session is cleared when a poll reaches it
    Finished,
}

impl fmt::Display for StateTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StateTag::AwaitingEntry => "awaiting_entry",
            StateTag::AwaitingTeacherType => "awaiting_teacher_type",
            StateTag::AnsweringQuestions => "answering_questions",
            StateTag::AwaitingOpenAnswer => "awaiting_open_answer",
            StateTag::Finished => "finished",
        };
        f.write_str(name)
    }
}

impl PollState {
    pub fn tag(&self) -> StateTag {
        match self {
            PollState::AwaitingEntry => StateTag::AwaitingEntry,
            PollState::AwaitingTeacherType => StateTag::AwaitingTeacherType,
            PollState::AnsweringQuestions { .. } => StateTag::AnsweringQuestions,
            PollState::AwaitingOpenAnswer { .. } => StateTag::AwaitingOpenAnswer,
        }
    }
}

/// One live poll of one user
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: TelegramId,
    pub subject: SubjectRef,
    pub state: PollState,
}

impl Session {
    pub fn new(user_id: TelegramId, subject: SubjectRef) -> Self {
        Self {
            user_id,
            subject,
            state: PollState::AwaitingEntry,
        }
    }

    pub fn category(&self) -> Option<Category> {
        match &self.state {
            PollState::AnsweringQuestions { category, .. }
            | PollState::AwaitingOpenAnswer { category, .. } => Some(*category),
            PollState::AwaitingEntry | PollState::AwaitingTeacherType => None,
        }
    }

    pub fn answers(&self) -> Option<&AnswerSheet> {
        match &self.state {
            PollState::AnsweringQuestions { answers, .. }
            | PollState::AwaitingOpenAnswer { answers, .. } => Some(answers),
            PollState::AwaitingEntry | PollState::AwaitingTeacherType => None,
        }
    }

    pub fn open_answer(&self) -> Option<&OpenAnswer> {
        match &self.state {
            PollState::AwaitingOpenAnswer { open_answer, .. } => Some(open_answer),
            _ => None,
        }
    }
}

/// Per-user state behind the store's map
#[derive(Default)]
struct UserSlot {
    /// Held for a whole event: the session update and the delivery of its effects
    turn: Arc<tokio::sync::Mutex<()>>,
    session: tokio::sync::Mutex<Option<Session>>,
}

type SessionSlot = Arc<UserSlot>;

/// In-memory session store with one lock per user
///
/// The outer map lock is only held to look up or prune a user's slot, never
/// across an await, so users do not block each other. Updates for the same
/// user queue on that user's slot lock and apply one after another.
pub struct SessionStore {
    slots: Mutex<HashMap<TelegramId, SessionSlot>>,
}

/// Exclusive turn of one user, released on drop
///
/// While a turn is held no other turn of the same user starts, so whatever
/// the holder sends to the chat lands in the order the updates were applied.
/// Plain `update` calls do not wait for turns.
pub struct UserTurn<'a> {
    store: &'a SessionStore,
    user_id: TelegramId,
    slot: SessionSlot,
    guard: Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl UserTurn<'_> {
    pub fn user_id(&self) -> TelegramId {
        self.user_id
    }
}

impl Drop for UserTurn<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.store.prune(self.user_id, &self.slot);
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, user_id: TelegramId) -> SessionSlot {
        let mut slots = self.slots.lock().unwrap();
        Arc::clone(slots.entry(user_id).or_default())
    }

    fn existing_slot(&self, user_id: TelegramId) -> Option<SessionSlot> {
        let slots = self.slots.lock().unwrap();
        slots.get(&user_id).map(Arc::clone)
    }

    /// Drop an empty slot nobody else is waiting on
    fn prune(&self, user_id: TelegramId, slot: &SessionSlot) {
        let mut slots = self.slots.lock().unwrap();
        // The map and `slot` are the only two owners when nobody is queued
        let vacant = Arc::strong_count(slot) == 2
            && slot.turn.try_lock().is_ok()
            && slot
                .session
                .try_lock()
                .map(|guard| guard.is_none())
                .unwrap_or(false);
        if vacant {
            slots.remove(&user_id);
        }
    }

    /// Wait for the user's previous turn to finish and take the next one
    pub async fn begin_turn(&self, user_id: TelegramId) -> UserTurn<'_> {
        let slot = self.slot(user_id);
        let guard = Arc::clone(&slot.turn).lock_owned().await;
        UserTurn {
            store: self,
            user_id,
            slot,
            guard: Some(guard),
        }
    }

    /// Snapshot of the user's session
    pub async fn get(&self, user_id: TelegramId) -> Option<Session> {
        let slot = self.existing_slot(user_id)?;
        let session = slot.session.lock().await.clone();
        session
    }

    /// Start a fresh session for `subject`, discarding any previous one
    pub async fn create_or_reset(&self, user_id: TelegramId, subject: SubjectRef) -> Session {
        let session = Session::new(user_id, subject);
        self.update(user_id, |slot| {
            if slot.is_some() {
                debug!(user_id, "Replacing existing poll session");
            }
            *slot = Some(session.clone());
        })
        .await;
        session
    }

    /// Atomic read-modify-write of the user's session slot
    ///
    /// Setting the slot to `None` clears the session.
    pub async fn update<F, R>(&self, user_id: TelegramId, mutator: F) -> R
    where
        F: FnOnce(&mut Option<Session>) -> R,
    {
        let slot = self.slot(user_id);
        let (result, cleared) = {
            let mut guard = slot.session.lock().await;
            let result = mutator(&mut *guard);
            (result, guard.is_none())
        };
        if cleared {
            self.prune(user_id, &slot);
        }
        result
    }

    /// Remove the user's session. Clearing a missing session is a no-op.
    pub async fn clear(&self, user_id: TelegramId) {
        if self.existing_slot(user_id).is_some() {
            self.update(user_id, |slot| *slot = None).await;
        }
    }

    /// Number of users with a tracked slot
    pub fn tracked_users(&self) -> usize {
        self.slots.lock().unwrap().len()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
