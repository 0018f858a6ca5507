//! Poll state machine
//!
//! `transition` is pure: given a session and an event it returns the next
//! session (or `None` once the poll is finished), the effects to deliver and,
//! on completion, the `Response` to store. Lookups that need I/O happen
//! before the call and arrive inside the event.

use std::fmt;

use crate::dialogue::{PollState, Session, StateTag};
use crate::poll_model::{
    AnswerSheet, AnswerVector, Category, CategoryPlan, GroupRoster, OpenAnswer, Question,
    QuestionId, Response, SubjectRef,
};

/// Reserved open-answer command: store the poll without free text
pub const SKIP_COMMAND: &str = "/skip";
/// Reserved open-answer command: store the pending free text
pub const CONFIRM_COMMAND: &str = "/confirm";

/// Inbound events, already classified by the transport
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Valid entry link; starts over whatever the user was doing
    Entry {
        subject: SubjectRef,
        /// The user already completed a poll for this subject
        repeated: bool,
        /// Present when the teacher's category is fixed
        preset: Option<CategoryPlan>,
    },
    CategoryChosen(CategoryPlan),
    AnswerSelected {
        question_id: QuestionId,
        row: usize,
        option: Option<u8>,
    },
    Text(String),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Entry { .. } => "entry",
            Event::CategoryChosen(_) => "category_chosen",
            Event::AnswerSelected { .. } => "answer_selected",
            Event::Text(_) => "text",
        }
    }
}

/// Fixed user-facing messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    InvalidSubject,
    RepeatedSubject,
    ConfirmOpenAnswer,
    NothingToConfirm,
    SaveSucceeded,
    SaveFailed,
    NoActivePoll,
    UseButtons,
}

impl Notice {
    /// Localization key
    pub fn key(self) -> &'static str {
        match self {
            Notice::InvalidSubject => "invalid-subject",
            Notice::RepeatedSubject => "repeated-subject",
            Notice::ConfirmOpenAnswer => "confirm-open-question",
            Notice::NothingToConfirm => "nothing-to-confirm",
            Notice::SaveSucceeded => "result-save-success",
            Notice::SaveFailed => "result-save-error",
            Notice::NoActivePoll => "no-active-poll",
            Notice::UseButtons => "use-buttons",
        }
    }
}

/// Output to deliver to the user's chat
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Notify(Notice),
    /// Teacher card shown on entry
    ShowSubject(SubjectRef),
    /// Teacher links of a group
    ShowGroup(GroupRoster),
    AskCategory(Vec<Category>),
    /// New message with the question and its keyboard
    SendQuestion {
        question: Question,
        answers: AnswerVector,
    },
    /// Re-render the keyboard of the message the answer came from
    RefreshKeyboard {
        question_id: QuestionId,
        answers: AnswerVector,
    },
    AskOpenAnswer,
}

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    /// `None` once the poll is finished and the session must be cleared
    pub session: Option<Session>,
    pub effects: Vec<Effect>,
    /// Finished poll to store, set together with `session == None`
    pub completed: Option<Response>,
}

impl TransitionResult {
    pub fn new(session: Session) -> Self {
        Self {
            session: Some(session),
            effects: vec![],
            completed: None,
        }
    }

    pub fn finished(response: Response) -> Self {
        Self {
            session: None,
            effects: vec![],
            completed: Some(response),
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }

    pub fn state_tag(&self) -> StateTag {
        self.session
            .as_ref()
            .map_or(StateTag::Finished, |session| session.state.tag())
    }
}

/// Events the state machine refuses; none of them changes the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The user has no live poll
    NoSession,
    /// Tap on a non-selectable row caption
    LabelButton { question_id: QuestionId, row: usize },
    /// Teacher type the student is not offered, such as a forged `ENG` choice
    UnselectableCategory(Category),
    /// Answer for a question or row that is not part of the poll
    UnknownQuestionOrRow {
        question_id: QuestionId,
        row: usize,
        option: u8,
    },
    /// Event that makes no sense in the current state (stale or out of order)
    UnexpectedEvent {
        state: StateTag,
        event: &'static str,
    },
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionError::NoSession => write!(f, "No active poll session"),
            TransitionError::LabelButton { question_id, row } => {
                write!(f, "Row label pressed (question {question_id}, row {row})")
            }
            TransitionError::UnselectableCategory(category) => {
                write!(f, "Category {category} cannot be chosen")
            }
            TransitionError::UnknownQuestionOrRow {
                question_id,
                row,
                option,
            } => write!(
                f,
                "Unknown question or row (question {question_id}, row {row}, option {option})"
            ),
            TransitionError::UnexpectedEvent { state, event } => {
                write!(f, "Unexpected {event} event in state {state}")
            }
        }
    }
}

impl std::error::Error for TransitionError {}

/// Pure transition function
pub fn transition(session: &Session, event: Event) -> Result<TransitionResult, TransitionError> {
    match (&session.state, event) {
        // Entry is accepted in any state and always starts over
        (
            _,
            Event::Entry {
                subject,
                repeated,
                preset,
            },
        ) => {
            let fresh = Session::new(session.user_id, subject.clone());
            let mut effects = Vec::with_capacity(2);
            if repeated {
                effects.push(Effect::Notify(Notice::RepeatedSubject));
            }
            effects.push(Effect::ShowSubject(subject));

            let mut result = match preset {
                Some(plan) => start_questions(fresh, plan),
                None => TransitionResult::new(Session {
                    state: PollState::AwaitingTeacherType,
                    ..fresh
                })
                .with_effect(Effect::AskCategory(Category::SELECTABLE.to_vec())),
            };
            effects.append(&mut result.effects);
            result.effects = effects;
            Ok(result)
        }

        (PollState::AwaitingTeacherType, Event::CategoryChosen(plan)) => {
            if !Category::SELECTABLE.contains(&plan.category) {
                return Err(TransitionError::UnselectableCategory(plan.category));
            }
            Ok(start_questions(session.clone(), plan))
        }

        (
            PollState::AnsweringQuestions { category, answers },
            Event::AnswerSelected {
                question_id,
                row,
                option,
            },
        ) => {
            let mut answers = answers.clone();
            let refresh = select_answer(&mut answers, question_id, row, option)?;

            if answers.is_complete() {
                Ok(TransitionResult::new(Session {
                    state: PollState::AwaitingOpenAnswer {
                        category: *category,
                        answers,
                        open_answer: OpenAnswer::Unset,
                    },
                    ..session.clone()
                })
                .with_effects([refresh, Effect::AskOpenAnswer]))
            } else {
                Ok(TransitionResult::new(Session {
                    state: PollState::AnsweringQuestions {
                        category: *category,
                        answers,
                    },
                    ..session.clone()
                })
                .with_effect(refresh))
            }
        }

        // Late taps on an earlier keyboard still overwrite; every slot stays set
        (
            PollState::AwaitingOpenAnswer {
                category,
                answers,
                open_answer,
            },
            Event::AnswerSelected {
                question_id,
                row,
                option,
            },
        ) => {
            let mut answers = answers.clone();
            let refresh = select_answer(&mut answers, question_id, row, option)?;
            Ok(TransitionResult::new(Session {
                state: PollState::AwaitingOpenAnswer {
                    category: *category,
                    answers,
                    open_answer: open_answer.clone(),
                },
                ..session.clone()
            })
            .with_effect(refresh))
        }

        (
            PollState::AwaitingOpenAnswer {
                category,
                answers,
                open_answer,
            },
            Event::Text(text),
        ) => Ok(open_answer_input(
            session,
            *category,
            answers,
            open_answer,
            text,
        )),

        (state, event) => Err(TransitionError::UnexpectedEvent {
            state: state.tag(),
            event: event.name(),
        }),
    }
}

/// Initialize the answer sheet for a category and send its questions
fn start_questions(session: Session, plan: CategoryPlan) -> TransitionResult {
    let answers = AnswerSheet::initialize(&plan.questions);
    let questions = plan.questions.into_iter().map(|planned| {
        let answers = answers
            .get(planned.question.id)
            .cloned()
            .unwrap_or_else(|| AnswerVector::new(planned.question.options, planned.layout));
        Effect::SendQuestion {
            question: planned.question,
            answers,
        }
    });
    let effects: Vec<Effect> = questions.collect();

    // A category without questions goes straight to the open answer
    if answers.is_complete() {
        TransitionResult::new(Session {
            state: PollState::AwaitingOpenAnswer {
                category: plan.category,
                answers,
                open_answer: OpenAnswer::Unset,
            },
            ..session
        })
        .with_effects(effects)
        .with_effect(Effect::AskOpenAnswer)
    } else {
        TransitionResult::new(Session {
            state: PollState::AnsweringQuestions {
                category: plan.category,
                answers,
            },
            ..session
        })
        .with_effects(effects)
    }
}

/// Apply one answer tap and build the keyboard refresh for it
fn select_answer(
    answers: &mut AnswerSheet,
    question_id: QuestionId,
    row: usize,
    option: Option<u8>,
) -> Result<Effect, TransitionError> {
    let option = option.ok_or(TransitionError::LabelButton { question_id, row })?;
    let vector = answers
        .set(question_id, row, option)
        .ok_or(TransitionError::UnknownQuestionOrRow {
            question_id,
            row,
            option,
        })?;
    Ok(Effect::RefreshKeyboard {
        question_id,
        answers: vector.clone(),
    })
}

fn open_answer_input(
    session: &Session,
    category: Category,
    answers: &AnswerSheet,
    open_answer: &OpenAnswer,
    text: String,
) -> TransitionResult {
    let finish = |open_answer: OpenAnswer| {
        TransitionResult::finished(Response {
            user_id: session.user_id,
            subject: session.subject.clone(),
            category,
            answers: answers.clone(),
            open_answer,
        })
    };
    let stay = |open_answer: OpenAnswer| {
        TransitionResult::new(Session {
            state: PollState::AwaitingOpenAnswer {
                category,
                answers: answers.clone(),
                open_answer,
            },
            ..session.clone()
        })
    };

    match text.trim() {
        SKIP_COMMAND => finish(OpenAnswer::Skipped),
        CONFIRM_COMMAND => match open_answer {
            OpenAnswer::Pending(pending) => finish(OpenAnswer::Confirmed(pending.clone())),
            _ => stay(open_answer.clone()).with_effect(Effect::Notify(Notice::NothingToConfirm)),
        },
        // Any other text replaces the pending answer
        _ => stay(OpenAnswer::Pending(text)).with_effect(Effect::Notify(Notice::ConfirmOpenAnswer)),
    }
}
