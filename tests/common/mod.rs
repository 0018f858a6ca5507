//! In-memory collaborators for poll flow tests
//!
//! These doubles let the poll service run without Telegram or PostgreSQL.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use teacher_poll::collaborators::{Presenter, QuestionProvider, ResultStore, SubjectResolver};
use teacher_poll::deep_link::{self, DeepLink};
use teacher_poll::poll_model::{
    AnswerOptions, Category, GroupRoster, Question, ResolvedSubject, Response, SubjectRef,
    TeacherSummary, TelegramId,
};
use teacher_poll::poll_service::PollService;
use teacher_poll::state_machine::{Effect, Notice};

pub const GROUP_ID: i64 = 3;
/// Teacher whose category the student chooses
pub const TEACHER_ID: i64 = 7;
/// English teacher; category is fixed
pub const ENGLISH_TEACHER_ID: i64 = 8;

/// Split five-point question shared by every category
pub const Q_SPLIT: i64 = 1;
/// Yes/no question for non-English categories
pub const Q_YES_NO: i64 = 2;
/// English-only five-point question
pub const Q_ENGLISH: i64 = 3;

// ============================================================================
// Directory: subjects and questions
// ============================================================================

pub struct MemoryDirectory {
    subjects: Vec<SubjectRef>,
    questions: Vec<Question>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        let subjects = vec![
            SubjectRef {
                teacher_n_group_id: 11,
                teacher_id: TEACHER_ID,
                group_id: GROUP_ID,
                teacher_name: "Petrenko".to_string(),
                teacher_photo: Some("https://example.com/petrenko.jpg".to_string()),
                fixed_category: None,
            },
            SubjectRef {
                teacher_n_group_id: 12,
                teacher_id: ENGLISH_TEACHER_ID,
                group_id: GROUP_ID,
                teacher_name: "Smith".to_string(),
                teacher_photo: None,
                fixed_category: Some(Category::English),
            },
        ];
        let questions = vec![
            Question {
                id: Q_SPLIT,
                text: "Explains the material clearly".to_string(),
                hint: "1 - never, 5 - always".to_string(),
                options: AnswerOptions::FivePoint,
                split_roles: true,
                categories: Category::ALL.to_vec(),
            },
            Question {
                id: Q_YES_NO,
                text: "Starts classes on time".to_string(),
                hint: String::new(),
                options: AnswerOptions::YesNo,
                split_roles: false,
                categories: Category::SELECTABLE.to_vec(),
            },
            Question {
                id: Q_ENGLISH,
                text: "Speaks English in class".to_string(),
                hint: String::new(),
                options: AnswerOptions::FivePoint,
                split_roles: false,
                categories: vec![Category::English],
            },
        ];
        Self {
            subjects,
            questions,
        }
    }

    pub fn with_questions(mut self, questions: Vec<Question>) -> Self {
        self.questions = questions;
        self
    }
}

#[async_trait]
impl SubjectResolver for MemoryDirectory {
    async fn resolve(&self, link: &DeepLink) -> Result<Option<ResolvedSubject>> {
        let resolved = match *link {
            DeepLink::Teacher {
                teacher_id,
                group_id,
            } => self
                .subjects
                .iter()
                .find(|s| s.teacher_id == teacher_id && s.group_id == group_id)
                .cloned()
                .map(ResolvedSubject::Teacher),
            DeepLink::Group { group_id } if group_id == GROUP_ID => {
                Some(ResolvedSubject::Group(GroupRoster {
                    group_id,
                    group_name: "KN-21".to_string(),
                    teachers: self
                        .subjects
                        .iter()
                        .map(|s| TeacherSummary {
                            teacher_id: s.teacher_id,
                            name: s.teacher_name.clone(),
                        })
                        .collect(),
                }))
            }
            DeepLink::Group { .. } => None,
        };
        Ok(resolved)
    }
}

#[async_trait]
impl QuestionProvider for MemoryDirectory {
    async fn questions_for_category(&self, category: Category) -> Result<Vec<Question>> {
        Ok(self
            .questions
            .iter()
            .filter(|q| q.applies_to(category))
            .cloned()
            .collect())
    }
}

// ============================================================================
// Result store
// ============================================================================

#[derive(Default)]
pub struct MemoryResults {
    saved: Mutex<Vec<Response>>,
    previous: Mutex<HashSet<(TelegramId, i64)>>,
    fail: AtomicBool,
}

impl MemoryResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following save fail
    pub fn fail_saves(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    /// Pretend the user answered about this pairing before
    pub fn mark_answered(&self, user_id: TelegramId, teacher_n_group_id: i64) {
        self.previous
            .lock()
            .unwrap()
            .insert((user_id, teacher_n_group_id));
    }

    pub fn saved(&self) -> Vec<Response> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResultStore for MemoryResults {
    async fn has_response(&self, user_id: TelegramId, subject: &SubjectRef) -> Result<bool> {
        let key = (user_id, subject.teacher_n_group_id);
        let previous = self.previous.lock().unwrap().contains(&key);
        let saved = self
            .saved
            .lock()
            .unwrap()
            .iter()
            .any(|r| (r.user_id, r.subject.teacher_n_group_id) == key);
        Ok(previous || saved)
    }

    async fn save(&self, response: &Response) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("database unavailable"));
        }
        self.saved.lock().unwrap().push(response.clone());
        Ok(())
    }
}

// ============================================================================
// Presenter
// ============================================================================

/// Records every effect it is asked to present
#[derive(Default)]
pub struct RecordingPresenter {
    effects: Mutex<Vec<Effect>>,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn effects(&self) -> Vec<Effect> {
        self.effects.lock().unwrap().clone()
    }

    /// Drain the recorded effects
    pub fn take(&self) -> Vec<Effect> {
        std::mem::take(&mut *self.effects.lock().unwrap())
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.effects()
            .into_iter()
            .filter_map(|effect| match effect {
                Effect::Notify(notice) => Some(notice),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Presenter for RecordingPresenter {
    async fn present(&self, effect: Effect) -> Result<()> {
        self.effects.lock().unwrap().push(effect);
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub struct Harness {
    pub service: Arc<PollService>,
    pub directory: Arc<MemoryDirectory>,
    pub results: Arc<MemoryResults>,
}

pub fn harness() -> Harness {
    harness_with(MemoryDirectory::new())
}

pub fn harness_with(directory: MemoryDirectory) -> Harness {
    let directory = Arc::new(directory);
    let results = Arc::new(MemoryResults::new());
    let service = Arc::new(PollService::new(
        directory.clone(),
        directory.clone(),
        results.clone(),
    ));
    Harness {
        service,
        directory,
        results,
    }
}

pub fn teacher_token(teacher_id: i64, group_id: i64) -> String {
    deep_link::encode(&DeepLink::Teacher {
        teacher_id,
        group_id,
    })
}

pub fn group_token(group_id: i64) -> String {
    deep_link::encode(&DeepLink::Group { group_id })
}
