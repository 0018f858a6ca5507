//! # Poll Data Model
//!
//! Data structures shared by the poll flow: teacher categories, questions and
//! their answer scales, the per-question answer slots a user fills in, and the
//! finished `Response` handed to the result store.
//!
//! ## Core Concepts
//!
//! - **Subject**: the teacher/group pairing a response is collected for
//! - **Category**: the teacher type; decides which questions apply and how many rows they need
//! - **Answer slot**: one sub-rating row of a question, either unset or holding a choice
//! - **Open answer**: the closing free-text answer with explicit skip/confirm handling

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Telegram user id as stored in the database
pub type TelegramId = i64;

/// Question primary key
pub type QuestionId = i64;

/// Teacher type a poll is answered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "LECTOR")]
    Lector,
    #[serde(rename = "PRACTIC")]
    Practice,
    #[serde(rename = "LECTOR_PRACTIC")]
    LectorPractice,
    #[serde(rename = "ENG")]
    English,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Lector,
        Category::Practice,
        Category::LectorPractice,
        Category::English,
    ];

    /// Categories a user may pick by hand; `English` is only ever assigned
    /// from the teacher record.
    pub const SELECTABLE: [Category; 3] = [
        Category::Lector,
        Category::Practice,
        Category::LectorPractice,
    ];

    /// Stable tag used in the database and in callback payloads
    pub fn tag(self) -> &'static str {
        match self {
            Category::Lector => "LECTOR",
            Category::Practice => "PRACTIC",
            Category::LectorPractice => "LECTOR_PRACTIC",
            Category::English => "ENG",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.tag() == tag)
    }

    /// Localization key of the button caption
    pub fn label_key(self) -> &'static str {
        match self {
            Category::Lector => "teacher-type-lector",
            Category::Practice => "teacher-type-practice",
            Category::LectorPractice => "teacher-type-lector-practice",
            Category::English => "teacher-type-english",
        }
    }

    /// Whether the teacher plays both roles, so split questions get two rows
    pub fn has_two_roles(self) -> bool {
        matches!(self, Category::LectorPractice)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Discrete answer scale of a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnswerOptions {
    /// No / Yes, values 0 and 1
    YesNo,
    /// Ordinal 1..5, values 0..4
    FivePoint,
}

impl AnswerOptions {
    /// Map the stored arity to a scale; only 5 selects the ordinal scale
    pub fn from_arity(arity: i32) -> Self {
        if arity == 5 {
            AnswerOptions::FivePoint
        } else {
            AnswerOptions::YesNo
        }
    }

    pub fn count(self) -> u8 {
        match self {
            AnswerOptions::YesNo => 2,
            AnswerOptions::FivePoint => 5,
        }
    }

    pub fn values(self) -> impl Iterator<Item = u8> {
        0..self.count()
    }

    pub fn contains(self, value: u8) -> bool {
        value < self.count()
    }
}

/// Number of independent answer rows for a question under a category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowLayout {
    Single,
    /// One row per role: lecturer first, practice second
    Split,
}

impl RowLayout {
    pub fn from_two_rows(two_rows: bool) -> Self {
        if two_rows {
            RowLayout::Split
        } else {
            RowLayout::Single
        }
    }

    pub fn rows(self) -> usize {
        match self {
            RowLayout::Single => 1,
            RowLayout::Split => 2,
        }
    }
}

/// A closed-form poll question (owned by the question store, read-only here)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    /// Explanatory text shown under the question
    pub hint: String,
    pub options: AnswerOptions,
    /// Whether the question is rated separately per role when a teacher has two roles
    pub split_roles: bool,
    pub categories: Vec<Category>,
}

impl Question {
    pub fn applies_to(&self, category: Category) -> bool {
        self.categories.contains(&category)
    }

    pub fn requires_two_rows(&self, category: Category) -> bool {
        self.split_roles && category.has_two_roles()
    }
}

/// A question together with the row layout chosen for the active category
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedQuestion {
    pub question: Question,
    pub layout: RowLayout,
}

/// Everything needed to start answering: the category and its ordered questions
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryPlan {
    pub category: Category,
    pub questions: Vec<PlannedQuestion>,
}

/// One answer position of a question
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnswerSlot {
    #[default]
    Unset,
    Chosen(u8),
}

impl AnswerSlot {
    pub fn is_set(self) -> bool {
        matches!(self, AnswerSlot::Chosen(_))
    }

    pub fn value(self) -> Option<u8> {
        match self {
            AnswerSlot::Chosen(value) => Some(value),
            AnswerSlot::Unset => None,
        }
    }
}

/// Fixed-length answer rows of a single question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerVector {
    options: AnswerOptions,
    slots: Vec<AnswerSlot>,
}

impl AnswerVector {
    pub fn new(options: AnswerOptions, layout: RowLayout) -> Self {
        Self {
            options,
            slots: vec![AnswerSlot::Unset; layout.rows()],
        }
    }

    pub fn options(&self) -> AnswerOptions {
        self.options
    }

    pub fn layout(&self) -> RowLayout {
        RowLayout::from_two_rows(self.slots.len() == 2)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot(&self, row: usize) -> Option<AnswerSlot> {
        self.slots.get(row).copied()
    }

    pub fn slots(&self) -> &[AnswerSlot] {
        &self.slots
    }

    /// Store `option` in `row`. Returns `false` when the row or the option is
    /// outside the question's shape; the vector is left untouched then.
    pub fn set(&mut self, row: usize, option: u8) -> bool {
        if !self.options.contains(option) {
            return false;
        }
        match self.slots.get_mut(row) {
            Some(slot) => {
                *slot = AnswerSlot::Chosen(option);
                true
            }
            None => false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(|slot| slot.is_set())
    }
}

/// Answers of a whole poll, keyed by question id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSheet {
    answers: BTreeMap<QuestionId, AnswerVector>,
}

impl AnswerSheet {
    /// Build a sheet with every planned question present and every slot unset
    pub fn initialize<'a>(plans: impl IntoIterator<Item = &'a PlannedQuestion>) -> Self {
        let answers = plans
            .into_iter()
            .map(|plan| {
                (
                    plan.question.id,
                    AnswerVector::new(plan.question.options, plan.layout),
                )
            })
            .collect();
        Self { answers }
    }

    pub fn get(&self, question_id: QuestionId) -> Option<&AnswerVector> {
        self.answers.get(&question_id)
    }

    /// Set one slot; `None` if the question is unknown or the row/option is out of range
    pub fn set(&mut self, question_id: QuestionId, row: usize, option: u8) -> Option<&AnswerVector> {
        let vector = self.answers.get_mut(&question_id)?;
        if vector.set(row, option) {
            Some(vector)
        } else {
            None
        }
    }

    /// Full re-scan: true only when no slot of any question is unset
    pub fn is_complete(&self) -> bool {
        self.answers.values().all(AnswerVector::is_complete)
    }

    pub fn unset_count(&self) -> usize {
        self.answers
            .values()
            .flat_map(|vector| vector.slots())
            .filter(|slot| !slot.is_set())
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (QuestionId, &AnswerVector)> {
        self.answers.iter().map(|(id, vector)| (*id, vector))
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}

/// Closing free-text answer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpenAnswer {
    #[default]
    Unset,
    /// Received, waiting for `/confirm`
    Pending(String),
    Confirmed(String),
    Skipped,
}

impl OpenAnswer {
    /// Text that ends up in the stored result
    pub fn text(&self) -> Option<&str> {
        match self {
            OpenAnswer::Pending(text) | OpenAnswer::Confirmed(text) => Some(text),
            OpenAnswer::Unset | OpenAnswer::Skipped => None,
        }
    }
}

/// Resolved teacher/group pairing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRef {
    pub teacher_n_group_id: i64,
    pub teacher_id: i64,
    pub group_id: i64,
    pub teacher_name: String,
    pub teacher_photo: Option<String>,
    /// Set when the teacher record already determines the category
    pub fixed_category: Option<Category>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherSummary {
    pub teacher_id: i64,
    pub name: String,
}

/// Teachers of a group, answered for a group-only deep link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRoster {
    pub group_id: i64,
    pub group_name: String,
    pub teachers: Vec<TeacherSummary>,
}

/// What a deep link resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedSubject {
    Teacher(SubjectRef),
    Group(GroupRoster),
}

/// A finished poll, ready to be stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub user_id: TelegramId,
    pub subject: SubjectRef,
    pub category: Category,
    pub answers: AnswerSheet,
    /// Either `Confirmed` or `Skipped`
    pub open_answer: OpenAnswer,
}
