use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use tracing::{debug, info};

use crate::collaborators::{QuestionProvider, ResultStore, SubjectResolver};
use crate::deep_link::DeepLink;
use crate::poll_model::{
    AnswerOptions, AnswerSheet, Category, GroupRoster, Question, QuestionId, ResolvedSubject,
    Response, SubjectRef, TeacherSummary, TelegramId,
};

/// A stored poll result
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ResultRecord {
    pub id: i64,
    pub user_id: i64,
    pub teacher_n_group_id: i64,
    pub teacher_type: String,
    pub open_answer: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One stored answer slot of a result
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ResultAnswerRecord {
    pub question_id: i64,
    pub row_index: i16,
    pub answer: i16,
}

/// Question definition to insert
#[derive(Debug, Clone)]
pub struct NewQuestion<'a> {
    pub text: &'a str,
    pub hint: &'a str,
    pub answer_options: i32,
    pub split_roles: bool,
    pub categories: &'a [Category],
    pub position: i32,
}

#[derive(sqlx::FromRow)]
struct SubjectRow {
    teacher_n_group_id: i64,
    teacher_id: i64,
    group_id: i64,
    name: String,
    photo: Option<String>,
    is_eng: bool,
}

impl From<SubjectRow> for SubjectRef {
    fn from(row: SubjectRow) -> Self {
        SubjectRef {
            teacher_n_group_id: row.teacher_n_group_id,
            teacher_id: row.teacher_id,
            group_id: row.group_id,
            teacher_name: row.name,
            teacher_photo: row.photo,
            // English teachers have exactly one category
            fixed_category: row.is_eng.then_some(Category::English),
        }
    }
}

#[derive(sqlx::FromRow)]
struct QuestionRow {
    id: i64,
    text: String,
    hint: String,
    answer_options: i32,
    split_roles: bool,
    categories: Vec<String>,
}

impl From<QuestionRow> for Question {
    fn from(row: QuestionRow) -> Self {
        Question {
            id: row.id,
            text: row.text,
            hint: row.hint,
            options: AnswerOptions::from_arity(row.answer_options),
            split_roles: row.split_roles,
            categories: row
                .categories
                .iter()
                .filter_map(|tag| Category::from_tag(tag))
                .collect(),
        }
    }
}

/// Initialize the database schema
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS teachers (
            id BIGSERIAL PRIMARY KEY,
            name TEXT NOT NULL,
            photo TEXT,
            is_eng BOOLEAN NOT NULL DEFAULT FALSE
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create teachers table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS groups (
            id BIGSERIAL PRIMARY KEY,
            name TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create groups table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS teacher_n_group (
            id BIGSERIAL PRIMARY KEY,
            teacher_id BIGINT NOT NULL REFERENCES teachers(id) ON DELETE CASCADE,
            group_id BIGINT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
            UNIQUE (teacher_id, group_id)
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create teacher_n_group table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS questions (
            id BIGSERIAL PRIMARY KEY,
            text TEXT NOT NULL,
            hint TEXT NOT NULL DEFAULT '',
            answer_options INTEGER NOT NULL DEFAULT 5,
            split_roles BOOLEAN NOT NULL DEFAULT FALSE,
            categories TEXT[] NOT NULL,
            position INTEGER NOT NULL DEFAULT 0
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create questions table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS results (
            id BIGSERIAL PRIMARY KEY,
            user_id BIGINT NOT NULL,
            teacher_n_group_id BIGINT NOT NULL REFERENCES teacher_n_group(id) ON DELETE CASCADE,
            teacher_type TEXT NOT NULL,
            open_answer TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create results table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS result_answers (
            id BIGSERIAL PRIMARY KEY,
            result_id BIGINT NOT NULL REFERENCES results(id) ON DELETE CASCADE,
            question_id BIGINT NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
            row_index SMALLINT NOT NULL,
            answer SMALLINT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create result_answers table")?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_results_user_subject
         ON results (user_id, teacher_n_group_id)",
    )
    .execute(pool)
    .await
    .context("Failed to create results index")?;

    info!("Database schema initialized successfully");
    Ok(())
}

/// Create a teacher
pub async fn create_teacher(pool: &PgPool, name: &str, photo: Option<&str>, is_eng: bool) -> Result<i64> {
    let id: i64 =
        sqlx::query_scalar("INSERT INTO teachers (name, photo, is_eng) VALUES ($1, $2, $3) RETURNING id")
            .bind(name)
            .bind(photo)
            .bind(is_eng)
            .fetch_one(pool)
            .await
            .context("Failed to insert teacher")?;

    info!(teacher_id = id, "Teacher created");
    Ok(id)
}

/// Create a student group
pub async fn create_group(pool: &PgPool, name: &str) -> Result<i64> {
    let id: i64 = sqlx::query_scalar("INSERT INTO groups (name) VALUES ($1) RETURNING id")
        .bind(name)
        .fetch_one(pool)
        .await
        .context("Failed to insert group")?;

    info!(group_id = id, "Group created");
    Ok(id)
}

/// Assign a teacher to a group, returning the pairing id
pub async fn link_teacher_to_group(pool: &PgPool, teacher_id: i64, group_id: i64) -> Result<i64> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO teacher_n_group (teacher_id, group_id) VALUES ($1, $2)
         ON CONFLICT (teacher_id, group_id) DO UPDATE SET teacher_id = EXCLUDED.teacher_id
         RETURNING id",
    )
    .bind(teacher_id)
    .bind(group_id)
    .fetch_one(pool)
    .await
    .context("Failed to link teacher to group")?;

    info!(teacher_id, group_id, teacher_n_group_id = id, "Teacher linked to group");
    Ok(id)
}

/// Create a question
pub async fn create_question(pool: &PgPool, question: &NewQuestion<'_>) -> Result<QuestionId> {
    let categories: Vec<String> = question
        .categories
        .iter()
        .map(|category| category.tag().to_string())
        .collect();

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO questions (text, hint, answer_options, split_roles, categories, position)
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
    )
    .bind(question.text)
    .bind(question.hint)
    .bind(question.answer_options)
    .bind(question.split_roles)
    .bind(&categories)
    .bind(question.position)
    .fetch_one(pool)
    .await
    .context("Failed to insert question")?;

    info!(question_id = id, "Question created");
    Ok(id)
}

/// Find the teacher/group pairing a teacher deep link points at
pub async fn find_subject(pool: &PgPool, teacher_id: i64, group_id: i64) -> Result<Option<SubjectRef>> {
    let row = sqlx::query_as::<_, SubjectRow>(
        "SELECT tng.id AS teacher_n_group_id, t.id AS teacher_id, tng.group_id,
                t.name, t.photo, t.is_eng
         FROM teacher_n_group tng
         JOIN teachers t ON t.id = tng.teacher_id
         WHERE tng.teacher_id = $1 AND tng.group_id = $2",
    )
    .bind(teacher_id)
    .bind(group_id)
    .fetch_optional(pool)
    .await
    .context("Failed to look up teacher in group")?;

    debug!(teacher_id, group_id, found = row.is_some(), "Subject lookup");
    Ok(row.map(SubjectRef::from))
}

/// Teachers assigned to a group, ordered by name
pub async fn find_group_roster(pool: &PgPool, group_id: i64) -> Result<Option<GroupRoster>> {
    let group_name: Option<String> = sqlx::query_scalar("SELECT name FROM groups WHERE id = $1")
        .bind(group_id)
        .fetch_optional(pool)
        .await
        .context("Failed to read group")?;

    let Some(group_name) = group_name else {
        debug!(group_id, "Group not found");
        return Ok(None);
    };

    let teachers = sqlx::query_as::<_, (i64, String)>(
        "SELECT t.id, t.name
         FROM teacher_n_group tng
         JOIN teachers t ON t.id = tng.teacher_id
         WHERE tng.group_id = $1
         ORDER BY t.name, t.id",
    )
    .bind(group_id)
    .fetch_all(pool)
    .await
    .context("Failed to list group teachers")?
    .into_iter()
    .map(|(teacher_id, name)| TeacherSummary { teacher_id, name })
    .collect();

    Ok(Some(GroupRoster {
        group_id,
        group_name,
        teachers,
    }))
}

/// Ordered questions that apply to a category
pub async fn questions_for_category(pool: &PgPool, category: Category) -> Result<Vec<Question>> {
    let rows = sqlx::query_as::<_, QuestionRow>(
        "SELECT id, text, hint, answer_options, split_roles, categories
         FROM questions
         WHERE $1 = ANY(categories)
         ORDER BY position, id",
    )
    .bind(category.tag())
    .fetch_all(pool)
    .await
    .context("Failed to list questions")?;

    debug!(category = %category, count = rows.len(), "Loaded questions");
    Ok(rows.into_iter().map(Question::from).collect())
}

/// Number of stored results of a user for a teacher/group pairing
pub async fn count_results(pool: &PgPool, user_id: TelegramId, teacher_n_group_id: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM results WHERE user_id = $1 AND teacher_n_group_id = $2",
    )
    .bind(user_id)
    .bind(teacher_n_group_id)
    .fetch_one(pool)
    .await
    .context("Failed to count results")?;

    Ok(count)
}

/// Flatten an answer sheet into `(question, row, answer)` rows
///
/// Fails if any slot is unset; only finished polls are stored.
pub fn answer_rows(answers: &AnswerSheet) -> Result<Vec<(QuestionId, i16, i16)>> {
    let mut rows = Vec::new();
    for (question_id, vector) in answers.iter() {
        for (row, slot) in vector.slots().iter().enumerate() {
            let Some(value) = slot.value() else {
                bail!("Question {question_id} row {row} has no answer");
            };
            rows.push((question_id, row as i16, i16::from(value)));
        }
    }
    Ok(rows)
}

/// Store a finished poll and its answers in one transaction
pub async fn save_result(pool: &PgPool, response: &Response) -> Result<i64> {
    let rows = answer_rows(&response.answers)?;

    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result_id: i64 = sqlx::query_scalar(
        "INSERT INTO results (user_id, teacher_n_group_id, teacher_type, open_answer)
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(response.user_id)
    .bind(response.subject.teacher_n_group_id)
    .bind(response.category.tag())
    .bind(response.open_answer.text())
    .fetch_one(&mut *tx)
    .await
    .context("Failed to insert result")?;

    for (question_id, row_index, answer) in &rows {
        sqlx::query(
            "INSERT INTO result_answers (result_id, question_id, row_index, answer)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(result_id)
        .bind(question_id)
        .bind(row_index)
        .bind(answer)
        .execute(&mut *tx)
        .await
        .context("Failed to insert result answer")?;
    }

    tx.commit().await.context("Failed to commit result")?;

    info!(
        result_id,
        user_id = response.user_id,
        answers = rows.len(),
        "Result stored"
    );
    Ok(result_id)
}

/// Results of a user, newest first
pub async fn list_results_for_user(pool: &PgPool, user_id: TelegramId) -> Result<Vec<ResultRecord>> {
    let results = sqlx::query_as::<_, ResultRecord>(
        "SELECT id, user_id, teacher_n_group_id, teacher_type, open_answer, created_at
         FROM results
         WHERE user_id = $1
         ORDER BY created_at DESC, id DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to list results")?;

    Ok(results)
}

/// Answer slots of a result in question and row order
pub async fn list_result_answers(pool: &PgPool, result_id: i64) -> Result<Vec<ResultAnswerRecord>> {
    let answers = sqlx::query_as::<_, ResultAnswerRecord>(
        "SELECT question_id, row_index, answer
         FROM result_answers
         WHERE result_id = $1
         ORDER BY question_id, row_index",
    )
    .bind(result_id)
    .fetch_all(pool)
    .await
    .context("Failed to list result answers")?;

    Ok(answers)
}

/// PostgreSQL-backed subject directory, question source and result store
#[derive(Clone)]
pub struct PgPollRepository {
    pool: PgPool,
}

impl PgPollRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubjectResolver for PgPollRepository {
    async fn resolve(&self, link: &DeepLink) -> Result<Option<ResolvedSubject>> {
        let resolved = match *link {
            DeepLink::Teacher {
                teacher_id,
                group_id,
            } => find_subject(&self.pool, teacher_id, group_id)
                .await?
                .map(ResolvedSubject::Teacher),
            DeepLink::Group { group_id } => find_group_roster(&self.pool, group_id)
                .await?
                .map(ResolvedSubject::Group),
        };
        Ok(resolved)
    }
}

#[async_trait]
impl QuestionProvider for PgPollRepository {
    async fn questions_for_category(&self, category: Category) -> Result<Vec<Question>> {
        questions_for_category(&self.pool, category).await
    }
}

#[async_trait]
impl ResultStore for PgPollRepository {
    async fn has_response(&self, user_id: TelegramId, subject: &SubjectRef) -> Result<bool> {
        Ok(count_results(&self.pool, user_id, subject.teacher_n_group_id).await? > 0)
    }

    async fn save(&self, response: &Response) -> Result<()> {
        save_result(&self.pool, response).await.map(|_| ())
    }
}
