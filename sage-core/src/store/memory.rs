//! In-memory repository
//!
//! Reference implementation used by the test suite and as the server default.
//! A single `tokio::sync::RwLock` over the interior makes every write a
//! serialised critical section, which is what gives
//! `record_answer_atomically` its all-or-nothing and exactly-one-winner
//! behaviour.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::bkt::{BktParams, KcCatalogue};
use crate::error::{EngineError, Result};
use crate::types::{
    BloomLevel, Interaction, IrtParams, Question, QuestionOption, Quiz, Session, User,
};

use super::traits::{LoadedSession, Repository, SessionUpdate};

#[derive(Default)]
struct Inner {
    users: HashMap<String, User>,
    quizzes: HashMap<String, Quiz>,
    questions: HashMap<String, Question>,
    /// Question ids per quiz, in authored order
    quiz_questions: HashMap<String, Vec<String>>,
    sessions: HashMap<String, Session>,
    /// Interactions per session, insertion order == ascending created_at
    interactions: HashMap<String, Vec<Interaction>>,
}

/// In-process repository backed by hash maps
#[derive(Default)]
pub struct MemoryRepository {
    inner: RwLock<Inner>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: User) {
        self.inner.write().await.users.insert(user.id.clone(), user);
    }

    pub async fn insert_quiz(&self, quiz: Quiz) {
        self.inner
            .write()
            .await
            .quizzes
            .insert(quiz.id.clone(), quiz);
    }

    /// Insert a question, appending it to its quiz's authored order
    pub async fn insert_question(&self, question: Question) -> Result<()> {
        question.validate()?;
        let mut inner = self.inner.write().await;
        inner
            .quiz_questions
            .entry(question.quiz_id.clone())
            .or_default()
            .push(question.id.clone());
        inner.questions.insert(question.id.clone(), question);
        Ok(())
    }

    /// Number of interactions recorded for a session (test support)
    pub async fn interaction_count(&self, session_id: &str) -> usize {
        self.inner
            .read()
            .await
            .interactions
            .get(session_id)
            .map_or(0, Vec::len)
    }

    /// Seed the demo UK-Geography fixture: one user, one quiz, five items
    pub async fn seed_demo(&self) -> Result<()> {
        self.insert_user(User {
            id: "user-demo".into(),
            display_name: "Demo Learner".into(),
        })
        .await;
        self.insert_quiz(Quiz {
            id: "quiz-uk-geo".into(),
            title: "UK Geography".into(),
        })
        .await;

        for question in demo_questions() {
            self.insert_question(question).await?;
        }
        Ok(())
    }
}

/// The five-item UK-Geography bank used by the demo server and the tests
pub fn demo_questions() -> Vec<Question> {
    let bank = [
        (
            "q-001",
            "Which city is the capital of the United Kingdom?",
            ["Manchester", "London", "Birmingham", "Leeds"],
            1usize,
            -0.80,
            BloomLevel::Remember,
            "UK_capitals",
        ),
        (
            "q-002",
            "What is the capital city of Scotland?",
            ["Glasgow", "Aberdeen", "Edinburgh", "Dundee"],
            2,
            -1.50,
            BloomLevel::Remember,
            "UK_capitals",
        ),
        (
            "q-003",
            "Which river flows through central London?",
            ["Severn", "Thames", "Mersey", "Clyde"],
            1,
            -0.60,
            BloomLevel::Understand,
            "UK_rivers",
        ),
        (
            "q-004",
            "Which is the longest river in the United Kingdom?",
            ["Thames", "Trent", "Severn", "Great Ouse"],
            2,
            0.20,
            BloomLevel::Understand,
            "UK_rivers",
        ),
        (
            "q-005",
            "Which mountain is the highest peak in the United Kingdom?",
            ["Snowdon", "Scafell Pike", "Ben Macdui", "Ben Nevis"],
            3,
            0.50,
            BloomLevel::Apply,
            "UK_mountains",
        ),
    ];

    bank.iter()
        .enumerate()
        .map(
            |(index, (id, stem, options, correct_index, b, bloom, kc))| Question {
                id: (*id).into(),
                quiz_id: "quiz-uk-geo".into(),
                stem: (*stem).into(),
                options: options
                    .iter()
                    .enumerate()
                    .map(|(i, text)| QuestionOption::new(*text, i == *correct_index))
                    .collect(),
                irt: IrtParams::new(1.20, *b, 0.25),
                bloom: *bloom,
                kc: (*kc).into(),
                order: index as u32 + 1,
            },
        )
        .collect()
}

/// Knowledge-component catalogue matching the demo bank
pub fn demo_catalogue() -> KcCatalogue {
    KcCatalogue::from_entries([
        (
            "UK_capitals".to_string(),
            BktParams::new(0.60, 0.25, 0.08, 0.25),
        ),
        (
            "UK_rivers".to_string(),
            BktParams::new(0.45, 0.20, 0.10, 0.25),
        ),
        (
            "UK_mountains".to_string(),
            BktParams::new(0.35, 0.20, 0.10, 0.25),
        ),
    ])
    .expect("demo catalogue parameters are valid")
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get_user(&self, id: &str) -> Result<Option<User>> {
        Ok(self.inner.read().await.users.get(id).cloned())
    }

    async fn get_quiz(&self, id: &str) -> Result<Option<Quiz>> {
        Ok(self.inner.read().await.quizzes.get(id).cloned())
    }

    async fn get_question(&self, id: &str) -> Result<Option<Question>> {
        Ok(self.inner.read().await.questions.get(id).cloned())
    }

    async fn list_questions_for_quiz(&self, quiz_id: &str) -> Result<Vec<Question>> {
        let inner = self.inner.read().await;
        let ids = match inner.quiz_questions.get(quiz_id) {
            Some(ids) => ids,
            None => return Ok(Vec::new()),
        };
        ids.iter()
            .map(|id| {
                inner.questions.get(id).cloned().ok_or_else(|| {
                    EngineError::Internal(format!("quiz '{quiz_id}' references missing question '{id}'"))
                })
            })
            .collect()
    }

    async fn get_session(&self, id: &str) -> Result<Option<LoadedSession>> {
        let inner = self.inner.read().await;
        let session = match inner.sessions.get(id) {
            Some(session) => session.clone(),
            None => return Ok(None),
        };
        let interactions = inner.interactions.get(id).cloned().unwrap_or_default();
        Ok(Some(LoadedSession {
            session,
            interactions,
        }))
    }

    async fn create_session(&self, session: Session) -> Result<Session> {
        let mut inner = self.inner.write().await;
        if inner.sessions.contains_key(&session.id) {
            return Err(EngineError::Conflict(format!(
                "session '{}' already exists",
                session.id
            )));
        }
        inner.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn record_answer_atomically(
        &self,
        session_id: &str,
        interaction: Interaction,
        update: SessionUpdate,
    ) -> Result<()> {
        // One write lock spans every check and both mutations: of two
        // concurrent submissions for the same question, the second finds the
        // first's interaction and loses with Conflict.
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        let session = inner
            .sessions
            .get(session_id)
            .ok_or_else(|| EngineError::not_found("session", session_id))?;
        if session.is_completed() {
            return Err(EngineError::Conflict(format!(
                "session '{session_id}' is already completed"
            )));
        }
        if interaction.session_id != session_id {
            return Err(EngineError::InvalidArgument(format!(
                "interaction belongs to session '{}', not '{session_id}'",
                interaction.session_id
            )));
        }
        let already_answered = inner
            .interactions
            .get(session_id)
            .is_some_and(|records| {
                records
                    .iter()
                    .any(|record| record.question_id == interaction.question_id)
            });
        if already_answered {
            return Err(EngineError::Conflict(format!(
                "question '{}' already answered in session '{session_id}'",
                interaction.question_id
            )));
        }

        let session = inner
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| EngineError::not_found("session", session_id))?;
        session.theta = update.theta;
        session.theta_sd = update.theta_sd;
        session.kc_states = update.kc_states;
        inner
            .interactions
            .entry(session_id.to_string())
            .or_default()
            .push(interaction);
        Ok(())
    }

    async fn complete_session(
        &self,
        session_id: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let session = inner
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| EngineError::not_found("session", session_id))?;
        // Completion happens exactly once; later calls leave the original
        // timestamp untouched.
        if session.completed_at.is_none() {
            session.completed_at = Some(completed_at);
        }
        Ok(())
    }
}
