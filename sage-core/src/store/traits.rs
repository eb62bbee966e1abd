//! Repository contract the session engine depends on
//!
//! The engine never talks to storage directly; it goes through this trait so
//! relational and in-memory backends are interchangeable. Implementations
//! must serialise `record_answer_atomically` per session (transactional
//! isolation or a per-session lock) to keep the duplicate-answer invariant
//! under concurrent requests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{Interaction, KcState, Question, Quiz, Session, User};

/// A session together with its prior interactions, ascending `created_at`
#[derive(Debug, Clone)]
pub struct LoadedSession {
    pub session: Session,
    pub interactions: Vec<Interaction>,
}

/// The session fields overwritten when an answer commits
#[derive(Debug, Clone)]
pub struct SessionUpdate {
    pub theta: f64,
    pub theta_sd: f64,
    pub kc_states: BTreeMap<String, KcState>,
}

/// Storage operations for users, quizzes, questions, sessions, interactions
#[async_trait]
pub trait Repository: Send + Sync {
    async fn get_user(&self, id: &str) -> Result<Option<User>>;

    async fn get_quiz(&self, id: &str) -> Result<Option<Quiz>>;

    /// Fetch one question with its options in authored order
    async fn get_question(&self, id: &str) -> Result<Option<Question>>;

    /// All questions of a quiz, in authored order
    async fn list_questions_for_quiz(&self, quiz_id: &str) -> Result<Vec<Question>>;

    /// Fetch a session with its interactions attached
    async fn get_session(&self, id: &str) -> Result<Option<LoadedSession>>;

    /// Persist a freshly created session
    async fn create_session(&self, session: Session) -> Result<Session>;

    /// Append an interaction and overwrite the session posteriors in one
    /// transaction; either both happen or neither does
    async fn record_answer_atomically(
        &self,
        session_id: &str,
        interaction: Interaction,
        update: SessionUpdate,
    ) -> Result<()>;

    /// Mark a session completed; a no-op if it already is
    async fn complete_session(&self, session_id: &str, completed_at: DateTime<Utc>)
        -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Verify the trait is object-safe
    #[test]
    fn repository_is_object_safe() {
        fn _takes_boxed(_: Box<dyn Repository>) {}
    }
}
