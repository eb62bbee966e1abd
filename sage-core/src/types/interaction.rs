//! Immutable interaction audit records
//!
//! Every answered question produces one record carrying both the ability and
//! mastery posteriors before and after the update. Records are append-only
//! and totally ordered by `created_at` within a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::question::AnswerLabel;

/// One answered question, with the full before/after posterior trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub id: String,
    pub session_id: String,
    pub question_id: String,
    pub selected_answer: AnswerLabel,
    pub is_correct: bool,
    /// Learner-reported latency; recorded for downstream analysis only
    pub response_time_ms: u64,
    pub theta_before: f64,
    pub theta_after: f64,
    pub p_learned_before: f64,
    pub p_learned_after: f64,
    pub created_at: DateTime<Utc>,
}
