//! Session state and per-KC mastery posteriors

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Study condition a session runs under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionCondition {
    /// Maximum-information item selection at the current ability estimate
    Adaptive,
    /// Authored-order item selection, the experimental control
    Static,
}

impl SessionCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Adaptive => "adaptive",
            Self::Static => "static",
        }
    }
}

impl Default for SessionCondition {
    fn default() -> Self {
        Self::Adaptive
    }
}

impl fmt::Display for SessionCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SessionCondition {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "adaptive" => Ok(Self::Adaptive),
            "static" => Ok(Self::Static),
            other => Err(EngineError::InvalidArgument(format!(
                "condition must be 'adaptive' or 'static', got '{other}'"
            ))),
        }
    }
}

/// Per-session posterior over one knowledge component
///
/// `is_mastered` is derived state: it holds exactly when `p_learned` has
/// reached the mastery threshold. `correct` never exceeds `attempts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KcState {
    pub kc_id: String,
    /// P(learned) after the most recent update, clamped to `[0, 1]`
    pub p_learned: f64,
    pub attempts: u32,
    pub correct: u32,
    pub is_mastered: bool,
}

/// A live learner session
///
/// Mutated only by the session engine; once `completed_at` is set the
/// session is terminal and immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub quiz_id: String,
    pub condition: SessionCondition,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Current EAP ability estimate
    pub theta: f64,
    /// Posterior standard deviation of theta, non-negative
    pub theta_sd: f64,
    /// Mastery posterior per knowledge component, keyed by KC id
    ///
    /// Seeded with the full catalogue at creation and never shrunk.
    pub kc_states: BTreeMap<String, KcState>,
}

impl Session {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// A registered learner (identity only; profile data lives elsewhere)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub display_name: String,
}

/// A quiz: an ordered bank of calibrated questions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub id: String,
    pub title: String,
}
