//! Session engine
//!
//! Owns the lifecycle of a learner session: creation, next-item selection,
//! per-response posterior updates, and completion. The engine is stateless
//! between calls; everything durable goes through the [`Repository`] seam,
//! and all IRT/BKT math is synchronous and CPU-bound.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bkt::{self, KcCatalogue};
use crate::error::{EngineError, Result};
use crate::irt::{self, ScoredResponse, DEFAULT_GUESSING, THETA_PRIOR_MEAN, THETA_PRIOR_SD};
use crate::selector::{self, SelectionCriteria};
use crate::store::{LoadedSession, Repository, SessionUpdate};
use crate::types::{
    AnswerLabel, BloomLevel, Interaction, Question, Session, SessionCondition,
};

/// Selection metadata returned alongside a served question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionMeta {
    pub current_theta: f64,
    pub item_difficulty: f64,
    /// Item information at the current theta, 3 decimals
    pub item_information: f64,
    pub questions_answered: usize,
    pub questions_remaining: usize,
    pub condition: SessionCondition,
}

/// A question ready to serve, stripped of correctness metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextQuestion {
    pub question_id: String,
    pub stem: String,
    /// Option text keyed by label, authored order
    pub options: BTreeMap<AnswerLabel, String>,
    pub bloom: BloomLevel,
    pub kc: String,
    pub meta: SelectionMeta,
}

/// Terminal payload once every quiz item has been answered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionComplete {
    pub final_theta: f64,
    pub total_answered: usize,
}

/// Outcome of a next-question request
#[derive(Debug, Clone, PartialEq)]
pub enum NextOutcome {
    Question(Box<NextQuestion>),
    Completed(SessionComplete),
}

/// Ability trajectory for one submitted answer, 3 decimals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThetaSummary {
    pub before: f64,
    pub after: f64,
    pub delta: f64,
    pub sd: f64,
    pub ci95: [f64; 2],
}

/// BKT trajectory for the knowledge component the answered item targets
///
/// Carried unrounded: these are audit values, not display values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KcUpdateSummary {
    pub kc: String,
    pub p_learned_before: f64,
    pub p_learned_after: f64,
    pub is_mastered: bool,
}

/// Full result of a submitted answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerOutcome {
    pub correct: bool,
    pub correct_answer: AnswerLabel,
    pub selected_answer: AnswerLabel,
    pub theta: ThetaSummary,
    pub bkt: KcUpdateSummary,
    pub interaction_id: String,
}

/// Round for reporting; persisted posteriors keep full precision
fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// The adaptive assessment engine
///
/// Cheap to clone; workers may run in parallel across sessions because all
/// per-session serialisation lives behind the repository.
#[derive(Clone)]
pub struct SessionEngine {
    repository: Arc<dyn Repository>,
    catalogue: Arc<KcCatalogue>,
}

impl SessionEngine {
    pub fn new(repository: Arc<dyn Repository>, catalogue: Arc<KcCatalogue>) -> Self {
        Self {
            repository,
            catalogue,
        }
    }

    pub fn catalogue(&self) -> &KcCatalogue {
        &self.catalogue
    }

    /// Create a session seeded with the ability prior and the full KC map
    pub async fn create_session(
        &self,
        user_id: &str,
        quiz_id: &str,
        condition: SessionCondition,
    ) -> Result<Session> {
        self.repository
            .get_user(user_id)
            .await?
            .ok_or_else(|| EngineError::not_found("user", user_id))?;
        self.repository
            .get_quiz(quiz_id)
            .await?
            .ok_or_else(|| EngineError::not_found("quiz", quiz_id))?;

        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            quiz_id: quiz_id.to_string(),
            condition,
            started_at: Utc::now(),
            completed_at: None,
            theta: THETA_PRIOR_MEAN,
            theta_sd: THETA_PRIOR_SD,
            kc_states: bkt::initialise_all(&self.catalogue),
        };

        let session = self.repository.create_session(session).await?;
        tracing::info!(
            session_id = %session.id,
            user_id,
            quiz_id,
            condition = %condition,
            "session created"
        );
        Ok(session)
    }

    /// Serve the next question, or the completion payload
    ///
    /// The first request that finds every quiz item answered flips the
    /// session to COMPLETED; later requests return the same payload without
    /// mutating anything.
    pub async fn next_question(&self, session_id: &str) -> Result<NextOutcome> {
        let LoadedSession {
            session,
            interactions,
        } = self
            .repository
            .get_session(session_id)
            .await?
            .ok_or_else(|| EngineError::not_found("session", session_id))?;

        let questions = self
            .repository
            .list_questions_for_quiz(&session.quiz_id)
            .await?;
        if questions.is_empty() {
            return Err(EngineError::NotFound(format!(
                "quiz '{}' has no questions",
                session.quiz_id
            )));
        }

        let answered: HashSet<String> = interactions
            .iter()
            .map(|interaction| interaction.question_id.clone())
            .collect();

        if session.is_completed() {
            return Ok(NextOutcome::Completed(SessionComplete {
                final_theta: round3(session.theta),
                total_answered: answered.len(),
            }));
        }

        if questions.iter().all(|question| answered.contains(&question.id)) {
            self.repository
                .complete_session(session_id, Utc::now())
                .await?;
            tracing::info!(session_id, theta = session.theta, "session completed");
            return Ok(NextOutcome::Completed(SessionComplete {
                final_theta: round3(session.theta),
                total_answered: answered.len(),
            }));
        }

        let picked = match session.condition {
            SessionCondition::Adaptive => {
                let criteria =
                    SelectionCriteria::new(session.theta).excluding(answered.iter().cloned());
                selector::select_adaptive(&questions, &criteria)?
            }
            SessionCondition::Static => selector::select_static(&questions, &answered),
        };
        let question = picked.ok_or_else(|| {
            EngineError::NotFound(format!(
                "no eligible question left in quiz '{}'",
                session.quiz_id
            ))
        })?;

        let info = irt::information(session.theta, &question.irt)?;
        tracing::debug!(
            session_id,
            question_id = %question.id,
            information = info,
            "question selected"
        );

        Ok(NextOutcome::Question(Box::new(NextQuestion {
            question_id: question.id.clone(),
            stem: question.stem.clone(),
            options: option_texts(question),
            bloom: question.bloom,
            kc: question.kc.clone(),
            meta: SelectionMeta {
                current_theta: round3(session.theta),
                item_difficulty: question.irt.b,
                item_information: round3(info),
                questions_answered: answered.len(),
                questions_remaining: questions.len() - answered.len(),
                condition: session.condition,
            },
        })))
    }

    /// Score a submitted answer and commit both posterior updates atomically
    pub async fn submit_answer(
        &self,
        session_id: &str,
        question_id: &str,
        selected_answer: &str,
        response_time_ms: u64,
    ) -> Result<AnswerOutcome> {
        let LoadedSession {
            session,
            interactions,
        } = self
            .repository
            .get_session(session_id)
            .await?
            .ok_or_else(|| EngineError::not_found("session", session_id))?;
        if session.is_completed() {
            return Err(EngineError::Conflict(format!(
                "session '{session_id}' is already completed"
            )));
        }

        let question = self
            .repository
            .get_question(question_id)
            .await?
            .ok_or_else(|| EngineError::not_found("question", question_id))?;
        if question.quiz_id != session.quiz_id {
            return Err(EngineError::InvalidArgument(format!(
                "question '{question_id}' does not belong to quiz '{}'",
                session.quiz_id
            )));
        }
        if interactions
            .iter()
            .any(|interaction| interaction.question_id == question_id)
        {
            return Err(EngineError::Conflict(format!(
                "question '{question_id}' already answered in session '{session_id}'"
            )));
        }

        let selected: AnswerLabel = selected_answer.parse()?;
        let correct_label = question.correct_label()?;
        let is_correct = selected == correct_label;

        // Ability: EAP over the complete response history, this answer last.
        let history = self
            .response_history(&session, &interactions, &question, is_correct)
            .await?;
        let estimate = irt::eap_estimate_with_default_prior(&history)?;
        let theta_before = session.theta;

        // Mastery: one BKT step on the targeted KC, when the catalogue
        // knows it. Unknown KCs are recorded at the default guessing floor
        // and leave the session's KC map untouched.
        let mut kc_states = session.kc_states.clone();
        let bkt_summary = if let Some(params) = self.catalogue.get(&question.kc) {
            let current = kc_states
                .get(&question.kc)
                .cloned()
                .unwrap_or_else(|| bkt::initial_state(&question.kc, params));
            let p_before = current.p_learned;
            let updated = bkt::update_kc_state(&current, is_correct, params)?;
            let summary = KcUpdateSummary {
                kc: question.kc.clone(),
                p_learned_before: p_before,
                p_learned_after: updated.p_learned,
                is_mastered: updated.is_mastered,
            };
            kc_states.insert(question.kc.clone(), updated);
            summary
        } else {
            KcUpdateSummary {
                kc: question.kc.clone(),
                p_learned_before: DEFAULT_GUESSING,
                p_learned_after: DEFAULT_GUESSING,
                is_mastered: false,
            }
        };

        let interaction = Interaction {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            question_id: question_id.to_string(),
            selected_answer: selected,
            is_correct,
            response_time_ms,
            theta_before,
            theta_after: estimate.theta,
            p_learned_before: bkt_summary.p_learned_before,
            p_learned_after: bkt_summary.p_learned_after,
            created_at: Utc::now(),
        };
        let interaction_id = interaction.id.clone();

        self.repository
            .record_answer_atomically(
                session_id,
                interaction,
                SessionUpdate {
                    theta: estimate.theta,
                    theta_sd: estimate.sd,
                    kc_states,
                },
            )
            .await?;

        tracing::debug!(
            session_id,
            question_id,
            correct = is_correct,
            theta_before,
            theta_after = estimate.theta,
            "answer recorded"
        );

        Ok(AnswerOutcome {
            correct: is_correct,
            correct_answer: correct_label,
            selected_answer: selected,
            theta: ThetaSummary {
                before: round3(theta_before),
                after: round3(estimate.theta),
                delta: round3(estimate.theta - theta_before),
                sd: round3(estimate.sd),
                ci95: [round3(estimate.ci_low), round3(estimate.ci_high)],
            },
            bkt: bkt_summary,
            interaction_id,
        })
    }

    /// Load a session with its interaction history attached
    pub async fn load_session(&self, session_id: &str) -> Result<LoadedSession> {
        self.repository
            .get_session(session_id)
            .await?
            .ok_or_else(|| EngineError::not_found("session", session_id))
    }

    /// Rebuild the scored response history behind a session, ending with the
    /// answer being submitted
    async fn response_history(
        &self,
        session: &Session,
        interactions: &[Interaction],
        current: &Question,
        is_correct: bool,
    ) -> Result<Vec<ScoredResponse>> {
        let questions = self
            .repository
            .list_questions_for_quiz(&session.quiz_id)
            .await?;
        let by_id: HashMap<&str, &Question> = questions
            .iter()
            .map(|question| (question.id.as_str(), question))
            .collect();

        let mut history = Vec::with_capacity(interactions.len() + 1);
        for interaction in interactions {
            let answered = by_id.get(interaction.question_id.as_str()).ok_or_else(|| {
                EngineError::Internal(format!(
                    "interaction '{}' references question '{}' outside quiz '{}'",
                    interaction.id, interaction.question_id, session.quiz_id
                ))
            })?;
            history.push(ScoredResponse {
                params: answered.irt,
                correct: interaction.is_correct,
            });
        }
        history.push(ScoredResponse {
            params: current.irt,
            correct: is_correct,
        });
        Ok(history)
    }
}

fn option_texts(question: &Question) -> BTreeMap<AnswerLabel, String> {
    question
        .options
        .iter()
        .enumerate()
        .filter_map(|(index, option)| {
            AnswerLabel::from_index(index).map(|label| (label, option.text.clone()))
        })
        .collect()
}
