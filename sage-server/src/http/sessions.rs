//! Session API handlers
//!
//! The three kernel endpoints (create, next question, answer) plus a
//! read-only session snapshot. Handlers translate between transport JSON
//! and the engine's DTOs; all decisions live in sage-core.

use std::collections::BTreeMap;
use std::str::FromStr;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sage_core::bkt::{summarise, weakest_unmastered, MasterySummary};
use sage_core::engine::NextOutcome;
use sage_core::{AnswerLabel, BloomLevel, SessionCondition};

use crate::error::ApiError;
use crate::AppState;

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

// ============================================================================
// Create session
// ============================================================================

/// Request body for POST /sessions
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub user_id: String,
    pub quiz_id: String,
    /// Defaults to "adaptive" when omitted
    pub condition: Option<String>,
}

/// Response for a created session
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub condition: SessionCondition,
    pub theta: f64,
    pub theta_sd: f64,
    pub message: String,
}

/// POST /sessions - start a session for a user on a quiz
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), ApiError> {
    let condition = match request.condition.as_deref() {
        Some(raw) => SessionCondition::from_str(raw)?,
        None => SessionCondition::default(),
    };

    let session = state
        .engine
        .create_session(&request.user_id, &request.quiz_id, condition)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: session.id,
            condition: session.condition,
            theta: session.theta,
            theta_sd: session.theta_sd,
            message: format!("session started in {} condition", session.condition),
        }),
    ))
}

// ============================================================================
// Next question
// ============================================================================

/// Selection metadata in the next-question response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaPayload {
    pub current_theta: f64,
    pub item_difficulty: f64,
    pub item_information: f64,
    pub questions_answered: usize,
    pub questions_remaining: usize,
    pub condition: SessionCondition,
}

/// A question to serve, with the correct answer withheld
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPayload {
    pub question_id: String,
    pub text: String,
    pub options: BTreeMap<AnswerLabel, String>,
    pub bloom: BloomLevel,
    pub kc: String,
    pub meta: MetaPayload,
}

/// Terminal payload for an exhausted quiz
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedPayload {
    pub completed: bool,
    pub final_theta: f64,
    pub total_answered: usize,
}

/// Response for GET /sessions/:id/next-question
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NextQuestionResponse {
    Question(QuestionPayload),
    Completed(CompletedPayload),
}

/// GET /sessions/:id/next-question - serve the next item or completion
pub async fn next_question(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<NextQuestionResponse>, ApiError> {
    let response = match state.engine.next_question(&session_id).await? {
        NextOutcome::Question(question) => NextQuestionResponse::Question(QuestionPayload {
            question_id: question.question_id,
            text: question.stem,
            options: question.options,
            bloom: question.bloom,
            kc: question.kc,
            meta: MetaPayload {
                current_theta: question.meta.current_theta,
                item_difficulty: question.meta.item_difficulty,
                item_information: question.meta.item_information,
                questions_answered: question.meta.questions_answered,
                questions_remaining: question.meta.questions_remaining,
                condition: question.meta.condition,
            },
        }),
        NextOutcome::Completed(payload) => NextQuestionResponse::Completed(CompletedPayload {
            completed: true,
            final_theta: payload.final_theta,
            total_answered: payload.total_answered,
        }),
    };
    Ok(Json(response))
}

// ============================================================================
// Submit answer
// ============================================================================

/// Request body for POST /sessions/:id/answer
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub question_id: String,
    /// A-D, case-insensitive
    pub selected_answer: String,
    pub response_time_ms: Option<u64>,
}

/// Ability trajectory in the answer response, 3 decimals
#[derive(Debug, Serialize, Deserialize)]
pub struct ThetaPayload {
    pub before: f64,
    pub after: f64,
    pub delta: f64,
    pub sd: f64,
    pub ci95: [f64; 2],
}

/// BKT trajectory for the answered item's knowledge component
#[derive(Debug, Serialize, Deserialize)]
pub struct BktPayload {
    pub kc: String,
    #[serde(rename = "pLearned_before")]
    pub p_learned_before: f64,
    #[serde(rename = "pLearned_after")]
    pub p_learned_after: f64,
    #[serde(rename = "isMastered")]
    pub is_mastered: bool,
}

/// Response for a scored answer
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResponse {
    pub correct: bool,
    pub correct_answer: AnswerLabel,
    pub selected_answer: AnswerLabel,
    pub theta: ThetaPayload,
    pub bkt: BktPayload,
    pub interaction_id: String,
}

/// POST /sessions/:id/answer - score one response and update both posteriors
pub async fn submit_answer(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let outcome = state
        .engine
        .submit_answer(
            &session_id,
            &request.question_id,
            &request.selected_answer,
            request.response_time_ms.unwrap_or(0),
        )
        .await?;

    Ok(Json(AnswerResponse {
        correct: outcome.correct,
        correct_answer: outcome.correct_answer,
        selected_answer: outcome.selected_answer,
        theta: ThetaPayload {
            before: outcome.theta.before,
            after: outcome.theta.after,
            delta: outcome.theta.delta,
            sd: outcome.theta.sd,
            ci95: outcome.theta.ci95,
        },
        bkt: BktPayload {
            kc: outcome.bkt.kc,
            p_learned_before: outcome.bkt.p_learned_before,
            p_learned_after: outcome.bkt.p_learned_after,
            is_mastered: outcome.bkt.is_mastered,
        },
        interaction_id: outcome.interaction_id,
    }))
}

// ============================================================================
// Session snapshot
// ============================================================================

/// One KC posterior in the snapshot
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KcStatePayload {
    pub p_learned: f64,
    pub attempts: u32,
    pub correct: u32,
    pub is_mastered: bool,
}

/// Response for GET /sessions/:id
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshotResponse {
    pub session_id: String,
    pub user_id: String,
    pub quiz_id: String,
    pub condition: SessionCondition,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub theta: f64,
    pub theta_sd: f64,
    pub questions_answered: usize,
    pub mastery: MasterySummary,
    /// Lowest-posterior KC still unmastered, if any
    pub weakest_kc: Option<String>,
    pub kc_states: BTreeMap<String, KcStatePayload>,
}

/// GET /sessions/:id - read-only progress snapshot
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSnapshotResponse>, ApiError> {
    let loaded = state.engine.load_session(&session_id).await?;
    let session = loaded.session;

    let mastery = summarise(session.kc_states.values());
    let weakest_kc =
        weakest_unmastered(session.kc_states.values()).map(|kc| kc.kc_id.clone());
    let kc_states = session
        .kc_states
        .iter()
        .map(|(kc_id, kc)| {
            (
                kc_id.clone(),
                KcStatePayload {
                    p_learned: kc.p_learned,
                    attempts: kc.attempts,
                    correct: kc.correct,
                    is_mastered: kc.is_mastered,
                },
            )
        })
        .collect();

    Ok(Json(SessionSnapshotResponse {
        session_id: session.id,
        user_id: session.user_id,
        quiz_id: session.quiz_id,
        condition: session.condition,
        started_at: session.started_at,
        completed_at: session.completed_at,
        theta: round3(session.theta),
        theta_sd: round3(session.theta_sd),
        questions_answered: loaded.interactions.len(),
        mastery,
        weakest_kc,
        kc_states,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::create_router;
    use axum_test::TestServer;
    use serde_json::json;

    async fn demo_server() -> TestServer {
        let state = AppState::demo().await.unwrap();
        TestServer::new(create_router(state)).unwrap()
    }

    async fn start_session(server: &TestServer) -> String {
        let response = server
            .post("/sessions")
            .json(&json!({ "userId": "user-demo", "quizId": "quiz-uk-geo" }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: CreateSessionResponse = response.json();
        body.session_id
    }

    #[tokio::test]
    async fn create_session_defaults_to_adaptive_and_prior() {
        let server = demo_server().await;
        let response = server
            .post("/sessions")
            .json(&json!({ "userId": "user-demo", "quizId": "quiz-uk-geo" }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let body: CreateSessionResponse = response.json();
        assert_eq!(body.condition, SessionCondition::Adaptive);
        assert_eq!(body.theta, -0.780);
        assert_eq!(body.theta_sd, 0.543);
    }

    #[tokio::test]
    async fn create_session_rejects_unknown_condition() {
        let server = demo_server().await;
        let response = server
            .post("/sessions")
            .json(&json!({
                "userId": "user-demo",
                "quizId": "quiz-uk-geo",
                "condition": "random"
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_session_for_unknown_user_is_404() {
        let server = demo_server().await;
        let response = server
            .post("/sessions")
            .json(&json!({ "userId": "nobody", "quizId": "quiz-uk-geo" }))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn next_question_serves_q002_first_and_hides_the_answer() {
        let server = demo_server().await;
        let session_id = start_session(&server).await;

        let response = server
            .get(&format!("/sessions/{session_id}/next-question"))
            .await;
        response.assert_status_ok();

        let body: serde_json::Value = response.json();
        assert_eq!(body["questionId"], "q-002");
        assert_eq!(body["meta"]["currentTheta"], -0.78);
        assert_eq!(body["meta"]["questionsRemaining"], 5);
        assert_eq!(body["options"].as_object().unwrap().len(), 4);
        // The wire payload must never reveal which option is correct.
        assert!(body.get("correctAnswer").is_none());
        assert!(!response.text().contains("is_correct"));
    }

    #[tokio::test]
    async fn next_question_for_unknown_session_is_404() {
        let server = demo_server().await;
        let response = server.get("/sessions/missing/next-question").await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn answer_reports_theta_and_bkt_movement() {
        let server = demo_server().await;
        let session_id = start_session(&server).await;

        let response = server
            .post(&format!("/sessions/{session_id}/answer"))
            .json(&json!({
                "questionId": "q-002",
                "selectedAnswer": "c",
                "responseTimeMs": 2500
            }))
            .await;
        response.assert_status_ok();

        let body: AnswerResponse = response.json();
        assert!(body.correct);
        assert_eq!(body.correct_answer, AnswerLabel::C);
        assert!(body.theta.after > body.theta.before);
        assert_eq!(body.bkt.kc, "UK_capitals");
        assert!(body.bkt.p_learned_after > body.bkt.p_learned_before);
        assert!(!body.interaction_id.is_empty());

        // The BKT block keeps its documented pLearned_* key casing.
        let raw: serde_json::Value = response.json();
        assert!(raw["bkt"].get("pLearned_after").is_some());
        assert!(raw["bkt"].get("isMastered").is_some());
    }

    #[tokio::test]
    async fn duplicate_answer_is_400() {
        let server = demo_server().await;
        let session_id = start_session(&server).await;

        let body = json!({ "questionId": "q-002", "selectedAnswer": "C" });
        server
            .post(&format!("/sessions/{session_id}/answer"))
            .json(&body)
            .await
            .assert_status_ok();
        let response = server
            .post(&format!("/sessions/{session_id}/answer"))
            .json(&body)
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_answer_label_is_400() {
        let server = demo_server().await;
        let session_id = start_session(&server).await;

        let response = server
            .post(&format!("/sessions/{session_id}/answer"))
            .json(&json!({ "questionId": "q-002", "selectedAnswer": "E" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn full_run_completes_and_locks_the_session() {
        let server = demo_server().await;
        let session_id = start_session(&server).await;

        let answers = [
            ("q-001", "B"),
            ("q-002", "C"),
            ("q-003", "B"),
            ("q-004", "C"),
            ("q-005", "D"),
        ];
        for (question_id, label) in answers {
            server
                .post(&format!("/sessions/{session_id}/answer"))
                .json(&json!({ "questionId": question_id, "selectedAnswer": label }))
                .await
                .assert_status_ok();
        }

        let response = server
            .get(&format!("/sessions/{session_id}/next-question"))
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["completed"], true);
        assert_eq!(body["totalAnswered"], 5);

        // A completed session rejects further answers.
        let rejected = server
            .post(&format!("/sessions/{session_id}/answer"))
            .json(&json!({ "questionId": "q-001", "selectedAnswer": "B" }))
            .await;
        rejected.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn snapshot_tracks_progress_and_weakest_kc() {
        let server = demo_server().await;
        let session_id = start_session(&server).await;

        server
            .post(&format!("/sessions/{session_id}/answer"))
            .json(&json!({ "questionId": "q-002", "selectedAnswer": "C" }))
            .await
            .assert_status_ok();

        let response = server.get(&format!("/sessions/{session_id}")).await;
        response.assert_status_ok();
        let body: SessionSnapshotResponse = response.json();

        assert_eq!(body.questions_answered, 1);
        assert_eq!(body.mastery.total, 3);
        assert_eq!(body.mastery.in_progress, 1);
        assert_eq!(body.mastery.not_started, 2);
        // UK_mountains has the lowest prior and nothing has moved it yet.
        assert_eq!(body.weakest_kc.as_deref(), Some("UK_mountains"));
        assert!(body.kc_states["UK_capitals"].p_learned > 0.60);
    }
}
