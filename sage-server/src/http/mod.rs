//! HTTP server module

mod api;
mod sessions;

use axum::routing::{get, post};
use axum::Router;

use crate::AppState;

pub use api::HealthResponse;
pub use sessions::{
    AnswerRequest, AnswerResponse, BktPayload, CompletedPayload, CreateSessionRequest,
    CreateSessionResponse, MetaPayload, NextQuestionResponse, QuestionPayload,
    SessionSnapshotResponse, ThetaPayload,
};

/// Create the HTTP router with all routes configured
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/sessions", post(sessions::create_session))
        .route("/sessions/:id", get(sessions::get_session))
        .route(
            "/sessions/:id/next-question",
            get(sessions::next_question),
        )
        .route("/sessions/:id/answer", post(sessions::submit_answer))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_test::TestServer;

    #[tokio::test]
    async fn router_has_health_endpoint() {
        let state = AppState::demo().await.unwrap();
        let server = TestServer::new(create_router(state)).unwrap();

        let response = server.get("/health").await;
        response.assert_status_ok();
        let body: HealthResponse = response.json();
        assert_eq!(body.status, "ok");
        assert_eq!(body.catalogue_size, 3);
    }
}
