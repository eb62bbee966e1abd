//! Shared application state for the sage server

use std::sync::Arc;

use chrono::{DateTime, Utc};

use sage_core::store::{demo_catalogue, MemoryRepository};
use sage_core::{EngineError, SessionEngine};

/// Shared application state accessible by all handlers
#[derive(Clone)]
pub struct AppState {
    /// The assessment engine all endpoints delegate to
    pub engine: SessionEngine,
    /// When the server started
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Build state around an existing engine (for tests and embedding)
    pub fn with_engine(engine: SessionEngine) -> Self {
        Self {
            engine,
            started_at: Utc::now(),
        }
    }

    /// Build state backed by an in-memory repository seeded with the demo
    /// UK-Geography bank
    pub async fn demo() -> Result<Self, EngineError> {
        let repository = Arc::new(MemoryRepository::new());
        repository.seed_demo().await?;
        let engine = SessionEngine::new(repository, demo_catalogue().into_shared());
        Ok(Self::with_engine(engine))
    }

    /// Returns how long the server has been running
    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sage_core::SessionCondition;

    #[tokio::test]
    async fn demo_state_serves_the_seeded_fixture() {
        let state = AppState::demo().await.unwrap();
        let session = state
            .engine
            .create_session("user-demo", "quiz-uk-geo", SessionCondition::Adaptive)
            .await
            .unwrap();
        assert_eq!(session.theta, -0.780);
    }

    #[tokio::test]
    async fn uptime_is_non_negative() {
        let state = AppState::demo().await.unwrap();
        assert!(state.uptime_seconds() >= 0);
    }
}
