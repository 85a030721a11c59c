use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;
use tracing::error;

use crate::config::ServerConfig;
use crate::event::EventBus;
use crate::game::GameError;
use crate::quiz::QuizSource;
use crate::room::{repository::RoomRepository, RoomService, RoomServiceConfig};
use crate::session::{SessionRepository, SessionService};

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub session_service: Arc<SessionService>,
    pub room_service: Arc<RoomService>,
}

impl AppState {
    pub fn new(
        config: &ServerConfig,
        session_repository: Arc<dyn SessionRepository + Send + Sync>,
        room_repository: Arc<dyn RoomRepository + Send + Sync>,
        quiz_source: Arc<dyn QuizSource>,
    ) -> Self {
        let session_service = Arc::new(SessionService::new(session_repository, &config.session));
        let room_service = Arc::new(RoomService::new(
            room_repository,
            quiz_source,
            EventBus::new(),
            RoomServiceConfig::from(config),
        ));

        Self {
            session_service,
            room_service,
        }
    }
}

/// Machine readable error codes carried in every error body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    AlreadyStarted,
    Forbidden,
    NotAMember,
    NotEnoughPlayers,
    NotAllAnswered,
    InvalidPhase,
    DuplicateAnswer,
    InvalidAnswer,
    RoomFull,
    RoomUnrecoverable,
    BadRequest,
    Unauthorized,
    Upstream,
    Internal,
}

impl ErrorCode {
    /// Codes after which a client should stop following the room
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ErrorCode::NotFound
                | ErrorCode::Forbidden
                | ErrorCode::NotAMember
                | ErrorCode::RoomUnrecoverable
                | ErrorCode::Unauthorized
        )
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("JWT error: {0}")]
    JwtError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Quiz source error: {0}")]
    QuizSource(String),

    #[error(transparent)]
    Game(#[from] GameError),

    #[error("Internal server error")]
    Internal,
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::JwtError(_) | AppError::Unauthorized(_) => ErrorCode::Unauthorized,
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::BadRequest(_) => ErrorCode::BadRequest,
            AppError::Storage(_) | AppError::Internal => ErrorCode::Internal,
            AppError::QuizSource(_) => ErrorCode::Upstream,
            AppError::Game(game) => match game {
                GameError::AlreadyStarted => ErrorCode::AlreadyStarted,
                GameError::Forbidden(_) => ErrorCode::Forbidden,
                GameError::NotAMember(_) => ErrorCode::NotAMember,
                GameError::NotEnoughPlayers { .. } => ErrorCode::NotEnoughPlayers,
                GameError::NotAllAnswered => ErrorCode::NotAllAnswered,
                GameError::InvalidPhase(_) => ErrorCode::InvalidPhase,
                GameError::DuplicateAnswer => ErrorCode::DuplicateAnswer,
                GameError::InvalidAnswer(_) => ErrorCode::InvalidAnswer,
                GameError::RoomFull => ErrorCode::RoomFull,
                GameError::Unrecoverable(_) => ErrorCode::RoomUnrecoverable,
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.code() {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Forbidden | ErrorCode::NotAMember => StatusCode::FORBIDDEN,
            ErrorCode::AlreadyStarted
            | ErrorCode::NotAllAnswered
            | ErrorCode::DuplicateAnswer
            | ErrorCode::InvalidPhase
            | ErrorCode::NotEnoughPlayers
            | ErrorCode::RoomFull => StatusCode::CONFLICT,
            ErrorCode::InvalidAnswer | ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::RoomUnrecoverable => StatusCode::GONE,
            ErrorCode::Upstream => StatusCode::BAD_GATEWAY,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let message = match &self {
            AppError::Storage(msg) => {
                error!(error = %msg, "Storage failure");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": message,
            "code": code.as_ref(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
pub mod test_utils {
    use super::*;
    use crate::quiz::{Question, StaticQuizSource};
    use crate::room::repository::InMemoryRoomRepository;
    use crate::session::InMemorySessionRepository;

    /// Question bank whose correct option cycles through 0..4
    pub fn sample_questions(count: usize) -> Vec<Question> {
        (0..count)
            .map(|i| {
                Question::new(
                    format!("Sample question {}", i),
                    vec![
                        "Alpha".to_string(),
                        "Beta".to_string(),
                        "Gamma".to_string(),
                        "Delta".to_string(),
                    ],
                    i % 4,
                )
            })
            .collect()
    }

    /// Builder for creating AppState with overrides for testing
    pub struct AppStateBuilder {
        config: ServerConfig,
        room_repository: Option<Arc<dyn RoomRepository + Send + Sync>>,
        quiz_source: Option<Arc<dyn QuizSource>>,
    }

    impl AppStateBuilder {
        pub fn new() -> Self {
            Self {
                config: ServerConfig::default(),
                room_repository: None,
                quiz_source: None,
            }
        }

        pub fn with_config(mut self, config: ServerConfig) -> Self {
            self.config = config;
            self
        }

        pub fn with_room_repository(mut self, repo: Arc<dyn RoomRepository + Send + Sync>) -> Self {
            self.room_repository = Some(repo);
            self
        }

        pub fn with_quiz_source(mut self, source: Arc<dyn QuizSource>) -> Self {
            self.quiz_source = Some(source);
            self
        }

        pub fn build(self) -> AppState {
            AppState::new(
                &self.config,
                Arc::new(InMemorySessionRepository::new()),
                self.room_repository
                    .unwrap_or_else(|| Arc::new(InMemoryRoomRepository::new())),
                self.quiz_source
                    .unwrap_or_else(|| Arc::new(StaticQuizSource::new(sample_questions(10)))),
            )
        }
    }

    impl Default for AppStateBuilder {
        fn default() -> Self {
            Self::new()
        }
    }
}
