use async_trait::async_trait;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::room::types::{
    DistributionResponse, LeaderboardEntry, RoomView, SubmitAnswerRequest, SubmitAnswerResponse,
};
use crate::room::RoomService;
use crate::session::PlayerIdentity;
use crate::shared::{AppError, ErrorCode};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClientError {
    #[error("{code} ({status}): {message}")]
    Api {
        status: u16,
        code: ErrorCode,
        message: String,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Cancelled")]
    Cancelled,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    code: String,
}

impl ClientError {
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::Api { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// The room can no longer be followed
    pub fn is_terminal(&self) -> bool {
        self.code().is_some_and(|code| code.is_terminal())
    }

    /// Passes successful responses through and turns error bodies into `Api`
    pub(crate) async fn check(response: reqwest::Response) -> Result<reqwest::Response, Self> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .json::<ErrorBody>()
            .await
            .unwrap_or(ErrorBody {
                error: status.to_string(),
                code: String::new(),
            });
        Err(ClientError::Api {
            status: status.as_u16(),
            code: ErrorCode::from_str(&body.code).unwrap_or(ErrorCode::Internal),
            message: body.error,
        })
    }
}

impl From<AppError> for ClientError {
    fn from(error: AppError) -> Self {
        ClientError::Api {
            status: error.status().as_u16(),
            code: error.code(),
            message: error.to_string(),
        }
    }
}

/// The room operations a client drives, independent of transport
#[async_trait]
pub trait GameApi: Send + Sync {
    fn player_id(&self) -> &str;

    async fn fetch_room(&self, pin: &str) -> Result<RoomView, ClientError>;

    async fn join_room(&self, pin: &str) -> Result<RoomView, ClientError>;

    async fn start_game(&self, pin: &str) -> Result<RoomView, ClientError>;

    async fn submit_answer(
        &self,
        pin: &str,
        request: SubmitAnswerRequest,
    ) -> Result<SubmitAnswerResponse, ClientError>;

    async fn advance_question(&self, pin: &str) -> Result<RoomView, ClientError>;

    async fn leaderboard(&self, pin: &str) -> Result<Vec<LeaderboardEntry>, ClientError>;

    async fn distribution(
        &self,
        pin: &str,
        question_index: usize,
    ) -> Result<DistributionResponse, ClientError>;
}

/// Calls the room service directly, for embedding and tests
pub struct InProcessGameApi {
    service: Arc<RoomService>,
    identity: PlayerIdentity,
}

impl InProcessGameApi {
    pub fn new(service: Arc<RoomService>, identity: PlayerIdentity) -> Self {
        Self { service, identity }
    }
}

#[async_trait]
impl GameApi for InProcessGameApi {
    fn player_id(&self) -> &str {
        &self.identity.id
    }

    async fn fetch_room(&self, pin: &str) -> Result<RoomView, ClientError> {
        Ok(self.service.get_room_view(pin, &self.identity.id).await?)
    }

    async fn join_room(&self, pin: &str) -> Result<RoomView, ClientError> {
        Ok(self.service.join_room(pin, &self.identity).await?)
    }

    async fn start_game(&self, pin: &str) -> Result<RoomView, ClientError> {
        Ok(self.service.start_game(pin, &self.identity.id).await?)
    }

    async fn submit_answer(
        &self,
        pin: &str,
        request: SubmitAnswerRequest,
    ) -> Result<SubmitAnswerResponse, ClientError> {
        Ok(self
            .service
            .submit_answer(pin, &self.identity.id, request)
            .await?)
    }

    async fn advance_question(&self, pin: &str) -> Result<RoomView, ClientError> {
        Ok(self.service.advance_question(pin, &self.identity.id).await?)
    }

    async fn leaderboard(&self, pin: &str) -> Result<Vec<LeaderboardEntry>, ClientError> {
        Ok(self.service.leaderboard(pin, &self.identity.id).await?)
    }

    async fn distribution(
        &self,
        pin: &str,
        question_index: usize,
    ) -> Result<DistributionResponse, ClientError> {
        Ok(self
            .service
            .answer_distribution(pin, &self.identity.id, question_index)
            .await?)
    }
}
