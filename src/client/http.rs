use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

use super::api::{ClientError, GameApi};
use super::context::SessionContext;
use crate::room::types::{
    DistributionResponse, LeaderboardEntry, RoomView, SubmitAnswerRequest, SubmitAnswerResponse,
};

/// `GameApi` over the server's HTTP routes
pub struct HttpGameApi {
    context: SessionContext,
    request_timeout: Duration,
}

impl HttpGameApi {
    pub fn new(context: SessionContext, request_timeout: Duration) -> Self {
        Self {
            context,
            request_timeout,
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let response = request
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Request failed");
                ClientError::Transport(e.to_string())
            })?;

        let response = ClientError::check(response).await.inspect_err(|e| {
            debug!(error = %e, "Server rejected request");
        })?;

        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}

#[async_trait]
impl GameApi for HttpGameApi {
    fn player_id(&self) -> &str {
        self.context.player_id()
    }

    async fn fetch_room(&self, pin: &str) -> Result<RoomView, ClientError> {
        self.send(self.context.get(&format!("/rooms/{}", pin))).await
    }

    async fn join_room(&self, pin: &str) -> Result<RoomView, ClientError> {
        self.send(self.context.post(&format!("/rooms/{}/join", pin)))
            .await
    }

    async fn start_game(&self, pin: &str) -> Result<RoomView, ClientError> {
        self.send(self.context.post(&format!("/rooms/{}/start", pin)))
            .await
    }

    async fn submit_answer(
        &self,
        pin: &str,
        request: SubmitAnswerRequest,
    ) -> Result<SubmitAnswerResponse, ClientError> {
        self.send(
            self.context
                .post(&format!("/rooms/{}/answer", pin))
                .json(&request),
        )
        .await
    }

    async fn advance_question(&self, pin: &str) -> Result<RoomView, ClientError> {
        self.send(self.context.post(&format!("/rooms/{}/advance", pin)))
            .await
    }

    async fn leaderboard(&self, pin: &str) -> Result<Vec<LeaderboardEntry>, ClientError> {
        self.send(self.context.get(&format!("/rooms/{}/leaderboard", pin)))
            .await
    }

    async fn distribution(
        &self,
        pin: &str,
        question_index: usize,
    ) -> Result<DistributionResponse, ClientError> {
        self.send(
            self.context
                .get(&format!("/rooms/{}/distribution", pin))
                .query(&[("question_index", question_index)]),
        )
        .await
    }
}
