#![allow(dead_code)] // Test utilities may not all be used in every test

use axum::{
    body::{to_bytes, Body},
    http::{header, Request},
};
use serde_json::{json, Value};
use tower::ServiceExt; // for `oneshot`

use super::assertions::ApiResponse;
use super::setup::TestSetup;

// ============================================================================
// Action Helpers
// ============================================================================

impl TestSetup {
    /// Sends one request through the router as `player` (or anonymously)
    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        player: Option<&str>,
        body: Option<Value>,
    ) -> ApiResponse {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(name) = player {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", self.token(name)));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status().as_u16();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        ApiResponse { status, json }
    }

    // ============================================================================
    // Convenience Action Methods
    // ============================================================================

    pub async fn join(&self, player: &str) -> ApiResponse {
        self.call("POST", &format!("/rooms/{}/join", self.pin), Some(player), None)
            .await
    }

    pub async fn leave(&self, player: &str) -> ApiResponse {
        self.call("POST", &format!("/rooms/{}/leave", self.pin), Some(player), None)
            .await
    }

    pub async fn room(&self, player: &str) -> ApiResponse {
        self.call("GET", &format!("/rooms/{}", self.pin), Some(player), None)
            .await
    }

    pub async fn start(&self, player: &str) -> ApiResponse {
        self.call("POST", &format!("/rooms/{}/start", self.pin), Some(player), None)
            .await
    }

    pub async fn answer(&self, player: &str, question_index: usize, value: Value) -> ApiResponse {
        self.call(
            "POST",
            &format!("/rooms/{}/answer", self.pin),
            Some(player),
            Some(json!({ "question_index": question_index, "value": value })),
        )
        .await
    }

    pub async fn advance(&self, player: &str) -> ApiResponse {
        self.call("POST", &format!("/rooms/{}/advance", self.pin), Some(player), None)
            .await
    }

    pub async fn leaderboard(&self, player: &str) -> ApiResponse {
        self.call(
            "GET",
            &format!("/rooms/{}/leaderboard", self.pin),
            Some(player),
            None,
        )
        .await
    }

    pub async fn distribution(&self, player: &str, question_index: usize) -> ApiResponse {
        self.call(
            "GET",
            &format!(
                "/rooms/{}/distribution?question_index={}",
                self.pin, question_index
            ),
            Some(player),
            None,
        )
        .await
    }
}
