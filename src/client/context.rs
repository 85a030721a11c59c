use reqwest::RequestBuilder;
use serde_json::json;
use tracing::{debug, instrument};

use super::api::ClientError;
use crate::config::ClientConfig;
use crate::session::SessionResponse;

/// Everything a client needs to talk to the server as one player.
///
/// Passed explicitly to every transport; there is no global session.
#[derive(Debug, Clone)]
pub struct SessionContext {
    base_url: String,
    token: String,
    player_id: String,
    http: reqwest::Client,
}

impl SessionContext {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        player_id: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        Ok(Self::with_client(base_url, token, player_id, http))
    }

    pub fn with_client(
        base_url: impl Into<String>,
        token: impl Into<String>,
        player_id: impl Into<String>,
        http: reqwest::Client,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            player_id: player_id.into(),
            http,
        }
    }

    /// Opens a new session on the server and returns a context bound to it
    #[instrument(skip(config))]
    pub async fn connect(
        base_url: &str,
        username: Option<&str>,
        config: &ClientConfig,
    ) -> Result<(Self, SessionResponse), ClientError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        let url = format!("{}/session", base_url.trim_end_matches('/'));

        let response = http
            .post(&url)
            .timeout(config.request_timeout)
            .json(&json!({ "username": username }))
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        let session: SessionResponse = ClientError::check(response)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;

        debug!(player_id = %session.player_id, "Session established");
        let context = Self::with_client(
            base_url,
            session.token.clone(),
            session.player_id.clone(),
            http,
        );
        Ok((context, session))
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.http.get(self.url(path)).bearer_auth(&self.token)
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.http.post(self.url(path)).bearer_auth(&self.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let context = SessionContext::new("http://localhost:3000/", "token", "p1").unwrap();
        assert_eq!(context.url("/rooms/123456"), "http://localhost:3000/rooms/123456");
        assert_eq!(context.base_url(), "http://localhost:3000");
        assert_eq!(context.player_id(), "p1");
    }
}
