use serde::{Deserialize, Serialize};

/// JWT claims structure containing session information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionClaims {
    pub session_id: String,
    pub player_id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub exp: usize, // Expiration timestamp (standard JWT claim)
    pub iat: usize, // Issued at timestamp (standard JWT claim)
}

impl SessionClaims {
    pub fn identity(&self) -> PlayerIdentity {
        PlayerIdentity {
            id: self.player_id.clone(),
            username: self.username.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }
}

/// Who a request acts as. Rooms copy this into their player list on join.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerIdentity {
    pub id: String,
    pub username: String,
    pub avatar_url: Option<String>,
}

/// Request payload for creating a session. A missing username gets a
/// generated pet name.
#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    pub username: Option<String>,
    pub avatar_url: Option<String>,
}

/// Response structure for the session endpoints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionResponse {
    /// Bearer token for the Authorization header
    pub token: String,
    pub player_id: String,
    pub username: String,
    pub avatar_url: Option<String>,
}

/// Identity returned by `GET /session`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CurrentSessionResponse {
    pub player_id: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub expires_at: usize,
}
