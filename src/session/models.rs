use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stored session. Tokens are only honoured while their session exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionModel {
    pub id: String,
    pub player_id: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_accessed: Option<DateTime<Utc>>,
}

impl SessionModel {
    /// Creates a new session model with generated ids and timestamps
    pub fn new(
        player_id: String,
        username: String,
        avatar_url: Option<String>,
        expiration_days: i64,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4().to_string(),
            player_id,
            username,
            avatar_url,
            created_at: now,
            expires_at: now + chrono::Duration::days(expiration_days),
            last_accessed: Some(now),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    pub fn touch(&mut self) {
        self.last_accessed = Some(Utc::now());
    }
}
