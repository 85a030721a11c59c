use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{
    generators::{generate_player_id, PetNameUsernameGenerator, UsernameGenerator},
    models::SessionModel,
    repository::SessionRepository,
    token::TokenConfig,
    types::{CreateSessionRequest, SessionClaims, SessionResponse},
};
use crate::config::SessionConfig;
use crate::shared::AppError;

pub const MAX_USERNAME_LENGTH: usize = 32;
pub const MAX_AVATAR_URL_LENGTH: usize = 2048;

/// Service for handling session business logic
pub struct SessionService {
    token_config: TokenConfig,
    repository: Arc<dyn SessionRepository + Send + Sync>,
    username_generator: Arc<dyn UsernameGenerator>,
}

impl SessionService {
    pub fn new(repository: Arc<dyn SessionRepository + Send + Sync>, config: &SessionConfig) -> Self {
        Self {
            token_config: TokenConfig::new(config),
            repository,
            username_generator: Arc::new(PetNameUsernameGenerator::new()),
        }
    }

    /// Creates a new player session and its bearer token
    #[instrument(skip(self, request))]
    pub async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<SessionResponse, AppError> {
        let username = match request.username {
            Some(name) => validate_username(&name)?,
            None => self.username_generator.generate().await,
        };
        let avatar_url = request
            .avatar_url
            .map(|url| validate_avatar_url(&url))
            .transpose()?
            .flatten();

        let session = SessionModel::new(
            generate_player_id(),
            username,
            avatar_url,
            self.token_config.expiration_days,
        );
        self.repository.create_session(&session).await?;
        let token = self.token_config.create_token(&session)?;

        info!(
            session_id = %session.id,
            player_id = %session.player_id,
            username = %session.username,
            "Session created"
        );

        Ok(SessionResponse {
            token,
            player_id: session.player_id,
            username: session.username,
            avatar_url: session.avatar_url,
        })
    }

    /// Validates a session token and returns the claims if the session is
    /// still stored and unexpired
    #[instrument(skip(self, token))]
    pub async fn validate_session(&self, token: &str) -> Result<SessionClaims, AppError> {
        let claims = self
            .token_config
            .validate_token(token)
            .map_err(|e| AppError::Unauthorized(e.to_string()))?;

        match self.repository.get_session(&claims.session_id).await? {
            Some(session) if session.is_expired() => {
                warn!(session_id = %claims.session_id, "Session has expired");
                Err(AppError::Unauthorized("Session has expired".to_string()))
            }
            Some(_) => Ok(claims),
            None => {
                warn!(
                    session_id = %claims.session_id,
                    "Session not found - may have been revoked"
                );
                Err(AppError::Unauthorized(
                    "Session not found or has been revoked".to_string(),
                ))
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn revoke_session(&self, session_id: &str) -> Result<(), AppError> {
        self.repository.delete_session(session_id).await?;
        info!(session_id = %session_id, "Session revoked");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, AppError> {
        let removed_count = self.repository.cleanup_expired_sessions().await?;
        if removed_count > 0 {
            info!(removed_sessions = removed_count, "Expired sessions removed");
        }
        Ok(removed_count)
    }
}

fn validate_username(name: &str) -> Result<String, AppError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest("Username cannot be empty".to_string()));
    }
    if trimmed.chars().count() > MAX_USERNAME_LENGTH {
        return Err(AppError::BadRequest(format!(
            "Username exceeds {} characters",
            MAX_USERNAME_LENGTH
        )));
    }
    Ok(trimmed.to_string())
}

/// Blank urls mean "no avatar"
fn validate_avatar_url(url: &str) -> Result<Option<String>, AppError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.len() > MAX_AVATAR_URL_LENGTH
        || !(trimmed.starts_with("https://") || trimmed.starts_with("http://"))
    {
        return Err(AppError::BadRequest("Invalid avatar url".to_string()));
    }
    Ok(Some(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::repository::InMemorySessionRepository;

    fn service() -> SessionService {
        SessionService::new(
            Arc::new(InMemorySessionRepository::new()),
            &SessionConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_create_session_with_generated_name() {
        let service = service();
        let session = service
            .create_session(CreateSessionRequest::default())
            .await
            .unwrap();

        assert!(session.token.contains('.')); // JWT has dots
        assert!(session.username.contains('-')); // Pet names have dashes
        assert!(!session.player_id.is_empty());

        let claims = service.validate_session(&session.token).await.unwrap();
        assert_eq!(claims.player_id, session.player_id);
        assert_eq!(claims.username, session.username);
    }

    #[tokio::test]
    async fn test_create_session_with_profile() {
        let service = service();
        let session = service
            .create_session(CreateSessionRequest {
                username: Some("  alice ".to_string()),
                avatar_url: Some("https://avatars.example/alice.png".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(session.username, "alice");
        let claims = service.validate_session(&session.token).await.unwrap();
        assert_eq!(
            claims.identity().avatar_url.as_deref(),
            Some("https://avatars.example/alice.png")
        );
    }

    #[tokio::test]
    async fn test_invalid_profile_is_rejected() {
        let service = service();
        let empty_name = service
            .create_session(CreateSessionRequest {
                username: Some("   ".to_string()),
                avatar_url: None,
            })
            .await;
        assert!(matches!(empty_name, Err(AppError::BadRequest(_))));

        let bad_avatar = service
            .create_session(CreateSessionRequest {
                username: None,
                avatar_url: Some("javascript:alert(1)".to_string()),
            })
            .await;
        assert!(matches!(bad_avatar, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_validate_rejects_garbage_and_revoked() {
        let service = service();
        assert!(matches!(
            service.validate_session("not-a-token").await,
            Err(AppError::Unauthorized(_))
        ));

        let session = service
            .create_session(CreateSessionRequest::default())
            .await
            .unwrap();
        let claims = service.validate_session(&session.token).await.unwrap();

        service.revoke_session(&claims.session_id).await.unwrap();
        assert!(matches!(
            service.validate_session(&session.token).await,
            Err(AppError::Unauthorized(_))
        ));
    }
}
