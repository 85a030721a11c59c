use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use tracing::{debug, instrument};

use super::{models::SessionModel, types::SessionClaims};
use crate::config::SessionConfig;
use crate::shared::AppError;

/// Configuration for JWT token operations
#[derive(Clone)]
pub struct TokenConfig {
    secret: String,
    pub expiration_days: i64,
}

impl TokenConfig {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            secret: config.jwt_secret.clone(),
            expiration_days: config.expiration_days,
        }
    }

    /// Creates a signed token for a stored session
    #[instrument(skip(self, session), fields(session_id = %session.id))]
    pub fn create_token(&self, session: &SessionModel) -> Result<String, AppError> {
        let now = Utc::now();
        let exp = (now + Duration::days(self.expiration_days)).timestamp() as usize;

        debug!(
            expiration_days = self.expiration_days,
            exp_timestamp = exp,
            "Creating JWT token with expiration"
        );

        let claims = SessionClaims {
            session_id: session.id.clone(),
            player_id: session.player_id.clone(),
            username: session.username.clone(),
            avatar_url: session.avatar_url.clone(),
            exp,
            iat: now.timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_ref()),
        )
        .map_err(|e| {
            debug!(error = %e, "Failed to encode JWT token");
            AppError::JwtError(e.to_string())
        })
    }

    /// Validates a JWT token and returns the claims if valid
    #[instrument(skip(self, token))]
    pub fn validate_token(&self, token: &str) -> Result<SessionClaims, AppError> {
        decode::<SessionClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_ref()),
            &Validation::default(),
        )
        .map(|data| {
            debug!(
                player_id = %data.claims.player_id,
                session_id = %data.claims.session_id,
                exp = data.claims.exp,
                "JWT token decoded successfully"
            );
            data.claims
        })
        .map_err(|e| {
            debug!(error = %e, "Failed to decode JWT token");
            AppError::JwtError(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_config(secret: &str) -> TokenConfig {
        TokenConfig::new(&SessionConfig {
            jwt_secret: secret.to_string(),
            expiration_days: 7,
        })
    }

    fn session() -> SessionModel {
        SessionModel::new(
            "player-1".to_string(),
            "test-user".to_string(),
            Some("https://avatars.example/1.png".to_string()),
            7,
        )
    }

    #[test]
    fn test_create_and_validate_token() {
        let config = token_config("secret");
        let session = session();

        let token = config.create_token(&session).unwrap();
        assert!(!token.is_empty());

        let claims = config.validate_token(&token).unwrap();
        assert_eq!(claims.session_id, session.id);
        assert_eq!(claims.player_id, "player-1");
        assert_eq!(claims.username, "test-user");
        assert_eq!(claims.avatar_url, session.avatar_url);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_invalid_token() {
        let config = token_config("secret");
        let result = config.validate_token("invalid.token.here");
        assert!(matches!(result, Err(AppError::JwtError(_))));
    }

    #[test]
    fn test_token_with_different_secret() {
        let token = token_config("one").create_token(&session()).unwrap();

        assert!(token_config("one").validate_token(&token).is_ok());
        assert!(token_config("two").validate_token(&token).is_err());
    }
}
