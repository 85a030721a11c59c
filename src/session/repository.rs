use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::models::SessionModel;
use crate::shared::AppError;

/// Trait for session repository operations
#[async_trait]
pub trait SessionRepository {
    async fn create_session(&self, session: &SessionModel) -> Result<(), AppError>;
    async fn get_session(&self, session_id: &str) -> Result<Option<SessionModel>, AppError>;
    async fn update_session(&self, session: &SessionModel) -> Result<(), AppError>;
    async fn delete_session(&self, session_id: &str) -> Result<(), AppError>;
    async fn cleanup_expired_sessions(&self) -> Result<u64, AppError>;
}

/// In-memory implementation of SessionRepository. Data is lost on restart,
/// together with every room.
#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<String, SessionModel>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    #[instrument(skip(self, session), fields(session_id = %session.id))]
    async fn create_session(&self, session: &SessionModel) -> Result<(), AppError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            warn!("Session already exists in memory");
            return Err(AppError::Storage("Session already exists".to_string()));
        }
        sessions.insert(session.id.clone(), session.clone());

        debug!(username = %session.username, "Session created in memory");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_session(&self, session_id: &str) -> Result<Option<SessionModel>, AppError> {
        let session = self.sessions.read().await.get(session_id).cloned();
        if session.is_none() {
            debug!("Session not found in memory");
        }
        Ok(session)
    }

    #[instrument(skip(self, session), fields(session_id = %session.id))]
    async fn update_session(&self, session: &SessionModel) -> Result<(), AppError> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&session.id) {
            Some(stored) => {
                *stored = session.clone();
                Ok(())
            }
            None => {
                warn!("Session not found for update in memory");
                Err(AppError::NotFound("Session not found".to_string()))
            }
        }
    }

    #[instrument(skip(self))]
    async fn delete_session(&self, session_id: &str) -> Result<(), AppError> {
        if self.sessions.write().await.remove(session_id).is_none() {
            warn!("Session not found for deletion in memory");
            return Err(AppError::NotFound("Session not found".to_string()));
        }
        debug!("Session deleted from memory");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn cleanup_expired_sessions(&self) -> Result<u64, AppError> {
        let mut sessions = self.sessions.write().await;
        let now = Utc::now();
        let initial_count = sessions.len();

        sessions.retain(|_, session| session.expires_at > now);

        let removed_count = initial_count - sessions.len();
        debug!(expired_sessions_removed = removed_count, "Expired sessions cleaned up");
        Ok(removed_count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn create_test_session(username: &str) -> SessionModel {
        SessionModel::new(format!("{}-id", username), username.to_string(), None, 7)
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let repo = InMemorySessionRepository::new();
        let session = create_test_session("test-user");

        repo.create_session(&session).await.unwrap();

        let retrieved = repo.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(retrieved.id, session.id);
        assert_eq!(retrieved.player_id, "test-user-id");
        assert_eq!(repo.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_create_duplicate_session() {
        let repo = InMemorySessionRepository::new();
        let session = create_test_session("test-user");

        repo.create_session(&session).await.unwrap();
        let result = repo.create_session(&session).await;
        assert!(matches!(result, Err(AppError::Storage(_))));
    }

    #[tokio::test]
    async fn test_update_session() {
        let repo = InMemorySessionRepository::new();
        let mut session = create_test_session("test-user");
        repo.create_session(&session).await.unwrap();

        session.username = "updated-user".to_string();
        repo.update_session(&session).await.unwrap();

        let retrieved = repo.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(retrieved.username, "updated-user");

        let missing = create_test_session("ghost");
        assert!(matches!(
            repo.update_session(&missing).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_session() {
        let repo = InMemorySessionRepository::new();
        let session = create_test_session("test-user");
        repo.create_session(&session).await.unwrap();

        repo.delete_session(&session.id).await.unwrap();
        assert!(repo.get_session(&session.id).await.unwrap().is_none());
        assert!(matches!(
            repo.delete_session(&session.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_cleanup_expired_sessions() {
        let repo = InMemorySessionRepository::new();

        let mut expired = create_test_session("expired-user");
        expired.expires_at = Utc::now() - Duration::hours(1);
        repo.create_session(&expired).await.unwrap();

        let valid = create_test_session("valid-user");
        repo.create_session(&valid).await.unwrap();

        assert_eq!(repo.cleanup_expired_sessions().await.unwrap(), 1);
        assert!(repo.get_session(&expired.id).await.unwrap().is_none());
        assert!(repo.get_session(&valid.id).await.unwrap().is_some());
    }
}
