use axum::{extract::State, http::StatusCode, Extension, Json};
use tracing::{info, instrument};

use super::types::{CreateSessionRequest, CurrentSessionResponse, SessionClaims, SessionResponse};
use crate::shared::{AppError, AppState};

/// HTTP handler for creating a new session
///
/// POST /session
/// Returns a bearer token and the player's identity
#[instrument(name = "create_session", skip(state, request))]
pub async fn create_session(
    State(state): State<AppState>,
    request: Option<Json<CreateSessionRequest>>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let request = request.map(|Json(body)| body).unwrap_or_default();
    let session = state.session_service.create_session(request).await?;

    info!(player_id = %session.player_id, username = %session.username, "Session issued");
    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /session
#[instrument(name = "current_session", skip(claims))]
pub async fn current_session(
    Extension(claims): Extension<SessionClaims>,
) -> Json<CurrentSessionResponse> {
    Json(CurrentSessionResponse {
        player_id: claims.player_id,
        username: claims.username,
        avatar_url: claims.avatar_url,
        expires_at: claims.exp,
    })
}
