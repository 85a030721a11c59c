use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{sse::Event, Sse},
    Extension, Json,
};
use futures::Stream;
use std::convert::Infallible;
use tracing::{info, instrument};

use super::{
    chat::ChatMessage,
    types::{
        ChatHistoryResponse, ChatQuery, CreateRoomRequest, CreateRoomResponse, DistributionQuery,
        DistributionResponse, LeaderboardEntry, PostChatRequest, RoomView, SubmitAnswerRequest,
        SubmitAnswerResponse,
    },
};
use crate::event::to_sse_stream;
use crate::session::SessionClaims;
use crate::shared::{AppError, AppState};

/// POST /rooms
/// Creates a room with the caller as creator and first player
#[instrument(name = "create_room", skip(state, claims, request), fields(player_id = %claims.player_id))]
pub async fn create_room(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    Json(request): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<CreateRoomResponse>), AppError> {
    let room = state
        .room_service
        .create_room(&claims.identity(), request)
        .await?;

    info!(pin = %room.pin, "Room created");
    Ok((StatusCode::CREATED, Json(room)))
}

/// POST /rooms/:pin/join
#[instrument(name = "join_room", skip(state, claims), fields(player_id = %claims.player_id))]
pub async fn join_room(
    State(state): State<AppState>,
    Path(pin): Path<String>,
    Extension(claims): Extension<SessionClaims>,
) -> Result<Json<RoomView>, AppError> {
    let view = state
        .room_service
        .join_room(&pin, &claims.identity())
        .await?;
    Ok(Json(view))
}

/// POST /rooms/:pin/leave
#[instrument(name = "leave_room", skip(state, claims), fields(player_id = %claims.player_id))]
pub async fn leave_room(
    State(state): State<AppState>,
    Path(pin): Path<String>,
    Extension(claims): Extension<SessionClaims>,
) -> Result<StatusCode, AppError> {
    state
        .room_service
        .leave_room(&pin, &claims.player_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /rooms/:pin
#[instrument(name = "get_room", skip(state, claims), fields(player_id = %claims.player_id))]
pub async fn get_room(
    State(state): State<AppState>,
    Path(pin): Path<String>,
    Extension(claims): Extension<SessionClaims>,
) -> Result<Json<RoomView>, AppError> {
    let view = state
        .room_service
        .get_room_view(&pin, &claims.player_id)
        .await?;
    Ok(Json(view))
}

/// POST /rooms/:pin/start
#[instrument(name = "start_game", skip(state, claims), fields(player_id = %claims.player_id))]
pub async fn start_game(
    State(state): State<AppState>,
    Path(pin): Path<String>,
    Extension(claims): Extension<SessionClaims>,
) -> Result<Json<RoomView>, AppError> {
    let view = state
        .room_service
        .start_game(&pin, &claims.player_id)
        .await?;
    Ok(Json(view))
}

/// POST /rooms/:pin/answer
#[instrument(name = "submit_answer", skip(state, claims, request), fields(player_id = %claims.player_id))]
pub async fn submit_answer(
    State(state): State<AppState>,
    Path(pin): Path<String>,
    Extension(claims): Extension<SessionClaims>,
    Json(request): Json<SubmitAnswerRequest>,
) -> Result<Json<SubmitAnswerResponse>, AppError> {
    let result = state
        .room_service
        .submit_answer(&pin, &claims.player_id, request)
        .await?;
    Ok(Json(result))
}

/// POST /rooms/:pin/advance
#[instrument(name = "advance_question", skip(state, claims), fields(player_id = %claims.player_id))]
pub async fn advance_question(
    State(state): State<AppState>,
    Path(pin): Path<String>,
    Extension(claims): Extension<SessionClaims>,
) -> Result<Json<RoomView>, AppError> {
    let view = state
        .room_service
        .advance_question(&pin, &claims.player_id)
        .await?;
    Ok(Json(view))
}

/// GET /rooms/:pin/leaderboard
#[instrument(name = "leaderboard", skip(state, claims), fields(player_id = %claims.player_id))]
pub async fn leaderboard(
    State(state): State<AppState>,
    Path(pin): Path<String>,
    Extension(claims): Extension<SessionClaims>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    let board = state
        .room_service
        .leaderboard(&pin, &claims.player_id)
        .await?;
    Ok(Json(board))
}

/// GET /rooms/:pin/distribution?question_index=
#[instrument(name = "answer_distribution", skip(state, claims, query), fields(player_id = %claims.player_id))]
pub async fn answer_distribution(
    State(state): State<AppState>,
    Path(pin): Path<String>,
    Extension(claims): Extension<SessionClaims>,
    Query(query): Query<DistributionQuery>,
) -> Result<Json<DistributionResponse>, AppError> {
    let distribution = state
        .room_service
        .answer_distribution(&pin, &claims.player_id, query.question_index)
        .await?;
    Ok(Json(distribution))
}

/// GET /rooms/:pin/chat?after=
#[instrument(name = "chat_history", skip(state, claims, query), fields(player_id = %claims.player_id))]
pub async fn chat_history(
    State(state): State<AppState>,
    Path(pin): Path<String>,
    Extension(claims): Extension<SessionClaims>,
    Query(query): Query<ChatQuery>,
) -> Result<Json<ChatHistoryResponse>, AppError> {
    let messages = state
        .room_service
        .chat_history(&pin, &claims.player_id, query.after)
        .await?;
    Ok(Json(ChatHistoryResponse { messages }))
}

/// POST /rooms/:pin/chat
#[instrument(name = "post_chat", skip(state, claims, request), fields(player_id = %claims.player_id))]
pub async fn post_chat(
    State(state): State<AppState>,
    Path(pin): Path<String>,
    Extension(claims): Extension<SessionClaims>,
    Json(request): Json<PostChatRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), AppError> {
    let message = state
        .room_service
        .post_chat(&pin, &claims.identity(), &request.message)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /rooms/:pin/events
/// Server-sent change notifications for members of the room
#[instrument(name = "room_events", skip(state, claims), fields(player_id = %claims.player_id))]
pub async fn room_events(
    State(state): State<AppState>,
    Path(pin): Path<String>,
    Extension(claims): Extension<SessionClaims>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let receiver = state
        .room_service
        .subscribe(&pin, &claims.player_id)
        .await?;

    info!("Room event stream connected");
    Ok(to_sse_stream(pin, receiver))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::build_router;
    use crate::session::CreateSessionRequest;
    use crate::shared::test_utils::AppStateBuilder;
    use axum::{
        body::{to_bytes, Body},
        http::Request,
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt; // for `oneshot`

    async fn token(state: &AppState, name: &str) -> String {
        state
            .session_service
            .create_session(CreateSessionRequest {
                username: Some(name.to_string()),
                avatar_url: None,
            })
            .await
            .unwrap()
            .token
    }

    async fn send(app: &Router, method: &str, uri: &str, token: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("Authorization", format!("Bearer {}", token));
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_create_and_fetch_room() {
        let state = AppStateBuilder::new().build();
        let host = token(&state, "host").await;
        let app = build_router(state);

        let (status, body) = send(&app, "POST", "/rooms", &host, Some(json!({"topic": "rivers", "count": 3}))).await;
        assert_eq!(status, StatusCode::CREATED);
        let pin = body["pin"].as_str().unwrap().to_string();

        let (status, view) = send(&app, "GET", &format!("/rooms/{}", pin), &host, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["phase"], "waiting");
        assert_eq!(view["players"].as_array().unwrap().len(), 1);
        assert_eq!(view["is_creator"], true);
    }

    #[tokio::test]
    async fn test_unknown_room_is_not_found() {
        let state = AppStateBuilder::new().build();
        let player = token(&state, "p").await;
        let app = build_router(state);

        let (status, body) = send(&app, "POST", "/rooms/999999/join", &player, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_start_errors_map_to_status_codes() {
        let state = AppStateBuilder::new().build();
        let host = token(&state, "host").await;
        let guest = token(&state, "guest").await;
        let app = build_router(state);

        let (_, body) = send(&app, "POST", "/rooms", &host, Some(json!({"topic": "bees", "count": 2}))).await;
        let pin = body["pin"].as_str().unwrap().to_string();

        let (status, body) = send(&app, "POST", &format!("/rooms/{}/start", pin), &host, None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "NOT_ENOUGH_PLAYERS");

        send(&app, "POST", &format!("/rooms/{}/join", pin), &guest, None).await;

        let (status, body) = send(&app, "POST", &format!("/rooms/{}/start", pin), &guest, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "FORBIDDEN");

        let (status, _) = send(&app, "POST", &format!("/rooms/{}/start", pin), &host, None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, "POST", &format!("/rooms/{}/start", pin), &host, None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "ALREADY_STARTED");
    }

    #[tokio::test]
    async fn test_chat_endpoints() {
        let state = AppStateBuilder::new().build();
        let host = token(&state, "host").await;
        let app = build_router(state);

        let (_, body) = send(&app, "POST", "/rooms", &host, Some(json!({"topic": "cats", "count": 1}))).await;
        let pin = body["pin"].as_str().unwrap().to_string();

        let (status, message) = send(&app, "POST", &format!("/rooms/{}/chat", pin), &host, Some(json!({"message": "hi all"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(message["username"], "host");

        let (status, history) = send(&app, "GET", &format!("/rooms/{}/chat?after=0", pin), &host, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history["messages"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_leave_returns_no_content() {
        let state = AppStateBuilder::new().build();
        let host = token(&state, "host").await;
        let guest = token(&state, "guest").await;
        let app = build_router(state);

        let (_, body) = send(&app, "POST", "/rooms", &host, Some(json!({"topic": "owls", "count": 1}))).await;
        let pin = body["pin"].as_str().unwrap().to_string();
        send(&app, "POST", &format!("/rooms/{}/join", pin), &guest, None).await;

        let (status, _) = send(&app, "POST", &format!("/rooms/{}/leave", pin), &guest, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&app, "GET", &format!("/rooms/{}", pin), &guest, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "NOT_A_MEMBER");
    }
}
