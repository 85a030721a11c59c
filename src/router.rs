use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::room;
use crate::session;
use crate::shared::AppState;

/// Builds the HTTP API. Everything except session creation and the health
/// check requires a bearer token.
pub fn build_router(state: AppState) -> Router {
    let auth = middleware::from_fn_with_state(state.clone(), session::jwt_auth);

    let rooms = Router::new()
        .route("/rooms", post(room::create_room))
        .route("/rooms/:pin", get(room::get_room))
        .route("/rooms/:pin/join", post(room::join_room))
        .route("/rooms/:pin/leave", post(room::leave_room))
        .route("/rooms/:pin/start", post(room::start_game))
        .route("/rooms/:pin/answer", post(room::submit_answer))
        .route("/rooms/:pin/advance", post(room::advance_question))
        .route("/rooms/:pin/leaderboard", get(room::leaderboard))
        .route("/rooms/:pin/distribution", get(room::answer_distribution))
        .route("/rooms/:pin/events", get(room::room_events))
        .route(
            "/rooms/:pin/chat",
            get(room::chat_history).post(room::post_chat),
        )
        .route_layer(auth.clone());

    Router::new()
        .route("/health", get(health))
        .route(
            "/session",
            post(session::create_session)
                .merge(get(session::current_session).route_layer(auth)),
        )
        .merge(rooms)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::test_utils::AppStateBuilder;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt; // for `oneshot`

    #[tokio::test]
    async fn test_health_is_public() {
        let app = build_router(AppStateBuilder::new().build());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_room_routes_require_bearer_token() {
        let app = build_router(AppStateBuilder::new().build());

        for (method, uri) in [
            ("POST", "/rooms"),
            ("GET", "/rooms/123456"),
            ("POST", "/rooms/123456/answer"),
            ("GET", "/rooms/123456/events"),
        ] {
            let request = Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{} {}", method, uri);
        }

        let request = Request::builder()
            .uri("/rooms/123456")
            .header("Authorization", "Bearer not-a-token")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
