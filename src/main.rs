use mindclash::{
    build_router,
    quiz::{HttpQuizSource, QuizSource, UnconfiguredQuizSource},
    room::{repository::InMemoryRoomRepository, start_cleanup_task},
    session::InMemorySessionRepository,
    AppState, ServerConfig,
};
use std::error::Error;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mindclash=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting MindClash game server");

    let config = ServerConfig::from_env()?;

    let quiz_source: Arc<dyn QuizSource> = match &config.quiz_generator_url {
        Some(url) => {
            info!(url = %url, "Using external quiz generator");
            Arc::new(HttpQuizSource::new(url.clone(), config.quiz_generator_timeout)?)
        }
        None => {
            warn!("QUIZ_GENERATOR_URL not set, rooms must supply their own questions");
            Arc::new(UnconfiguredQuizSource)
        }
    };

    // Rooms and sessions live in memory only
    let app_state = AppState::new(
        &config,
        Arc::new(InMemorySessionRepository::new()),
        Arc::new(InMemoryRoomRepository::new()),
        quiz_source,
    );

    tokio::spawn(start_cleanup_task(
        app_state.room_service.clone(),
        app_state.session_service.clone(),
        config.cleanup.clone(),
    ));

    let app = build_router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Server running on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
