use chrono::Utc;
use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument};

use super::service::RoomService;
use crate::config::CleanupConfig;
use crate::session::SessionService;

/// Starts the background task that periodically removes expired rooms and
/// sessions. Runs until the runtime shuts down.
#[instrument(skip(room_service, session_service, config))]
pub async fn start_cleanup_task(
    room_service: Arc<RoomService>,
    session_service: Arc<SessionService>,
    config: CleanupConfig,
) {
    info!(
        cleanup_interval_secs = config.interval.as_secs(),
        completed_room_ttl_secs = config.completed_room_ttl.as_secs(),
        idle_room_ttl_secs = config.idle_room_ttl.as_secs(),
        "Starting room cleanup background task"
    );

    let mut cleanup_interval = interval(config.interval);
    cleanup_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        cleanup_interval.tick().await;
        run_cleanup(&room_service, &session_service, &config).await;
    }
}

/// One sweep. Failures are logged and retried on the next tick.
pub async fn run_cleanup(
    room_service: &RoomService,
    session_service: &SessionService,
    config: &CleanupConfig,
) {
    match room_service.expire_rooms(Utc::now(), config).await {
        Ok(0) => debug!("No expired rooms"),
        Ok(deleted_count) => info!(deleted_count, "Expired rooms removed"),
        Err(e) => error!(error = %e, "Room cleanup failed"),
    }

    if let Err(e) = session_service.cleanup_expired_sessions().await {
        error!(error = %e, "Session cleanup failed");
    }
}
