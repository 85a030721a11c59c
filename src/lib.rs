// Library crate for the MindClash quiz server and client
// This file exposes the public API for the binary and integration tests

pub mod client;
pub mod config;
pub mod event;
pub mod game;
pub mod quiz;
pub mod room;
pub mod router;
pub mod session;
pub mod shared;

// Re-export commonly used types for easier access in tests
pub use client::{ClientSnapshot, GameApi, RoomSubscription, Screen, SessionContext};
pub use config::{ClientConfig, ServerConfig};
pub use event::{EventBus, RoomEvent};
pub use game::{GameError, Phase};
pub use room::{models::RoomModel, repository::RoomRepository, RoomService};
pub use router::build_router;
pub use shared::{AppError, AppState, ErrorCode};
