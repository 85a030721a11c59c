// Public API - what other modules can use
pub use cleanup_task::{run_cleanup, start_cleanup_task};
pub use handlers::{
    advance_question, answer_distribution, chat_history, create_room, get_room, join_room,
    leaderboard, leave_room, post_chat, room_events, start_game, submit_answer,
};
pub use service::{RoomService, RoomServiceConfig};

// Internal modules
pub mod chat;
mod cleanup_task;
mod handlers;
pub mod models;
pub mod repository;
mod service;
pub mod types;
