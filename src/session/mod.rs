// Public API - what other modules can use
pub use handlers::{create_session, current_session};
pub use middleware::jwt_auth;
pub use repository::{InMemorySessionRepository, SessionRepository};
pub use service::SessionService;
pub use types::{CreateSessionRequest, PlayerIdentity, SessionClaims, SessionResponse};

// Internal modules
mod generators;
mod handlers;
mod middleware;
mod models;
mod repository;
mod service;
mod token;
mod types;
