use crate::state::AppState;
use axum::Router;

pub mod claims;
mod dto;
pub mod guard;
pub mod handlers;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod repo;
pub mod services;
mod validation;

pub use dto::{MeResponse, MessageResponse};
pub use middleware::{require_identity, Identity};

/// Public signup and login routes.
pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::auth_routes())
}
