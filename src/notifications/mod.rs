mod handlers;
mod model;
mod repo;
mod sweeper;

use crate::state::AppState;
use axum::Router;

pub use sweeper::spawn_expiry_sweeper;

/// `/notifications`: the caller's inbox plus admin-only creation.
pub fn router() -> Router<AppState> {
    handlers::routes()
}
