mod handlers;
mod model;
mod repo;

use crate::state::AppState;
use axum::Router;

/// `/personalInfo`: the caller's account summary and profile document.
pub fn router() -> Router<AppState> {
    handlers::routes()
}
