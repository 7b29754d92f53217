mod dto;
pub mod handlers;
pub mod repo;

use crate::state::AppState;
use axum::Router;

pub use dto::{CreateSessionRequest, SessionResponse};

pub fn router(body_limit: usize) -> Router<AppState> {
    Router::new()
        .merge(handlers::session_routes())
        .merge(handlers::upload_routes(body_limit))
}
