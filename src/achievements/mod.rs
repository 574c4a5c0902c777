use crate::state::AppState;
use axum::Router;

pub mod catalog;
pub mod dto;
pub mod engine;
pub mod handlers;
pub mod repo;
pub mod stats;

pub fn router() -> Router<AppState> {
    handlers::achievement_routes()
}
