use crate::state::AppState;
use axum::Router;

pub mod credentials;
pub mod dto;
pub mod handlers;
pub mod services;
pub mod tokens;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
