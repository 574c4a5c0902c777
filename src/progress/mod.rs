use crate::state::AppState;
use axum::Router;

pub mod handlers;
pub mod repo;
pub mod services;

pub use services::load_day_context;

pub fn router() -> Router<AppState> {
    handlers::progress_routes()
}
