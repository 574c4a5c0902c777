use crate::state::AppState;
use axum::Router;

pub mod handlers;
pub mod lookup;
pub mod repo;

pub fn router() -> Router<AppState> {
    handlers::nutrition_routes()
}
