use crate::state::AppState;
use axum::Router;

pub mod handlers;
pub mod mailer;
pub mod notify;
pub mod repo;
pub mod scheduler;
pub mod templates;

pub fn router() -> Router<AppState> {
    handlers::email_routes()
}
