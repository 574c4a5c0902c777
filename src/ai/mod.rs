use crate::state::AppState;
use axum::Router;

pub mod advice;
pub mod client;
pub mod handlers;
pub mod parsing;

pub use client::{GeminiClient, LanguageModel, LlmError, UnconfiguredModel};

pub fn router() -> Router<AppState> {
    handlers::ai_routes()
}
