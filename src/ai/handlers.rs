use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use super::advice::{self, ChatReply};
use crate::{
    auth::services::AuthUser,
    db,
    error::{AppError, AppResult},
    progress,
    state::AppState,
};

pub const MAX_MESSAGE_LEN: usize = 2000;

pub fn ai_routes() -> Router<AppState> {
    Router::new().route("/ai/chat", post(chat))
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub success: bool,
    #[serde(flatten)]
    pub reply: ChatReply,
}

#[instrument(skip(state, payload))]
pub async fn chat(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<ChatRequest>,
) -> AppResult<Json<ChatResponse>> {
    let message = payload.message.trim();
    if message.is_empty() {
        return Err(AppError::BadRequest("Message is required".into()));
    }
    if message.chars().count() > MAX_MESSAGE_LEN {
        return Err(AppError::BadRequest("Message is too long".into()));
    }

    let ctx = progress::load_day_context(&state.db, user_id, db::today()).await?;
    let reply = advice::chat(state.model.as_ref(), &ctx, message)
        .await
        .map_err(|e| {
            error!(error = %e, "chat generation failed");
            AppError::Upstream("Failed to generate AI response".into())
        })?;

    info!(user_id, ai_powered = reply.ai_powered, "chat answered");
    Ok(Json(ChatResponse { success: true, reply }))
}
