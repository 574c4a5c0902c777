use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument};

use super::{
    dto::{recent, AchievementStats, AchievementView, AchievementsResponse, SyncResponse},
    engine, repo,
};
use crate::{auth::services::AuthUser, error::AppResult, state::AppState};

pub fn achievement_routes() -> Router<AppState> {
    Router::new()
        .route("/achievements", get(list_achievements))
        .route("/achievements/sync", post(sync_achievements))
}

/// Refreshes first so day-relative achievements reflect today.
#[instrument(skip(state))]
pub async fn list_achievements(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<AchievementsResponse>> {
    engine::sync_user(&state, user_id).await?;

    let achievements: Vec<AchievementView> = repo::list_for_user(&state.db, user_id)
        .await?
        .into_iter()
        .map(AchievementView::from)
        .collect();
    let stats = AchievementStats::from_views(&achievements);
    let recent = recent(&achievements, OffsetDateTime::now_utc());

    Ok(Json(AchievementsResponse {
        success: true,
        achievements,
        recent,
        stats,
    }))
}

#[instrument(skip(state))]
pub async fn sync_achievements(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<SyncResponse>> {
    let outcome = engine::sync_user(&state, user_id).await?;
    info!(user_id, evaluated = outcome.evaluated, newly_earned = outcome.newly_earned.len(), "achievements synced");
    Ok(Json(SyncResponse {
        success: true,
        evaluated: outcome.evaluated,
        newly_earned: outcome.newly_earned,
    }))
}
