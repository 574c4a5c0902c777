use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use time::Date;
use tracing::{info, instrument};

use super::{
    repo::{self, Recommendation},
    services::{load_day_context, DayProgress},
};
use crate::{
    ai::advice,
    auth::services::AuthUser,
    db,
    error::{AppError, AppResult},
    nutrition,
    state::AppState,
};

/// Foods offered to the model as suggestions.
const FOOD_SAMPLE: i64 = 20;

pub fn progress_routes() -> Router<AppState> {
    Router::new()
        .route("/progress", get(day_progress))
        .route("/recommendations", post(generate_recommendations))
}

#[derive(Debug, Deserialize)]
pub struct DayQuery {
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub success: bool,
    pub date: Date,
    #[serde(flatten)]
    pub progress: DayProgress,
    pub recommendations: Vec<Recommendation>,
}

#[instrument(skip(state))]
pub async fn day_progress(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<DayQuery>,
) -> AppResult<Json<ProgressResponse>> {
    let day = db::parse_day(q.date.as_deref()).map_err(AppError::BadRequest)?;
    let ctx = load_day_context(&state.db, user_id, day).await?;
    let recommendations = repo::list_for_day(&state.db, user_id, day).await?;
    Ok(Json(ProgressResponse {
        success: true,
        date: day,
        progress: DayProgress::from(&ctx),
        recommendations,
    }))
}

#[derive(Debug, Serialize)]
pub struct RecommendationsResponse {
    pub success: bool,
    pub recommendations: Vec<Recommendation>,
    pub ai_powered: bool,
}

#[instrument(skip(state))]
pub async fn generate_recommendations(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<RecommendationsResponse>> {
    let today = db::today();
    let ctx = load_day_context(&state.db, user_id, today).await?;
    let foods = nutrition::repo::sample_names(&state.db, FOOD_SAMPLE).await?;

    let (texts, ai_powered) = advice::recommend(state.model.as_ref(), &ctx, &foods).await;
    let recommendations = repo::insert_many(&state.db, user_id, today, &texts).await?;

    info!(user_id, count = recommendations.len(), ai_powered, "recommendations stored");
    Ok(Json(RecommendationsResponse {
        success: true,
        recommendations,
        ai_powered,
    }))
}
