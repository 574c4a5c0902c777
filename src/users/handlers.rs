use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::{
    auth::services::AuthUser,
    error::{AppError, AppResult},
    state::AppState,
    users::{
        bmi::{BodyProfile, GoalType},
        repo::User,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me))
        .route("/profile", put(update_profile))
}

#[derive(Debug, Deserialize)]
pub struct ProfileUpdateRequest {
    pub name: String,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub goal_type: Option<String>,
    pub calorie_goal: Option<f64>,
    pub protein_goal: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub success: bool,
    pub user: User,
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<UserResponse>> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| {
            warn!(user_id, "token for missing user");
            AppError::Unauthorized("User not found".into())
        })?;

    Ok(Json(UserResponse {
        success: true,
        user,
    }))
}

/// Goal inputs for an edit. Stored goals survive when height, weight and goal
/// type are unchanged and the request names no new goals; an omitted goal
/// type keeps the stored one.
fn goal_inputs(
    current: &User,
    payload: &ProfileUpdateRequest,
    requested: Option<GoalType>,
) -> (Option<GoalType>, Option<f64>, Option<f64>) {
    let stored_goal = current.goal_type.parse::<GoalType>().ok();
    let goal_type = requested.or(stored_goal);
    let body_unchanged = current.height_cm == payload.height_cm
        && current.weight_kg == payload.weight_kg
        && goal_type == stored_goal;
    if body_unchanged {
        (
            goal_type,
            payload.calorie_goal.or(Some(current.calorie_goal)),
            payload.protein_goal.or(Some(current.protein_goal)),
        )
    } else {
        (goal_type, payload.calorie_goal, payload.protein_goal)
    }
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<ProfileUpdateRequest>,
) -> AppResult<Json<UserResponse>> {
    let name = payload.name.trim();
    validate_body(name, payload.height_cm, payload.weight_kg)?;
    let requested = parse_goal_type(payload.goal_type.as_deref())?;

    let current = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    let (goal_type, calorie_goal, protein_goal) = goal_inputs(&current, &payload, requested);
    let body = BodyProfile::derive(payload.height_cm, payload.weight_kg, goal_type, calorie_goal, protein_goal);

    let user = User::update_profile(&state.db, user_id, name, payload.height_cm, payload.weight_kg, &body)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    info!(user_id, bmi = body.bmi, goal = %body.goal_type, "profile updated");
    Ok(Json(UserResponse {
        success: true,
        user,
    }))
}

pub(crate) fn validate_body(name: &str, height_cm: f64, weight_kg: f64) -> AppResult<()> {
    if name.is_empty() {
        return Err(AppError::BadRequest("Name is required".into()));
    }
    if !(50.0..=300.0).contains(&height_cm) {
        return Err(AppError::BadRequest("Height must be between 50 and 300 cm".into()));
    }
    if !(20.0..=500.0).contains(&weight_kg) {
        return Err(AppError::BadRequest("Weight must be between 20 and 500 kg".into()));
    }
    Ok(())
}

pub(crate) fn parse_goal_type(raw: Option<&str>) -> AppResult<Option<GoalType>> {
    raw.filter(|s| !s.trim().is_empty())
        .map(|s| s.parse::<GoalType>().map_err(AppError::BadRequest))
        .transpose()
}
