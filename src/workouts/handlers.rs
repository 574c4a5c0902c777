use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use time::Date;
use tracing::{info, instrument};

use super::repo::{self, Exercise, NewWorkout, Workout};
use crate::{
    auth::services::AuthUser,
    db,
    error::{AppError, AppResult},
    state::AppState,
};

/// One day's worth.
pub const MAX_DURATION_MINUTES: i32 = 24 * 60;

pub fn workout_routes() -> Router<AppState> {
    Router::new()
        .route("/exercises", get(list_exercises))
        .route("/workouts", get(list_workouts).post(log_workout))
}

#[derive(Debug, Deserialize)]
pub struct ExerciseQuery {
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExercisesResponse {
    pub success: bool,
    pub exercises: Vec<Exercise>,
}

#[instrument(skip(state))]
pub async fn list_exercises(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Query(q): Query<ExerciseQuery>,
) -> AppResult<Json<ExercisesResponse>> {
    let category = q.category.as_deref().map(str::trim).filter(|c| !c.is_empty());
    let exercises = repo::list_exercises(&state.db, category).await?;
    Ok(Json(ExercisesResponse {
        success: true,
        exercises,
    }))
}

#[derive(Debug, Deserialize)]
pub struct LogWorkoutRequest {
    pub exercise_id: i64,
    pub duration_minutes: i32,
    pub notes: Option<String>,
}

impl LogWorkoutRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.duration_minutes <= 0 || self.duration_minutes > MAX_DURATION_MINUTES {
            return Err(format!(
                "duration_minutes must be between 1 and {}",
                MAX_DURATION_MINUTES
            ));
        }
        if self.notes.as_deref().is_some_and(|n| n.chars().count() > 500) {
            return Err("Notes are too long".into());
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct WorkoutLoggedResponse {
    pub success: bool,
    pub workout: Workout,
}

#[instrument(skip(state, payload))]
pub async fn log_workout(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<LogWorkoutRequest>,
) -> AppResult<(StatusCode, Json<WorkoutLoggedResponse>)> {
    payload.validate().map_err(AppError::BadRequest)?;

    let exercise = repo::find_exercise(&state.db, payload.exercise_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Exercise not found".into()))?;

    let notes = payload.notes.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let workout = repo::insert(
        &state.db,
        user_id,
        NewWorkout {
            exercise: &exercise,
            duration_minutes: payload.duration_minutes,
            notes,
            workout_date: db::today(),
        },
    )
    .await?;

    info!(
        user_id,
        workout_id = workout.id,
        exercise = %workout.exercise_name,
        calories_burned = workout.calories_burned,
        "workout logged"
    );
    Ok((
        StatusCode::CREATED,
        Json(WorkoutLoggedResponse {
            success: true,
            workout,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct DayQuery {
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WorkoutsResponse {
    pub success: bool,
    pub date: Date,
    pub workouts: Vec<Workout>,
    pub total_calories_burned: f64,
}

#[instrument(skip(state))]
pub async fn list_workouts(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<DayQuery>,
) -> AppResult<Json<WorkoutsResponse>> {
    let day = db::parse_day(q.date.as_deref()).map_err(AppError::BadRequest)?;
    let workouts = repo::list_for_day(&state.db, user_id, day).await?;
    let total_calories_burned = repo::total_burned(&workouts);
    Ok(Json(WorkoutsResponse {
        success: true,
        date: day,
        workouts,
        total_calories_burned,
    }))
}
