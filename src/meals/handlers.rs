use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::{
    dto::{
        CreateMealRequest, DayQuery, MealDeletedResponse, MealLoggedResponse, MealsResponse,
        ParseMealRequest, ParseMealResponse, ParsedItemNutrition, MAX_MEAL_TEXT,
    },
    repo,
};
use crate::{
    achievements::engine,
    ai::parsing::parse_meal,
    auth::services::AuthUser,
    db,
    error::{AppError, AppResult},
    nutrition::lookup::{self, Nutrients},
    state::AppState,
};

pub fn meal_routes() -> Router<AppState> {
    Router::new()
        .route("/meals", get(list_meals).post(log_meal))
        .route("/meals/:id", delete(delete_meal))
        .route("/meals/parse", post(parse))
}

#[instrument(skip(state))]
pub async fn list_meals(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<DayQuery>,
) -> AppResult<Json<MealsResponse>> {
    let day = db::parse_day(q.date.as_deref()).map_err(AppError::BadRequest)?;
    let meals = repo::list_for_day(&state.db, user_id, day).await?;
    let totals = repo::totals_for_day(&state.db, user_id, day).await?;
    Ok(Json(MealsResponse {
        success: true,
        date: day,
        meals,
        totals,
    }))
}

/// Inserts the meal and recomputes achievements in one transaction.
#[instrument(skip(state, payload))]
pub async fn log_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateMealRequest>,
) -> AppResult<(StatusCode, Json<MealLoggedResponse>)> {
    let today = db::today();
    let new_meal = payload.into_new_meal(today).map_err(AppError::BadRequest)?;

    let mut tx = state.db.begin().await?;
    let meal = repo::insert(&mut *tx, user_id, &new_meal).await?;
    let outcome = engine::recompute(&mut *tx, user_id, today).await?;
    tx.commit().await?;

    info!(user_id, meal_id = meal.id, calories = meal.calories, protein = meal.protein, "meal logged");
    engine::announce(&state, user_id, &outcome);

    Ok((
        StatusCode::CREATED,
        Json(MealLoggedResponse {
            success: true,
            meal,
            newly_earned: outcome.newly_earned,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn delete_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<MealDeletedResponse>> {
    let mut tx = state.db.begin().await?;
    let Some(meal) = repo::delete_owned(&mut *tx, user_id, id).await? else {
        warn!(user_id, meal_id = id, "delete of missing or foreign meal");
        return Err(AppError::NotFound("Meal not found".into()));
    };
    let outcome = engine::recompute(&mut *tx, user_id, db::today()).await?;
    tx.commit().await?;

    info!(user_id, meal_id = meal.id, "meal deleted");
    engine::announce(&state, user_id, &outcome);

    Ok(Json(MealDeletedResponse {
        success: true,
        deleted_id: meal.id,
    }))
}

/// Estimates nutrition for free text without logging anything.
#[instrument(skip(state, payload))]
pub async fn parse(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<ParseMealRequest>,
) -> AppResult<Json<ParseMealResponse>> {
    let text = payload.meal_text.trim().to_string();
    if text.is_empty() {
        return Err(AppError::BadRequest("Meal text is required".into()));
    }
    if text.chars().count() > MAX_MEAL_TEXT {
        return Err(AppError::BadRequest("Meal text is too long".into()));
    }

    let parsed = parse_meal(state.model.as_ref(), &text).await;
    let mut items = Vec::with_capacity(parsed.items.len());
    for item in parsed.items {
        let food = lookup::best(&state, &item.name).await?;
        items.push(ParsedItemNutrition::new(item, food));
    }
    let totals = Nutrients::sum(items.iter().map(|i| &i.nutrition));

    info!(user_id, items = items.len(), ai_powered = parsed.ai_powered, "meal parsed");
    Ok(Json(ParseMealResponse {
        success: true,
        original_text: text,
        items,
        totals,
        ai_powered: parsed.ai_powered,
    }))
}
