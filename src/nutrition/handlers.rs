use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::{
    lookup::{self, FoodMatch, Nutrients},
    repo::{self, Food, NewFood},
};
use crate::{
    auth::services::AuthUser,
    error::{AppError, AppResult},
    state::AppState,
};

const SEARCH_LIMIT: i64 = 10;
const LIST_LIMIT: i64 = 1000;
const MAX_NAME_LEN: usize = 100;
const DUPLICATE_FOOD: &str = "Food item already exists";

pub fn nutrition_routes() -> Router<AppState> {
    Router::new()
        .route("/nutrition", get(list_foods).post(add_food))
        .route("/nutrition/:id", put(update_food).delete(delete_food))
        .route("/nutrition/search", get(search))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    pub query: String,
    pub results: Vec<FoodMatch>,
}

#[instrument(skip(state))]
pub async fn search(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Query(params): Query<SearchQuery>,
) -> AppResult<Json<SearchResponse>> {
    let query = params.q.unwrap_or_default().trim().to_string();
    if query.is_empty() {
        return Err(AppError::BadRequest("Query parameter 'q' is required".into()));
    }
    if query.chars().count() > 100 {
        return Err(AppError::BadRequest("Query is too long".into()));
    }

    let results = lookup::find(&state, &query, SEARCH_LIMIT).await?;
    Ok(Json(SearchResponse {
        success: true,
        query,
        results,
    }))
}

/// Per-100 g values; missing numbers are stored as 0.
#[derive(Debug, Deserialize)]
pub struct FoodRequest {
    pub name: String,
    pub calories_per_100g: Option<f64>,
    pub protein_per_100g: Option<f64>,
    pub fat_per_100g: Option<f64>,
    pub carbs_per_100g: Option<f64>,
    pub fiber_per_100g: Option<f64>,
}

impl FoodRequest {
    pub fn into_new_food(self) -> Result<NewFood, String> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err("Food name is required".into());
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err("Food name is too long".into());
        }
        let value = |field: &str, v: Option<f64>| match v {
            None => Ok(0.0),
            Some(v) if v.is_finite() && v >= 0.0 => Ok(v),
            Some(_) => Err(format!("{field} must be a non-negative number")),
        };
        Ok(NewFood {
            name: name.to_string(),
            per_100g: Nutrients {
                calories: value("calories_per_100g", self.calories_per_100g)?,
                protein: value("protein_per_100g", self.protein_per_100g)?,
                fat: value("fat_per_100g", self.fat_per_100g)?,
                carbs: value("carbs_per_100g", self.carbs_per_100g)?,
                fiber: value("fiber_per_100g", self.fiber_per_100g)?,
            },
        })
    }
}

#[derive(Debug, Serialize)]
pub struct FoodsResponse {
    pub success: bool,
    pub foods: Vec<Food>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct FoodResponse {
    pub success: bool,
    pub food: Food,
}

#[derive(Debug, Serialize)]
pub struct FoodDeletedResponse {
    pub success: bool,
    pub deleted_id: i64,
    pub name: String,
}

/// A concurrent writer can still win the name between the check and the
/// write; the unique index turns that into the same 409.
fn duplicate_as_conflict(e: sqlx::Error) -> AppError {
    if e.as_database_error().is_some_and(|d| d.is_unique_violation()) {
        AppError::Conflict(DUPLICATE_FOOD.into())
    } else {
        e.into()
    }
}

#[instrument(skip(state))]
pub async fn list_foods(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
) -> AppResult<Json<FoodsResponse>> {
    let foods = repo::list_all(&state.db, LIST_LIMIT).await?;
    Ok(Json(FoodsResponse {
        success: true,
        total: foods.len(),
        foods,
    }))
}

#[instrument(skip(state, payload))]
pub async fn add_food(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<FoodRequest>,
) -> AppResult<(StatusCode, Json<FoodResponse>)> {
    let new_food = payload.into_new_food().map_err(AppError::BadRequest)?;
    if repo::name_taken(&state.db, &new_food.name, None).await?.is_some() {
        warn!(user_id, name = %new_food.name, "duplicate food");
        return Err(AppError::Conflict(DUPLICATE_FOOD.into()));
    }
    let food = repo::insert(&state.db, &new_food).await.map_err(duplicate_as_conflict)?;

    info!(user_id, food_id = food.id, name = %food.name, "food added");
    Ok((
        StatusCode::CREATED,
        Json(FoodResponse {
            success: true,
            food,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn update_food(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<FoodRequest>,
) -> AppResult<Json<FoodResponse>> {
    let new_food = payload.into_new_food().map_err(AppError::BadRequest)?;
    if repo::name_taken(&state.db, &new_food.name, Some(id)).await?.is_some() {
        warn!(user_id, food_id = id, name = %new_food.name, "rename onto existing food");
        return Err(AppError::Conflict(DUPLICATE_FOOD.into()));
    }
    let food = repo::update(&state.db, id, &new_food)
        .await
        .map_err(duplicate_as_conflict)?
        .ok_or_else(|| AppError::NotFound("Food item not found".into()))?;

    info!(user_id, food_id = food.id, "food updated");
    Ok(Json(FoodResponse {
        success: true,
        food,
    }))
}

#[instrument(skip(state))]
pub async fn delete_food(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<FoodDeletedResponse>> {
    let food = repo::delete(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Food item not found".into()))?;

    info!(user_id, food_id = food.id, name = %food.name, "food deleted");
    Ok(Json(FoodDeletedResponse {
        success: true,
        deleted_id: food.id,
        name: food.name,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{app::build_app, auth::tokens::JwtKeys, db::testing::insert_user};
    use axum::{
        body::Body,
        extract::FromRef,
        http::{header, Method, Request},
    };
    use serde_json::{json, Value};
    use sqlx::PgPool;
    use tower::ServiceExt;

    fn request(name: &str, calories: Option<f64>) -> FoodRequest {
        FoodRequest {
            name: name.into(),
            calories_per_100g: calories,
            protein_per_100g: None,
            fat_per_100g: None,
            carbs_per_100g: None,
            fiber_per_100g: None,
        }
    }

    #[test]
    fn missing_values_default_to_zero() {
        let food = request("  Tofu ", Some(76.0)).into_new_food().unwrap();
        assert_eq!(food.name, "Tofu");
        assert_eq!(food.per_100g.calories, 76.0);
        assert_eq!(food.per_100g.fiber, 0.0);
    }

    #[test]
    fn rejects_blank_names_and_negative_values() {
        assert!(request("  ", Some(1.0)).into_new_food().is_err());
        assert!(request(&"x".repeat(101), None).into_new_food().is_err());
        let err = request("Tofu", Some(-5.0)).into_new_food().unwrap_err();
        assert!(err.contains("calories_per_100g"));
        assert!(request("Tofu", Some(f64::NAN)).into_new_food().is_err());
    }

    async fn call(state: &AppState, token: &str, method: Method, uri: &str, body: Value) -> (StatusCode, Value) {
        let res = build_app(state.clone())
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), 1 << 20).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[sqlx::test]
    async fn manage_foods_over_http(pool: PgPool) {
        let user = insert_user(&pool, "ann@example.com", 2000.0, 100.0).await;
        let state = AppState::fake_with_db(pool);
        let token = JwtKeys::from_ref(&state).pair(user).unwrap().access_token;
        let tofu = json!({ "name": "Silken Tofu", "calories_per_100g": 55, "protein_per_100g": 4.8 });

        let (status, body) = call(&state, &token, Method::POST, "/api/v1/nutrition", tofu.clone()).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["food"]["id"].as_i64().unwrap();

        let shouty = json!({ "name": "SILKEN TOFU" });
        let (status, body) = call(&state, &token, Method::POST, "/api/v1/nutrition", shouty.clone()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], DUPLICATE_FOOD);

        let (status, _) = call(&state, &token, Method::PUT, "/api/v1/nutrition/-1", tofu.clone()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) =
            call(&state, &token, Method::PUT, "/api/v1/nutrition/1", json!({ "name": "silken tofu" })).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let uri = format!("/api/v1/nutrition/{id}");
        let (status, body) = call(&state, &token, Method::PUT, &uri, shouty).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["food"]["name"], "SILKEN TOFU");
        assert_eq!(body["food"]["calories_per_100g"], 0.0);

        let (status, body) = call(&state, &token, Method::GET, "/api/v1/nutrition", Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"].as_u64(), body["foods"].as_array().map(|f| f.len() as u64));

        let (status, _) = call(&state, &token, Method::DELETE, &uri, Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&state, &token, Method::DELETE, &uri, Value::Null).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
