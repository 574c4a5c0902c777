use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use time::{Date, OffsetDateTime};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Meal {
    pub id: i64,
    pub user_id: i64,
    pub meal_text: String,
    pub calories: f64,
    pub protein: f64,
    pub fat: f64,
    pub carbs: f64,
    pub fiber: f64,
    pub meal_date: Date,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, FromRow)]
pub struct MealTotals {
    pub calories: f64,
    pub protein: f64,
    pub fat: f64,
    pub carbs: f64,
    pub fiber: f64,
    pub meal_count: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMeal {
    pub meal_text: String,
    pub calories: f64,
    pub protein: f64,
    pub fat: f64,
    pub carbs: f64,
    pub fiber: f64,
    pub meal_date: Date,
}

const MEAL_COLUMNS: &str =
    "id, user_id, meal_text, calories, protein, fat, carbs, fiber, meal_date, created_at";

pub async fn insert(conn: &mut PgConnection, user_id: i64, meal: &NewMeal) -> sqlx::Result<Meal> {
    sqlx::query_as::<_, Meal>(&format!(
        r#"
        INSERT INTO meals (user_id, meal_text, calories, protein, fat, carbs, fiber, meal_date)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {MEAL_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(&meal.meal_text)
    .bind(meal.calories)
    .bind(meal.protein)
    .bind(meal.fat)
    .bind(meal.carbs)
    .bind(meal.fiber)
    .bind(meal.meal_date)
    .fetch_one(conn)
    .await
}

/// Deletes only if the meal belongs to `user_id`.
pub async fn delete_owned(conn: &mut PgConnection, user_id: i64, meal_id: i64) -> sqlx::Result<Option<Meal>> {
    sqlx::query_as::<_, Meal>(&format!(
        "DELETE FROM meals WHERE id = $1 AND user_id = $2 RETURNING {MEAL_COLUMNS}"
    ))
    .bind(meal_id)
    .bind(user_id)
    .fetch_optional(conn)
    .await
}

pub async fn list_for_day(db: &PgPool, user_id: i64, day: Date) -> anyhow::Result<Vec<Meal>> {
    let rows = sqlx::query_as::<_, Meal>(&format!(
        r#"
        SELECT {MEAL_COLUMNS}
        FROM meals
        WHERE user_id = $1 AND meal_date = $2
        ORDER BY created_at DESC, id DESC
        "#
    ))
    .bind(user_id)
    .bind(day)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn totals_for_day(db: &PgPool, user_id: i64, day: Date) -> anyhow::Result<MealTotals> {
    let totals = sqlx::query_as::<_, MealTotals>(
        r#"
        SELECT COALESCE(SUM(calories), 0)::float8 AS calories,
               COALESCE(SUM(protein), 0)::float8 AS protein,
               COALESCE(SUM(fat), 0)::float8 AS fat,
               COALESCE(SUM(carbs), 0)::float8 AS carbs,
               COALESCE(SUM(fiber), 0)::float8 AS fiber,
               COUNT(*) AS meal_count
        FROM meals
        WHERE user_id = $1 AND meal_date = $2
        "#,
    )
    .bind(user_id)
    .bind(day)
    .fetch_one(db)
    .await?;
    Ok(totals)
}
