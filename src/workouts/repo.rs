use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Exercise {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub calories_per_minute: f64,
}

/// A workout joined with its exercise.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Workout {
    pub id: i64,
    pub exercise_id: i64,
    pub exercise_name: String,
    pub category: String,
    pub duration_minutes: i32,
    pub calories_burned: f64,
    pub workout_date: Date,
    pub notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub struct NewWorkout<'a> {
    pub exercise: &'a Exercise,
    pub duration_minutes: i32,
    pub notes: Option<&'a str>,
    pub workout_date: Date,
}

/// Rounded to whole calories.
pub fn calories_burned(calories_per_minute: f64, duration_minutes: i32) -> f64 {
    (calories_per_minute * f64::from(duration_minutes)).round()
}

pub async fn list_exercises(db: &PgPool, category: Option<&str>) -> anyhow::Result<Vec<Exercise>> {
    let rows = sqlx::query_as::<_, Exercise>(
        r#"
        SELECT id, name, category, calories_per_minute
        FROM exercises
        WHERE $1::text IS NULL OR category = $1
        ORDER BY category, name
        "#,
    )
    .bind(category)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn find_exercise(db: &PgPool, id: i64) -> anyhow::Result<Option<Exercise>> {
    let row = sqlx::query_as::<_, Exercise>(
        "SELECT id, name, category, calories_per_minute FROM exercises WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

pub async fn insert(db: &PgPool, user_id: i64, new: NewWorkout<'_>) -> anyhow::Result<Workout> {
    let row = sqlx::query_as::<_, Workout>(
        r#"
        WITH inserted AS (
            INSERT INTO workouts (user_id, exercise_id, duration_minutes, calories_burned, workout_date, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
        )
        SELECT w.id, w.exercise_id, e.name AS exercise_name, e.category, w.duration_minutes,
               w.calories_burned, w.workout_date, w.notes, w.created_at
        FROM inserted w
        JOIN exercises e ON e.id = w.exercise_id
        "#,
    )
    .bind(user_id)
    .bind(new.exercise.id)
    .bind(new.duration_minutes)
    .bind(calories_burned(new.exercise.calories_per_minute, new.duration_minutes))
    .bind(new.workout_date)
    .bind(new.notes)
    .fetch_one(db)
    .await?;
    Ok(row)
}

pub async fn list_for_day(db: &PgPool, user_id: i64, day: Date) -> anyhow::Result<Vec<Workout>> {
    let rows = sqlx::query_as::<_, Workout>(
        r#"
        SELECT w.id, w.exercise_id, e.name AS exercise_name, e.category, w.duration_minutes,
               w.calories_burned, w.workout_date, w.notes, w.created_at
        FROM workouts w
        JOIN exercises e ON e.id = w.exercise_id
        WHERE w.user_id = $1 AND w.workout_date = $2
        ORDER BY w.created_at DESC, w.id DESC
        "#,
    )
    .bind(user_id)
    .bind(day)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub fn total_burned(workouts: &[Workout]) -> f64 {
    workouts.iter().map(|w| w.calories_burned).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burned_calories_are_rounded() {
        assert_eq!(calories_burned(11.4, 30), 342.0);
        assert_eq!(calories_burned(8.5, 25), 213.0);
        assert_eq!(calories_burned(3.0, 1), 3.0);
    }
}
