use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use time::OffsetDateTime;

use super::bmi::BodyProfile;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub height_cm: f64,
    pub weight_kg: f64,
    pub bmi: f64,
    pub bmi_category: String,
    pub goal_type: String,
    pub calorie_goal: f64,
    pub protein_goal: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// The part of a user the achievement calculator needs.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct Goals {
    pub calorie_goal: f64,
    pub protein_goal: f64,
}

pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub body: &'a BodyProfile,
}

const USER_COLUMNS: &str = "id, name, email, password_hash, height_cm, weight_kg, bmi, \
     bmi_category, goal_type, calorie_goal, protein_goal, created_at, updated_at";

impl User {
    /// Find a user by email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create a new user with hashed password and derived goals.
    pub async fn create(db: &PgPool, new: NewUser<'_>) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash, height_cm, weight_kg, bmi,
                               bmi_category, goal_type, calorie_goal, protein_goal)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(new.name)
        .bind(new.email)
        .bind(new.password_hash)
        .bind(new.height_cm)
        .bind(new.weight_kg)
        .bind(new.body.bmi)
        .bind(new.body.bmi_category)
        .bind(new.body.goal_type.as_str())
        .bind(new.body.calorie_goal)
        .bind(new.body.protein_goal)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn update_profile(
        db: &PgPool,
        id: i64,
        name: &str,
        height_cm: f64,
        weight_kg: f64,
        body: &BodyProfile,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET name = $2, height_cm = $3, weight_kg = $4, bmi = $5, bmi_category = $6,
                   goal_type = $7, calorie_goal = $8, protein_goal = $9, updated_at = NOW()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(name)
        .bind(height_cm)
        .bind(weight_kg)
        .bind(body.bmi)
        .bind(body.bmi_category)
        .bind(body.goal_type.as_str())
        .bind(body.calorie_goal)
        .bind(body.protein_goal)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }
}

impl Goals {
    /// Reads the goals and row-locks the user until the transaction ends.
    /// `NO KEY UPDATE` does not conflict with the key-share lock a meal
    /// insert takes on the same row through its foreign key.
    pub async fn lock_for_update(conn: &mut PgConnection, user_id: i64) -> sqlx::Result<Option<Goals>> {
        sqlx::query_as::<_, Goals>(
            "SELECT calorie_goal, protein_goal FROM users WHERE id = $1 FOR NO KEY UPDATE",
        )
        .bind(user_id)
        .fetch_optional(conn)
        .await
    }
}
