use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use time::{macros::format_description, Date, OffsetDateTime};

pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("connect to database")
}

pub async fn migrate(db: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .context("run migrations")
}

/// Calendar day used for meal and workout bucketing.
pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

/// Parses an optional `YYYY-MM-DD` query value, defaulting to today.
pub fn parse_day(raw: Option<&str>) -> Result<Date, String> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(today()),
        Some(s) => Date::parse(s, format_description!("[year]-[month]-[day]"))
            .map_err(|_| format!("Invalid date '{}', expected YYYY-MM-DD", s)),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use sqlx::PgPool;

    /// Inserts a user with fixed body metrics and the given goals.
    pub async fn insert_user(db: &PgPool, email: &str, calorie_goal: f64, protein_goal: f64) -> i64 {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO users (name, email, password_hash, height_cm, weight_kg, bmi,
                               bmi_category, goal_type, calorie_goal, protein_goal)
            VALUES ('Test', $1, 'hash', 170, 65, 22.5, 'Normal', 'maintenance', $2, $3)
            RETURNING id
            "#,
        )
        .bind(email)
        .bind(calorie_goal)
        .bind(protein_goal)
        .fetch_one(db)
        .await
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn parse_day_accepts_iso_dates() {
        assert_eq!(parse_day(Some("2024-03-09")).unwrap(), date!(2024 - 03 - 09));
    }

    #[test]
    fn parse_day_defaults_to_today() {
        assert_eq!(parse_day(None).unwrap(), today());
        assert_eq!(parse_day(Some("  ")).unwrap(), today());
    }

    #[test]
    fn parse_day_rejects_garbage() {
        let err = parse_day(Some("03/09/2024")).unwrap_err();
        assert!(err.contains("YYYY-MM-DD"));
    }
}
