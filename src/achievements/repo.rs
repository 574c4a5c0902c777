use std::collections::HashMap;

use sqlx::{FromRow, PgConnection, PgPool};
use time::{Date, OffsetDateTime};

use super::{catalog::AchievementDefinition, stats::DayTotals};

const DEFINITION_COLUMNS: &str = "a.id, a.name, a.description, a.badge_icon, a.badge_color, \
     a.category, a.achievement_type, a.metric, a.target_value, a.target_unit";

/// A definition joined with one user's stored progress (zero when never computed).
#[derive(Debug, Clone, FromRow)]
pub struct ProgressRow {
    #[sqlx(flatten)]
    pub definition: AchievementDefinition,
    pub current_progress: f64,
    pub is_earned: bool,
    pub earned_at: Option<OffsetDateTime>,
}

pub async fn active_definitions(conn: &mut PgConnection) -> sqlx::Result<Vec<AchievementDefinition>> {
    sqlx::query_as::<_, AchievementDefinition>(&format!(
        "SELECT {DEFINITION_COLUMNS} FROM achievements a WHERE a.is_active ORDER BY a.id"
    ))
    .fetch_all(conn)
    .await
}

/// Per-day meal totals for one user, one row per distinct meal date.
pub async fn daily_totals(conn: &mut PgConnection, user_id: i64) -> sqlx::Result<Vec<DayTotals>> {
    sqlx::query_as::<_, DayTotals>(
        r#"
        SELECT meal_date AS day,
               COALESCE(SUM(calories), 0)::float8 AS calories,
               COALESCE(SUM(protein), 0)::float8 AS protein
        FROM meals
        WHERE user_id = $1
        GROUP BY meal_date
        "#,
    )
    .bind(user_id)
    .fetch_all(conn)
    .await
}

pub async fn earned_flags(conn: &mut PgConnection, user_id: i64) -> sqlx::Result<HashMap<i64, bool>> {
    let rows = sqlx::query_as::<_, (i64, bool)>(
        "SELECT achievement_id, is_earned FROM user_achievements WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().collect())
}

/// Stores `progress`; `is_earned` follows from it in the table definition.
/// `earned_at` is stamped on the first earned write, kept while earned and
/// cleared once progress drops below 1.
pub async fn upsert_progress(
    conn: &mut PgConnection,
    user_id: i64,
    achievement_id: i64,
    progress: f64,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO user_achievements (user_id, achievement_id, current_progress, earned_at, updated_at)
        VALUES ($1, $2, $3::float8, CASE WHEN $3::float8 >= 1.0 THEN NOW() END, NOW())
        ON CONFLICT (user_id, achievement_id) DO UPDATE
           SET current_progress = EXCLUDED.current_progress,
               earned_at = CASE
                   WHEN EXCLUDED.current_progress >= 1.0
                       THEN COALESCE(user_achievements.earned_at, NOW())
                   ELSE NULL
               END,
               updated_at = NOW()
        "#,
    )
    .bind(user_id)
    .bind(achievement_id)
    .bind(progress)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn log_progress(
    conn: &mut PgConnection,
    user_id: i64,
    day: Date,
    entries: &[(i64, f64)],
) -> sqlx::Result<()> {
    if entries.is_empty() {
        return Ok(());
    }
    let (ids, values): (Vec<i64>, Vec<f64>) = entries.iter().copied().unzip();
    sqlx::query(
        r#"
        INSERT INTO achievement_progress_log (user_id, achievement_id, progress_value, progress_date)
        SELECT $1, t.achievement_id, t.progress_value, $4
        FROM UNNEST($2::bigint[], $3::float8[]) AS t(achievement_id, progress_value)
        "#,
    )
    .bind(user_id)
    .bind(ids)
    .bind(values)
    .bind(day)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn list_for_user(db: &PgPool, user_id: i64) -> anyhow::Result<Vec<ProgressRow>> {
    let rows = sqlx::query_as::<_, ProgressRow>(&format!(
        r#"
        SELECT {DEFINITION_COLUMNS},
               COALESCE(ua.current_progress, 0)::float8 AS current_progress,
               COALESCE(ua.is_earned, FALSE) AS is_earned,
               ua.earned_at
        FROM achievements a
        LEFT JOIN user_achievements ua
               ON ua.achievement_id = a.id AND ua.user_id = $1
        WHERE a.is_active
        ORDER BY a.category, a.id
        "#
    ))
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}
