use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Recommendation {
    pub id: i64,
    pub recommendation_text: String,
    pub recommendation_date: Date,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Stores one row per recommendation, keeping their order.
pub async fn insert_many(db: &PgPool, user_id: i64, day: Date, texts: &[String]) -> anyhow::Result<Vec<Recommendation>> {
    let rows = sqlx::query_as::<_, Recommendation>(
        r#"
        INSERT INTO recommendations (user_id, recommendation_text, recommendation_date)
        SELECT $1, t, $3 FROM UNNEST($2::text[]) WITH ORDINALITY AS u(t, ord)
        ORDER BY ord
        RETURNING id, recommendation_text, recommendation_date, created_at
        "#,
    )
    .bind(user_id)
    .bind(texts)
    .bind(day)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn list_for_day(db: &PgPool, user_id: i64, day: Date) -> anyhow::Result<Vec<Recommendation>> {
    let rows = sqlx::query_as::<_, Recommendation>(
        r#"
        SELECT id, recommendation_text, recommendation_date, created_at
        FROM recommendations
        WHERE user_id = $1 AND recommendation_date = $2
        ORDER BY created_at DESC, id
        "#,
    )
    .bind(user_id)
    .bind(day)
    .fetch_all(db)
    .await?;
    Ok(rows)
}
