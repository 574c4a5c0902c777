use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime, Time};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailKind {
    DailyReminder,
    AchievementNotification,
    Welcome,
}

impl EmailKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailKind::DailyReminder => "daily_reminder",
            EmailKind::AchievementNotification => "achievement_notification",
            EmailKind::Welcome => "welcome",
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct EmailPreferences {
    pub user_id: i64,
    pub daily_reminders_enabled: bool,
    pub achievement_notifications_enabled: bool,
    pub marketing_emails_enabled: bool,
    pub reminder_time: Time,
    pub timezone: String,
    pub last_reminder_sent: Option<Date>,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Default, Clone)]
pub struct PreferencesChange {
    pub daily_reminders_enabled: Option<bool>,
    pub achievement_notifications_enabled: Option<bool>,
    pub marketing_emails_enabled: Option<bool>,
    pub reminder_time: Option<Time>,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EmailLog {
    pub id: i64,
    pub recipient_email: String,
    pub email_type: String,
    pub subject: String,
    pub status: String,
    pub message_id: Option<String>,
    pub error_message: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub sent_at: OffsetDateTime,
}

pub struct NewEmailLog<'a> {
    pub user_id: Option<i64>,
    pub recipient: &'a str,
    pub kind: EmailKind,
    pub subject: &'a str,
    pub content: &'a str,
    /// `Ok(message_id)` or `Err(error message)`.
    pub result: Result<&'a str, &'a str>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EmailStatistic {
    pub email_type: String,
    pub total_sent: i32,
    pub total_failed: i32,
}

/// Who gets told about what, with their preferences folded in.
#[derive(Debug, Clone, FromRow)]
pub struct Recipient {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub calorie_goal: f64,
    pub protein_goal: f64,
    pub daily_reminders_enabled: bool,
    pub achievement_notifications_enabled: bool,
}

const PREFERENCE_COLUMNS: &str = "user_id, daily_reminders_enabled, achievement_notifications_enabled, \
     marketing_emails_enabled, reminder_time, timezone, last_reminder_sent, updated_at";

const RECIPIENT_SELECT: &str = r#"
    SELECT u.id AS user_id, u.name, u.email, u.calorie_goal, u.protein_goal,
           COALESCE(p.daily_reminders_enabled, TRUE) AS daily_reminders_enabled,
           COALESCE(p.achievement_notifications_enabled, TRUE) AS achievement_notifications_enabled
    FROM users u
    LEFT JOIN email_preferences p ON p.user_id = u.id
"#;

pub async fn ensure_preferences(db: &PgPool, user_id: i64) -> anyhow::Result<()> {
    sqlx::query("INSERT INTO email_preferences (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn get_preferences(db: &PgPool, user_id: i64) -> anyhow::Result<EmailPreferences> {
    ensure_preferences(db, user_id).await?;
    let prefs = sqlx::query_as::<_, EmailPreferences>(&format!(
        "SELECT {PREFERENCE_COLUMNS} FROM email_preferences WHERE user_id = $1"
    ))
    .bind(user_id)
    .fetch_one(db)
    .await?;
    Ok(prefs)
}

pub async fn update_preferences(
    db: &PgPool,
    user_id: i64,
    change: &PreferencesChange,
) -> anyhow::Result<EmailPreferences> {
    ensure_preferences(db, user_id).await?;
    let prefs = sqlx::query_as::<_, EmailPreferences>(&format!(
        r#"
        UPDATE email_preferences
           SET daily_reminders_enabled = COALESCE($2, daily_reminders_enabled),
               achievement_notifications_enabled = COALESCE($3, achievement_notifications_enabled),
               marketing_emails_enabled = COALESCE($4, marketing_emails_enabled),
               reminder_time = COALESCE($5, reminder_time),
               timezone = COALESCE($6, timezone),
               updated_at = NOW()
         WHERE user_id = $1
        RETURNING {PREFERENCE_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(change.daily_reminders_enabled)
    .bind(change.achievement_notifications_enabled)
    .bind(change.marketing_emails_enabled)
    .bind(change.reminder_time)
    .bind(change.timezone.as_deref())
    .fetch_one(db)
    .await?;
    Ok(prefs)
}

/// Writes the log row and bumps the day's counters together.
pub async fn record_attempt(db: &PgPool, entry: &NewEmailLog<'_>) -> anyhow::Result<()> {
    let (status, message_id, error_message) = match entry.result {
        Ok(id) => ("sent", Some(id), None),
        Err(e) => ("failed", None, Some(e)),
    };

    let mut tx = db.begin().await?;
    sqlx::query(
        r#"
        INSERT INTO email_logs (user_id, recipient_email, email_type, subject, message_content,
                                status, message_id, error_message)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(entry.user_id)
    .bind(entry.recipient)
    .bind(entry.kind.as_str())
    .bind(entry.subject)
    .bind(entry.content)
    .bind(status)
    .bind(message_id)
    .bind(error_message)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO email_statistics (date, email_type, total_sent, total_failed)
        VALUES (CURRENT_DATE, $1, $2, $3)
        ON CONFLICT (date, email_type) DO UPDATE
           SET total_sent = email_statistics.total_sent + EXCLUDED.total_sent,
               total_failed = email_statistics.total_failed + EXCLUDED.total_failed,
               updated_at = NOW()
        "#,
    )
    .bind(entry.kind.as_str())
    .bind(i32::from(entry.result.is_ok()))
    .bind(i32::from(entry.result.is_err()))
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn recent_logs(db: &PgPool, user_id: i64, limit: i64) -> anyhow::Result<Vec<EmailLog>> {
    let rows = sqlx::query_as::<_, EmailLog>(
        r#"
        SELECT id, recipient_email, email_type, subject, status, message_id, error_message, sent_at
        FROM email_logs
        WHERE user_id = $1
        ORDER BY sent_at DESC, id DESC
        LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn statistics_for(db: &PgPool, day: Date) -> anyhow::Result<Vec<EmailStatistic>> {
    let rows = sqlx::query_as::<_, EmailStatistic>(
        "SELECT email_type, total_sent, total_failed FROM email_statistics WHERE date = $1 ORDER BY email_type",
    )
    .bind(day)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn recipient(db: &PgPool, user_id: i64) -> anyhow::Result<Option<Recipient>> {
    let row = sqlx::query_as::<_, Recipient>(&format!("{RECIPIENT_SELECT} WHERE u.id = $1"))
        .bind(user_id)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

/// Users with reminders on that have not been reminded on `day` yet.
pub async fn reminder_candidates(db: &PgPool, day: Date) -> anyhow::Result<Vec<Recipient>> {
    let rows = sqlx::query_as::<_, Recipient>(&format!(
        r#"{RECIPIENT_SELECT}
        WHERE COALESCE(p.daily_reminders_enabled, TRUE)
          AND (p.last_reminder_sent IS NULL OR p.last_reminder_sent < $1)
        ORDER BY u.id
        "#
    ))
    .bind(day)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Stamps `last_reminder_sent = day` unless already stamped. Returns whether
/// this caller won the claim, so each user gets at most one reminder a day.
pub async fn claim_reminder(db: &PgPool, user_id: i64, day: Date) -> anyhow::Result<bool> {
    let res = sqlx::query(
        r#"
        INSERT INTO email_preferences (user_id, last_reminder_sent)
        VALUES ($1, $2)
        ON CONFLICT (user_id) DO UPDATE
           SET last_reminder_sent = EXCLUDED.last_reminder_sent, updated_at = NOW()
         WHERE email_preferences.last_reminder_sent IS NULL
            OR email_preferences.last_reminder_sent < EXCLUDED.last_reminder_sent
        "#,
    )
    .bind(user_id)
    .bind(day)
    .execute(db)
    .await?;
    Ok(res.rows_affected() == 1)
}

pub async fn last_reminder_day(db: &PgPool) -> anyhow::Result<Option<Date>> {
    let day: Option<Date> = sqlx::query_scalar("SELECT MAX(last_reminder_sent) FROM email_preferences")
        .fetch_one(db)
        .await?;
    Ok(day)
}
