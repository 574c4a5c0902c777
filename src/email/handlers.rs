use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use time::{macros::format_description, OffsetDateTime, Time};
use tracing::{info, instrument};

use super::{
    notify,
    repo::{self, EmailLog, EmailPreferences, EmailStatistic, PreferencesChange},
    scheduler::{self, SchedulerStatus},
};
use crate::{
    auth::services::AuthUser,
    db,
    error::{AppError, AppResult},
    state::AppState,
};

const LOG_LIMIT: i64 = 50;

pub fn email_routes() -> Router<AppState> {
    Router::new()
        .route("/email/preferences", get(get_preferences).put(update_preferences))
        .route("/email/logs", get(list_logs))
        .route("/email/test", post(send_test))
        .route("/email/scheduler", get(scheduler_status))
}

#[derive(Debug, Serialize)]
pub struct PreferencesView {
    pub daily_reminders_enabled: bool,
    pub achievement_notifications_enabled: bool,
    pub marketing_emails_enabled: bool,
    pub reminder_time: String,
    pub timezone: String,
    pub last_reminder_sent: Option<time::Date>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<EmailPreferences> for PreferencesView {
    fn from(p: EmailPreferences) -> Self {
        Self {
            daily_reminders_enabled: p.daily_reminders_enabled,
            achievement_notifications_enabled: p.achievement_notifications_enabled,
            marketing_emails_enabled: p.marketing_emails_enabled,
            reminder_time: format!("{:02}:{:02}", p.reminder_time.hour(), p.reminder_time.minute()),
            timezone: p.timezone,
            last_reminder_sent: p.last_reminder_sent,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PreferencesResponse {
    pub success: bool,
    pub preferences: PreferencesView,
}

#[derive(Debug, Deserialize)]
pub struct PreferencesUpdateRequest {
    pub daily_reminders_enabled: Option<bool>,
    pub achievement_notifications_enabled: Option<bool>,
    pub marketing_emails_enabled: Option<bool>,
    /// `HH:MM`
    pub reminder_time: Option<String>,
    pub timezone: Option<String>,
}

pub fn parse_reminder_time(raw: &str) -> Result<Time, String> {
    let raw = raw.trim();
    Time::parse(raw, format_description!("[hour]:[minute]"))
        .or_else(|_| Time::parse(raw, format_description!("[hour]:[minute]:[second]")))
        .map_err(|_| format!("Invalid reminder_time '{}', expected HH:MM", raw))
}

impl TryFrom<PreferencesUpdateRequest> for PreferencesChange {
    type Error = AppError;

    fn try_from(req: PreferencesUpdateRequest) -> Result<Self, Self::Error> {
        let reminder_time = req
            .reminder_time
            .as_deref()
            .map(parse_reminder_time)
            .transpose()
            .map_err(AppError::BadRequest)?;
        let timezone = req.timezone.map(|t| t.trim().to_string());
        if timezone.as_deref().is_some_and(|t| t.is_empty() || t.len() > 64) {
            return Err(AppError::BadRequest("Invalid timezone".into()));
        }
        Ok(Self {
            daily_reminders_enabled: req.daily_reminders_enabled,
            achievement_notifications_enabled: req.achievement_notifications_enabled,
            marketing_emails_enabled: req.marketing_emails_enabled,
            reminder_time,
            timezone,
        })
    }
}

#[instrument(skip(state))]
pub async fn get_preferences(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<PreferencesResponse>> {
    let prefs = repo::get_preferences(&state.db, user_id).await?;
    Ok(Json(PreferencesResponse {
        success: true,
        preferences: prefs.into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn update_preferences(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<PreferencesUpdateRequest>,
) -> AppResult<Json<PreferencesResponse>> {
    let change = PreferencesChange::try_from(payload)?;
    let prefs = repo::update_preferences(&state.db, user_id, &change).await?;
    info!(user_id, reminders = prefs.daily_reminders_enabled, "email preferences updated");
    Ok(Json(PreferencesResponse {
        success: true,
        preferences: prefs.into(),
    }))
}

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub success: bool,
    pub logs: Vec<EmailLog>,
}

#[instrument(skip(state))]
pub async fn list_logs(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<LogsResponse>> {
    let logs = repo::recent_logs(&state.db, user_id, LOG_LIMIT).await?;
    Ok(Json(LogsResponse { success: true, logs }))
}

#[derive(Debug, Serialize)]
pub struct TestEmailResponse {
    pub success: bool,
    pub message_id: String,
}

/// Sends a reminder to the caller right away. Does not count as the day's
/// scheduled reminder.
#[instrument(skip(state))]
pub async fn send_test(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<TestEmailResponse>> {
    let recipient = repo::recipient(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    let message_id = notify::send_daily_reminder(&state, &recipient)
        .await
        .map_err(AppError::Upstream)?;
    Ok(Json(TestEmailResponse {
        success: true,
        message_id,
    }))
}

#[derive(Debug, Serialize)]
pub struct SchedulerResponse {
    pub success: bool,
    pub scheduler: SchedulerStatus,
    pub today: Vec<EmailStatistic>,
}

#[instrument(skip(state))]
pub async fn scheduler_status(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
) -> AppResult<Json<SchedulerResponse>> {
    let last = repo::last_reminder_day(&state.db).await?;
    let today = repo::statistics_for(&state.db, db::today()).await?;
    Ok(Json(SchedulerResponse {
        success: true,
        scheduler: scheduler::status(&state.config.reminders, OffsetDateTime::now_utc(), last),
        today,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::time;

    #[test]
    fn reminder_time_accepts_minutes_and_seconds() {
        assert_eq!(parse_reminder_time("07:30").unwrap(), time!(7:30));
        assert_eq!(parse_reminder_time(" 18:05:00 ").unwrap(), time!(18:05));
        assert!(parse_reminder_time("7pm").is_err());
        assert!(parse_reminder_time("25:00").is_err());
    }

    #[test]
    fn update_request_validates_fields() {
        let req = PreferencesUpdateRequest {
            daily_reminders_enabled: Some(false),
            achievement_notifications_enabled: None,
            marketing_emails_enabled: None,
            reminder_time: Some("08:15".into()),
            timezone: Some(" Europe/Berlin ".into()),
        };
        let change = PreferencesChange::try_from(req).unwrap();
        assert_eq!(change.daily_reminders_enabled, Some(false));
        assert_eq!(change.reminder_time, Some(time!(8:15)));
        assert_eq!(change.timezone.as_deref(), Some("Europe/Berlin"));

        let bad = PreferencesUpdateRequest {
            daily_reminders_enabled: None,
            achievement_notifications_enabled: None,
            marketing_emails_enabled: None,
            reminder_time: None,
            timezone: Some("   ".into()),
        };
        assert!(matches!(PreferencesChange::try_from(bad), Err(AppError::BadRequest(_))));
    }
}
