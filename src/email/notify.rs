//! Fire-and-record helpers. Nothing here returns an error to the caller:
//! failures are logged and written to `email_logs`.

use tracing::{error, info, instrument, warn};

use super::{
    mailer::OutgoingEmail,
    repo::{self, EmailKind, NewEmailLog, Recipient},
    templates,
};
use crate::{achievements::engine::EarnedAchievement, state::AppState, users::repo::User};

/// Sends through the configured mailer and records the attempt. Returns the
/// message id on success.
#[instrument(skip(state, email), fields(to = %email.to, kind = kind.as_str()))]
pub async fn send_and_record(
    state: &AppState,
    user_id: Option<i64>,
    kind: EmailKind,
    email: &OutgoingEmail,
) -> Result<String, String> {
    let result = state.mailer.send(email).await.map_err(|e| format!("{:#}", e));

    match &result {
        Ok(id) => info!(message_id = %id, "email sent"),
        Err(e) => warn!(error = %e, "email send failed"),
    }

    let entry = NewEmailLog {
        user_id,
        recipient: &email.to,
        kind,
        subject: &email.subject,
        content: &email.text,
        result: result.as_deref().map_err(String::as_str),
    };
    if let Err(e) = repo::record_attempt(&state.db, &entry).await {
        error!(error = %e, "could not record email attempt");
    }

    result
}

fn goal_vars(name: &str, calorie_goal: f64, protein_goal: f64) -> Vec<(&'static str, String)> {
    vec![
        ("name", name.to_string()),
        ("calorie_goal", format!("{:.0}", calorie_goal)),
        ("protein_goal", format!("{:.0}", protein_goal)),
    ]
}

pub fn daily_reminder_for(r: &Recipient) -> OutgoingEmail {
    templates::DAILY_REMINDER.render(&r.email, &goal_vars(&r.name, r.calorie_goal, r.protein_goal))
}

pub fn achievement_email(r: &Recipient, earned: &EarnedAchievement) -> OutgoingEmail {
    let vars = [
        ("name", r.name.clone()),
        ("achievement_name", earned.name.clone()),
        ("achievement_description", earned.description.clone()),
        ("badge_color", earned.badge_color.clone()),
    ];
    templates::ACHIEVEMENT_UNLOCKED.render(&r.email, &vars)
}

pub fn welcome_email(user: &User) -> OutgoingEmail {
    let mut vars = goal_vars(&user.name, user.calorie_goal, user.protein_goal);
    vars.push(("bmi", format!("{:.1}", user.bmi)));
    vars.push(("bmi_category", user.bmi_category.clone()));
    templates::WELCOME.render(&user.email, &vars)
}

pub async fn send_welcome(state: &AppState, user: &User) {
    let _ = send_and_record(state, Some(user.id), EmailKind::Welcome, &welcome_email(user)).await;
}

pub async fn send_daily_reminder(state: &AppState, r: &Recipient) -> Result<String, String> {
    send_and_record(state, Some(r.user_id), EmailKind::DailyReminder, &daily_reminder_for(r)).await
}

/// One email per achievement, if the user has notifications enabled.
#[instrument(skip(state, earned), fields(count = earned.len()))]
pub async fn achievements_unlocked(state: &AppState, user_id: i64, earned: &[EarnedAchievement]) {
    let recipient = match repo::recipient(&state.db, user_id).await {
        Ok(Some(r)) => r,
        Ok(None) => return,
        Err(e) => {
            error!(error = %e, user_id, "recipient lookup failed");
            return;
        }
    };
    if !recipient.achievement_notifications_enabled {
        info!(user_id, "achievement notifications disabled");
        return;
    }
    for a in earned {
        let email = achievement_email(&recipient, a);
        let _ = send_and_record(state, Some(user_id), EmailKind::AchievementNotification, &email).await;
    }
}
