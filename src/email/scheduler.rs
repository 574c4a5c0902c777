//! Daily reminder loop.
//!
//! Progress is persisted per user in `email_preferences.last_reminder_sent`
//! and claimed before sending, so a restart after the slot runs a catch-up
//! pass without sending anyone a second reminder.

use std::time::Duration;

use serde::Serialize;
use time::{Date, OffsetDateTime, Time};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use super::{notify, repo};
use crate::{config::ReminderConfig, state::AppState};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReminderRun {
    pub candidates: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
}

pub fn slot_time(cfg: &ReminderConfig) -> Time {
    Time::from_hms(cfg.hour.min(23), cfg.minute.min(59), 0).unwrap_or(Time::MIDNIGHT)
}

/// Whether today's slot is at or before `now`.
pub fn slot_passed(now: OffsetDateTime, slot: Time) -> bool {
    now.time() >= slot
}

/// The first slot strictly after `now`.
pub fn next_run_after(now: OffsetDateTime, slot: Time) -> OffsetDateTime {
    let today = now.replace_time(slot);
    if today > now {
        today
    } else {
        today + time::Duration::days(1)
    }
}

#[instrument(skip(state))]
pub async fn run_reminders(state: &AppState, day: Date) -> anyhow::Result<ReminderRun> {
    let candidates = repo::reminder_candidates(&state.db, day).await?;
    let mut run = ReminderRun {
        candidates: candidates.len(),
        ..Default::default()
    };

    for r in &candidates {
        match repo::claim_reminder(&state.db, r.user_id, day).await {
            Ok(true) => {}
            Ok(false) => {
                run.skipped += 1;
                continue;
            }
            Err(e) => {
                error!(error = %e, user_id = r.user_id, "claim reminder failed");
                run.failed += 1;
                continue;
            }
        }
        match notify::send_daily_reminder(state, r).await {
            Ok(_) => run.sent += 1,
            Err(_) => run.failed += 1,
        }
    }

    info!(%day, candidates = run.candidates, sent = run.sent, failed = run.failed, skipped = run.skipped, "daily reminders done");
    Ok(run)
}

/// Spawns the reminder loop, or does nothing when reminders are disabled.
pub fn spawn(state: AppState) -> Option<JoinHandle<()>> {
    if !state.config.reminders.enabled {
        info!("daily reminders disabled");
        return None;
    }
    let slot = slot_time(&state.config.reminders);
    info!(%slot, "daily reminder scheduler started (UTC)");

    Some(tokio::spawn(async move {
        let now = OffsetDateTime::now_utc();
        if slot_passed(now, slot) {
            info!("reminder slot already passed today, running catch-up");
            if let Err(e) = run_reminders(&state, now.date()).await {
                error!(error = %e, "catch-up reminder run failed");
            }
        }

        loop {
            let now = OffsetDateTime::now_utc();
            let next = next_run_after(now, slot);
            let wait = Duration::try_from(next - now).unwrap_or(Duration::from_secs(60));
            tokio::time::sleep(wait).await;

            if let Err(e) = run_reminders(&state, next.date()).await {
                warn!(error = %e, "reminder run failed");
            }
        }
    }))
}

#[derive(Debug, Serialize)]
pub struct SchedulerStatus {
    pub enabled: bool,
    pub reminder_time_utc: String,
    #[serde(with = "time::serde::rfc3339")]
    pub next_run: OffsetDateTime,
    pub last_run_date: Option<Date>,
}

pub fn status(cfg: &ReminderConfig, now: OffsetDateTime, last_run_date: Option<Date>) -> SchedulerStatus {
    let slot = slot_time(cfg);
    SchedulerStatus {
        enabled: cfg.enabled,
        reminder_time_utc: format!("{:02}:{:02}", slot.hour(), slot.minute()),
        next_run: next_run_after(now, slot),
        last_run_date,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime, time};

    fn cfg(hour: u8, minute: u8) -> ReminderConfig {
        ReminderConfig {
            enabled: true,
            hour,
            minute,
        }
    }

    #[test]
    fn next_run_is_later_today_before_the_slot() {
        let now = datetime!(2024-05-10 07:30 UTC);
        assert_eq!(next_run_after(now, time!(9:00)), datetime!(2024-05-10 09:00 UTC));
        assert!(!slot_passed(now, time!(9:00)));
    }

    #[test]
    fn next_run_is_tomorrow_once_the_slot_passed() {
        let now = datetime!(2024-05-10 09:00 UTC);
        assert!(slot_passed(now, time!(9:00)));
        assert_eq!(next_run_after(now, time!(9:00)), datetime!(2024-05-11 09:00 UTC));
        let late = datetime!(2024-12-31 23:59 UTC);
        assert_eq!(next_run_after(late, time!(9:00)), datetime!(2025-01-01 09:00 UTC));
    }

    #[test]
    fn slot_time_clamps_out_of_range_config() {
        assert_eq!(slot_time(&cfg(30, 99)), time!(23:59));
        assert_eq!(slot_time(&cfg(6, 15)), time!(6:15));
    }

    #[test]
    fn status_reports_slot_and_next_run() {
        let s = status(&cfg(9, 5), datetime!(2024-05-10 10:00 UTC), Some(date!(2024 - 05 - 10)));
        assert_eq!(s.reminder_time_utc, "09:05");
        assert_eq!(s.next_run, datetime!(2024-05-11 09:05 UTC));
        assert_eq!(s.last_run_date, Some(date!(2024 - 05 - 10)));
    }
}
