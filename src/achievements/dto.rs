use std::collections::BTreeMap;

use serde::Serialize;
use time::{Duration, OffsetDateTime};

use super::{engine::EarnedAchievement, repo::ProgressRow};

pub const RECENT_DAYS: i64 = 7;
pub const RECENT_LIMIT: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct AchievementView {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub badge_icon: String,
    pub badge_color: String,
    pub category: String,
    pub achievement_type: String,
    pub target_value: Option<f64>,
    pub target_unit: Option<String>,
    pub current_progress: f64,
    pub progress_percentage: u8,
    pub is_earned: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub earned_at: Option<OffsetDateTime>,
}

/// Whole percent for display; 100 only when earned.
pub fn progress_percentage(progress: f64, is_earned: bool) -> u8 {
    if is_earned {
        return 100;
    }
    let pct = (progress.clamp(0.0, 1.0) * 100.0).floor();
    if pct.is_nan() {
        0
    } else {
        pct.min(99.0) as u8
    }
}

impl From<ProgressRow> for AchievementView {
    fn from(r: ProgressRow) -> Self {
        let d = r.definition;
        Self {
            id: d.id,
            name: d.name,
            description: d.description,
            badge_icon: d.badge_icon,
            badge_color: d.badge_color,
            category: d.category,
            achievement_type: d.achievement_type,
            target_value: d.target_value,
            target_unit: d.target_unit,
            current_progress: r.current_progress.clamp(0.0, 1.0),
            progress_percentage: progress_percentage(r.current_progress, r.is_earned),
            is_earned: r.is_earned,
            earned_at: r.earned_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryStats {
    pub total: usize,
    pub earned: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AchievementStats {
    pub total: usize,
    pub earned: usize,
    pub completion_percentage: u8,
    pub by_category: BTreeMap<String, CategoryStats>,
}

impl AchievementStats {
    pub fn from_views(views: &[AchievementView]) -> Self {
        let mut by_category: BTreeMap<String, CategoryStats> = BTreeMap::new();
        for v in views {
            let entry = by_category
                .entry(v.category.clone())
                .or_insert(CategoryStats { total: 0, earned: 0 });
            entry.total += 1;
            if v.is_earned {
                entry.earned += 1;
            }
        }
        let total = views.len();
        let earned = views.iter().filter(|v| v.is_earned).count();
        let completion_percentage = if total == 0 {
            0
        } else {
            (earned * 100 / total) as u8
        };
        Self {
            total,
            earned,
            completion_percentage,
            by_category,
        }
    }
}

/// Earned within the last week, newest first.
pub fn recent(views: &[AchievementView], now: OffsetDateTime) -> Vec<AchievementView> {
    let since = now - Duration::days(RECENT_DAYS);
    let mut out: Vec<AchievementView> = views
        .iter()
        .filter(|v| v.is_earned && v.earned_at.is_some_and(|t| t >= since))
        .cloned()
        .collect();
    out.sort_by(|a, b| b.earned_at.cmp(&a.earned_at));
    out.truncate(RECENT_LIMIT);
    out
}

#[derive(Debug, Serialize)]
pub struct AchievementsResponse {
    pub success: bool,
    pub achievements: Vec<AchievementView>,
    pub recent: Vec<AchievementView>,
    pub stats: AchievementStats,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub success: bool,
    pub evaluated: usize,
    pub newly_earned: Vec<EarnedAchievement>,
}
