//! Aggregated per-user activity that every achievement rule is measured against.
//!
//! Everything here is pure: the engine loads per-day meal totals once and
//! builds an [`ActivitySnapshot`], so the rules never issue their own queries.

use std::collections::BTreeSet;

use sqlx::FromRow;
use time::{Date, Duration};

use crate::users::repo::Goals;

/// Both daily ratios must reach this for a day to count as goal-met.
pub const GOAL_MET_RATIO: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, FromRow)]
pub struct DayTotals {
    pub day: Date,
    pub calories: f64,
    pub protein: f64,
}

/// `value / goal`, or 0 when the goal is unset.
pub fn ratio(value: f64, goal: f64) -> f64 {
    if goal > 0.0 && value.is_finite() {
        value / goal
    } else {
        0.0
    }
}

pub fn is_goal_met(goals: Goals, calories: f64, protein: f64) -> bool {
    ratio(calories, goals.calorie_goal) >= GOAL_MET_RATIO
        && ratio(protein, goals.protein_goal) >= GOAL_MET_RATIO
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivitySnapshot {
    pub today: Date,
    pub calorie_ratio: f64,
    pub protein_ratio: f64,
    pub lifetime_calories: f64,
    pub lifetime_protein: f64,
    goal_met_days: BTreeSet<Date>,
}

impl ActivitySnapshot {
    /// `days` may come in any order; duplicate dates are summed.
    pub fn build(goals: Goals, days: &[DayTotals], today: Date) -> Self {
        let mut merged: std::collections::BTreeMap<Date, (f64, f64)> = Default::default();
        for d in days {
            let entry = merged.entry(d.day).or_insert((0.0, 0.0));
            entry.0 += d.calories;
            entry.1 += d.protein;
        }

        let (today_calories, today_protein) = merged.get(&today).copied().unwrap_or((0.0, 0.0));
        let goal_met_days = merged
            .iter()
            .filter(|(day, (cal, prot))| **day <= today && is_goal_met(goals, *cal, *prot))
            .map(|(day, _)| *day)
            .collect();

        Self {
            today,
            calorie_ratio: ratio(today_calories, goals.calorie_goal),
            protein_ratio: ratio(today_protein, goals.protein_goal),
            lifetime_calories: merged.values().map(|(c, _)| c).sum(),
            lifetime_protein: merged.values().map(|(_, p)| p).sum(),
            goal_met_days,
        }
    }

    pub fn today_goal_met(&self) -> bool {
        self.calorie_ratio >= GOAL_MET_RATIO && self.protein_ratio >= GOAL_MET_RATIO
    }

    pub fn goal_days_total(&self) -> u32 {
        self.goal_met_days.len() as u32
    }

    /// Goal-met days in the `window_days` days ending today, inclusive.
    pub fn goal_days_within(&self, window_days: u32) -> u32 {
        if window_days == 0 {
            return 0;
        }
        let start = self.today - Duration::days(i64::from(window_days) - 1);
        self.goal_met_days.range(start..=self.today).count() as u32
    }

    /// Consecutive goal-met days counting backward from today; 0 if today is not met.
    pub fn current_streak(&self) -> u32 {
        let mut streak = 0;
        let mut cursor = self.today;
        while self.goal_met_days.contains(&cursor) {
            streak += 1;
            match cursor.previous_day() {
                Some(prev) => cursor = prev,
                None => break,
            }
        }
        streak
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    const GOALS: Goals = Goals {
        calorie_goal: 2000.0,
        protein_goal: 100.0,
    };

    fn day(d: Date, calories: f64, protein: f64) -> DayTotals {
        DayTotals {
            day: d,
            calories,
            protein,
        }
    }

    #[test]
    fn ratio_guards_zero_goal() {
        assert_eq!(ratio(500.0, 0.0), 0.0);
        assert_eq!(ratio(500.0, -10.0), 0.0);
        assert_eq!(ratio(500.0, 1000.0), 0.5);
    }

    #[test]
    fn goal_met_needs_both_ratios() {
        assert!(is_goal_met(GOALS, 1600.0, 80.0));
        assert!(!is_goal_met(GOALS, 1600.0, 79.0));
        assert!(!is_goal_met(GOALS, 1500.0, 120.0));
    }

    #[test]
    fn empty_history() {
        let s = ActivitySnapshot::build(GOALS, &[], date!(2024 - 05 - 10));
        assert_eq!(s.calorie_ratio, 0.0);
        assert_eq!(s.goal_days_total(), 0);
        assert_eq!(s.current_streak(), 0);
        assert_eq!(s.lifetime_calories, 0.0);
    }

    #[test]
    fn today_ratios_and_lifetime_sums() {
        let today = date!(2024 - 05 - 10);
        let s = ActivitySnapshot::build(
            GOALS,
            &[day(today, 1000.0, 50.0), day(date!(2024 - 05 - 01), 3000.0, 150.0)],
            today,
        );
        assert_eq!(s.calorie_ratio, 0.5);
        assert_eq!(s.protein_ratio, 0.5);
        assert_eq!(s.lifetime_calories, 4000.0);
        assert_eq!(s.lifetime_protein, 200.0);
        assert!(!s.today_goal_met());
    }

    #[test]
    fn duplicate_dates_are_merged() {
        let today = date!(2024 - 05 - 10);
        let s = ActivitySnapshot::build(
            GOALS,
            &[day(today, 900.0, 45.0), day(today, 900.0, 45.0)],
            today,
        );
        assert!(s.today_goal_met());
        assert_eq!(s.goal_days_total(), 1);
    }

    #[test]
    fn streak_counts_back_from_today_and_stops_at_gap() {
        let today = date!(2024 - 05 - 10);
        let days = [
            day(date!(2024 - 05 - 10), 2000.0, 100.0),
            day(date!(2024 - 05 - 09), 2000.0, 100.0),
            day(date!(2024 - 05 - 08), 2000.0, 100.0),
            // gap on the 7th
            day(date!(2024 - 05 - 06), 2000.0, 100.0),
        ];
        let s = ActivitySnapshot::build(GOALS, &days, today);
        assert_eq!(s.current_streak(), 3);
        assert_eq!(s.goal_days_total(), 4);
    }

    #[test]
    fn streak_is_zero_when_today_not_met() {
        let today = date!(2024 - 05 - 10);
        let days = [
            day(date!(2024 - 05 - 09), 2000.0, 100.0),
            day(date!(2024 - 05 - 08), 2000.0, 100.0),
        ];
        let s = ActivitySnapshot::build(GOALS, &days, today);
        assert_eq!(s.current_streak(), 0);
    }

    #[test]
    fn window_includes_today_and_excludes_older_days() {
        let today = date!(2024 - 05 - 10);
        let days = [
            day(date!(2024 - 05 - 10), 2000.0, 100.0),
            day(date!(2024 - 05 - 04), 2000.0, 100.0), // 7th day back, inside
            day(date!(2024 - 05 - 03), 2000.0, 100.0), // 8th day back, outside
            day(date!(2024 - 04 - 20), 2000.0, 100.0),
        ];
        let s = ActivitySnapshot::build(GOALS, &days, today);
        assert_eq!(s.goal_days_within(7), 2);
        assert_eq!(s.goal_days_within(30), 4);
        assert_eq!(s.goal_days_within(0), 0);
    }

    #[test]
    fn future_days_do_not_count_as_goal_met() {
        let today = date!(2024 - 05 - 10);
        let s = ActivitySnapshot::build(GOALS, &[day(date!(2024 - 05 - 11), 2000.0, 100.0)], today);
        assert_eq!(s.goal_days_total(), 0);
    }
}
