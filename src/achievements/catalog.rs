//! Achievement definitions and the rule table that scores them.
//!
//! A definition's `(achievement_type, metric)` pair selects a [`Rule`]; the
//! rule reads one number out of an [`ActivitySnapshot`] and the definition's
//! target turns it into a progress ratio. Names are display text only.

use std::str::FromStr;

use serde::Serialize;
use sqlx::FromRow;

use super::stats::ActivitySnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    Daily,
    Weekly,
    Monthly,
    Total,
    Streak,
}

impl FromStr for Cadence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Cadence::Daily),
            "weekly" => Ok(Cadence::Weekly),
            "monthly" => Ok(Cadence::Monthly),
            "total" => Ok(Cadence::Total),
            "streak" => Ok(Cadence::Streak),
            other => Err(format!("unknown achievement type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Calories,
    Protein,
    /// Both daily goals together, i.e. goal-met days.
    Both,
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "calories" => Ok(Metric::Calories),
            "protein" => Ok(Metric::Protein),
            "both" => Ok(Metric::Both),
            other => Err(format!("unknown achievement metric '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nutrient {
    Calories,
    Protein,
}

pub const WEEK_DAYS: u32 = 7;
pub const MONTH_DAYS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Today's consumed / goal ratio.
    DailyRatio(Nutrient),
    /// 1 when today is goal-met, else 0.
    BalancedDay,
    /// Goal-met days, ever (`None`) or in a trailing window ending today.
    GoalDays { window_days: Option<u32> },
    /// Current run of consecutive goal-met days ending today.
    Streak,
    /// Everything ever logged of one nutrient.
    LifetimeTotal(Nutrient),
}

impl Rule {
    pub fn resolve(cadence: Cadence, metric: Metric) -> Option<Rule> {
        use Cadence::*;
        match (cadence, metric) {
            (Daily, Metric::Calories) => Some(Rule::DailyRatio(Nutrient::Calories)),
            (Daily, Metric::Protein) => Some(Rule::DailyRatio(Nutrient::Protein)),
            (Daily, Metric::Both) => Some(Rule::BalancedDay),
            (Weekly, Metric::Both) => Some(Rule::GoalDays {
                window_days: Some(WEEK_DAYS),
            }),
            (Monthly, Metric::Both) => Some(Rule::GoalDays {
                window_days: Some(MONTH_DAYS),
            }),
            (Total, Metric::Both) => Some(Rule::GoalDays { window_days: None }),
            (Total, Metric::Calories) => Some(Rule::LifetimeTotal(Nutrient::Calories)),
            (Total, Metric::Protein) => Some(Rule::LifetimeTotal(Nutrient::Protein)),
            (Streak, Metric::Both) => Some(Rule::Streak),
            _ => None,
        }
    }

    pub fn measure(&self, s: &ActivitySnapshot) -> f64 {
        match *self {
            Rule::DailyRatio(Nutrient::Calories) => s.calorie_ratio,
            Rule::DailyRatio(Nutrient::Protein) => s.protein_ratio,
            Rule::BalancedDay => {
                if s.today_goal_met() {
                    1.0
                } else {
                    0.0
                }
            }
            Rule::GoalDays { window_days: None } => f64::from(s.goal_days_total()),
            Rule::GoalDays {
                window_days: Some(days),
            } => f64::from(s.goal_days_within(days)),
            Rule::Streak => f64::from(s.current_streak()),
            Rule::LifetimeTotal(Nutrient::Calories) => s.lifetime_calories,
            Rule::LifetimeTotal(Nutrient::Protein) => s.lifetime_protein,
        }
    }
}

/// A measured value against its target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub value: f64,
    pub target: f64,
}

impl Evaluation {
    pub fn new(value: f64, target: Option<f64>) -> Self {
        let target = target.filter(|t| t.is_finite() && *t > 0.0).unwrap_or(1.0);
        let value = if value.is_finite() { value.max(0.0) } else { 0.0 };
        Self { value, target }
    }

    /// `value / target` clamped to `[0, 1]`; this is what gets stored.
    pub fn progress(&self) -> f64 {
        (self.value / self.target).clamp(0.0, 1.0)
    }

    pub fn is_earned(&self) -> bool {
        self.progress() >= 1.0
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AchievementDefinition {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub badge_icon: String,
    pub badge_color: String,
    pub category: String,
    pub achievement_type: String,
    pub metric: String,
    pub target_value: Option<f64>,
    pub target_unit: Option<String>,
}

impl AchievementDefinition {
    pub fn rule(&self) -> Result<Rule, String> {
        let cadence: Cadence = self.achievement_type.parse()?;
        let metric: Metric = self.metric.parse()?;
        Rule::resolve(cadence, metric).ok_or_else(|| {
            format!(
                "no rule for {} achievements measuring {}",
                self.achievement_type, self.metric
            )
        })
    }

    pub fn evaluate(&self, snapshot: &ActivitySnapshot) -> Result<Evaluation, String> {
        let rule = self.rule()?;
        Ok(Evaluation::new(rule.measure(snapshot), self.target_value))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::achievements::stats::DayTotals;
    use crate::users::repo::Goals;
    use time::{macros::date, Duration};

    const GOALS: Goals = Goals {
        calorie_goal: 2000.0,
        protein_goal: 100.0,
    };

    fn snapshot(days: &[(i64, f64, f64)]) -> ActivitySnapshot {
        let today = date!(2024 - 06 - 30);
        let rows: Vec<DayTotals> = days
            .iter()
            .map(|(back, c, p)| DayTotals {
                day: today - Duration::days(*back),
                calories: *c,
                protein: *p,
            })
            .collect();
        ActivitySnapshot::build(GOALS, &rows, today)
    }

    fn by_name<'a>(defs: &'a [AchievementDefinition], name: &str) -> &'a AchievementDefinition {
        defs.iter().find(|d| d.name == name).unwrap()
    }

    #[test]
    fn every_seeded_definition_resolves() {
        for d in fixtures::seeded() {
            assert!(d.rule().is_ok(), "{} should resolve", d.name);
        }
    }

    #[test]
    fn unknown_pairs_are_rejected() {
        assert_eq!(Rule::resolve(Cadence::Streak, Metric::Protein), None);
        let mut d = fixtures::seeded().remove(0);
        d.achievement_type = "hourly".into();
        assert!(d.rule().is_err());
    }

    #[test]
    fn daily_ratio_is_clamped_and_earned_at_goal() {
        let defs = fixtures::seeded();
        let s = snapshot(&[(0, 2600.0, 50.0)]);
        let cal = by_name(&defs, "Daily Calorie Goal").evaluate(&s).unwrap();
        assert_eq!(cal.progress(), 1.0);
        assert!(cal.is_earned());
        let prot = by_name(&defs, "Daily Protein Goal").evaluate(&s).unwrap();
        assert_eq!(prot.progress(), 0.5);
        assert!(!prot.is_earned());
    }

    #[test]
    fn balanced_day_uses_eighty_percent_threshold() {
        let defs = fixtures::seeded();
        let balanced = by_name(&defs, "Balanced Day");
        assert!(balanced.evaluate(&snapshot(&[(0, 1600.0, 80.0)])).unwrap().is_earned());
        assert!(!balanced.evaluate(&snapshot(&[(0, 1600.0, 70.0)])).unwrap().is_earned());
    }

    #[test]
    fn milestones_scale_by_target() {
        let defs = fixtures::seeded();
        let s = snapshot(&[(0, 2000.0, 100.0), (40, 2000.0, 100.0), (41, 10000.0, 300.0)]);
        assert!(by_name(&defs, "First Goal").evaluate(&s).unwrap().is_earned());
        let century = by_name(&defs, "Century Club").evaluate(&s).unwrap();
        assert_eq!(century.value, 3.0);
        assert!((century.progress() - 0.03).abs() < 1e-9);
        let protein = by_name(&defs, "Protein Master").evaluate(&s).unwrap();
        assert!((protein.progress() - 0.5).abs() < 1e-9);
        let calories = by_name(&defs, "Calorie Counter").evaluate(&s).unwrap();
        assert!((calories.progress() - 0.28).abs() < 1e-9);
    }

    #[test]
    fn weekly_window_and_streaks() {
        let defs = fixtures::seeded();
        let s = snapshot(&[
            (0, 2000.0, 100.0),
            (1, 2000.0, 100.0),
            (2, 2000.0, 100.0),
            (4, 2000.0, 100.0),
            (5, 2000.0, 100.0),
        ]);
        let warrior = by_name(&defs, "Weekly Warrior").evaluate(&s).unwrap();
        assert_eq!(warrior.value, 5.0);
        assert!(warrior.is_earned());
        assert!(!by_name(&defs, "Perfect Week").evaluate(&s).unwrap().is_earned());
        assert!(by_name(&defs, "3-Day Streak").evaluate(&s).unwrap().is_earned());
        let seven = by_name(&defs, "7-Day Streak").evaluate(&s).unwrap();
        assert_eq!(seven.value, 3.0);
        assert!(!seven.is_earned());
    }

    #[test]
    fn earned_iff_value_reaches_target() {
        for (value, target) in [(0.0, 3.0), (2.999, 3.0), (3.0, 3.0), (40.0, 3.0), (1.0, 1.0)] {
            let e = Evaluation::new(value, Some(target));
            assert_eq!(e.is_earned(), value >= target, "{value} vs {target}");
            assert!((0.0..=1.0).contains(&e.progress()));
        }
    }

    #[test]
    fn missing_or_bad_target_defaults_to_one() {
        assert_eq!(Evaluation::new(0.5, None).target, 1.0);
        assert_eq!(Evaluation::new(0.5, Some(0.0)).target, 1.0);
        assert_eq!(Evaluation::new(f64::NAN, Some(2.0)).progress(), 0.0);
        assert_eq!(Evaluation::new(-4.0, Some(2.0)).progress(), 0.0);
    }
}
