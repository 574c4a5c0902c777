use serde::Serialize;
use sqlx::PgPool;
use time::Date;

use crate::{
    ai::advice::{DayContext, WorkoutLine},
    error::{AppError, AppResult},
    meals,
    users::repo::User,
    workouts,
};

/// Gathers a user's goals, intake and workouts for one day.
pub async fn load_day_context(db: &PgPool, user_id: i64, day: Date) -> AppResult<DayContext> {
    let user = User::find_by_id(db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    let totals = meals::repo::totals_for_day(db, user_id, day).await?;
    let workouts = workouts::repo::list_for_day(db, user_id, day).await?;

    Ok(DayContext {
        name: user.name,
        goal_type: user.goal_type,
        calorie_goal: user.calorie_goal,
        protein_goal: user.protein_goal,
        calories: totals.calories,
        protein: totals.protein,
        fat: totals.fat,
        carbs: totals.carbs,
        fiber: totals.fiber,
        burned: workouts::repo::total_burned(&workouts),
        workouts: workouts
            .into_iter()
            .map(|w| WorkoutLine {
                exercise: w.exercise_name,
                duration_minutes: w.duration_minutes,
                calories_burned: w.calories_burned,
            })
            .collect(),
    })
}

/// Share of `goal` reached, in whole percent within 0..=100.
pub fn capped_percentage(value: f64, goal: f64) -> f64 {
    if goal <= 0.0 || !value.is_finite() {
        return 0.0;
    }
    (value / goal * 100.0).round().clamp(0.0, 100.0)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalorieProgress {
    pub consumed: f64,
    pub burned: f64,
    pub net: f64,
    pub goal: f64,
    pub remaining: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProteinProgress {
    pub consumed: f64,
    pub goal: f64,
    pub remaining: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Macros {
    pub fat: f64,
    pub carbs: f64,
    pub fiber: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayProgress {
    pub calories: CalorieProgress,
    pub protein: ProteinProgress,
    pub macros: Macros,
    pub workout_count: usize,
}

impl From<&DayContext> for DayProgress {
    fn from(ctx: &DayContext) -> Self {
        let net = ctx.net_calories();
        DayProgress {
            calories: CalorieProgress {
                consumed: ctx.calories,
                burned: ctx.burned,
                net,
                goal: ctx.calorie_goal,
                remaining: ctx.remaining_calories(),
                percentage: capped_percentage(net, ctx.calorie_goal),
            },
            protein: ProteinProgress {
                consumed: ctx.protein,
                goal: ctx.protein_goal,
                remaining: ctx.remaining_protein(),
                percentage: capped_percentage(ctx.protein, ctx.protein_goal),
            },
            macros: Macros {
                fat: ctx.fat,
                carbs: ctx.carbs,
                fiber: ctx.fiber,
            },
            workout_count: ctx.workouts.len(),
        }
    }
}
