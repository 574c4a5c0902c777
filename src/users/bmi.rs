//! Body-mass index and default daily goal estimates.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalType {
    Loss,
    Maintenance,
    Gain,
}

impl GoalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalType::Loss => "loss",
            GoalType::Maintenance => "maintenance",
            GoalType::Gain => "gain",
        }
    }
}

impl fmt::Display for GoalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GoalType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "loss" => Ok(GoalType::Loss),
            "maintenance" => Ok(GoalType::Maintenance),
            "gain" => Ok(GoalType::Gain),
            other => Err(format!("unknown goal type '{}'", other)),
        }
    }
}

/// weight (kg) / height (m)^2, rounded to one decimal.
pub fn calculate_bmi(weight_kg: f64, height_cm: f64) -> f64 {
    let height_m = height_cm / 100.0;
    let bmi = weight_kg / (height_m * height_m);
    (bmi * 10.0).round() / 10.0
}

pub fn categorize_bmi(bmi: f64) -> &'static str {
    if bmi < 18.5 {
        "Underweight"
    } else if bmi <= 24.9 {
        "Normal"
    } else if bmi <= 29.9 {
        "Overweight"
    } else {
        "Obese"
    }
}

pub fn suggest_goal_type(bmi: f64) -> GoalType {
    if bmi < 18.5 {
        GoalType::Gain
    } else if bmi >= 25.0 {
        GoalType::Loss
    } else {
        GoalType::Maintenance
    }
}

/// Mifflin-St Jeor BMR for a 25 year old male at moderate activity (x1.55),
/// shifted by 500 kcal for loss/gain.
pub fn calculate_calorie_goal(weight_kg: f64, height_cm: f64, goal: GoalType) -> f64 {
    const AGE: f64 = 25.0;
    let bmr = 10.0 * weight_kg + 6.25 * height_cm - 5.0 * AGE + 5.0;
    let tdee = bmr * 1.55;
    match goal {
        GoalType::Loss => (tdee - 500.0).round(),
        GoalType::Gain => (tdee + 500.0).round(),
        GoalType::Maintenance => tdee.round(),
    }
}

/// Grams of protein per kg of body weight, by goal.
pub fn calculate_protein_goal(weight_kg: f64, goal: GoalType) -> f64 {
    let per_kg = match goal {
        GoalType::Gain => 2.2,
        GoalType::Loss => 2.0,
        GoalType::Maintenance => 1.6,
    };
    (weight_kg * per_kg).round()
}

/// Everything derived from height/weight when a profile is created or edited.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyProfile {
    pub bmi: f64,
    pub bmi_category: &'static str,
    pub goal_type: GoalType,
    pub calorie_goal: f64,
    pub protein_goal: f64,
}

impl BodyProfile {
    /// Explicit goals win over the estimates; a missing goal type is suggested from BMI.
    pub fn derive(
        height_cm: f64,
        weight_kg: f64,
        goal_type: Option<GoalType>,
        calorie_goal: Option<f64>,
        protein_goal: Option<f64>,
    ) -> Self {
        let bmi = calculate_bmi(weight_kg, height_cm);
        let goal_type = goal_type.unwrap_or_else(|| suggest_goal_type(bmi));
        Self {
            bmi,
            bmi_category: categorize_bmi(bmi),
            goal_type,
            calorie_goal: calorie_goal
                .filter(|g| *g > 0.0)
                .unwrap_or_else(|| calculate_calorie_goal(weight_kg, height_cm, goal_type)),
            protein_goal: protein_goal
                .filter(|g| *g > 0.0)
                .unwrap_or_else(|| calculate_protein_goal(weight_kg, goal_type)),
        }
    }
}
