use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    achievements::engine::EarnedAchievement,
    ai::parsing::ParsedItem,
    meals::repo::{Meal, MealTotals, NewMeal},
    nutrition::lookup::{FoodMatch, Nutrients, Source},
};

pub const MAX_MEAL_TEXT: usize = 500;

#[derive(Debug, Deserialize)]
pub struct DayQuery {
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateMealRequest {
    pub meal_text: String,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub fat: Option<f64>,
    pub carbs: Option<f64>,
    pub fiber: Option<f64>,
}

fn amount(field: &str, v: Option<f64>) -> Result<f64, String> {
    match v {
        None => Ok(0.0),
        Some(x) if x.is_finite() && x >= 0.0 => Ok(x),
        Some(_) => Err(format!("{} must be a non-negative number", field)),
    }
}

impl CreateMealRequest {
    /// Missing nutrient values count as zero.
    pub fn into_new_meal(self, day: Date) -> Result<NewMeal, String> {
        let meal_text = self.meal_text.trim().to_string();
        if meal_text.is_empty() {
            return Err("Meal description is required".into());
        }
        if meal_text.chars().count() > MAX_MEAL_TEXT {
            return Err("Meal description is too long".into());
        }
        Ok(NewMeal {
            meal_text,
            calories: amount("calories", self.calories)?,
            protein: amount("protein", self.protein)?,
            fat: amount("fat", self.fat)?,
            carbs: amount("carbs", self.carbs)?,
            fiber: amount("fiber", self.fiber)?,
            meal_date: day,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct MealsResponse {
    pub success: bool,
    pub date: Date,
    pub meals: Vec<Meal>,
    pub totals: MealTotals,
}

#[derive(Debug, Serialize)]
pub struct MealLoggedResponse {
    pub success: bool,
    pub meal: Meal,
    pub newly_earned: Vec<EarnedAchievement>,
}

#[derive(Debug, Serialize)]
pub struct MealDeletedResponse {
    pub success: bool,
    pub deleted_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct ParseMealRequest {
    pub meal_text: String,
}

#[derive(Debug, Serialize)]
pub struct ParsedItemNutrition {
    pub name: String,
    pub quantity_g: f64,
    pub matched_food: String,
    pub source: Source,
    pub confidence: String,
    pub nutrition: Nutrients,
}

impl ParsedItemNutrition {
    pub fn new(item: ParsedItem, food: FoodMatch) -> Self {
        Self {
            nutrition: food.per_100g.scaled(item.quantity_g),
            name: item.name,
            quantity_g: item.quantity_g,
            matched_food: food.name,
            source: food.source,
            confidence: food.confidence,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ParseMealResponse {
    pub success: bool,
    pub original_text: String,
    pub items: Vec<ParsedItemNutrition>,
    pub totals: Nutrients,
    pub ai_powered: bool,
}
