use serde::Serialize;
use tracing::{debug, instrument};

use super::repo::{self, Food};
use crate::{ai::parsing::{estimate_food, NutritionEstimate}, state::AppState};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Nutrients {
    pub calories: f64,
    pub protein: f64,
    pub fat: f64,
    pub carbs: f64,
    pub fiber: f64,
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

impl Nutrients {
    /// Values for `grams` of a food given per 100 g, to one decimal.
    pub fn scaled(&self, grams: f64) -> Nutrients {
        let k = grams / 100.0;
        Nutrients {
            calories: round1(self.calories * k),
            protein: round1(self.protein * k),
            fat: round1(self.fat * k),
            carbs: round1(self.carbs * k),
            fiber: round1(self.fiber * k),
        }
    }

    pub fn sum<'a>(items: impl IntoIterator<Item = &'a Nutrients>) -> Nutrients {
        let mut t = Nutrients::default();
        for n in items {
            t.calories += n.calories;
            t.protein += n.protein;
            t.fat += n.fat;
            t.carbs += n.carbs;
            t.fiber += n.fiber;
        }
        Nutrients {
            calories: round1(t.calories),
            protein: round1(t.protein),
            fat: round1(t.fat),
            carbs: round1(t.carbs),
            fiber: round1(t.fiber),
        }
    }
}

impl From<&Food> for Nutrients {
    fn from(f: &Food) -> Self {
        Self {
            calories: f.calories_per_100g,
            protein: f.protein_per_100g,
            fat: f.fat_per_100g,
            carbs: f.carbs_per_100g,
            fiber: f.fiber_per_100g,
        }
    }
}

impl From<&NutritionEstimate> for Nutrients {
    fn from(e: &NutritionEstimate) -> Self {
        Self {
            calories: e.calories_per_100g,
            protein: e.protein_per_100g,
            fat: e.fat_per_100g,
            carbs: e.carbs_per_100g,
            fiber: e.fiber_per_100g,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Database,
    AiEstimate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoodMatch {
    pub name: String,
    pub per_100g: Nutrients,
    pub source: Source,
    pub confidence: String,
}

impl From<&Food> for FoodMatch {
    fn from(f: &Food) -> Self {
        Self {
            name: f.name.clone(),
            per_100g: f.into(),
            source: Source::Database,
            confidence: "high".into(),
        }
    }
}

impl From<NutritionEstimate> for FoodMatch {
    fn from(e: NutritionEstimate) -> Self {
        Self {
            per_100g: (&e).into(),
            name: e.name,
            source: Source::AiEstimate,
            confidence: e.confidence,
        }
    }
}

/// Reference table matches, or a single model estimate when there are none.
#[instrument(skip(state))]
pub async fn find(state: &AppState, name: &str, limit: i64) -> anyhow::Result<Vec<FoodMatch>> {
    let foods = repo::search(&state.db, name, limit).await?;
    if !foods.is_empty() {
        debug!(count = foods.len(), "nutrition found in table");
        return Ok(foods.iter().map(FoodMatch::from).collect());
    }
    let estimate = estimate_food(state.model.as_ref(), name).await;
    Ok(vec![estimate.into()])
}

/// Best single match for `name`.
pub async fn best(state: &AppState, name: &str) -> anyhow::Result<FoodMatch> {
    find(state, name, 1)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("no nutrition match for '{}'", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rice() -> Food {
        Food {
            id: 1,
            name: "rice".into(),
            calories_per_100g: 130.0,
            protein_per_100g: 2.7,
            fat_per_100g: 0.3,
            carbs_per_100g: 28.2,
            fiber_per_100g: 0.4,
        }
    }

    #[test]
    fn scaling_rounds_to_one_decimal() {
        let n = Nutrients::from(&rice()).scaled(200.0);
        assert_eq!(n.calories, 260.0);
        assert_eq!(n.protein, 5.4);
        assert_eq!(n.carbs, 56.4);
        assert_eq!(Nutrients::from(&rice()).scaled(33.0).calories, 42.9);
    }

    #[test]
    fn sums_items() {
        let a = Nutrients::from(&rice()).scaled(100.0);
        let total = Nutrients::sum([&a, &a]);
        assert_eq!(total.calories, 260.0);
        assert_eq!(total.protein, 5.4);
    }

    #[test]
    fn estimate_match_is_marked() {
        let m = FoodMatch::from(NutritionEstimate::fallback("Mystery"));
        assert_eq!(m.source, Source::AiEstimate);
        assert_eq!(m.confidence, "low");
        assert_eq!(m.per_100g.calories, 200.0);
        assert_eq!(FoodMatch::from(&rice()).source, Source::Database);
    }
}
