//! Turning free text into food items, and estimating nutrition for foods the
//! reference table does not know. Both degrade to local heuristics when the
//! model is unavailable or answers with something unusable.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::client::{extract_block, LanguageModel};

pub const DEFAULT_QUANTITY_G: f64 = 100.0;
pub const GRAMS_PER_CUP: f64 = 200.0;
/// Each item costs a nutrition lookup, which may itself call the model.
pub const MAX_ITEMS: usize = 20;

lazy_static! {
    static ref SEGMENT_SPLIT: Regex = Regex::new(r"(?i)\s*(?:,|;|\+|\band\b|\bwith\b)\s*").unwrap();
    static ref QTY_FIRST: Regex =
        Regex::new(r"(?i)^(\d+(?:\.\d+)?)\s*(?:g|grams?)\s+(?:of\s+)?(.+)$").unwrap();
    static ref QTY_LAST: Regex = Regex::new(r"(?i)^(.+?)\s+(\d+(?:\.\d+)?)\s*(?:g|grams?)$").unwrap();
    static ref CUPS: Regex = Regex::new(r"(?i)^(\d+(?:\.\d+)?)\s*cups?\s+(?:of\s+)?(.+)$").unwrap();
    static ref NON_WORD: Regex = Regex::new(r"[^\w\s]").unwrap();
    static ref SPACES: Regex = Regex::new(r"\s+").unwrap();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedItem {
    pub name: String,
    pub quantity_g: f64,
}

#[derive(Debug, Deserialize)]
struct ParsedMeal {
    items: Vec<ParsedItem>,
}

fn clean_name(raw: &str) -> String {
    let stripped = NON_WORD.replace_all(raw, "");
    SPACES.replace_all(stripped.trim(), " ").to_lowercase()
}

fn item(name: &str, quantity_g: f64) -> Option<ParsedItem> {
    let name = clean_name(name);
    (!name.is_empty() && quantity_g.is_finite() && quantity_g > 0.0).then_some(ParsedItem { name, quantity_g })
}

fn parse_segment(segment: &str) -> Option<ParsedItem> {
    if let Some(c) = QTY_FIRST.captures(segment) {
        return item(&c[2], c[1].parse().ok()?);
    }
    if let Some(c) = QTY_LAST.captures(segment) {
        return item(&c[1], c[2].parse().ok()?);
    }
    if let Some(c) = CUPS.captures(segment) {
        let cups: f64 = c[1].parse().ok()?;
        return item(&c[2], cups * GRAMS_PER_CUP);
    }
    None
}

/// Heuristic parser: `250g chicken`, `chicken 250g` and `2 cups rice`, split on
/// commas and "and". With nothing recognised, the whole text becomes one
/// 100 g item.
pub fn fallback_parse(text: &str) -> Vec<ParsedItem> {
    let items: Vec<ParsedItem> = SEGMENT_SPLIT
        .split(text.trim())
        .filter(|s| !s.is_empty())
        .filter_map(parse_segment)
        .take(MAX_ITEMS)
        .collect();
    if !items.is_empty() {
        return items;
    }
    item(text, DEFAULT_QUANTITY_G).into_iter().collect()
}

pub fn meal_prompt(text: &str) -> String {
    format!(
        r#"You are a nutrition expert. Parse the following meal description and extract food items with their quantities.

Meal description: "{text}"

Respond with ONLY a valid JSON object in this exact format:
{{"items": [{{"name": "food_name_in_lowercase", "quantity_g": number_in_grams}}]}}

Rules:
1. Convert all quantities to grams (1 cup rice is about 200g, 1 medium apple about 180g).
2. Use simple, searchable food names ("chicken breast", not "grilled chicken breast").
3. If no quantity is specified, assume 100g.
4. Include every food mentioned.
5. Only respond with the JSON, no additional text."#
    )
}

fn items_from_response(response: &str) -> Option<Vec<ParsedItem>> {
    let block = extract_block(response, '{', '}')?;
    let parsed: ParsedMeal = serde_json::from_str(block).ok()?;
    let items: Vec<ParsedItem> = parsed
        .items
        .into_iter()
        .filter_map(|i| item(&i.name, i.quantity_g))
        .take(MAX_ITEMS)
        .collect();
    (!items.is_empty()).then_some(items)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MealParse {
    pub items: Vec<ParsedItem>,
    pub ai_powered: bool,
}

pub async fn parse_meal(model: &dyn LanguageModel, text: &str) -> MealParse {
    match model.generate(&meal_prompt(text)).await {
        Ok(response) => {
            if let Some(items) = items_from_response(&response) {
                debug!(count = items.len(), "meal parsed by model");
                return MealParse {
                    items,
                    ai_powered: true,
                };
            }
            warn!("model answer unusable, using fallback parser");
        }
        Err(e) => warn!(error = %e, "meal parse model call failed, using fallback parser"),
    }
    MealParse {
        items: fallback_parse(text),
        ai_powered: false,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NutritionEstimate {
    pub name: String,
    pub calories_per_100g: f64,
    pub protein_per_100g: f64,
    pub fat_per_100g: f64,
    pub carbs_per_100g: f64,
    pub fiber_per_100g: f64,
    pub confidence: String,
}

impl NutritionEstimate {
    /// Conservative numbers for an unknown food.
    pub fn fallback(name: &str) -> Self {
        Self {
            name: name.trim().to_lowercase(),
            calories_per_100g: 200.0,
            protein_per_100g: 5.0,
            fat_per_100g: 3.0,
            carbs_per_100g: 35.0,
            fiber_per_100g: 3.0,
            confidence: "low".into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawEstimate {
    calories: Option<f64>,
    protein: Option<f64>,
    fat: Option<f64>,
    carbs: Option<f64>,
    fiber: Option<f64>,
    confidence: Option<String>,
}

pub fn estimate_prompt(name: &str) -> String {
    format!(
        r#"You are a professional nutritionist and food database expert. Give the nutrition values for "{name}" per 100 grams, based on standard food composition tables (USDA, Indian food composition tables, etc.).

Respond with ONLY a valid JSON object in this exact format:
{{"calories": number, "protein": grams, "fat": grams, "carbs": grams, "fiber": grams, "confidence": "high" | "medium" | "low"}}

Be conservative: better to underestimate than overestimate. Set confidence by how common the food is."#
    )
}

fn non_negative(v: Option<f64>) -> f64 {
    v.filter(|x| x.is_finite()).unwrap_or(0.0).max(0.0)
}

fn estimate_from_response(name: &str, response: &str) -> Option<NutritionEstimate> {
    let raw: RawEstimate = serde_json::from_str(extract_block(response, '{', '}')?).ok()?;
    let calories = raw.calories.filter(|c| c.is_finite() && *c > 0.0)?;
    raw.protein?;
    let confidence = match raw.confidence.as_deref().map(str::to_lowercase).as_deref() {
        Some("high") => "high",
        Some("medium") => "medium",
        _ => "low",
    };
    Some(NutritionEstimate {
        name: name.trim().to_lowercase(),
        calories_per_100g: calories,
        protein_per_100g: non_negative(raw.protein),
        fat_per_100g: non_negative(raw.fat),
        carbs_per_100g: non_negative(raw.carbs),
        fiber_per_100g: non_negative(raw.fiber),
        confidence: confidence.into(),
    })
}

/// Per-100 g estimate; never fails, the fallback carries confidence "low".
pub async fn estimate_food(model: &dyn LanguageModel, name: &str) -> NutritionEstimate {
    match model.generate(&estimate_prompt(name)).await {
        Ok(response) => estimate_from_response(name, &response).unwrap_or_else(|| {
            warn!(food = %name, "nutrition estimate unusable, using defaults");
            NutritionEstimate::fallback(name)
        }),
        Err(e) => {
            warn!(food = %name, error = %e, "nutrition estimate failed, using defaults");
            NutritionEstimate::fallback(name)
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;

    use crate::ai::client::{LanguageModel, LlmError};

    /// Answers every prompt with the same text, or fails rate-limited on `None`.
    pub struct Canned(pub Option<&'static str>);

    #[async_trait]
    impl LanguageModel for Canned {
        async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
            self.0.map(str::to_string).ok_or(LlmError::RateLimited)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::Canned;
    use super::*;

    fn p(name: &str, q: f64) -> ParsedItem {
        ParsedItem {
            name: name.into(),
            quantity_g: q,
        }
    }

    #[test]
    fn fallback_handles_the_three_shapes() {
        assert_eq!(fallback_parse("250g chicken"), vec![p("chicken", 250.0)]);
        assert_eq!(fallback_parse("Chicken Breast 150 grams"), vec![p("chicken breast", 150.0)]);
        assert_eq!(fallback_parse("2 cups rice"), vec![p("rice", 400.0)]);
    }

    #[test]
    fn fallback_splits_segments() {
        assert_eq!(
            fallback_parse("200g paneer, 1 cup dal and 50g of spinach"),
            vec![p("paneer", 200.0), p("dal", 200.0), p("spinach", 50.0)]
        );
    }

    #[test]
    fn fallback_defaults_to_one_hundred_grams() {
        assert_eq!(fallback_parse("a banana!"), vec![p("a banana", 100.0)]);
        assert!(fallback_parse("  ?! ").is_empty());
    }

    #[tokio::test]
    async fn model_json_is_extracted_from_prose() {
        let model = Canned(Some(
            "Here you go:\n```json\n{\"items\": [{\"name\": \"Rice\", \"quantity_g\": 400}, {\"name\": \"apple\", \"quantity_g\": 180}]}\n```",
        ));
        let parsed = parse_meal(&model, "2 cups rice and an apple").await;
        assert!(parsed.ai_powered);
        assert_eq!(parsed.items, vec![p("rice", 400.0), p("apple", 180.0)]);
    }

    #[tokio::test]
    async fn unusable_model_answer_falls_back() {
        let parsed = parse_meal(&Canned(Some("I cannot help with that")), "250g chicken").await;
        assert!(!parsed.ai_powered);
        assert_eq!(parsed.items, vec![p("chicken", 250.0)]);

        let parsed = parse_meal(&Canned(None), "chicken 250g").await;
        assert_eq!(parsed.items, vec![p("chicken", 250.0)]);
    }

    #[test]
    fn item_count_is_capped() {
        let many: Vec<String> = (0..30)
            .map(|i| format!(r#"{{"name": "food{i}", "quantity_g": 10}}"#))
            .collect();
        let response = format!(r#"{{"items": [{}]}}"#, many.join(","));
        let items = items_from_response(&response).unwrap();
        assert_eq!(items.len(), MAX_ITEMS);
        assert_eq!(items[0], p("food0", 10.0));

        let text = vec!["10g rice"; 30].join(", ");
        assert_eq!(fallback_parse(&text).len(), MAX_ITEMS);
    }

    #[tokio::test]
    async fn estimate_uses_model_values() {
        let model = Canned(Some(
            r#"{"calories": 297, "protein": 11.5, "fat": 3.7, "carbs": 50.2, "fiber": 4.9, "confidence": "Medium"}"#,
        ));
        let e = estimate_food(&model, "Chapathi").await;
        assert_eq!(e.name, "chapathi");
        assert_eq!(e.calories_per_100g, 297.0);
        assert_eq!(e.confidence, "medium");
    }

    #[tokio::test]
    async fn estimate_defaults_when_model_fails_or_lies() {
        let e = estimate_food(&Canned(None), "mystery stew").await;
        assert_eq!(e, NutritionEstimate::fallback("mystery stew"));
        assert_eq!(e.calories_per_100g, 200.0);
        assert_eq!(e.confidence, "low");

        let zero = estimate_food(&Canned(Some(r#"{"calories": 0, "protein": 1}"#)), "air").await;
        assert_eq!(zero.confidence, "low");
        assert_eq!(zero.calories_per_100g, 200.0);
    }
}
