use serde::Serialize;
use tracing::warn;

use super::client::{extract_block, LanguageModel, LlmError};

pub const BUSY_REPLY: &str = "I'm currently experiencing high demand. Please wait a moment and try your \
     question again. In the meantime, focus on balanced nutrition with plenty of vegetables, lean \
     proteins, and stay hydrated!";

#[derive(Debug, Clone, Default)]
pub struct WorkoutLine {
    pub exercise: String,
    pub duration_minutes: i32,
    pub calories_burned: f64,
}

/// What the assistant knows about the user's day.
#[derive(Debug, Clone, Default)]
pub struct DayContext {
    pub name: String,
    pub goal_type: String,
    pub calorie_goal: f64,
    pub protein_goal: f64,
    pub calories: f64,
    pub protein: f64,
    pub fat: f64,
    pub carbs: f64,
    pub fiber: f64,
    pub burned: f64,
    pub workouts: Vec<WorkoutLine>,
}

impl DayContext {
    pub fn net_calories(&self) -> f64 {
        self.calories - self.burned
    }

    pub fn remaining_calories(&self) -> f64 {
        (self.calorie_goal - self.net_calories()).max(0.0)
    }

    pub fn remaining_protein(&self) -> f64 {
        (self.protein_goal - self.protein).max(0.0)
    }

    fn percent(value: f64, goal: f64) -> f64 {
        if goal > 0.0 {
            value / goal * 100.0
        } else {
            0.0
        }
    }

    pub fn render(&self) -> String {
        let workouts = if self.workouts.is_empty() {
            "- No workouts logged today".to_string()
        } else {
            self.workouts
                .iter()
                .map(|w| {
                    format!(
                        "- {}: {} minutes ({:.0} calories burned)",
                        w.exercise, w.duration_minutes, w.calories_burned
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        };
        format!(
            "User context:
- Name: {name}
- Goal: {goal}
- Daily calorie goal: {cal_goal:.0}
- Daily protein goal: {prot_goal:.0}g

Today's nutrition:
- Calories consumed: {cal:.0}
- Calories burned through exercise: {burned:.0}
- Net calories: {net:.0}
- Protein consumed: {prot:.1}g
- Fat: {fat:.1}g
- Carbs: {carbs:.1}g
- Fiber: {fiber:.1}g

Today's workouts:
{workouts}

Progress:
- Calories: {net:.0}/{cal_goal:.0} ({cal_pct:.1}%)
- Protein: {prot:.1}/{prot_goal:.0}g ({prot_pct:.1}%)",
            name = self.name,
            goal = self.goal_type,
            cal_goal = self.calorie_goal,
            prot_goal = self.protein_goal,
            cal = self.calories,
            burned = self.burned,
            net = self.net_calories(),
            prot = self.protein,
            fat = self.fat,
            carbs = self.carbs,
            fiber = self.fiber,
            cal_pct = Self::percent(self.net_calories(), self.calorie_goal),
            prot_pct = Self::percent(self.protein, self.protein_goal),
        )
    }
}

pub fn chat_prompt(ctx: &DayContext, message: &str) -> String {
    format!(
        "You are a helpful nutrition and fitness assistant. Answer the user's question with accurate, practical advice.

{}

User question: \"{}\"

Give a helpful, concise response. For nutrition or fitness questions give specific, actionable advice, and suggest common, easily available foods. Keep it conversational and encouraging.",
        ctx.render(),
        message.trim()
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub response: String,
    pub ai_powered: bool,
    pub rate_limited: bool,
}

/// Soft model failures turn into a canned reply; anything else is returned.
pub async fn chat(model: &dyn LanguageModel, ctx: &DayContext, message: &str) -> Result<ChatReply, LlmError> {
    match model.generate(&chat_prompt(ctx, message)).await {
        Ok(text) => Ok(ChatReply {
            response: text.trim().to_string(),
            ai_powered: true,
            rate_limited: false,
        }),
        Err(e) if e.is_soft() => {
            warn!(error = %e, "chat falling back to canned reply");
            Ok(ChatReply {
                response: BUSY_REPLY.to_string(),
                ai_powered: false,
                rate_limited: matches!(e, LlmError::RateLimited),
            })
        }
        Err(e) => Err(e),
    }
}

pub fn recommendation_prompt(ctx: &DayContext, foods: &[String]) -> String {
    format!(
        "You are a professional nutritionist. Generate personalized nutrition recommendations for the rest of today.

{}

Available foods: {}

Give 3-4 specific, actionable recommendations about meeting the remaining calorie ({:.0}) and protein ({:.0}g) targets, portion sizes and meal timing, and advice for the user's goal. Each recommendation is 1-2 sentences.

Respond with ONLY a JSON array of strings: [\"recommendation 1\", \"recommendation 2\", \"recommendation 3\"]",
        ctx.render(),
        if foods.is_empty() { "any common foods".to_string() } else { foods.join(", ") },
        ctx.remaining_calories(),
        ctx.remaining_protein(),
    )
}

/// Rule-based advice used when the model cannot answer.
pub fn fallback_recommendations(ctx: &DayContext) -> Vec<String> {
    let remaining_calories = ctx.remaining_calories();
    let remaining_protein = ctx.remaining_protein();
    let mut out = Vec::new();

    if remaining_calories > 200.0 {
        if remaining_protein > 10.0 {
            out.push(format!(
                "You need {:.0} more calories and {:.1}g more protein today. Try adding lean protein sources like chicken breast, fish, or Greek yogurt.",
                remaining_calories, remaining_protein
            ));
        } else {
            out.push(format!(
                "You need {:.0} more calories today. Consider healthy options like nuts, avocado, or whole grains.",
                remaining_calories
            ));
        }
    } else if remaining_protein > 5.0 {
        out.push(format!(
            "You're close to your calorie goal but need {:.1}g more protein. Try low-calorie protein sources like egg whites or lean fish.",
            remaining_protein
        ));
    } else {
        out.push("Great job! You're on track with your nutrition goals today. Keep up the good work!".to_string());
    }

    match ctx.goal_type.as_str() {
        "gain" => out.push(
            "For muscle gain, focus on protein-rich foods and don't forget healthy carbs for energy. Consider post-workout meals with both protein and carbs.".to_string(),
        ),
        "loss" => out.push(
            "For weight loss, prioritize protein to maintain muscle mass and include plenty of vegetables for nutrients and satiety.".to_string(),
        ),
        _ => {}
    }
    out
}

fn recommendations_from_response(response: &str) -> Option<Vec<String>> {
    let list: Vec<String> = serde_json::from_str(extract_block(response, '[', ']')?).ok()?;
    let list: Vec<String> = list
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    (!list.is_empty()).then_some(list)
}

/// Returns the recommendations and whether the model produced them.
pub async fn recommend(model: &dyn LanguageModel, ctx: &DayContext, foods: &[String]) -> (Vec<String>, bool) {
    match model.generate(&recommendation_prompt(ctx, foods)).await {
        Ok(text) => match recommendations_from_response(&text) {
            Some(list) => (list, true),
            None => {
                warn!("recommendation answer unusable, using rules");
                (fallback_recommendations(ctx), false)
            }
        },
        Err(e) => {
            warn!(error = %e, "recommendation model call failed, using rules");
            (fallback_recommendations(ctx), false)
        }
    }
}
