//! Prompt builders for meal analysis and the coach.

use serde_json::{Value, json};

use super::{ChatMessage, CompletionRequest, ModelInfo};
use crate::nutrition::{FoodEntry, MacroTotals};

pub const FOOD_SYSTEM: &str = "You are an expert in food analysis, specializing in Indian and \
international cuisine. You can identify food items, estimate portions, and calculate calories \
accurately.";

pub const INSIGHTS_SYSTEM: &str = "You are a nutrition expert AI assistant. Analyze meals and \
provide detailed nutritional insights.";

pub const COACH_SYSTEM: &str = "You are a friendly and supportive nutrition coach. Keep responses \
short, casual, and motivating. Focus on being helpful without being overwhelming. Use emojis \
occasionally to make responses more friendly.";

const COACH_GUIDELINES: &str = "You are a friendly and supportive nutrition coach. Keep your responses:
1. Short and sweet - aim for 2-3 sentences max
2. Casual and conversational - like a friend chatting
3. Positive and motivating
4. Specific and actionable - give clear, simple advice
5. Personal - reference their goals and food choices

If asked \"who are you?\", say you are their friendly nutrition coach who helps them eat better \
and reach their health goals.
If they mention food, acknowledge the choice and give one quick tip or healthier alternative.
If they ask about goals, ask one simple question and suggest a small, achievable step.
Avoid long paragraphs, jargon, and repeating earlier replies.";

/// A goal as the coach should see it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoalBrief<'a> {
    pub goal_type: &'a str,
    pub target_weight: Option<f64>,
    pub timeline_weeks: Option<i64>,
}

/// Everything that goes into a coach prompt.
#[derive(Debug, Clone, Copy)]
pub struct CoachPrompt<'a> {
    pub message: &'a str,
    /// Earlier turns, alternating user then assistant.
    pub context: &'a [String],
    pub goal: Option<GoalBrief<'a>>,
    pub today: Option<MacroTotals>,
}

fn food_item_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "food": {"type": "string"},
            "quantity": {"type": "number"},
            "portion": {"type": "string"},
            "calories_per_item": {"type": "number"},
            "total_calories": {"type": "number"},
            "confidence": {"type": "number"}
        },
        "required": ["food", "quantity", "portion", "calories_per_item", "total_calories", "confidence"],
        "additionalProperties": false
    })
}

/// `response_format` asking for `{"foods": [...]}`.
pub fn food_response_format() -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "food_estimates",
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {
                    "foods": {"type": "array", "items": food_item_schema()}
                },
                "required": ["foods"],
                "additionalProperties": false
            }
        }
    })
}

pub fn insights_response_format() -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "meal_insights",
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {
                    "macro_balance": {"type": "string"},
                    "nutrition_gaps": {"type": "string"},
                    "health_score": {"type": "integer"},
                    "next_meal": {"type": "string"}
                },
                "required": ["macro_balance", "nutrition_gaps", "health_score", "next_meal"],
                "additionalProperties": false
            }
        }
    })
}

pub fn food_detection(model: &ModelInfo, description: &str) -> CompletionRequest {
    let format_hint = if model.structured_output {
        "Respond with a JSON object whose \"foods\" key holds an array of objects with these keys:"
    } else {
        "Format your response as a JSON array of objects with these keys:"
    };

    let prompt = format!(
        r#"Analyze this food description and extract all food items with their quantities and estimated calories:
Description: "{description}"

For each food item, provide:
1. Food name (in English)
2. Quantity (number)
3. Portion size (e.g., bowl, plate, piece)
4. Estimated calories per item

Consider:
- Indian and international foods
- Common portion sizes
- Typical calorie ranges for each food
- Multiple items in a single description

{format_hint}
[
    {{
        "food": "food name",
        "quantity": number,
        "portion": "portion size",
        "calories_per_item": number,
        "total_calories": number,
        "confidence": number (0-1)
    }}
]"#
    );

    CompletionRequest {
        model: model.id.clone(),
        messages: vec![ChatMessage::system(FOOD_SYSTEM), ChatMessage::user(prompt)],
        temperature: 0.3,
        top_p: 0.95,
        response_format: model.structured_output.then(food_response_format),
    }
}

pub fn insights(model: &ModelInfo, entries: &[FoodEntry], total_calories: i64) -> CompletionRequest {
    let meal = entries
        .iter()
        .map(|e| format!("{} {}", e.quantity, e.food))
        .collect::<Vec<_>>()
        .join(", ");

    let prompt = format!(
        "Analyze this meal and provide nutrition insights:
Meal: {meal}
Total calories: {total_calories}

Please provide:
1. Macro balance analysis
2. Nutrition gaps
3. Health score (0-100)
4. Next meal suggestions

Format your response as a JSON object with these keys: macro_balance, nutrition_gaps, health_score, next_meal"
    );

    CompletionRequest {
        model: model.id.clone(),
        messages: vec![ChatMessage::system(INSIGHTS_SYSTEM), ChatMessage::user(prompt)],
        temperature: 0.7,
        top_p: 0.95,
        response_format: model.structured_output.then(insights_response_format),
    }
}

pub fn coach(model: &ModelInfo, input: &CoachPrompt<'_>) -> CompletionRequest {
    let history = input
        .context
        .iter()
        .enumerate()
        .map(|(i, msg)| {
            let speaker = if i % 2 == 0 { "User" } else { "Assistant" };
            format!("{}: {}", speaker, msg)
        })
        .collect::<Vec<_>>()
        .join("\n");

    let mut user_context = String::new();
    if let Some(goal) = &input.goal {
        user_context.push_str(&format!("User's current goal: {}\n", goal.goal_type));
        if let Some(target) = goal.target_weight {
            user_context.push_str(&format!("Target weight: {} kg\n", target));
        }
        if let Some(weeks) = goal.timeline_weeks {
            user_context.push_str(&format!("Timeline: {} weeks\n", weeks));
        }
    }
    if let Some(today) = input.today.filter(|m| !m.is_zero()) {
        user_context.push_str(&format!(
            "Today's macros:\n- Protein: {:.1}g\n- Carbs: {:.1}g\n- Fats: {:.1}g\n- Calories: {:.0}\n",
            today.protein, today.carbs, today.fats, today.calories
        ));
    }

    let prompt = format!(
        "Previous conversation:\n{history}\n\nUser's Context:\n{user_context}\nUser: {message}\n\n{COACH_GUIDELINES}\n\nAssistant:",
        message = input.message,
    );

    CompletionRequest {
        model: model.id.clone(),
        messages: vec![ChatMessage::system(COACH_SYSTEM), ChatMessage::user(prompt)],
        temperature: 0.7,
        top_p: 0.95,
        response_format: None,
    }
}
