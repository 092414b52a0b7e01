//! Turning model replies into typed food entries and meal insights.
//!
//! Structured (JSON) replies are preferred; when a model ignores the
//! requested format the parsers fall back to scanning labelled lines.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::extract::{extract_json, strip_reasoning};
use crate::nutrition::quantity::{RawQuantity, parse_quantity_text};
use crate::nutrition::{FoodEntry, NutritionTables};
use crate::util::first_number;

/// Keys under which a wrapping object may carry the item array.
const ARRAY_KEYS: [&str; 3] = ["foods", "items", "food_items"];

/// A number the model may also have sent as a string (`"150 kcal"`).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum NumberLike {
    Number(f64),
    Text(String),
}

impl NumberLike {
    fn value(&self) -> Option<f64> {
        match self {
            NumberLike::Number(n) => Some(*n),
            NumberLike::Text(t) => first_number(t),
        }
        .filter(|n| n.is_finite())
    }
}

#[derive(Debug, Deserialize)]
struct RawFoodItem {
    #[serde(alias = "name", alias = "food_name")]
    food: String,
    #[serde(default)]
    quantity: Option<RawQuantity>,
    #[serde(default, alias = "portion_size")]
    portion: Option<String>,
    #[serde(default)]
    calories_per_item: Option<NumberLike>,
    #[serde(default)]
    total_calories: Option<NumberLike>,
    #[serde(default)]
    confidence: Option<NumberLike>,
}

impl RawFoodItem {
    fn into_entry(self, tables: &NutritionTables) -> Option<FoodEntry> {
        let food = self.food.trim();
        if food.is_empty() {
            return None;
        }
        let quantity = self
            .quantity
            .as_ref()
            .map(|q| q.resolve(tables))
            .unwrap_or(1.0);
        let per_item = self.calories_per_item.as_ref().and_then(NumberLike::value);
        let total = self.total_calories.as_ref().and_then(NumberLike::value);
        let (per_item, total) = match (per_item, total) {
            (Some(p), Some(t)) => (p, t),
            (Some(p), None) => (p, p * quantity),
            (None, Some(t)) => (t / quantity, t),
            (None, None) => (0.0, 0.0),
        };

        Some(FoodEntry::new(
            food,
            quantity,
            self.portion.as_deref(),
            per_item,
            total,
            self.confidence.as_ref().and_then(NumberLike::value),
            tables,
        ))
    }
}

/// Parse a food-detection reply into entries.
///
/// Malformed items are skipped. An unusable reply yields an empty list.
pub fn parse_food_entries(text: &str, tables: &NutritionTables) -> Vec<FoodEntry> {
    let text = strip_reasoning(text);

    if let Some(items) = extract_json(&text).and_then(item_array) {
        let total = items.len();
        let entries: Vec<FoodEntry> = items
            .into_iter()
            .filter_map(|item| serde_json::from_value::<RawFoodItem>(item).ok())
            .filter_map(|raw| raw.into_entry(tables))
            .collect();
        if entries.len() < total {
            debug!(skipped = total - entries.len(), "Skipped malformed food items");
        }
        if !entries.is_empty() {
            return entries;
        }
    }

    parse_labelled_lines(&text, tables)
}

fn item_array(value: Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => {
            for key in ARRAY_KEYS {
                if let Some(Value::Array(items)) = map.remove(key) {
                    return Some(items);
                }
            }
            ["food", "name", "food_name"]
                .iter()
                .any(|k| map.contains_key(*k))
                .then(|| vec![Value::Object(map)])
        }
        _ => None,
    }
}

/// Split `"**Food Name:** Rice"` or `"- Quantity: 2"` into a lowercase
/// label and its value.
fn labelled(line: &str) -> Option<(String, String)> {
    let cleaned: String = line.chars().filter(|c| *c != '*').collect();
    let cleaned = cleaned
        .trim()
        .trim_start_matches(|c: char| c == '-' || c == '•' || c.is_ascii_digit() || c == '.')
        .trim();
    let (label, value) = cleaned.split_once(':')?;
    Some((label.trim().to_lowercase(), value.trim().to_string()))
}

struct PartialEntry {
    food: String,
    quantity: f64,
    portion: Option<String>,
    calories_per_item: f64,
}

fn parse_labelled_lines(text: &str, tables: &NutritionTables) -> Vec<FoodEntry> {
    let mut partial: Vec<PartialEntry> = Vec::new();

    for line in text.lines() {
        let Some((label, value)) = labelled(line) else {
            continue;
        };
        if label == "food name" || label == "food" {
            if !value.is_empty() {
                partial.push(PartialEntry {
                    food: value,
                    quantity: 1.0,
                    portion: None,
                    calories_per_item: 0.0,
                });
            }
            continue;
        }
        let Some(current) = partial.last_mut() else {
            continue;
        };
        if label.starts_with("quantity") {
            current.quantity = parse_quantity_text(&value, tables);
        } else if label.starts_with("portion") {
            current.portion = Some(value).filter(|v| !v.is_empty());
        } else if label.contains("calorie") {
            current.calories_per_item = first_number(&value).unwrap_or(0.0);
        }
    }

    partial
        .into_iter()
        .map(|p| {
            FoodEntry::new(
                p.food,
                p.quantity,
                p.portion.as_deref(),
                p.calories_per_item,
                p.calories_per_item * p.quantity,
                None,
                tables,
            )
        })
        .collect()
}

pub const DEFAULT_MACRO_BALANCE: &str = "Analyzing your meal composition...";
pub const DEFAULT_NUTRITION_GAPS: &str = "Identifying nutritional gaps...";
pub const DEFAULT_HEALTH_SCORE: u8 = 75;
pub const DEFAULT_NEXT_MEAL: &str = "Suggesting next meal...";

/// Model commentary on a meal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insights {
    pub macro_balance: String,
    pub nutrition_gaps: String,
    pub health_score: u8,
    pub next_meal: String,
}

impl Default for Insights {
    fn default() -> Self {
        Self {
            macro_balance: DEFAULT_MACRO_BALANCE.to_string(),
            nutrition_gaps: DEFAULT_NUTRITION_GAPS.to_string(),
            health_score: DEFAULT_HEALTH_SCORE,
            next_meal: DEFAULT_NEXT_MEAL.to_string(),
        }
    }
}

impl Insights {
    pub fn assessment(&self) -> &'static str {
        match self.health_score {
            80.. => "Excellent meal composition",
            60..=79 => "Good meal composition",
            _ => "Room for improvement",
        }
    }
}

/// Parse an insights reply. Missing fields keep their placeholder text.
pub fn parse_insights(text: &str) -> Insights {
    let text = strip_reasoning(text);

    if let Some(Value::Object(map)) = extract_json(&text) {
        let mut insights = Insights::default();
        if let Some(v) = map.get("macro_balance").and_then(flatten) {
            insights.macro_balance = v;
        }
        if let Some(v) = map.get("nutrition_gaps").and_then(flatten) {
            insights.nutrition_gaps = v;
        }
        if let Some(v) = map.get("next_meal").and_then(flatten) {
            insights.next_meal = v;
        }
        if let Some(score) = map.get("health_score").and_then(score_value) {
            insights.health_score = score;
        }
        return insights;
    }

    parse_insight_lines(&text)
}

/// Render any JSON value as display text; `None` for null or empty.
fn flatten(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(flatten)
            .collect::<Vec<_>>()
            .join("; "),
        Value::Object(map) => map
            .iter()
            .filter_map(|(k, v)| flatten(v).map(|v| format!("{}: {}", k, v)))
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

fn score_value(value: &Value) -> Option<u8> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => first_number(s)?,
        _ => return None,
    };
    raw.is_finite().then(|| raw.round().clamp(0.0, 100.0) as u8)
}

fn parse_insight_lines(text: &str) -> Insights {
    let mut insights = Insights::default();

    for line in text.lines() {
        let lower = line.to_lowercase();
        let Some((_, after)) = line.rsplit_once(':') else {
            continue;
        };
        let value = after.trim().trim_matches('*').trim().to_string();

        if lower.contains("health score") {
            if let Some(score) = first_number(&value).or_else(|| first_number(line)) {
                insights.health_score = score.round().clamp(0.0, 100.0) as u8;
            }
        } else if value.is_empty() {
            continue;
        } else if lower.contains("macro balance") {
            insights.macro_balance = value;
        } else if lower.contains("nutrition gaps") {
            insights.nutrition_gaps = value;
        } else if lower.contains("next meal") {
            insights.next_meal = value;
        }
    }

    insights
}
