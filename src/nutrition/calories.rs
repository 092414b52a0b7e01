use serde::{Deserialize, Serialize};

use super::tables::NutritionTables;

pub const DEFAULT_CONFIDENCE: f64 = 0.8;
pub const DEFAULT_PORTION: &str = "standard";

/// One food item recognised in a meal description, with multipliers applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodEntry {
    pub food: String,
    pub quantity: f64,
    pub portion: String,
    pub container_multiplier: f64,
    pub total_multiplier: f64,
    pub calories_per_item: f64,
    pub total_calories: f64,
    pub confidence: f64,
}

impl FoodEntry {
    /// Build an entry, deriving the portion and total multipliers.
    pub fn new(
        food: impl Into<String>,
        quantity: f64,
        portion: Option<&str>,
        calories_per_item: f64,
        total_calories: f64,
        confidence: Option<f64>,
        tables: &NutritionTables,
    ) -> Self {
        let portion = portion
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_PORTION)
            .to_string();
        let container_multiplier = tables.portion_multiplier(&portion);
        let confidence = confidence
            .filter(|c| c.is_finite())
            .map(|c| c.clamp(0.0, 1.0))
            .unwrap_or(DEFAULT_CONFIDENCE);

        Self {
            food: food.into(),
            quantity,
            portion,
            container_multiplier,
            total_multiplier: quantity * container_multiplier,
            calories_per_item: non_negative(calories_per_item),
            total_calories: non_negative(total_calories),
            confidence,
        }
    }
}

/// Per-item line of a calorie calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownItem {
    pub food: String,
    pub base_calories: f64,
    pub quantity: f64,
    pub container_multiplier: f64,
    pub total_multiplier: f64,
    pub total_calories: i64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalorieBreakdown {
    pub total_calories: i64,
    pub items: Vec<BreakdownItem>,
}

/// Apply each entry's multiplier to its per-item calories.
///
/// The model's own `total_calories` is ignored; item calories are
/// `trunc(calories_per_item * total_multiplier)` and the meal total is their sum.
pub fn calculate(entries: &[FoodEntry]) -> CalorieBreakdown {
    let items: Vec<BreakdownItem> = entries
        .iter()
        .map(|entry| BreakdownItem {
            food: entry.food.clone(),
            base_calories: entry.calories_per_item,
            quantity: entry.quantity,
            container_multiplier: entry.container_multiplier,
            total_multiplier: entry.total_multiplier,
            total_calories: (entry.calories_per_item * entry.total_multiplier).trunc() as i64,
            confidence: entry.confidence,
        })
        .collect();

    CalorieBreakdown {
        total_calories: items.iter().map(|i| i.total_calories).sum(),
        items,
    }
}

/// Mean confidence across entries, or `None` for an empty meal.
pub fn average_confidence(entries: &[FoodEntry]) -> Option<f64> {
    if entries.is_empty() {
        return None;
    }
    Some(entries.iter().map(|e| e.confidence).sum::<f64>() / entries.len() as f64)
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 { value } else { 0.0 }
}
