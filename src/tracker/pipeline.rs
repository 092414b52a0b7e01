//! Meal analysis: model food detection, calorie maths, insights and saving.
//!
//! Besides `tracing` output, every run builds a human-readable log that is
//! returned to the dashboard's processing panel.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::api::AppState;
use super::models::{NewEntry, User};
use super::{timestamp, today};
use crate::errors::TrackerError;
use crate::llm::parse::{Insights, parse_food_entries, parse_insights};
use crate::llm::{ChatModel, ModelInfo, prompts};
use crate::nutrition::calories::average_confidence;
use crate::nutrition::{CalorieBreakdown, FoodEntry, NutritionTables, calculate};

/// Processing log shown to the user alongside an analysis.
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    lines: Vec<String>,
}

impl RunLog {
    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn section(&mut self, title: &str) {
        self.lines.push(format!("=== {} ===", title));
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

/// Result of analysing one description, before anything is stored.
#[derive(Debug, Clone)]
pub struct MealAnalysis {
    pub entries: Vec<FoodEntry>,
    pub breakdown: CalorieBreakdown,
    pub insights: Option<Insights>,
    pub logs: RunLog,
}

/// JSON body returned by `POST /process_food`.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResponse {
    pub success: bool,
    pub user_input: String,
    pub food_entries: Vec<String>,
    pub total_calories: i64,
    pub detailed_breakdown: CalorieBreakdown,
    pub daily_total: i64,
    pub daily_entries_count: usize,
    pub logs: Vec<String>,
    pub entry_id: i64,
    pub ai_insights: Option<Insights>,
    pub model_used: String,
}

/// Ask the model for the foods in `text`. Model failures are logged and
/// yield no entries.
pub async fn detect_entries(
    llm: &dyn ChatModel,
    model: &ModelInfo,
    text: &str,
    tables: &NutritionTables,
    log: &mut RunLog,
) -> Vec<FoodEntry> {
    log.section(&format!("FOOD DETECTION WITH {}", model.label));
    log.push(format!("Input text: '{}'", text));

    let reply = match llm.complete(prompts::food_detection(model, text)).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!(model = %model.id, error = %e, "Food detection request failed");
            log.push(format!("API error: {}", e));
            return Vec::new();
        }
    };
    log.push(format!("Raw response: {}", reply.trim()));

    let entries = parse_food_entries(&reply, tables);
    if entries.is_empty() {
        log.push("No food items detected in response");
        return entries;
    }

    log.push("Detected food items:");
    for entry in &entries {
        log.push(format!(
            "  • {} {} ({}) - {} kcal per item, confidence {:.2}",
            entry.quantity, entry.food, entry.portion, entry.calories_per_item, entry.confidence
        ));
    }
    if let Some(avg) = average_confidence(&entries) {
        log.push(format!(
            "Total items detected: {}, average confidence: {:.2}",
            entries.len(),
            avg
        ));
    }
    entries
}

pub fn calculate_logged(entries: &[FoodEntry], log: &mut RunLog) -> CalorieBreakdown {
    log.section("CALORIE CALCULATION");
    let breakdown = calculate(entries);
    for item in &breakdown.items {
        log.push(format!(
            "  • {}: {} kcal × {:.2} = {} kcal",
            item.food, item.base_calories, item.total_multiplier, item.total_calories
        ));
    }
    log.push(format!("Total calories: {}", breakdown.total_calories));
    breakdown
}

/// Ask the model for meal insights. `None` when the request fails.
pub async fn fetch_insights(
    llm: &dyn ChatModel,
    model: &ModelInfo,
    entries: &[FoodEntry],
    total_calories: i64,
    log: &mut RunLog,
) -> Option<Insights> {
    log.section("AI INSIGHTS");
    match llm
        .complete(prompts::insights(model, entries, total_calories))
        .await
    {
        Ok(reply) => {
            let insights = parse_insights(&reply);
            log.push(format!("Macro balance: {}", insights.macro_balance));
            log.push(format!("Nutrition gaps: {}", insights.nutrition_gaps));
            log.push(format!(
                "Health score: {}/100 ({})",
                insights.health_score,
                insights.assessment()
            ));
            log.push(format!("Next meal: {}", insights.next_meal));
            Some(insights)
        }
        Err(e) => {
            warn!(model = %model.id, error = %e, "Insights request failed");
            log.push(format!("Insights unavailable: {}", e));
            None
        }
    }
}

/// Detection, calculation and insights for one description.
///
/// Fails with `NoFoodDetected` (carrying the log) when the model reply has
/// no usable items; insights are only requested once foods are known.
pub async fn analyze_text(
    llm: &dyn ChatModel,
    model: &ModelInfo,
    text: &str,
    tables: &NutritionTables,
) -> Result<MealAnalysis, TrackerError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(TrackerError::BadRequest("Please describe what you ate".into()));
    }

    let mut logs = RunLog::default();
    let entries = detect_entries(llm, model, text, tables, &mut logs).await;
    if entries.is_empty() {
        logs.push("Nothing was saved");
        return Err(TrackerError::NoFoodDetected {
            logs: logs.into_lines(),
        });
    }

    let breakdown = calculate_logged(&entries, &mut logs);
    let insights = fetch_insights(llm, model, &entries, breakdown.total_calories, &mut logs).await;

    Ok(MealAnalysis {
        entries,
        breakdown,
        insights,
        logs,
    })
}

/// Full `/process_food` flow for a logged-in user.
pub async fn analyze_meal(
    state: &AppState,
    user: &User,
    user_input: &str,
    model_id: Option<&str>,
) -> Result<AnalysisResponse, TrackerError> {
    let model = state.catalog.pick(model_id)?.clone();
    let MealAnalysis {
        entries,
        breakdown,
        insights,
        mut logs,
    } = analyze_text(state.llm.as_ref(), &model, user_input, &state.tables).await?;

    logs.section("SAVING TO DATABASE");
    let date = today().to_string();
    let new_entry = NewEntry {
        user_input: user_input.trim().to_string(),
        food_items: entries.iter().map(|e| e.food.clone()).collect(),
        total_calories: breakdown.total_calories,
        detailed_breakdown: breakdown.clone(),
        created_at: timestamp(Utc::now()),
        date: date.clone(),
    };
    let user_id = user.id;
    let (saved, todays) = state
        .db
        .call(move |db| {
            let saved = db.insert_entry(user_id, &new_entry)?;
            let todays = db.entries_for_date(user_id, &date)?;
            Ok((saved, todays))
        })
        .await?;
    logs.push(format!("Saved entry {}", saved.id));

    let daily_total: i64 = todays.iter().map(|e| e.total_calories).sum();
    logs.section("DAILY SUMMARY");
    logs.push(format!("Updated daily total: {} calories", daily_total));

    info!(
        user_id,
        entry_id = saved.id,
        total_calories = saved.total_calories,
        model = %model.id,
        "Analysed meal"
    );

    Ok(AnalysisResponse {
        success: true,
        user_input: saved.user_input,
        food_entries: saved.food_items,
        total_calories: saved.total_calories,
        detailed_breakdown: breakdown,
        daily_total,
        daily_entries_count: todays.len(),
        logs: logs.into_lines(),
        entry_id: saved.id,
        ai_insights: insights,
        model_used: model.label,
    })
}
