use std::collections::HashMap;
use std::str::FromStr;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::nutrition::{CalorieBreakdown, MacroTotals};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: String,
}

/// A user row together with its stored bcrypt hash.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalorieEntry {
    pub id: i64,
    pub user_id: i64,
    pub user_input: String,
    pub food_items: Vec<String>,
    pub total_calories: i64,
    pub detailed_breakdown: CalorieBreakdown,
    pub created_at: String,
    pub date: String,
}

/// Values for a new calorie entry. `created_at` and `date` are filled in by
/// the caller so one request uses one clock reading.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub user_input: String,
    pub food_items: Vec<String>,
    pub total_calories: i64,
    pub detailed_breakdown: CalorieBreakdown,
    pub created_at: String,
    pub date: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    WeightLoss,
    WeightGain,
    Maintenance,
}

impl GoalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WeightLoss => "weight_loss",
            Self::WeightGain => "weight_gain",
            Self::Maintenance => "maintenance",
        }
    }

    /// Target weight assumed when a goal is first set from chat.
    pub fn default_target_weight(&self) -> Option<f64> {
        match self {
            Self::WeightLoss => Some(70.0),
            Self::WeightGain => Some(80.0),
            Self::Maintenance => None,
        }
    }
}

impl FromStr for GoalType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weight_loss" => Ok(Self::WeightLoss),
            "weight_gain" => Ok(Self::WeightGain),
            "maintenance" => Ok(Self::Maintenance),
            _ => Err(format!("Invalid goal type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserGoal {
    pub id: i64,
    pub user_id: i64,
    pub goal_type: GoalType,
    pub target_weight: Option<f64>,
    pub current_weight: Option<f64>,
    pub timeline_weeks: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoalUpdate {
    pub goal_type: GoalType,
    #[serde(default)]
    pub target_weight: Option<f64>,
    #[serde(default)]
    pub current_weight: Option<f64>,
    #[serde(default)]
    pub timeline_weeks: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MacroEntry {
    pub id: i64,
    pub user_id: i64,
    pub date: String,
    pub protein: f64,
    pub carbs: f64,
    pub fats: f64,
    pub fiber: Option<f64>,
    pub calories: f64,
    pub created_at: String,
}

impl MacroEntry {
    pub fn totals(&self) -> MacroTotals {
        MacroTotals {
            protein: self.protein,
            carbs: self.carbs,
            fats: self.fats,
            calories: self.calories,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRecord {
    pub id: i64,
    pub user_id: i64,
    pub message: String,
    pub is_user: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailySummary {
    pub date: String,
    pub entries: Vec<CalorieEntry>,
    pub total_calories: i64,
    pub entries_count: usize,
}

impl DailySummary {
    pub fn new(date: String, entries: Vec<CalorieEntry>) -> Self {
        Self {
            total_calories: entries.iter().map(|e| e.total_calories).sum(),
            entries_count: entries.len(),
            date,
            entries,
        }
    }
}

/// One bar in the weekly chart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeekDay {
    pub date: String,
    pub calories: i64,
    pub entries: usize,
    /// Abbreviated weekday name, e.g. "Mon".
    pub day: String,
}

impl WeekDay {
    /// Seven days ending on `end`, oldest first, with per-day totals of
    /// `entries`. Entries outside the window are ignored.
    pub fn week_ending(end: NaiveDate, entries: &[CalorieEntry]) -> Vec<WeekDay> {
        let mut per_day: HashMap<&str, (i64, usize)> = HashMap::new();
        for entry in entries {
            let slot = per_day.entry(entry.date.as_str()).or_default();
            slot.0 += entry.total_calories;
            slot.1 += 1;
        }

        (0..7)
            .rev()
            .map(|back| {
                let day = end - Duration::days(back);
                let date = day.to_string();
                let (calories, count) = per_day.get(date.as_str()).copied().unwrap_or_default();
                WeekDay {
                    calories,
                    entries: count,
                    day: day.format("%a").to_string(),
                    date,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(date: &str, calories: i64) -> CalorieEntry {
        CalorieEntry {
            id: 0,
            user_id: 1,
            user_input: String::new(),
            food_items: Vec::new(),
            total_calories: calories,
            detailed_breakdown: CalorieBreakdown::default(),
            created_at: String::new(),
            date: date.to_string(),
        }
    }

    #[test]
    fn test_week_ending_fills_gaps() {
        let end = NaiveDate::from_ymd_opt(2026, 1, 7).unwrap();
        let entries = vec![
            entry("2026-01-01", 300),
            entry("2026-01-07", 200),
            entry("2026-01-07", 150),
            entry("2025-12-31", 999),
        ];
        let week = WeekDay::week_ending(end, &entries);
        assert_eq!(week.len(), 7);
        assert_eq!(week[0].date, "2026-01-01");
        assert_eq!(week[0].day, "Thu");
        assert_eq!(week[0].calories, 300);
        assert_eq!(week[3].entries, 0);
        assert_eq!(week[6].date, "2026-01-07");
        assert_eq!(week[6].calories, 350);
        assert_eq!(week[6].entries, 2);
        assert_eq!(week.iter().map(|d| d.entries).sum::<usize>(), 3);
    }

    #[test]
    fn test_goal_type_round_trip_strings() {
        for goal in [GoalType::WeightLoss, GoalType::WeightGain, GoalType::Maintenance] {
            assert_eq!(goal.as_str().parse::<GoalType>().unwrap(), goal);
        }
        assert!("bulk".parse::<GoalType>().is_err());
    }

    #[test]
    fn test_goal_defaults() {
        assert_eq!(GoalType::WeightLoss.default_target_weight(), Some(70.0));
        assert_eq!(GoalType::WeightGain.default_target_weight(), Some(80.0));
        assert_eq!(GoalType::Maintenance.default_target_weight(), None);
    }

    #[test]
    fn test_goal_update_deserializes_partial() {
        let update: GoalUpdate = serde_json::from_str(r#"{"goal_type": "weight_gain"}"#).unwrap();
        assert_eq!(update.goal_type, GoalType::WeightGain);
        assert!(update.target_weight.is_none());
    }

    #[test]
    fn test_daily_summary_totals() {
        let summary = DailySummary::new("2026-01-05".into(), Vec::new());
        assert_eq!(summary.total_calories, 0);
        assert_eq!(summary.entries_count, 0);
    }
}
