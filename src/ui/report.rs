//! Terminal rendering for `platewise analyze` and friends.

use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use super::icons::{CHART, PLATE, SPARKLE};
use crate::llm::parse::Insights;
use crate::nutrition::CalorieBreakdown;

/// A steadily ticking spinner with `message`. Finish it with
/// `finish_and_clear` before printing results.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    let bar = ProgressBar::new_spinner();
    bar.set_style(style);
    bar.set_message(message.into());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Table rows for a breakdown, one per item, without styling.
pub fn breakdown_lines(breakdown: &CalorieBreakdown) -> Vec<String> {
    breakdown
        .items
        .iter()
        .map(|item| {
            format!(
                "{:<20} {:>6.2} × {:>6.1} kcal = {:>5} kcal  (confidence {:.0}%)",
                item.food,
                item.total_multiplier,
                item.base_calories,
                item.total_calories,
                item.confidence * 100.0
            )
        })
        .collect()
}

pub fn print_breakdown(breakdown: &CalorieBreakdown) {
    println!();
    println!("{}{}", PLATE, style("Calorie breakdown").bold());
    for line in breakdown_lines(breakdown) {
        println!("  {}", line);
    }
    println!(
        "  {} {}",
        style("Total:").bold(),
        style(format!("{} kcal", breakdown.total_calories)).green().bold()
    );
}

pub fn print_insights(insights: &Insights) {
    println!();
    println!("{}{}", SPARKLE, style("Insights").bold());
    println!("  {} {}", style("Macro balance:").dim(), insights.macro_balance);
    println!("  {} {}", style("Nutrition gaps:").dim(), insights.nutrition_gaps);
    println!(
        "  {}{} {}/100 ({})",
        CHART,
        style("Health score:").dim(),
        style(insights.health_score).cyan(),
        insights.assessment()
    );
    println!("  {} {}", style("Next meal:").dim(), insights.next_meal);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrition::{FoodEntry, NutritionTables, calculate};

    #[test]
    fn test_breakdown_lines() {
        let tables = NutritionTables::default();
        let entry = FoodEntry::new("dosa", 2.0, Some("plate"), 120.0, 480.0, Some(0.9), &tables);
        let breakdown = calculate(&[entry]);
        let lines = breakdown_lines(&breakdown);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("dosa"));
        assert!(lines[0].contains("480 kcal"));
        assert!(lines[0].contains("confidence 90%"));
    }
}
