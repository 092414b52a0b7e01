//! One-shot meal analysis in the terminal: `platewise analyze`.

use anyhow::{Result, bail};
use console::style;
use platewise::config::PlatewiseToml;
use platewise::errors::TrackerError;
use platewise::tracker::pipeline::analyze_text;
use platewise::ui::icons::CROSS;
use platewise::ui::{print_breakdown, print_insights, spinner};
use serde_json::json;

pub async fn cmd_analyze(
    config: &PlatewiseToml,
    text: &str,
    model: Option<&str>,
    as_json: bool,
) -> Result<()> {
    let catalog = config.catalog();
    let model = catalog.pick(model)?;
    let tables = config.tables()?;
    let client = super::llm_client(config)?;

    let progress = (!as_json).then(|| spinner(format!("Asking {}...", model.label)));
    let result = analyze_text(&client, model, text, &tables).await;
    if let Some(progress) = progress {
        progress.finish_and_clear();
    }

    let analysis = match result {
        Ok(analysis) => analysis,
        Err(TrackerError::NoFoodDetected { logs }) => {
            if as_json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({
                        "success": false,
                        "error": "No food items detected",
                        "logs": logs,
                    }))?
                );
            } else {
                for line in &logs {
                    eprintln!("  {}", style(line).dim());
                }
            }
            bail!("No food items detected");
        }
        Err(e) => {
            eprintln!("{}{}", CROSS, e);
            return Err(e.into());
        }
    };

    if as_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "success": true,
                "model_used": model.label,
                "food_entries": analysis.entries,
                "total_calories": analysis.breakdown.total_calories,
                "detailed_breakdown": analysis.breakdown,
                "ai_insights": analysis.insights,
                "logs": analysis.logs.lines(),
            }))?
        );
        return Ok(());
    }

    println!("{} {}", style("Model:").dim(), model.label);
    print_breakdown(&analysis.breakdown);
    if let Some(insights) = &analysis.insights {
        print_insights(insights);
    }
    println!();
    Ok(())
}
