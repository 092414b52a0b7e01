//! Model catalogue listing: `platewise models`.

use console::style;
use platewise::config::PlatewiseToml;

pub fn cmd_models(config: &PlatewiseToml) {
    let catalog = config.catalog();

    println!();
    println!("{}", style("Available models").bold());
    println!();
    for model in &catalog.models {
        let mut tags = Vec::new();
        if model.id == catalog.default_model {
            tags.push("analysis default");
        }
        if model.id == catalog.coach_model {
            tags.push("coach default");
        }
        if model.structured_output {
            tags.push("structured output");
        }
        let tags = if tags.is_empty() {
            String::new()
        } else {
            format!(" ({})", tags.join(", "))
        };
        println!(
            "  {:<28} {}{}",
            style(&model.id).cyan(),
            model.label,
            style(tags).dim()
        );
    }
    println!();
}
