//! Account maintenance: `platewise user`.

use std::path::Path;

use anyhow::{Context, Result, bail};
use console::style;
use dialoguer::Confirm;
use platewise::config::PlatewiseToml;
use platewise::tracker::db::TrackerDb;
use platewise::ui::icons::CHECK;

pub fn cmd_user_reset(
    config: &PlatewiseToml,
    username: &str,
    yes: bool,
    db_path: Option<&Path>,
) -> Result<()> {
    let path = db_path.unwrap_or(&config.server.db_path);
    if !path.exists() {
        bail!("No database at {}", path.display());
    }
    let db = TrackerDb::new(path)
        .with_context(|| format!("Failed to open database at {}", path.display()))?;

    let Some(creds) = db.find_user_by_username(username)? else {
        bail!("User '{}' not found", username);
    };

    if !yes {
        let confirm = Confirm::new()
            .with_prompt(format!(
                "Delete all entries, goals, macros and chat history of '{}'?",
                username
            ))
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirm {
            println!("Reset cancelled");
            return Ok(());
        }
    }

    let counts = db.reset_user_data(creds.user.id)?;
    println!(
        "{}Reset {}: {} entries, {} goals, {} macro rows, {} messages",
        CHECK,
        style(username).bold(),
        counts.entries,
        counts.goals,
        counts.macros,
        counts.messages
    );
    Ok(())
}
