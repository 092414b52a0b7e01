//! Database setup command: `platewise init-db`.

use std::path::Path;

use anyhow::{Context, Result};
use platewise::config::PlatewiseToml;
use platewise::tracker::db::TrackerDb;
use platewise::ui::icons::CHECK;

pub fn cmd_init_db(config: &PlatewiseToml, db_path: Option<&Path>) -> Result<()> {
    let path = db_path.unwrap_or(&config.server.db_path);
    TrackerDb::new(path)
        .with_context(|| format!("Failed to initialize database at {}", path.display()))?;
    println!("{}Database ready at {}", CHECK, path.display());
    Ok(())
}
