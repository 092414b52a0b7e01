use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use platewise::config::{CONFIG_FILE, PlatewiseToml};

mod cmd;

#[derive(Parser)]
#[command(name = "platewise")]
#[command(version, about = "Describe a meal, get a calorie breakdown and a nutrition coach")]
pub struct Cli {
    /// Path to platewise.toml
    #[arg(long, global = true, env = "PLATEWISE_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the web app
    Serve {
        /// Interface to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to serve on
        #[arg(short, long)]
        port: Option<u16>,

        /// Database path
        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Enable dev mode (permissive CORS for a separate front-end server)
        #[arg(long)]
        dev: bool,

        /// Open a browser once the server is listening
        #[arg(long)]
        open: bool,
    },
    /// Create the database and apply migrations
    InitDb {
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
    /// Analyse a meal description in the terminal without saving it
    Analyze {
        /// What you ate, e.g. "2 idli and a bowl of sambar"
        text: String,

        /// Model id from `platewise models`
        #[arg(short, long)]
        model: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the model catalogue
    Models,
    /// View, validate or create configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Manage user accounts
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the resolved configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Write a default platewise.toml
    Init,
}

#[derive(Subcommand, Clone)]
pub enum UserCommands {
    /// Delete every entry, goal, macro row and chat message of a user
    Reset {
        username: String,

        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,

        #[arg(long)]
        db_path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config_path = cli.config_path();

    // `config` commands report on the file themselves, including parse errors.
    let command = match cli.command {
        Commands::Config { command } => return cmd::cmd_config(&config_path, command),
        other => other,
    };

    let config = PlatewiseToml::resolve(&config_path)?;
    let _guard = platewise::logging::init(&config.logging, cli.verbose)?;

    match command {
        Commands::Serve {
            host,
            port,
            db_path,
            dev,
            open,
        } => {
            let overrides = cmd::ServeOverrides {
                host,
                port,
                db_path,
                dev,
                open,
            };
            cmd::cmd_serve(config, overrides).await?;
        }
        Commands::InitDb { db_path } => cmd::cmd_init_db(&config, db_path.as_deref())?,
        Commands::Analyze { text, model, json } => {
            cmd::cmd_analyze(&config, &text, model.as_deref(), json).await?
        }
        Commands::Models => cmd::cmd_models(&config),
        Commands::User { command } => match command {
            UserCommands::Reset {
                username,
                yes,
                db_path,
            } => cmd::cmd_user_reset(&config, &username, yes, db_path.as_deref())?,
        },
        Commands::Config { .. } => {}
    }

    Ok(())
}
