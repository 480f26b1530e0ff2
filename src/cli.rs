use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sentinel-watch", about = "URL change monitor and webhook dispatcher")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Force debug-level logging regardless of the config file's `debug` flag
    #[arg(long, global = true)]
    pub debug: bool,

    /// Force JSON-formatted logs regardless of the config file's `structured_logs` flag
    #[arg(long, global = true)]
    pub structured_logs: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one monitoring pass over the configured targets
    Run {
        /// Path to the JSON configuration document
        #[arg(short, long, default_value = "config/default.json")]
        config: String,
    },
    /// Replay the dead-letter queue instead of polling targets
    Replay {
        /// Path to the JSON configuration document
        #[arg(short, long, default_value = "config/default.json")]
        config: String,
    },
}

impl Commands {
    pub fn config_path(&self) -> &str {
        match self {
            Commands::Run { config } => config,
            Commands::Replay { config } => config,
        }
    }
}
