//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// Stackforge - Resolve and fetch the components of a platform
#[derive(Parser, Debug)]
#[command(name = "stackforge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Set log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve a platform and fetch its components
    Resolve(commands::resolve::ResolveArgs),

    /// List the components containing a file or directory
    Find(commands::find::FindArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&self.log_level))
            .format_timestamp(None)
            .init();

        match self.command {
            Commands::Resolve(args) => commands::resolve::execute(args),
            Commands::Find(args) => commands::find::execute(args),
        }
    }
}
