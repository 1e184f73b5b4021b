//! # Stackforge CLI
//!
//! This is the binary entry point for the `stackforge` command-line tool.
//!
//! It parses arguments with `clap`, sets up logging and dispatches to the
//! subcommand. Everything else lives in the library crate; the binary is a
//! thin wrapper around the `ComponentManager`.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
