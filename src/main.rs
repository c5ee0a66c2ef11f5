//! herokuctl (heroku) - CLI for managing apps on the platform.
//!
//! One command per invocation: list, inspect, create, rename, open, or
//! destroy remotely-hosted apps.

use anyhow::Result;
use clap::Parser;

mod client;
mod commands;
mod config;
mod error;
mod git;
mod info;
mod output;
mod prompt;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Run the command
    if let Err(e) = cli.run().await {
        // Print error in a user-friendly way
        error::print_error(&e);
        std::process::exit(1);
    }

    Ok(())
}
