//! Interactive confirmation for destructive commands.

use std::io::{BufRead, Write};

use anyhow::Result;
use colored::Colorize;

/// Ask the user to confirm a destructive action by typing the exact app
/// name. Returns `false` (without error) when the typed name does not match.
pub fn confirm_destructive(app: &str, warning: &str) -> Result<bool> {
    print!(
        "{}\n{}\nTo proceed, type \"{}\" or re-run this command with --confirm {}\n> ",
        "WARNING: Potentially Destructive Action".yellow().bold(),
        warning,
        app,
        app
    );
    std::io::stdout().flush()?;

    let stdin = std::io::stdin();
    let mut input = String::new();
    stdin.lock().read_line(&mut input)?;

    Ok(input.trim() == app)
}
