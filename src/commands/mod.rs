//! CLI commands.

mod apps;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::client::ApiClient;
use crate::config::{Config, Credentials};
use crate::error::CliError;
use crate::git::RemoteRegistry;

/// Manage apps on the platform.
#[derive(Debug, Parser)]
#[command(name = "heroku")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// App name. Defaults to the app your local git remotes point at.
    #[arg(long, global = true, env = "HEROKU_APP")]
    app: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Manage apps (create, destroy). `heroku list` is shorthand for the
    /// bare listing.
    #[command(alias = "list")]
    Apps(apps::AppsCommand),

    /// Show CLI version.
    Version,
}

impl Cli {
    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        let config = Config::load()?;
        let credentials = Credentials::load()?;

        let ctx = CommandContext {
            config,
            credentials,
            app: self.app,
        };

        match self.command {
            Commands::Apps(cmd) => cmd.run(ctx).await,
            Commands::Version => {
                println!("heroku {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    pub config: Config,
    pub credentials: Option<Credentials>,
    pub app: Option<String>,
}

impl CommandContext {
    /// Get an authenticated API client.
    pub fn client(&self) -> Result<ApiClient> {
        ApiClient::new(&self.config, self.credentials.as_ref())
    }

    /// Resolve the target app: the `--app` flag wins, otherwise the app
    /// named by the local git remotes (the `heroku` alias first, then a
    /// unique binding).
    pub fn require_app(&self, registry: &dyn RemoteRegistry) -> Result<String> {
        if let Some(app) = self.app.as_deref() {
            return Ok(app.trim().to_string());
        }

        let Some(bindings) = registry.bindings()? else {
            return Err(CliError::InvalidArgument(
                "No app specified. Run this from an app checkout or use --app NAME.".to_string(),
            )
            .into());
        };

        if let Some(app) = bindings.get("heroku") {
            return Ok(app.clone());
        }

        let mut apps: Vec<&String> = bindings.values().collect();
        apps.sort_unstable();
        apps.dedup();

        match apps.as_slice() {
            [only] => Ok((*only).clone()),
            [] => Err(CliError::InvalidArgument(
                "No app specified. Run this from an app checkout or use --app NAME.".to_string(),
            )
            .into()),
            _ => Err(CliError::InvalidArgument(
                "Multiple apps in git remotes. Specify one with --app NAME.".to_string(),
            )
            .into()),
        }
    }
}
