//! Local git remote bookkeeping.
//!
//! Apps are addressed by git remotes whose URL points at the platform's git
//! host. Commands resolve the current app from these bindings and keep them
//! in sync after rename/destroy.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result};

/// Registry of local git remotes bound to platform apps.
///
/// Implemented by `GitCli` against the real working copy; tests use an
/// in-memory fake.
pub trait RemoteRegistry {
    /// Map of remote alias to app name, or `None` when the working
    /// directory is not a git repository. Remotes that do not point at the
    /// platform git host are excluded.
    fn bindings(&self) -> Result<Option<BTreeMap<String, String>>>;

    fn add(&mut self, alias: &str, url: &str) -> Result<()>;

    fn remove(&mut self, alias: &str) -> Result<()>;
}

/// Remote registry backed by the `git` CLI in a working directory.
pub struct GitCli {
    working_dir: PathBuf,
}

impl GitCli {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }

    /// Registry rooted at the current directory.
    pub fn current_dir() -> Result<Self> {
        Ok(Self::new(
            std::env::current_dir().context("Could not determine working directory")?,
        ))
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.working_dir)
            .output()
            .with_context(|| format!("Failed to run git {}", args.join(" ")))?;

        if !output.status.success() {
            anyhow::bail!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl RemoteRegistry for GitCli {
    fn bindings(&self) -> Result<Option<BTreeMap<String, String>>> {
        if !self.working_dir.join(".git").exists() {
            return Ok(None);
        }

        let listing = self.git(&["remote", "-v"])?;
        Ok(Some(parse_remote_listing(&listing)))
    }

    fn add(&mut self, alias: &str, url: &str) -> Result<()> {
        self.git(&["remote", "add", alias, url])?;
        Ok(())
    }

    fn remove(&mut self, alias: &str) -> Result<()> {
        self.git(&["remote", "rm", alias])?;
        Ok(())
    }
}

/// Parse `git remote -v` output into alias -> app name bindings.
fn parse_remote_listing(listing: &str) -> BTreeMap<String, String> {
    let mut bindings = BTreeMap::new();

    for line in listing.lines() {
        let mut fields = line.split_whitespace();
        let (Some(alias), Some(url)) = (fields.next(), fields.next()) else {
            continue;
        };
        if let Some(app) = app_from_remote_url(url) {
            bindings.insert(alias.to_string(), app.to_string());
        }
    }

    bindings
}

/// Extract the app name from a platform git URL, in either transport form:
/// `git@heroku.com:myapp.git` or `https://git.heroku.com/myapp.git`.
pub(crate) fn app_from_remote_url(url: &str) -> Option<&str> {
    let rest = url
        .strip_prefix("git@heroku.com:")
        .or_else(|| url.strip_prefix("https://git.heroku.com/"))?;
    let app = rest.strip_suffix(".git")?;
    if app.is_empty() {
        None
    } else {
        Some(app)
    }
}
