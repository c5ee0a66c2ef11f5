//! App lifecycle commands.

use std::collections::BTreeMap;
use std::io::Write as _;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;
use tabled::Tabled;

use crate::client::{AppUpdate, Platform};
use crate::error::CliError;
use crate::git::{GitCli, RemoteRegistry};
use crate::info;
use crate::output::{print_header, print_record, print_table};
use crate::prompt;

use super::CommandContext;

/// Config var injected when `--buildpack` is given.
const BUILDPACK_VAR: &str = "BUILDPACK_URL";

/// Default git remote alias for a newly created app.
const DEFAULT_REMOTE: &str = "heroku";

/// Interval between provisioning checks during app creation.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// App commands. `heroku apps` with no verb lists your apps.
#[derive(Debug, Args)]
pub struct AppsCommand {
    #[command(subcommand)]
    command: Option<AppsSubcommand>,
}

#[derive(Debug, Subcommand)]
enum AppsSubcommand {
    /// List your apps.
    List,

    /// Show detailed app information.
    Info(InfoArgs),

    /// Create a new app.
    Create(CreateArgs),

    /// Rename the app.
    Rename(RenameArgs),

    /// Open the app in a web browser.
    Open,

    /// Permanently destroy an app.
    Destroy(DestroyArgs),
}

#[derive(Debug, Args)]
struct InfoArgs {
    /// Output info as raw key/value pairs.
    #[arg(short, long)]
    raw: bool,
}

#[derive(Debug, Args)]
struct CreateArgs {
    /// App name. Omit to let the server pick one.
    name: Option<String>,

    /// A comma-delimited list of addons to install.
    #[arg(long)]
    addons: Option<String>,

    /// A buildpack url to use for this app.
    #[arg(short, long)]
    buildpack: Option<String>,

    /// The git remote to create.
    #[arg(short, long, default_value = DEFAULT_REMOTE)]
    remote: String,

    /// The stack on which to create the app.
    #[arg(short, long)]
    stack: Option<String>,

    /// Seconds to wait for provisioning before giving up.
    #[arg(long, default_value_t = 30)]
    timeout: u64,
}

#[derive(Debug, Args)]
struct RenameArgs {
    /// The new app name.
    newname: String,
}

#[derive(Debug, Args)]
struct DestroyArgs {
    /// App to destroy.
    name: Option<String>,

    /// Skip the interactive prompt by naming the app to destroy.
    #[arg(long)]
    confirm: Option<String>,
}

impl AppsCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let client = ctx.client()?;
        let mut registry = GitCli::current_dir()?;

        match self.command.unwrap_or(AppsSubcommand::List) {
            AppsSubcommand::List => list_apps(&client).await,
            AppsSubcommand::Info(args) => {
                let app = ctx.require_app(&registry)?;
                info_app(&client, &app, args.raw).await
            }
            AppsSubcommand::Create(args) => {
                let opts = CreateOpts {
                    name: args.name.as_deref(),
                    addons: args.addons.as_deref(),
                    buildpack: args.buildpack.as_deref(),
                    stack: args.stack.as_deref(),
                    remote_alias: &args.remote,
                    timeout: Duration::from_secs(args.timeout),
                };
                create_app(&client, &mut registry, opts).await
            }
            AppsSubcommand::Rename(args) => {
                let app = ctx.require_app(&registry)?;
                rename_app(&client, &mut registry, &app, &args.newname).await
            }
            AppsSubcommand::Open => {
                let app = ctx.require_app(&registry)?;
                open_app(&client, &app).await
            }
            AppsSubcommand::Destroy(args) => {
                let target = args
                    .name
                    .as_deref()
                    .or(ctx.app.as_deref())
                    .or(args.confirm.as_deref())
                    .ok_or_else(|| {
                        CliError::InvalidArgument(
                            "Usage: heroku apps destroy --app APP".to_string(),
                        )
                    })?
                    .to_string();

                let preconfirmed = args.confirm.as_deref();
                if let Some(confirmed) = preconfirmed {
                    if confirmed != target {
                        return Err(CliError::InvalidArgument(format!(
                            "Confirmed app {} did not match the selected app {}.",
                            confirmed, target
                        ))
                        .into());
                    }
                }

                destroy_app(&client, &mut registry, &target, |app, warning| {
                    if preconfirmed.is_some() {
                        Ok(true)
                    } else {
                        prompt::confirm_destructive(app, warning)
                    }
                })
                .await
            }
        }
    }
}

/// One row of the apps list.
#[derive(Tabled)]
struct AppRow {
    #[tabled(rename = "Name")]
    name: String,

    #[tabled(rename = "Owner")]
    owner: String,
}

/// List all apps the account can see.
async fn list_apps<P: Platform>(client: &P) -> Result<()> {
    let apps = client.list().await?;

    let rows: Vec<AppRow> = apps
        .into_iter()
        .map(|app| AppRow {
            name: app.name,
            owner: app.owner,
        })
        .collect();

    print_table(&rows, "You have no apps.");
    Ok(())
}

/// Show detailed app information.
async fn info_app<P: Platform>(client: &P, app: &str, raw: bool) -> Result<()> {
    let attrs = client.info(app).await?;

    if raw {
        for line in info::raw_lines(&attrs) {
            println!("{}", line);
        }
    } else {
        print_header(&attrs.name);
        print_record(&info::display_record(&attrs));
    }

    Ok(())
}

struct CreateOpts<'a> {
    name: Option<&'a str>,
    addons: Option<&'a str>,
    buildpack: Option<&'a str>,
    stack: Option<&'a str>,
    remote_alias: &'a str,
    timeout: Duration,
}

/// Create a new app, driving asynchronous provisioning to completion.
///
/// A provisioning timeout is reported but not fatal: the server may still
/// finish on its own, so addon installation, buildpack injection, and git
/// remote registration all still run against the returned app name.
async fn create_app<P: Platform, R: RemoteRegistry + ?Sized>(
    client: &P,
    registry: &mut R,
    opts: CreateOpts<'_>,
) -> Result<()> {
    let requested = opts
        .name
        .map(|name| name.trim().to_lowercase())
        .filter(|name| !name.is_empty());

    let created = client.create(requested.as_deref(), opts.stack).await?;

    print!("Creating {}...", created.name);
    flush_stdout();

    if created.is_creating() {
        if wait_for_provisioning(client, &created.name, opts.timeout).await? {
            println!(" done, stack is {}", created.stack);
        } else {
            println!();
            println!(
                "{}",
                "Timed out. The app may still be provisioning; check its info shortly.".yellow()
            );
        }
    } else {
        println!(" done, stack is {}", created.stack);
    }

    // Addon failures abort the remaining installs; already-installed addons
    // are not rolled back.
    for addon in opts
        .addons
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|addon| !addon.is_empty())
    {
        print!("Adding {} to {}... ", addon, created.name);
        flush_stdout();
        client.install_addon(&created.name, addon).await?;
        println!("done");
    }

    if let Some(buildpack) = opts.buildpack {
        let vars = BTreeMap::from([(BUILDPACK_VAR.to_string(), buildpack.to_string())]);
        client.add_config_vars(&created.name, &vars).await?;
    }

    println!(
        "{} | {}",
        created.web_url.as_deref().unwrap_or(""),
        created.git_url.as_deref().unwrap_or("")
    );

    if let Some(git_url) = created.git_url.as_deref() {
        register_remote(registry, opts.remote_alias, git_url)?;
    }

    Ok(())
}

/// Poll until the server finishes provisioning, printing one progress dot
/// per check. Returns `false` when the deadline passes first.
async fn wait_for_provisioning<P: Platform>(
    client: &P,
    name: &str,
    timeout: Duration,
) -> Result<bool, CliError> {
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        if client.create_complete(name).await? {
            return Ok(true);
        }
        if tokio::time::Instant::now() >= deadline {
            return Ok(false);
        }
        print!(".");
        flush_stdout();
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Add a git remote for the app unless the alias is already bound.
fn register_remote<R: RemoteRegistry + ?Sized>(
    registry: &mut R,
    alias: &str,
    git_url: &str,
) -> Result<()> {
    let Some(bindings) = registry.bindings()? else {
        return Ok(());
    };
    if bindings.contains_key(alias) {
        return Ok(());
    }

    registry.add(alias, git_url)?;
    println!("Git remote {} added", alias);
    Ok(())
}

/// Rename an app and repoint every local git remote bound to the old name.
async fn rename_app<P: Platform, R: RemoteRegistry + ?Sized>(
    client: &P,
    registry: &mut R,
    app: &str,
    newname: &str,
) -> Result<()> {
    let newname = newname.trim().to_lowercase();
    if newname.is_empty() {
        return Err(CliError::InvalidArgument("Must specify a new name.".to_string()).into());
    }

    let update = AppUpdate {
        name: Some(&newname),
    };
    client.update(app, &update).await?;

    // `update` returns no body; fetch the fresh URLs under the new name.
    let attrs = client.info(&newname).await?;
    println!(
        "{} | {}",
        attrs.web_url.as_deref().unwrap_or(""),
        attrs.git_url.as_deref().unwrap_or("")
    );

    let bindings = registry.bindings()?;
    match (bindings, attrs.git_url.as_deref()) {
        (Some(bindings), Some(git_url)) if !bindings.is_empty() => {
            for (alias, bound_app) in &bindings {
                if bound_app != app {
                    continue;
                }
                registry.remove(alias)?;
                registry.add(alias, git_url)?;
                println!("Git remote {} updated", alias);
            }
        }
        _ => {
            println!("Don't forget to update your Git remotes on any local checkouts.");
        }
    }

    Ok(())
}

/// Open the app's web URL in a browser.
async fn open_app<P: Platform>(client: &P, app: &str) -> Result<()> {
    let attrs = client.info(app).await?;
    let url = attrs.web_url.ok_or_else(|| {
        CliError::InvalidArgument(format!("App {} has no web URL.", app))
    })?;

    println!("Opening {}", url);
    launch_browser(&url)?;
    Ok(())
}

#[cfg(target_os = "macos")]
const BROWSER_OPENER: &str = "open";
#[cfg(not(target_os = "macos"))]
const BROWSER_OPENER: &str = "xdg-open";

fn launch_browser(url: &str) -> Result<()> {
    use anyhow::Context;

    std::process::Command::new(BROWSER_OPENER)
        .arg(url)
        .spawn()
        .with_context(|| format!("Failed to launch {}", BROWSER_OPENER))?;
    Ok(())
}

/// Destroy an app after confirmation, then drop local git remotes bound to
/// it. The up-front `info` call aborts the whole command before anything
/// destructive when the app is missing or inaccessible.
async fn destroy_app<P, R, C>(client: &P, registry: &mut R, app: &str, confirm: C) -> Result<()>
where
    P: Platform,
    R: RemoteRegistry + ?Sized,
    C: FnOnce(&str, &str) -> Result<bool>,
{
    client.info(app).await?;

    let warning = format!("This will destroy {} (including all add-ons).", app);
    if !confirm(app, &warning)? {
        println!("Aborted. {} was not destroyed.", app);
        return Ok(());
    }

    print!("Destroying {} (including all add-ons)... ", app);
    flush_stdout();
    client.destroy(app).await?;

    if let Some(bindings) = registry.bindings()? {
        for (alias, bound_app) in &bindings {
            if bound_app == app {
                registry.remove(alias)?;
            }
        }
    }

    println!("done");
    Ok(())
}

fn flush_stdout() {
    let _ = std::io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::client::{AppAttributes, AppSummary, CreatedApp};
    use crate::git;
    use async_trait::async_trait;

    /// In-memory platform recording every facade call in order.
    struct FakePlatform {
        calls: Mutex<Vec<String>>,
        /// Number of `create_complete` checks that report "still creating"
        /// before completion; `None` never completes.
        complete_after: Option<u32>,
        checks: Mutex<u32>,
        create_status: Option<&'static str>,
        info_fails: bool,
    }

    impl FakePlatform {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                complete_after: Some(0),
                checks: Mutex::new(0),
                create_status: Some("complete"),
                info_fails: false,
            }
        }

        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn attrs(name: &str) -> AppAttributes {
            AppAttributes {
                name: name.to_string(),
                owner: "owner@example.com".to_string(),
                stack: "cedar".to_string(),
                web_url: Some(format!("http://{}.example.com/", name)),
                git_url: Some(format!("git@heroku.com:{}.git", name)),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl Platform for FakePlatform {
        async fn list(&self) -> Result<Vec<AppSummary>, CliError> {
            self.record("list");
            Ok(vec![])
        }

        async fn info(&self, name: &str) -> Result<AppAttributes, CliError> {
            self.record(format!("info:{}", name));
            if self.info_fails {
                return Err(CliError::NotFound(name.to_string()));
            }
            Ok(Self::attrs(name))
        }

        async fn create(
            &self,
            name: Option<&str>,
            stack: Option<&str>,
        ) -> Result<CreatedApp, CliError> {
            self.record(format!(
                "create:{}:{}",
                name.unwrap_or("<auto>"),
                stack.unwrap_or("<default>")
            ));
            let name = name.unwrap_or("gentle-snow-22").to_string();
            Ok(CreatedApp {
                name: name.clone(),
                stack: stack.unwrap_or("cedar").to_string(),
                create_status: self.create_status.map(str::to_string),
                web_url: Some(format!("http://{}.example.com/", name)),
                git_url: Some(format!("git@heroku.com:{}.git", name)),
            })
        }

        async fn create_complete(&self, name: &str) -> Result<bool, CliError> {
            self.record(format!("create_complete:{}", name));
            let mut checks = self.checks.lock().unwrap();
            *checks += 1;
            match self.complete_after {
                Some(after) => Ok(*checks > after),
                None => Ok(false),
            }
        }

        async fn update(&self, name: &str, attrs: &AppUpdate<'_>) -> Result<(), CliError> {
            self.record(format!("update:{}:{}", name, attrs.name.unwrap_or("")));
            Ok(())
        }

        async fn install_addon(&self, name: &str, addon: &str) -> Result<(), CliError> {
            self.record(format!("install_addon:{}:{}", name, addon));
            Ok(())
        }

        async fn add_config_vars(
            &self,
            name: &str,
            vars: &BTreeMap<String, String>,
        ) -> Result<(), CliError> {
            let keys: Vec<&str> = vars.keys().map(String::as_str).collect();
            self.record(format!("add_config_vars:{}:{}", name, keys.join(",")));
            Ok(())
        }

        async fn destroy(&self, name: &str) -> Result<(), CliError> {
            self.record(format!("destroy:{}", name));
            Ok(())
        }
    }

    /// In-memory remote registry.
    struct FakeRegistry {
        /// `None` models a working directory without a git repository.
        bindings: Option<BTreeMap<String, String>>,
        added: Vec<(String, String)>,
        removed: Vec<String>,
    }

    impl FakeRegistry {
        fn repo(bindings: &[(&str, &str)]) -> Self {
            Self {
                bindings: Some(
                    bindings
                        .iter()
                        .map(|(alias, app)| (alias.to_string(), app.to_string()))
                        .collect(),
                ),
                added: Vec::new(),
                removed: Vec::new(),
            }
        }

        fn no_repo() -> Self {
            Self {
                bindings: None,
                added: Vec::new(),
                removed: Vec::new(),
            }
        }
    }

    impl RemoteRegistry for FakeRegistry {
        fn bindings(&self) -> Result<Option<BTreeMap<String, String>>> {
            Ok(self.bindings.clone())
        }

        fn add(&mut self, alias: &str, url: &str) -> Result<()> {
            let app = git::app_from_remote_url(url)
                .ok_or_else(|| anyhow::anyhow!("not a platform url: {url}"))?;
            if let Some(bindings) = &mut self.bindings {
                bindings.insert(alias.to_string(), app.to_string());
            }
            self.added.push((alias.to_string(), url.to_string()));
            Ok(())
        }

        fn remove(&mut self, alias: &str) -> Result<()> {
            if let Some(bindings) = &mut self.bindings {
                bindings.remove(alias);
            }
            self.removed.push(alias.to_string());
            Ok(())
        }
    }

    fn create_opts<'a>(
        name: Option<&'a str>,
        addons: Option<&'a str>,
        timeout: u64,
    ) -> CreateOpts<'a> {
        CreateOpts {
            name,
            addons,
            buildpack: None,
            stack: Some("cedar"),
            remote_alias: DEFAULT_REMOTE,
            timeout: Duration::from_secs(timeout),
        }
    }

    #[tokio::test]
    async fn create_installs_addons_in_order_then_registers_remote() {
        let platform = FakePlatform::new();
        let mut registry = FakeRegistry::repo(&[]);

        create_app(
            &platform,
            &mut registry,
            create_opts(None, Some("pg, redis"), 30),
        )
        .await
        .unwrap();

        let calls = platform.calls();
        assert_eq!(calls[0], "create:<auto>:cedar");
        assert_eq!(calls[1], "install_addon:gentle-snow-22:pg");
        assert_eq!(calls[2], "install_addon:gentle-snow-22:redis");
        assert_eq!(
            registry.added,
            vec![(
                "heroku".to_string(),
                "git@heroku.com:gentle-snow-22.git".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn create_normalizes_the_requested_name() {
        let platform = FakePlatform::new();
        let mut registry = FakeRegistry::no_repo();

        create_app(&platform, &mut registry, create_opts(Some("  MyApp "), None, 30))
            .await
            .unwrap();

        assert_eq!(platform.calls()[0], "create:myapp:cedar");
        assert!(registry.added.is_empty());
    }

    #[tokio::test]
    async fn create_sends_buildpack_config_var() {
        let platform = FakePlatform::new();
        let mut registry = FakeRegistry::no_repo();

        let opts = CreateOpts {
            buildpack: Some("https://example.com/buildpack.git"),
            ..create_opts(Some("myapp"), None, 30)
        };
        create_app(&platform, &mut registry, opts).await.unwrap();

        assert!(platform
            .calls()
            .contains(&"add_config_vars:myapp:BUILDPACK_URL".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn create_polls_until_provisioning_completes() {
        let mut platform = FakePlatform::new();
        platform.create_status = Some("creating");
        platform.complete_after = Some(3);
        let mut registry = FakeRegistry::repo(&[]);

        create_app(&platform, &mut registry, create_opts(Some("slow"), None, 30))
            .await
            .unwrap();

        let checks = platform
            .calls()
            .iter()
            .filter(|call| call.starts_with("create_complete:"))
            .count();
        assert_eq!(checks, 4);
        assert_eq!(registry.added.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn create_timeout_still_runs_addons_and_remote_registration() {
        let mut platform = FakePlatform::new();
        platform.create_status = Some("creating");
        platform.complete_after = None;
        let mut registry = FakeRegistry::repo(&[]);

        create_app(
            &platform,
            &mut registry,
            create_opts(Some("stuck"), Some("pg"), 5),
        )
        .await
        .unwrap();

        let calls = platform.calls();
        assert!(calls.contains(&"install_addon:stuck:pg".to_string()));
        assert_eq!(registry.added.len(), 1);
        // One check per second within the deadline, plus the final one that
        // observes the deadline has passed.
        let checks = calls
            .iter()
            .filter(|call| call.starts_with("create_complete:"))
            .count();
        assert_eq!(checks, 6);
    }

    #[tokio::test]
    async fn create_skips_taken_remote_alias() {
        let platform = FakePlatform::new();
        let mut registry = FakeRegistry::repo(&[("heroku", "existing")]);

        create_app(&platform, &mut registry, create_opts(Some("myapp"), None, 30))
            .await
            .unwrap();

        assert!(registry.added.is_empty());
    }

    #[tokio::test]
    async fn rename_rejects_empty_new_name() {
        let platform = FakePlatform::new();
        let mut registry = FakeRegistry::no_repo();

        let err = rename_app(&platform, &mut registry, "old-name", "   ")
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::InvalidArgument(_))
        ));
        assert!(platform.calls().is_empty());
    }

    #[tokio::test]
    async fn rename_repoints_only_matching_remotes() {
        let platform = FakePlatform::new();
        let mut registry =
            FakeRegistry::repo(&[("heroku", "old-name"), ("staging", "other-app")]);

        rename_app(&platform, &mut registry, "old-name", "new-name")
            .await
            .unwrap();

        let calls = platform.calls();
        assert_eq!(calls[0], "update:old-name:new-name");
        assert_eq!(calls[1], "info:new-name");

        assert_eq!(registry.removed, vec!["heroku".to_string()]);
        assert_eq!(
            registry.added,
            vec![(
                "heroku".to_string(),
                "git@heroku.com:new-name.git".to_string()
            )]
        );
        let bindings = registry.bindings().unwrap().unwrap();
        assert_eq!(bindings["heroku"], "new-name");
        assert_eq!(bindings["staging"], "other-app");
    }

    #[tokio::test]
    async fn rename_outside_a_repo_touches_nothing() {
        let platform = FakePlatform::new();
        let mut registry = FakeRegistry::no_repo();

        rename_app(&platform, &mut registry, "old-name", "new-name")
            .await
            .unwrap();

        assert!(registry.added.is_empty());
        assert!(registry.removed.is_empty());
    }

    #[tokio::test]
    async fn destroy_aborts_before_anything_when_info_fails() {
        let mut platform = FakePlatform::new();
        platform.info_fails = true;
        let mut registry = FakeRegistry::repo(&[("heroku", "myapp")]);

        let err = destroy_app(&platform, &mut registry, "myapp", |_, _| Ok(true))
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::NotFound(_))
        ));
        assert_eq!(platform.calls(), vec!["info:myapp".to_string()]);
        assert!(registry.removed.is_empty());
    }

    #[tokio::test]
    async fn destroy_declined_makes_no_mutation() {
        let platform = FakePlatform::new();
        let mut registry = FakeRegistry::repo(&[("heroku", "myapp")]);

        destroy_app(&platform, &mut registry, "myapp", |_, _| Ok(false))
            .await
            .unwrap();

        assert_eq!(platform.calls(), vec!["info:myapp".to_string()]);
        assert!(registry.removed.is_empty());
    }

    #[tokio::test]
    async fn destroy_removes_every_matching_binding() {
        let platform = FakePlatform::new();
        let mut registry = FakeRegistry::repo(&[
            ("heroku", "myapp"),
            ("production", "myapp"),
            ("staging", "other-app"),
        ]);

        destroy_app(&platform, &mut registry, "myapp", |_, _| Ok(true))
            .await
            .unwrap();

        assert!(platform.calls().contains(&"destroy:myapp".to_string()));
        let mut removed = registry.removed.clone();
        removed.sort_unstable();
        assert_eq!(removed, vec!["heroku".to_string(), "production".to_string()]);
        let bindings = registry.bindings().unwrap().unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings["staging"], "other-app");
    }

    #[tokio::test]
    async fn destroy_with_no_matching_bindings_still_succeeds() {
        let platform = FakePlatform::new();
        let mut registry = FakeRegistry::repo(&[("staging", "other-app")]);

        destroy_app(&platform, &mut registry, "myapp", |_, _| Ok(true))
            .await
            .unwrap();

        assert!(platform.calls().contains(&"destroy:myapp".to_string()));
        assert!(registry.removed.is_empty());
    }
}
