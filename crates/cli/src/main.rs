//! git2cc: Git hook entry points mirroring pushes into a ClearCase view.
//!
//! Install `git2cc update "$@"` as the repository's `update` hook and
//! `git2cc post-receive` as its `post-receive` hook. The maintenance
//! subcommands inspect and clean up checkouts left in the view.

mod logging;

use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, error, info, warn};

use git2cc_core::clearcase::ClearCase;
use git2cc_core::config::BridgeConfig;
use git2cc_core::git::{GitClient, ViewPuller};
use git2cc_core::hook::{self, HookHandler, HookMode, HookOutcome, RefUpdate};
use git2cc_core::policy::SyncPolicy;
use git2cc_core::process::SystemRunner;
use git2cc_core::sync_engine::{SyncEngine, SyncReport};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "git2cc",
    version,
    about = "Mirror Git pushes into a ClearCase view"
)]
struct Cli {
    /// Path to the TOML configuration file (`~` is expanded).
    #[arg(short, long, global = true, default_value = "hooks_config/bridge.toml")]
    config: String,

    /// Stderr log level or filter directive; overrides `log.level`.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// `update` hook: check one ref update before git accepts it.
    Update {
        refname: String,
        old: String,
        new: Option<String>,
    },

    /// `post-receive` hook: mirror the `<old> <new> <ref>` lines read from stdin.
    PostReceive,

    /// List the checkouts currently open in the view.
    Checkouts {
        /// Print a JSON array instead of one path per line.
        #[arg(long)]
        json: bool,
    },

    /// Cancel every checkout open in the view.
    CancelCheckouts,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.log.level.clone());
    let _guard = match logging::init(&level, config.log.file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = run(cli.command, &config).await;
    if let Err(ref e) = result {
        error!("{:#}", e);
        warn!(
            view = %config.view.path.display(),
            "ClearCase may hold leftover checkouts; inspect them with `git2cc checkouts`"
        );
    }
    ExitCode::from(hook::exit_code(&result) as u8)
}

async fn run(command: Commands, config: &BridgeConfig) -> Result<()> {
    match command {
        Commands::Update { refname, old, new } => {
            let update = RefUpdate::from_args(&refname, &old, new.as_deref());
            cmd_hook(config, vec![update], HookMode::Update).await
        }
        Commands::PostReceive => {
            let updates = read_updates(std::io::stdin().lock())?;
            cmd_hook(config, updates, HookMode::PostReceive).await
        }
        Commands::Checkouts { json } => cmd_checkouts(config, json).await,
        Commands::CancelCheckouts => cmd_cancel_checkouts(config).await,
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn load_config(path: &str) -> Result<BridgeConfig> {
    let path = expand_tilde(path);
    BridgeConfig::load_and_validate(&path)
        .with_context(|| format!("failed to load configuration {}", path.display()))
}

fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

fn read_updates<B: BufRead>(input: B) -> Result<Vec<RefUpdate>> {
    let mut updates = Vec::new();
    for line in input.lines() {
        let line = line.context("failed to read ref updates from stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        updates.push(RefUpdate::parse_line(&line)?);
    }
    Ok(updates)
}

async fn cmd_hook(config: &BridgeConfig, updates: Vec<RefUpdate>, mode: HookMode) -> Result<()> {
    let git = GitClient::open_from_env().context("failed to open the pushed repository")?;
    let policy = SyncPolicy::from(&config.git);
    let engine = SyncEngine::from_config(SystemRunner, config);
    let stager = ViewPuller::new(SystemRunner);
    let handler = HookHandler::new(&git, &policy, &engine, &stager);

    for update in &updates {
        let outcome = match handler.handle(update, mode).await {
            Ok(outcome) => outcome,
            Err(e) => {
                if let Some(report) = e.report() {
                    log_report(report);
                }
                return Err(anyhow::Error::new(e)
                    .context(format!("failed to mirror {} into ClearCase", update.refname)));
            }
        };
        match outcome {
            HookOutcome::Skipped(reason) => {
                info!(push_ref = %update.refname, %reason, "nothing to mirror");
            }
            HookOutcome::Accepted => {
                info!(push_ref = %update.refname, "ClearCase preflight passed");
            }
            HookOutcome::Synced(report) => {
                info!(
                    push_ref = %update.refname,
                    txn = %report.transaction_id,
                    "push mirrored into ClearCase"
                );
                log_report(&report);
            }
        }
    }
    Ok(())
}

fn log_report(report: &SyncReport) {
    if let Ok(json) = serde_json::to_string(report) {
        debug!(outcome = %report.outcome, report = %json, "transaction report");
    }
}

// ---------------------------------------------------------------------------
// Maintenance
// ---------------------------------------------------------------------------

async fn cmd_checkouts(config: &BridgeConfig, json: bool) -> Result<()> {
    let cc = ClearCase::from_config(SystemRunner, config);
    let checkouts = cc
        .list_checkouts()
        .await
        .context("failed to list view checkouts")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&checkouts)?);
    } else if checkouts.is_empty() {
        println!("No checkouts in {}", config.view.path.display());
    } else {
        for path in &checkouts {
            println!("{}", path.display());
        }
    }
    Ok(())
}

async fn cmd_cancel_checkouts(config: &BridgeConfig) -> Result<()> {
    let cc = ClearCase::from_config(SystemRunner, config);
    let report = cc
        .uncheckout_all()
        .await
        .context("failed to list view checkouts")?;
    for path in &report.cancelled {
        println!("cancelled  {}", path.display());
    }
    for (path, reason) in &report.failed {
        println!("FAILED     {}: {}", path.display(), reason);
    }
    if !report.is_clean() {
        bail!("{} checkout(s) could not be cancelled", report.failed.len());
    }
    Ok(())
}
