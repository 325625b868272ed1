use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use dotenvy::dotenv;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use catsync_cli::{Command, Config, StoreArgs, SyncArgs};
use catsync_client::OgcApiClient;
use catsync_core::{
    audit, build_resolver, default_config_path, load_config, CatsyncConfig, Reconciler,
    SyncError, SyncReport,
};
use catsync_store::LocalStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::parse();

    // Logs go to stderr so stdout carries only the JSON report
    let subscriber = FmtSubscriber::builder()
        .with_max_level(if config.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install the log subscriber")?;

    let file_config = match config.config.clone().or_else(default_config_path) {
        Some(path) => load_config(&path).map_err(user_error)?,
        None => CatsyncConfig::default(),
    };

    match config.command {
        Command::Sync(args) => sync(file_config, &args, false).await,
        Command::Plan(args) => sync(file_config, &args, true).await,
        Command::Validate(args) => validate(file_config, &args),
    }
}

/// Reconcile the local store against the remote service
async fn sync(mut settings: CatsyncConfig, args: &SyncArgs, dry_run: bool) -> anyhow::Result<()> {
    args.apply(&mut settings);

    let remote_url = settings
        .remote
        .url
        .as_deref()
        .context("No remote URL. Pass --remote-url or set CATSYNC_REMOTE_URL")?;
    let store = open_store(&settings);

    let mut client = OgcApiClient::new(remote_url, &settings.http).map_err(user_error)?;
    if let Some(user) = &args.user {
        client = client.with_basic_auth(user, args.password.clone());
    } else if args.password.is_some() {
        warn!("Password given without a user name; sending requests unauthenticated");
    }

    info!(
        remote = remote_url,
        store = %store.root().display(),
        dry_run,
        "Starting sync"
    );

    let mut reconciler = Reconciler::new(&client, build_resolver(&settings.sync))
        .skip_unchanged(settings.sync.skip_unchanged)
        .dry_run(dry_run);
    let report = reconciler.run(&store).await.map_err(user_error)?;

    log_summary(&report);
    println!("{}", serde_json::to_string_pretty(&report)?);

    if settings.sync.fail_on_error && !report.is_success() {
        bail!("{} document(s) failed", report.failed_count());
    }
    Ok(())
}

/// Check the local store without contacting the remote service
fn validate(mut settings: CatsyncConfig, args: &StoreArgs) -> anyhow::Result<()> {
    args.apply(&mut settings);
    let store = open_store(&settings);

    let audit = audit(&store).map_err(user_error)?;
    for rejection in &audit.rejected {
        error!("{}", rejection.error);
    }
    info!(
        "Validation complete: {} collections, {} items, {} rejected",
        audit.collections,
        audit.items,
        audit.rejected.len()
    );
    println!("{}", serde_json::to_string_pretty(&audit)?);

    if !audit.is_clean() {
        bail!("{} document(s) rejected", audit.rejected.len());
    }
    Ok(())
}

fn open_store(settings: &CatsyncConfig) -> LocalStore {
    LocalStore::new(
        settings
            .store
            .root
            .clone()
            .unwrap_or_else(|| PathBuf::from(".")),
    )
}

fn log_summary(report: &SyncReport) {
    for failure in &report.failures {
        error!(
            kind = %failure.kind,
            key = failure.key.as_deref().unwrap_or("-"),
            "{}",
            failure.error
        );
    }
    let verb = if report.dry_run { "Plan" } else { "Sync" };
    info!(
        "{} complete: collections {} created, {} updated, {} unchanged, {} failed; \
         items {} created, {} updated, {} unchanged, {} failed, {} skipped",
        verb,
        report.collections.created,
        report.collections.updated,
        report.collections.unchanged,
        report.collections.failed,
        report.items.created,
        report.items.updated,
        report.items.unchanged,
        report.items.failed,
        report.items.skipped,
    );
}

fn user_error(e: SyncError) -> anyhow::Error {
    anyhow::anyhow!(e.user_message())
}
