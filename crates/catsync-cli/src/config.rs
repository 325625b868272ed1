use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use catsync_core::config::{CatsyncConfig, ResolverStrategy};

/// CLI configuration parsed from command line arguments and environment variables
#[derive(Parser, Debug)]
#[command(name = "catsync")]
#[command(
    author,
    version,
    about = "Reconcile a local collection/item tree against a remote catalog service"
)]
#[command(after_help = "Examples:
  catsync validate --store ./catalog
  catsync plan --store ./catalog --remote-url https://example.com/stac
  catsync sync --store ./catalog --remote-url https://example.com/stac --resolver index")]
pub struct Config {
    /// Custom path to the config.toml file
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log every request and per-document decision
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create or update every local collection and item on the remote service
    #[command(after_help = "Example: catsync sync --store ./catalog --fail-on-error")]
    Sync(SyncArgs),
    /// Show what a sync would create or update, without writing anything
    Plan(SyncArgs),
    /// Check the local store for identity and parse errors
    Validate(StoreArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct StoreArgs {
    /// Directory containing collections/{id}.json
    #[arg(short, long, env = "CATSYNC_STORE", value_name = "DIR")]
    pub store: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SyncArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Root URL of the remote catalog service
    #[arg(long, env = "CATSYNC_REMOTE_URL", value_name = "URL")]
    pub remote_url: Option<String>,

    /// User name for HTTP basic authentication
    #[arg(long, env = "CATSYNC_USER")]
    pub user: Option<String>,

    /// Password for HTTP basic authentication
    #[arg(long, env = "CATSYNC_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Existence check strategy
    #[arg(long)]
    pub resolver: Option<ResolverArg>,

    /// Exit with an error if any document failed
    #[arg(long)]
    pub fail_on_error: bool,

    /// Skip the PUT when the merged document equals the remote one
    #[arg(long)]
    pub skip_unchanged: bool,
}

/// Existence check strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResolverArg {
    /// One GET per document
    Probe,
    /// One listing per collection scope
    Index,
    /// Listing for large scopes, GET per document otherwise
    Auto,
}

impl From<ResolverArg> for ResolverStrategy {
    fn from(arg: ResolverArg) -> Self {
        match arg {
            ResolverArg::Probe => ResolverStrategy::Probe,
            ResolverArg::Index => ResolverStrategy::Index,
            ResolverArg::Auto => ResolverStrategy::Auto,
        }
    }
}

impl StoreArgs {
    pub fn apply(&self, config: &mut CatsyncConfig) {
        if let Some(store) = &self.store {
            config.store.root = Some(store.clone());
        }
    }
}

impl SyncArgs {
    /// Overrides file values with the flags that were given.
    pub fn apply(&self, config: &mut CatsyncConfig) {
        self.store.apply(config);
        if let Some(url) = &self.remote_url {
            config.remote.url = Some(url.clone());
        }
        if let Some(resolver) = self.resolver {
            config.sync.resolver = resolver.into();
        }
        if self.fail_on_error {
            config.sync.fail_on_error = true;
        }
        if self.skip_unchanged {
            config.sync.skip_unchanged = true;
        }
    }
}
