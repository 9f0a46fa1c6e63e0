//! Remora CLI - mirror GitHub repositories into storage backends.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::Facet;

#[derive(Parser)]
#[command(name = "remora")]
#[command(version)]
#[command(about = "Mirror GitHub repositories into storage backends")]
#[command(
    long_about = "Remora mirrors remote GitHub repositories (code, wiki, issues, discussions, \
release assets) into filesystem or S3-compatible storage backends, either on \
demand or on a cron schedule. Runs are incremental and idempotent."
)]
#[command(after_long_help = r#"EXAMPLES
    Mirror every configured repository's code tree:
        $ remora code

    Mirror one repository's issues into a specific storage target:
        $ remora issues my-repo --storage offsite

    Publish a timestamped full dump:
        $ remora dump my-repo

    Run scheduled syncs as a daemon:
        $ remora daemon

CONFIGURATION
    Remora reads a YAML config file (default: config.yaml) listing the
    repositories and named storage backends. Environment variables with the
    REMORA_ prefix override file values, e.g. REMORA_GITHUBTOKEN.
"#)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every on-demand sync command.
#[derive(Debug, Clone, clap::Args)]
struct SyncArgs {
    /// Repository name from the config (every repository when omitted)
    name: Option<String>,

    /// Storage target to publish to (the repository's configured targets
    /// when omitted)
    #[arg(short, long)]
    storage: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Mirror code trees
    Code(SyncArgs),
    /// Mirror wiki trees
    Wiki(SyncArgs),
    /// Mirror issues as markdown snapshots
    Issues(SyncArgs),
    /// Mirror discussions as markdown snapshots
    Discussions(SyncArgs),
    /// Mirror release assets, applying the retention limits
    Releases(SyncArgs),
    /// Publish a timestamp-named full dump
    Dump(SyncArgs),
    /// Run every cron-scheduled repository as a daemon
    Daemon,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("remora=info,remora_cli=info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let cfg = remora::Config::load(&cli.config)?;

    match cli.command {
        Commands::Code(args) => commands::run_facet(cfg, args, Facet::Code).await,
        Commands::Wiki(args) => commands::run_facet(cfg, args, Facet::Wiki).await,
        Commands::Issues(args) => commands::run_facet(cfg, args, Facet::Issues).await,
        Commands::Discussions(args) => commands::run_facet(cfg, args, Facet::Discussions).await,
        Commands::Releases(args) => commands::run_facet(cfg, args, Facet::Releases).await,
        Commands::Dump(args) => commands::run_facet(cfg, args, Facet::Dump).await,
        Commands::Daemon => commands::daemon(cfg).await,
    }
}
