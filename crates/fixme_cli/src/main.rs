//! fixme CLI - the issue ingestion worker.

mod commands;
mod config;
mod progress;
mod shutdown;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "github")]
use crate::commands::limits::OutputFormat;
use crate::commands::run::SourceArg;

#[derive(Parser)]
#[command(name = "fixme")]
#[command(version)]
#[command(about = "Issue ingestion worker for GitHub and GitLab")]
#[command(
    long_about = "fixme keeps a local copy of the open issues of registered repositories, \
classified by difficulty, kind and technology. It polls GitHub and GitLab within \
their rate limits, closes issues that disappear upstream, and refreshes \
repository technology tags hourly."
)]
#[command(after_long_help = r#"EXAMPLES
    Poll both trackers until interrupted:
        $ fixme run

    Poll only GitLab:
        $ fixme run --source gitlab

    Sync the least recently synced GitHub repository once:
        $ fixme sync-once --source github

    Check the GitHub quota:
        $ fixme limits --output json

CONFIGURATION
    fixme reads configuration from:
      1. ~/.config/fixme/config.toml (or $XDG_CONFIG_HOME/fixme/config.toml)
      2. ./fixme.toml
      3. Environment variables (FIXME_* prefix, e.g., FIXME_GITHUB_TOKEN)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    FIXME_DATABASE_URL         Database connection string (default: ~/.local/state/fixme/fixme.db)
    FIXME_GITHUB_TOKEN         GitHub personal access token (legacy: GITHUB_TOKEN)
    FIXME_GITLAB_TOKEN         GitLab personal access token (legacy: GITLAB_TOKEN)
    FIXME_GITLAB_HOST          GitLab host (default: gitlab.com)
    FIXME_CACHE_URL            Redis URL of the listing cache (legacy: CACHE_SERVER)
    FIXME_WORKER__RATE_FLOOR   Any [worker] key, e.g. FIXME_WORKER__TOPIC_INTERVAL_SECS
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the issue and topic pollers until Ctrl+C
    Run {
        /// Tracker(s) to poll
        #[arg(short, long, value_enum, default_value_t)]
        source: SourceArg,
    },
    /// Run a single issue cycle and wait for its sweep
    SyncOnce {
        #[arg(short, long, value_enum, default_value_t)]
        source: SourceArg,
    },
    /// Refresh repository technology tags once
    Topics {
        #[arg(short, long, value_enum, default_value_t)]
        source: SourceArg,
    },
    /// Show the GitHub rate limit status
    #[cfg(feature = "github")]
    Limits {
        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        output: OutputFormat,
    },
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Apply all pending migrations
    Up,
    /// Rollback the last migration
    Down,
    /// Show migration status
    Status,
    /// Fresh install - drop all tables and reapply migrations
    Fresh,
}

impl Commands {
    /// Sources whose tokens must exist before anything starts.
    fn sources(&self) -> Vec<fixme::SourceSystem> {
        match self {
            Commands::Run { source } | Commands::SyncOnce { source } | Commands::Topics { source } => {
                source.systems()
            }
            #[cfg(feature = "github")]
            Commands::Limits { .. } => vec![fixme::SourceSystem::GitHub],
            Commands::Migrate { .. } => Vec::new(),
        }
    }
}

/// Create the parent directory of a SQLite database file.
fn ensure_sqlite_dir(database_url: &str) -> std::io::Result<()> {
    let Some(db_path) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    // Strip query parameters (e.g., ?mode=rwc) before path operations
    let db_path = db_path.split('?').next().unwrap_or(db_path);
    let db_path = std::path::Path::new(db_path);

    if db_path.is_relative() && !db_path.as_os_str().is_empty() {
        tracing::warn!(
            "Database path '{}' is relative - behavior depends on current directory. \
             Consider using an absolute path.",
            db_path.display()
        );
    }

    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("fixme=info,fixme_cli=info"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    // Config (files -> legacy env -> FIXME_ env -> defaults)
    let config = config::Config::load()?;
    for source in cli.command.sources() {
        config.require_token(source)?;
    }

    let database_url = config.database_url()?;
    ensure_sqlite_dir(&database_url)?;

    match cli.command {
        Commands::Migrate { action } => {
            commands::migrate::handle_migrate(action, &database_url).await?;
        }
        #[cfg(feature = "github")]
        Commands::Limits { output } => {
            commands::limits::handle_limits(output, &config).await?;
        }
        Commands::Run { source } => {
            let db = fixme::connect_and_migrate(&database_url).await?;
            commands::run::handle_run(source, &config, db).await?;
        }
        Commands::SyncOnce { source } => {
            let db = fixme::connect_and_migrate(&database_url).await?;
            commands::run::handle_sync_once(source, &config, db).await?;
        }
        Commands::Topics { source } => {
            let db = fixme::connect_and_migrate(&database_url).await?;
            commands::run::handle_topics(source, &config, db).await?;
        }
    }

    Ok(())
}
