//! gitmirror monitoring daemon.
//!
//! Loads a configuration document describing one or more mirrored pairs,
//! bootstraps a working tree for each, and mirrors filesystem changes
//! onto the configured remote branches until interrupted.

mod signals;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use gitmirror_core::config::{self, SyncTargetConfig};
use gitmirror_core::coordinator::SyncCoordinator;
use gitmirror_core::git::GitHubClient;

/// gitmirror — continuous directory-to-repository mirroring daemon.
#[derive(Parser)]
#[command(name = "gitmirrord", version, about)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "~/.config/gitmirror/config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the configuration and monitor until interrupted.
    Run,

    /// Validate the configuration (including remote reachability) and exit.
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let file_appender = tracing_appender::rolling::never(".", "gitmirror.log");
    let (file_writer, _log_guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();

    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);

    match cli.command {
        Commands::Run => cmd_run(&config_path).await,
        Commands::Check => cmd_check(&config_path).await,
    }
}

/// Load the document and prepare each target independently: token
/// resolution, field validation, and the hosting API check. A failure
/// affects only the target it concerns.
async fn prepare_targets(config_path: &str) -> Result<(Vec<SyncTargetConfig>, usize)> {
    let targets = config::load_document(config_path).context("failed to load configuration")?;
    if targets.is_empty() {
        anyhow::bail!("configuration contains no sync targets");
    }

    let mut ready = Vec::new();
    let mut rejected = 0usize;
    for mut target in targets {
        let repo = target.repo.clone();
        let prepared = async {
            target.resolve_token()?;
            target.validate()?;
            let github = GitHubClient::new(&target.api_url, target.token().map(String::from));
            target.verify_remote(&github).await?;
            Ok::<_, gitmirror_core::errors::ConfigError>(target)
        }
        .await;

        match prepared {
            Ok(target) => ready.push(target),
            Err(e) => {
                rejected += 1;
                error!(repo = %repo, error = %e, "target configuration rejected");
            }
        }
    }
    Ok((ready, rejected))
}

/// Load configuration and start monitoring unattended.
async fn cmd_run(config_path: &str) -> Result<()> {
    let (ready, rejected) = prepare_targets(config_path).await?;
    if ready.is_empty() {
        anyhow::bail!("no usable sync targets ({rejected} rejected)");
    }
    if rejected > 0 {
        warn!(rejected, "continuing without rejected targets");
    }

    let (coordinator, failures) = SyncCoordinator::bootstrap_targets(ready);
    for failure in &failures {
        error!(repo = %failure.repo, error = %failure.error, "target not started");
    }
    if coordinator.targets().is_empty() {
        anyhow::bail!("no sync targets could be bootstrapped");
    }

    let shutdown = signals::setup_signal_handlers();
    info!("monitoring started, press Ctrl+C to stop");
    coordinator
        .run(shutdown)
        .await
        .context("change-notification subscription failed")?;
    Ok(())
}

/// Validate the configuration, reporting each target distinctly.
async fn cmd_check(config_path: &str) -> Result<()> {
    let (ready, rejected) = prepare_targets(config_path).await?;
    for target in &ready {
        println!("✓ {} -> {} ({})", target.local_path.display(), target.repo, target.strategy());
    }
    if rejected > 0 {
        anyhow::bail!("{rejected} target(s) rejected, see log for details");
    }
    println!("Configuration OK: {} target(s)", ready.len());
    Ok(())
}

/// Expand `~` to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return format!("{}/{}", home.display(), rest);
        }
    }
    path.to_string()
}
