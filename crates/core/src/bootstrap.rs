//! Working-tree bootstrap for a sync target.
//!
//! Turns a validated [`SyncTargetConfig`] into a ready local working tree
//! bound to the target branch, choosing among open / clone /
//! initialize-in-place, then applying the dominance strategy once as the
//! initial sync.

use std::path::Path;

use tracing::{info, warn};

use crate::config::SyncTargetConfig;
use crate::errors::BootstrapError;
use crate::git::GitClient;
use crate::strategy::DominanceStrategy;

/// Prepare the local working tree for one sync target.
///
/// Precedence:
/// 1. A `.git` directory already exists at the local path: open it as-is.
/// 2. The local path is absent or empty: clone the remote into it.
/// 3. The local path is non-empty with no `.git`: initialize a repository
///    in place, register `origin` and fetch (both tolerated on failure),
///    and capture any existing content in an initial commit.
///
/// Afterwards the configured strategy runs once as the initial sync
/// (failures logged, non-fatal: the target stays usable in a degraded
/// state), and the target branch is checked out, created from the current
/// state if missing.
pub fn bootstrap(config: &SyncTargetConfig) -> Result<GitClient, BootstrapError> {
    let local = &config.local_path;
    let clone_url = config.clone_url();

    let mut made_initial_commit = false;
    let git = if local.join(".git").exists() {
        GitClient::open(local).map_err(|source| BootstrapError::OpenFailed {
            path: local.display().to_string(),
            source,
        })?
    } else if is_absent_or_empty(local)? {
        GitClient::clone_repo(&clone_url, local, config.token()).map_err(|source| {
            BootstrapError::CloneFailed {
                url: clone_url.clone(),
                source,
            }
        })?
    } else {
        info!(path = %local.display(), "no .git found, initializing repository in place");
        let git = init_in_place(local, &clone_url, config)?;
        made_initial_commit = capture_existing_content(&git)?;
        if let Err(e) = git.fetch("origin", config.token()) {
            warn!(error = %e, "could not fetch remote, continuing without remote state");
        }
        git
    };

    // Initial sync. A failure here leaves the target degraded but usable;
    // the next change event retries.
    let strategy = config.strategy();
    match strategy.apply(&git, config, "bootstrap") {
        Ok(outcome) => info!(strategy = %strategy, outcome = ?outcome, "initial sync applied"),
        Err(e) => warn!(strategy = %strategy, error = %e, "initial sync failed"),
    }

    git.checkout_branch(&config.target_branch)
        .map_err(|source| BootstrapError::CheckoutFailed {
            branch: config.target_branch.clone(),
            source,
        })?;

    // An initial commit captured from an existing directory under local
    // dominance belongs on the remote, even though the tree is clean by
    // the time the strategy first runs.
    if made_initial_commit && strategy == DominanceStrategy::LocalDominant {
        if let Err(e) = git.push("origin", &config.target_branch, true, config.token()) {
            warn!(error = %e, "could not push initial commit, will retry on next change");
        }
    }

    Ok(git)
}

fn is_absent_or_empty(path: &Path) -> Result<bool, BootstrapError> {
    if !path.exists() {
        return Ok(true);
    }
    Ok(path.read_dir()?.next().is_none())
}

fn init_in_place(
    local: &Path,
    clone_url: &str,
    config: &SyncTargetConfig,
) -> Result<GitClient, BootstrapError> {
    let git = GitClient::init(local).map_err(|source| BootstrapError::InitFailed {
        path: local.display().to_string(),
        source,
    })?;
    git.checkout_branch(&config.target_branch)
        .map_err(|source| BootstrapError::CheckoutFailed {
            branch: config.target_branch.clone(),
            source,
        })?;
    if !git.has_remote("origin") {
        if let Err(e) = git.add_remote("origin", clone_url) {
            warn!(error = %e, "could not register remote, continuing without it");
        }
    }
    Ok(git)
}

fn capture_existing_content(git: &GitClient) -> Result<bool, BootstrapError> {
    let dirty = git.is_dirty().map_err(|source| BootstrapError::InitFailed {
        path: git.repo_path().display().to_string(),
        source,
    })?;
    if !dirty {
        return Ok(false);
    }
    let commit = git
        .stage_all()
        .and_then(|_| git.commit("Initial commit from existing directory"))
        .map_err(|source| BootstrapError::InitFailed {
            path: git.repo_path().display().to_string(),
            source,
        })?;
    info!(commit = %commit, "captured existing directory content");
    Ok(true)
}
