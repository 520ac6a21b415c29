//! Dominance enforcement policies.
//!
//! Each policy converts "a change happened" into a concrete sequence of
//! version-control primitive calls. Dominance is all-or-nothing per sync
//! attempt; there is no file-level merging.

use tracing::{debug, info};

use crate::config::SyncTargetConfig;
use crate::errors::SyncError;
use crate::git::GitClient;

/// Which side is authoritative during a sync. Fixed per target at
/// construction, never swapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DominanceStrategy {
    /// Local changes overwrite remote history (commit + force-push).
    LocalDominant,
    /// Remote state overwrites the local tree (fetch + hard reset + clean).
    RemoteDominant,
}

impl std::fmt::Display for DominanceStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LocalDominant => write!(f, "local-dominant"),
            Self::RemoteDominant => write!(f, "remote-dominant"),
        }
    }
}

/// What a single strategy execution did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Local dominance: committed and force-pushed.
    Pushed { commit: String },
    /// Local dominance with a clean tree: nothing to do, no push attempted.
    CleanNoOp,
    /// Remote dominance: fetched, hard-reset, and cleaned.
    MirroredRemote,
}

impl DominanceStrategy {
    /// Run one full sync sequence against the target's working tree.
    ///
    /// `reason` names the trigger (a changed path, or "bootstrap") and
    /// ends up in the commit message under local dominance.
    pub fn apply(
        &self,
        git: &GitClient,
        config: &SyncTargetConfig,
        reason: &str,
    ) -> Result<SyncOutcome, SyncError> {
        match self {
            Self::LocalDominant => {
                git.stage_all()?;
                if !git.is_dirty()? {
                    debug!("working tree clean, nothing to push");
                    return Ok(SyncOutcome::CleanNoOp);
                }
                let oid = git.commit(&format!("Auto-sync: changes in {reason}"))?;
                git.push("origin", &config.target_branch, true, config.token())?;
                info!(commit = %oid, branch = %config.target_branch, "pushed local changes");
                Ok(SyncOutcome::Pushed {
                    commit: oid.to_string(),
                })
            }
            Self::RemoteDominant => {
                // Always the full sequence, dirty or not: the point is to
                // make the local tree a pure mirror of the remote tip.
                git.fetch("origin", config.token())?;
                let remote_ref = format!("refs/remotes/origin/{}", config.target_branch);
                git.reset_hard(&remote_ref)?;
                git.clean_untracked()?;
                info!(branch = %config.target_branch, "mirrored remote state");
                Ok(SyncOutcome::MirroredRemote)
            }
        }
    }
}
