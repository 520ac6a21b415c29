//! Sync target configuration.
//!
//! A configuration document describes one or more mirrored pairs: a local
//! directory tree bound to a branch of a remote GitHub repository, with a
//! dominance flag deciding which side overwrites the other.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::{ConfigError, GitHubError};
use crate::git::github::GitHubClient;
use crate::git::remote_url::derive_git_remote_url;
use crate::strategy::DominanceStrategy;

// ---------------------------------------------------------------------------
// Sync target
// ---------------------------------------------------------------------------

/// Configuration for one mirrored pair. Immutable after validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncTargetConfig {
    /// Remote repository in `owner/repo` format.
    pub repo: String,

    /// GitHub API base URL (default `https://api.github.com`).
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Explicit clone/push URL. When set, this overrides the automatic
    /// derivation from `api_url` + `repo`. Also accepts local paths,
    /// which is what the integration tests use.
    #[serde(default)]
    pub remote_url: Option<String>,

    /// Literal access token. Prefer `token_env` in checked-in configs.
    #[serde(default)]
    pub token: Option<String>,

    /// Environment variable holding the access token.
    #[serde(default)]
    pub token_env: Option<String>,

    /// Local working-tree directory.
    pub local_path: PathBuf,

    /// Directories to watch for changes. Defaults to `[local_path]`.
    #[serde(default)]
    pub watch_paths: Vec<PathBuf>,

    /// Minimum seconds between successful syncs (debounce window).
    #[serde(default = "default_sync_delay")]
    pub sync_delay: u64,

    /// When true the local tree overwrites the remote; when false the
    /// remote overwrites the local tree.
    #[serde(default)]
    pub local_dominance: bool,

    /// Branch that is mirrored.
    #[serde(default = "default_branch")]
    pub target_branch: String,

    /// Whether a missing target branch may be created with a prefix.
    #[serde(default)]
    pub create_new_branch: bool,

    /// Prefix for created branches.
    #[serde(default = "default_branch_prefix")]
    pub branch_prefix: String,
}

fn default_api_url() -> String {
    "https://api.github.com".into()
}

fn default_sync_delay() -> u64 {
    1
}

fn default_branch() -> String {
    "main".into()
}

fn default_branch_prefix() -> String {
    "sync".into()
}

impl SyncTargetConfig {
    /// Resolve the access token, consulting `token_env` when no literal
    /// token is configured.
    pub fn resolve_token(&mut self) -> Result<(), ConfigError> {
        if self.token.is_some() {
            return Ok(());
        }
        if let Some(var) = &self.token_env {
            match std::env::var(var) {
                Ok(val) if !val.is_empty() => {
                    debug!(var, "resolved token from environment");
                    self.token = Some(val);
                }
                _ => {
                    return Err(ConfigError::EnvVarMissing {
                        var: var.clone(),
                        field: "token_env".into(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Validate the declarative fields and create any missing directories.
    ///
    /// Directory creation is a deliberate side effect: an absent local or
    /// watch path is never an error, only a `mkdir -p` and a log line.
    /// Pre-existing directories (empty or not) are accepted as-is.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.repo.is_empty() || !self.repo.contains('/') {
            return Err(ConfigError::InvalidValue {
                field: "repo".into(),
                detail: "repository must be in 'owner/repo' format".into(),
            });
        }
        if self.sync_delay < 1 {
            return Err(ConfigError::InvalidValue {
                field: "sync_delay".into(),
                detail: "sync_delay must be at least 1 second".into(),
            });
        }
        if self.target_branch.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "target_branch".into(),
                detail: "target branch must not be empty".into(),
            });
        }
        if self.create_new_branch && self.branch_prefix.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "branch_prefix".into(),
                detail: "branch_prefix must not be empty when create_new_branch is set".into(),
            });
        }

        ensure_directory(&self.local_path)?;
        for path in self.watch_paths() {
            ensure_directory(&path)?;
        }
        Ok(())
    }

    /// Resolve the repository against the hosting API.
    ///
    /// Only called at configuration-validation time; a failure here is
    /// fatal for this target but must not abort sibling targets.
    pub async fn verify_remote(&self, github: &GitHubClient) -> Result<(), ConfigError> {
        // Local-path remotes (tests, air-gapped mirrors) skip the API check.
        if let Some(url) = &self.remote_url {
            if !url.starts_with("http") {
                debug!(url, "skipping hosting API check for non-HTTP remote");
                return Ok(());
            }
        }
        match github.verify_repo(&self.repo).await {
            Ok(()) => {
                info!(repo = %self.repo, "remote repository verified");
                Ok(())
            }
            Err(GitHubError::AuthenticationFailed(detail)) => Err(ConfigError::RemoteUnreachable {
                repo: self.repo.clone(),
                detail: format!("credentials rejected: {detail}"),
            }),
            Err(e) => Err(ConfigError::RemoteUnreachable {
                repo: self.repo.clone(),
                detail: e.to_string(),
            }),
        }
    }

    /// The effective watch paths: the configured set, or the local path
    /// when none were given.
    pub fn watch_paths(&self) -> Vec<PathBuf> {
        if self.watch_paths.is_empty() {
            vec![self.local_path.clone()]
        } else {
            self.watch_paths.clone()
        }
    }

    /// The clone/push URL for the configured repository.
    pub fn clone_url(&self) -> String {
        if let Some(url) = &self.remote_url {
            return url.clone();
        }
        derive_git_remote_url(&self.api_url, &self.repo)
    }

    /// The dominance strategy bound to this target.
    pub fn strategy(&self) -> DominanceStrategy {
        if self.local_dominance {
            DominanceStrategy::LocalDominant
        } else {
            DominanceStrategy::RemoteDominant
        }
    }

    /// The resolved access token, if any.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Generate a default TOML config template string.
    pub fn default_template() -> &'static str {
        r#"# gitmirror configuration
# Single target at the top level, or several under [[sync_targets]].

repo = "yourname/mirror"
token_env = "GITMIRROR_GITHUB_TOKEN"
local_path = "/home/you/mirror"
# watch_paths = ["/home/you/mirror"]   # defaults to local_path
sync_delay = 5
local_dominance = false
target_branch = "main"
"#
    }
}

fn ensure_directory(path: &Path) -> Result<(), ConfigError> {
    if !path.exists() {
        warn!(path = %path.display(), "directory does not exist, creating it");
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Document loading
// ---------------------------------------------------------------------------

/// A configuration document: either a single target at the top level or a
/// list under `sync_targets`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ConfigDocument {
    Multi { sync_targets: Vec<SyncTargetConfig> },
    Single(Box<SyncTargetConfig>),
}

/// Parse a configuration document from a TOML file.
///
/// Parsing alone; token resolution and validation are per-target steps so
/// that one bad target does not take down its siblings.
pub fn load_document<P: AsRef<Path>>(path: P) -> Result<Vec<SyncTargetConfig>, ConfigError> {
    let path = path.as_ref();
    info!(path = %path.display(), "loading configuration");

    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let contents = std::fs::read_to_string(path)?;
    let document: ConfigDocument =
        toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

    let targets = match document {
        ConfigDocument::Multi { sync_targets } => sync_targets,
        ConfigDocument::Single(target) => vec![*target],
    };
    debug!(count = targets.len(), "configuration parsed");
    Ok(targets)
}
