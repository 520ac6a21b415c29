//! Error types for the gitmirror core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    GitHub(#[from] GitHubError),

    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Watch(#[from] WatchError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
///
/// A configuration error is fatal for the target it concerns; in a
/// multi-target run the other targets keep going.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A required environment variable is not set.
    #[error("environment variable '{var}' is not set (referenced by config field '{field}')")]
    EnvVarMissing {
        var: String,
        field: String,
    },

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// The remote repository could not be resolved against the hosting API.
    #[error("remote repository '{repo}' is unreachable: {detail}")]
    RemoteUnreachable {
        repo: String,
        detail: String,
    },

    /// Generic I/O error (e.g. creating a watch directory).
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Git errors
// ---------------------------------------------------------------------------

/// Errors from local Git (git2) operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// The repository path does not exist or is not a git repo.
    #[error("git repository not found at '{0}'")]
    RepositoryNotFound(String),

    /// A `git2` library error.
    #[error("git2 error: {0}")]
    Git2Error(#[from] git2::Error),

    /// A ref (branch, remote-tracking ref, SHA) could not be resolved.
    #[error("git ref not found: {0}")]
    RefNotFound(String),

    /// Push was rejected by the remote (e.g. non-fast-forward).
    #[error("git push rejected for branch '{branch}': {detail}")]
    PushRejected {
        branch: String,
        detail: String,
    },

    /// Generic I/O wrapper.
    #[error("git I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// GitHub API errors
// ---------------------------------------------------------------------------

/// Errors from GitHub REST API interactions.
#[derive(Debug, Error)]
pub enum GitHubError {
    /// HTTP-level transport error (network, TLS, etc.).
    #[error("GitHub HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The API returned a non-success status code.
    #[error("GitHub API error (HTTP {status}): {body}")]
    ApiError {
        status: u16,
        body: String,
    },

    /// Authentication token is missing or invalid.
    #[error("GitHub authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The repository does not exist (or the token cannot see it).
    #[error("GitHub repository not found: {0}")]
    RepoNotFound(String),

    /// Rate limit exceeded.
    #[error("GitHub rate limit exceeded, resets at {reset_at}")]
    RateLimited {
        reset_at: String,
    },
}

// ---------------------------------------------------------------------------
// Bootstrap errors
// ---------------------------------------------------------------------------

/// Errors preparing a local working tree for a sync target.
///
/// A bootstrap failure means the target is not started; sibling targets
/// are unaffected.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// An existing repository could not be opened.
    #[error("failed to open repository at '{path}': {source}")]
    OpenFailed {
        path: String,
        source: GitError,
    },

    /// Cloning the remote repository failed.
    #[error("failed to clone '{url}': {source}")]
    CloneFailed {
        url: String,
        source: GitError,
    },

    /// Initializing a repository in an existing directory failed.
    #[error("failed to initialize repository at '{path}': {source}")]
    InitFailed {
        path: String,
        source: GitError,
    },

    /// The target branch could not be checked out or created.
    #[error("failed to check out branch '{branch}': {source}")]
    CheckoutFailed {
        branch: String,
        source: GitError,
    },

    /// Generic I/O error (e.g. creating the working-tree directory).
    #[error("bootstrap I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Sync errors
// ---------------------------------------------------------------------------

/// Errors from a single dominance-strategy execution.
///
/// These are always recovered locally: the attempt is logged and
/// abandoned, and the debounce gate is left unadvanced so the next
/// event retries.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Underlying Git error during a sync attempt.
    #[error("sync git error: {0}")]
    Git(#[from] GitError),

    /// The blocking task running the strategy could not be joined.
    #[error("sync task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

// ---------------------------------------------------------------------------
// Watcher errors
// ---------------------------------------------------------------------------

/// Errors from the filesystem change-notification subscription.
#[derive(Debug, Error)]
pub enum WatchError {
    /// Underlying notify backend error.
    #[error("filesystem watch error: {0}")]
    Notify(#[from] notify::Error),

    /// A watch path could not be registered.
    #[error("failed to watch path '{path}': {detail}")]
    PathUnwatchable {
        path: String,
        detail: String,
    },
}
