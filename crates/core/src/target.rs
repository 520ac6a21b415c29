//! Runtime sync target: one working tree, one strategy, one debounce gate.

use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

use crate::config::SyncTargetConfig;
use crate::errors::SyncError;
use crate::git::GitClient;
use crate::strategy::{DominanceStrategy, SyncOutcome};
use crate::watcher::ChangeEvent;

/// What `handle_change` did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncDisposition {
    /// The strategy ran to completion.
    Completed(SyncOutcome),
    /// Discarded: inside the debounce window.
    Debounced,
    /// Discarded: version-control metadata or lock-file noise.
    Ignored,
}

/// Runtime actor owning one working tree and its dominance strategy.
pub struct SyncTarget {
    config: Arc<SyncTargetConfig>,
    strategy: DominanceStrategy,
    /// The working tree, locked only from inside the blocking section.
    git: Arc<StdMutex<GitClient>>,
    /// Debounce timestamp. The guard is held across the whole sync
    /// attempt, so at most one sequence runs at a time per target;
    /// events for the same target queue here while other targets proceed.
    gate: Mutex<Option<Instant>>,
}

impl SyncTarget {
    /// Wrap a bootstrapped working tree. The strategy is fixed here and
    /// never swapped.
    pub fn new(config: SyncTargetConfig, git: GitClient) -> Self {
        let strategy = config.strategy();
        Self {
            config: Arc::new(config),
            strategy,
            git: Arc::new(StdMutex::new(git)),
            gate: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SyncTargetConfig {
        &self.config
    }

    pub fn strategy(&self) -> DominanceStrategy {
        self.strategy
    }

    /// Whether this target's watch-path set covers `path`.
    pub fn watches(&self, path: &Path) -> bool {
        self.config
            .watch_paths()
            .iter()
            .any(|watch| path.starts_with(watch))
    }

    /// React to one admitted filesystem change.
    ///
    /// The debounce timestamp advances only on success; a failed attempt
    /// leaves it unchanged so the next event retries without waiting out
    /// the delay window.
    pub async fn handle_change(&self, event: &ChangeEvent) -> Result<SyncDisposition, SyncError> {
        let mut gate = self.gate.lock().await;

        if is_noise_path(&event.path) {
            trace!(path = %event.path.display(), "ignoring version-control noise");
            return Ok(SyncDisposition::Ignored);
        }

        if let Some(last_sync) = *gate {
            let delay = Duration::from_secs(self.config.sync_delay);
            if last_sync.elapsed() < delay {
                trace!(path = %event.path.display(), "event inside debounce window, discarded");
                return Ok(SyncDisposition::Debounced);
            }
        }

        let reason = event
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| event.path.display().to_string());

        debug!(
            repo = %self.config.repo,
            path = %event.path.display(),
            kind = ?event.kind,
            strategy = %self.strategy,
            "running sync attempt"
        );

        // git2 fetch/push block on the network, so the strategy runs on the
        // blocking pool, not an async worker. The gate guard stays held
        // across the await: attempts for this target never overlap.
        let git = Arc::clone(&self.git);
        let config = Arc::clone(&self.config);
        let strategy = self.strategy;
        let result = tokio::task::spawn_blocking(move || {
            let git = git.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            strategy.apply(&git, &config, &reason)
        })
        .await?;

        match result {
            Ok(outcome) => {
                *gate = Some(Instant::now());
                info!(repo = %self.config.repo, outcome = ?outcome, "sync attempt succeeded");
                Ok(SyncDisposition::Completed(outcome))
            }
            Err(e) => {
                // Retry-without-cooldown: the gate stays where it was.
                warn!(repo = %self.config.repo, error = %e, "sync attempt failed");
                Err(e)
            }
        }
    }

    /// Timestamp of the last successful sync, if any.
    pub async fn last_sync(&self) -> Option<Instant> {
        *self.gate.lock().await
    }
}

/// Noise produced by the version-control primitives' own activity:
/// anything under the `.git` metadata directory, or lock files.
fn is_noise_path(path: &Path) -> bool {
    if path.components().any(|c| c.as_os_str() == ".git") {
        return true;
    }
    path.file_name()
        .map(|name| name.to_string_lossy().ends_with(".lock"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::ChangeKind;
    use std::path::PathBuf;

    fn event(path: &Path) -> ChangeEvent {
        ChangeEvent {
            path: path.to_path_buf(),
            kind: ChangeKind::Modified,
        }
    }

    fn local_dominant_target(tmp: &Path) -> SyncTarget {
        let bare_path = tmp.join("remote.git");
        let bare = git2::Repository::init_bare(&bare_path).unwrap();
        bare.set_head("refs/heads/main").unwrap();

        let local = tmp.join("local");
        std::fs::create_dir(&local).unwrap();
        let git = GitClient::init(&local).unwrap();
        git.checkout_branch("main").unwrap();
        git.add_remote("origin", bare_path.to_str().unwrap())
            .unwrap();

        let toml_str = format!(
            r#"
repo = "test/mirror"
remote_url = "{}"
local_path = "{}"
local_dominance = true
sync_delay = 1
"#,
            bare_path.display(),
            local.display()
        );
        let config: SyncTargetConfig = toml::from_str(&toml_str).unwrap();
        SyncTarget::new(config, git)
    }

    #[test]
    fn test_noise_path_detection() {
        assert!(is_noise_path(&PathBuf::from("/w/repo/.git/index")));
        assert!(is_noise_path(&PathBuf::from("/w/repo/.git/refs/heads/main")));
        assert!(is_noise_path(&PathBuf::from("/w/repo/index.lock")));
        assert!(!is_noise_path(&PathBuf::from("/w/repo/src/main.rs")));
        assert!(!is_noise_path(&PathBuf::from("/w/repo/locker.txt")));
    }

    #[tokio::test]
    async fn test_noise_events_never_trigger_strategy() {
        let tmp = tempfile::tempdir().unwrap();
        let target = local_dominant_target(tmp.path());
        let local = tmp.path().join("local");

        let disposition = target
            .handle_change(&event(&local.join(".git/index")))
            .await
            .unwrap();
        assert_eq!(disposition, SyncDisposition::Ignored);

        let disposition = target
            .handle_change(&event(&local.join("index.lock")))
            .await
            .unwrap();
        assert_eq!(disposition, SyncDisposition::Ignored);
        assert!(target.last_sync().await.is_none());
    }

    #[tokio::test]
    async fn test_noise_inside_debounce_window_is_still_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let target = local_dominant_target(tmp.path());
        let local = tmp.path().join("local");

        std::fs::write(local.join("a.txt"), "v1").unwrap();
        let first = target.handle_change(&event(&local.join("a.txt"))).await.unwrap();
        assert!(matches!(first, SyncDisposition::Completed(_)));

        // Immediately after, still inside the window: a noise event is
        // classified as noise, not as debounced.
        let disposition = target
            .handle_change(&event(&local.join(".git/index")))
            .await
            .unwrap();
        assert_eq!(disposition, SyncDisposition::Ignored);
    }

    #[tokio::test]
    async fn test_concurrent_events_serialize_and_admit_one() {
        let tmp = tempfile::tempdir().unwrap();
        let target = local_dominant_target(tmp.path());
        let local = tmp.path().join("local");

        std::fs::write(local.join("a.txt"), "v1").unwrap();
        std::fs::write(local.join("b.txt"), "v1").unwrap();

        // Two simultaneous events: the second queues behind the gate while
        // the first runs its strategy on the blocking pool, then lands
        // inside the debounce window.
        let event_a = event(&local.join("a.txt"));
        let event_b = event(&local.join("b.txt"));
        let (first, second) = tokio::join!(
            target.handle_change(&event_a),
            target.handle_change(&event_b),
        );
        let dispositions = [first.unwrap(), second.unwrap()];
        let completed = dispositions
            .iter()
            .filter(|d| matches!(d, SyncDisposition::Completed(_)))
            .count();
        assert_eq!(completed, 1);
        assert!(dispositions.contains(&SyncDisposition::Debounced));
        assert!(target.last_sync().await.is_some());
    }

    #[tokio::test]
    async fn test_debounce_admits_one_of_two_rapid_events() {
        let tmp = tempfile::tempdir().unwrap();
        let target = local_dominant_target(tmp.path());
        let local = tmp.path().join("local");

        std::fs::write(local.join("a.txt"), "v1").unwrap();
        let first = target.handle_change(&event(&local.join("a.txt"))).await.unwrap();
        assert!(matches!(first, SyncDisposition::Completed(_)));

        // Immediately after: inside the window, silently discarded.
        std::fs::write(local.join("b.txt"), "v1").unwrap();
        let second = target.handle_change(&event(&local.join("b.txt"))).await.unwrap();
        assert_eq!(second, SyncDisposition::Debounced);
    }

    #[tokio::test]
    async fn test_debounce_admits_events_spaced_beyond_delay() {
        let tmp = tempfile::tempdir().unwrap();
        let target = local_dominant_target(tmp.path());
        let local = tmp.path().join("local");

        std::fs::write(local.join("a.txt"), "v1").unwrap();
        let first = target.handle_change(&event(&local.join("a.txt"))).await.unwrap();
        assert!(matches!(first, SyncDisposition::Completed(_)));

        tokio::time::sleep(Duration::from_millis(1100)).await;

        std::fs::write(local.join("b.txt"), "v1").unwrap();
        let second = target.handle_change(&event(&local.join("b.txt"))).await.unwrap();
        assert!(matches!(second, SyncDisposition::Completed(_)));
    }

    #[tokio::test]
    async fn test_failed_attempt_leaves_gate_unadvanced() {
        let tmp = tempfile::tempdir().unwrap();

        // Remote-dominant target whose remote has no commits: fetch works
        // but origin/main never resolves, so every attempt fails.
        let bare_path = tmp.path().join("remote.git");
        git2::Repository::init_bare(&bare_path).unwrap();
        let local = tmp.path().join("local");
        std::fs::create_dir(&local).unwrap();
        let git = GitClient::init(&local).unwrap();
        git.add_remote("origin", bare_path.to_str().unwrap())
            .unwrap();

        let toml_str = format!(
            r#"
repo = "test/mirror"
remote_url = "{}"
local_path = "{}"
sync_delay = 1
"#,
            bare_path.display(),
            local.display()
        );
        let config: SyncTargetConfig = toml::from_str(&toml_str).unwrap();
        let target = SyncTarget::new(config, git);

        let result = target.handle_change(&event(&local.join("a.txt"))).await;
        assert!(result.is_err());
        assert!(target.last_sync().await.is_none());

        // The very next event re-attempts instead of being debounced.
        let result = target.handle_change(&event(&local.join("a.txt"))).await;
        assert!(result.is_err());
    }
}
