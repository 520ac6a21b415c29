//! Sync coordinator: builds targets, subscribes watch paths, routes events.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::bootstrap;
use crate::config::SyncTargetConfig;
use crate::errors::{BootstrapError, WatchError};
use crate::target::{SyncDisposition, SyncTarget};
use crate::watcher::{ChangeEvent, ChangeWatcher};

/// How often the run loop re-checks the shutdown flag while idle.
const SHUTDOWN_POLL: Duration = Duration::from_millis(500);

/// Shared shutdown flag checked by the run loop.
pub type ShutdownFlag = Arc<AtomicBool>;

/// A bootstrap failure for one target, surfaced without affecting its
/// siblings.
#[derive(Debug)]
pub struct TargetFailure {
    pub repo: String,
    pub error: BootstrapError,
}

/// Owns the set of sync targets for one run and routes change events to
/// them.
pub struct SyncCoordinator {
    targets: Vec<Arc<SyncTarget>>,
}

impl SyncCoordinator {
    /// Bootstrap one target per validated config.
    ///
    /// Construction is isolated per target: a bootstrap failure is
    /// collected and reported, and the remaining targets still start.
    pub fn bootstrap_targets(
        configs: Vec<SyncTargetConfig>,
    ) -> (Self, Vec<TargetFailure>) {
        let mut targets = Vec::new();
        let mut failures = Vec::new();

        for config in configs {
            match bootstrap::bootstrap(&config) {
                Ok(git) => {
                    info!(repo = %config.repo, path = %config.local_path.display(), "target ready");
                    targets.push(Arc::new(SyncTarget::new(config, git)));
                }
                Err(error) => {
                    error!(repo = %config.repo, error = %error, "target bootstrap failed, skipping");
                    failures.push(TargetFailure {
                        repo: config.repo.clone(),
                        error,
                    });
                }
            }
        }

        (Self { targets }, failures)
    }

    pub fn targets(&self) -> &[Arc<SyncTarget>] {
        &self.targets
    }

    /// Every target whose watch-path set is an ancestor of `path`.
    /// Overlapping watch sets deliver to all matching targets.
    pub fn targets_for(&self, path: &Path) -> Vec<Arc<SyncTarget>> {
        self.targets
            .iter()
            .filter(|target| target.watches(path))
            .cloned()
            .collect()
    }

    /// Subscribe to all watch paths and dispatch events until the shutdown
    /// flag is set.
    ///
    /// In-flight sync attempts are allowed to finish after shutdown; only
    /// the subscription itself is released immediately. A failure to
    /// subscribe at all is the one fatal error here.
    pub async fn run(&self, shutdown: ShutdownFlag) -> Result<(), WatchError> {
        let watch_paths: Vec<_> = self
            .targets
            .iter()
            .flat_map(|target| target.config().watch_paths())
            .collect();

        let (watcher, mut events) = ChangeWatcher::subscribe(&watch_paths)?;
        info!(paths = watch_paths.len(), targets = self.targets.len(), "monitoring started");

        let mut in_flight = JoinSet::new();

        loop {
            if shutdown.load(Ordering::SeqCst) {
                info!("shutdown requested, stopping event dispatch");
                break;
            }

            // Reap finished attempts opportunistically so the set stays small.
            while in_flight.try_join_next().is_some() {}

            match tokio::time::timeout(SHUTDOWN_POLL, events.recv()).await {
                Ok(Some(event)) => self.dispatch(event, &mut in_flight),
                Ok(None) => {
                    warn!("event channel closed, stopping");
                    break;
                }
                Err(_) => continue, // idle tick, re-check shutdown
            }
        }

        watcher.stop();

        // No forced cancellation: wait for in-flight attempts to finish.
        while let Some(result) = in_flight.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "sync task panicked");
            }
        }
        info!("monitoring stopped");
        Ok(())
    }

    /// Route one event to every owning target, each on its own task.
    ///
    /// Targets serialize internally, so concurrent dispatches to the same
    /// target queue behind its lock while other targets proceed.
    fn dispatch(&self, event: ChangeEvent, in_flight: &mut JoinSet<()>) {
        for target in self.targets_for(&event.path) {
            let event = event.clone();
            in_flight.spawn(async move {
                match target.handle_change(&event).await {
                    Ok(SyncDisposition::Completed(outcome)) => {
                        debug!(repo = %target.config().repo, outcome = ?outcome, "synced change");
                    }
                    Ok(SyncDisposition::Debounced) | Ok(SyncDisposition::Ignored) => {}
                    Err(e) => {
                        // Already logged by the target; the run keeps going.
                        debug!(repo = %target.config().repo, error = %e, "sync attempt abandoned");
                    }
                }
            });
        }
    }
}
