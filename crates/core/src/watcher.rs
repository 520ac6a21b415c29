//! Filesystem change-notification subscription.
//!
//! Wraps a `notify::RecommendedWatcher` and normalizes its raw events into
//! [`ChangeEvent`]s delivered over a bounded channel. The notify backend
//! delivers callbacks from its own background threads; the channel is the
//! hand-off into the async side.

use std::path::PathBuf;

use notify::event::{Event, EventKind, ModifyKind, RenameMode};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{error, info, trace, warn};

use crate::errors::WatchError;

/// Channel capacity for in-flight change events. A burst beyond this
/// blocks the notify thread briefly rather than growing without bound.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// The kind of filesystem change that occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
    Moved,
}

/// A single normalized filesystem change. Transient; never persisted.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    /// The affected path. For `Moved`, the destination.
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// An active recursive subscription over a set of watch paths.
pub struct ChangeWatcher {
    watcher: RecommendedWatcher,
    paths: Vec<PathBuf>,
}

impl ChangeWatcher {
    /// Subscribe recursively to every path in `paths`.
    ///
    /// Returns the subscription handle and the receiving end of the event
    /// channel. Dropping the handle (or calling [`ChangeWatcher::stop`])
    /// ends delivery.
    pub fn subscribe(
        paths: &[PathBuf],
    ) -> Result<(Self, mpsc::Receiver<ChangeEvent>), WatchError> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    for change in normalize(&event) {
                        trace!(path = %change.path.display(), kind = ?change.kind, "fs event");
                        if tx.blocking_send(change).is_err() {
                            // Receiver gone; the run loop has shut down.
                            return;
                        }
                    }
                }
                Err(e) => error!(error = %e, "watcher backend error"),
            },
            notify::Config::default(),
        )?;

        for path in paths {
            watcher
                .watch(path, RecursiveMode::Recursive)
                .map_err(|e| WatchError::PathUnwatchable {
                    path: path.display().to_string(),
                    detail: e.to_string(),
                })?;
            info!(path = %path.display(), "watching directory");
        }

        Ok((
            Self {
                watcher,
                paths: paths.to_vec(),
            },
            rx,
        ))
    }

    /// Release the subscription. Events already in the channel are still
    /// delivered; nothing new is produced.
    pub fn stop(mut self) {
        for path in &self.paths {
            if let Err(e) = self.watcher.unwatch(path) {
                warn!(path = %path.display(), error = %e, "failed to unwatch path");
            }
        }
        info!("stopped filesystem subscription");
    }
}

/// Map a raw notify event to zero or more normalized change events.
///
/// Access events and other unclassifiable noise are dropped here. Renames
/// report the destination path; a From-only rename has no destination and
/// is treated as a deletion of the source.
fn normalize(event: &Event) -> Vec<ChangeEvent> {
    let kind = match &event.kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Remove(_) => ChangeKind::Deleted,
        // A From-only rename carries just the vanished source path, so
        // there is no destination to report.
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => ChangeKind::Deleted,
        EventKind::Modify(ModifyKind::Name(_)) => ChangeKind::Moved,
        EventKind::Modify(_) => ChangeKind::Modified,
        _ => return Vec::new(),
    };

    if kind == ChangeKind::Moved {
        // Rename events may carry [from, to]; the destination is last.
        return event
            .paths
            .last()
            .map(|path| ChangeEvent {
                path: path.clone(),
                kind,
            })
            .into_iter()
            .collect();
    }

    event
        .paths
        .iter()
        .map(|path| ChangeEvent {
            path: path.clone(),
            kind,
        })
        .collect()
}
