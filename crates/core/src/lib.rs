//! gitmirror core library.
//!
//! Turns raw filesystem change notifications into debounced,
//! dominance-driven version-control operations: configuration, git and
//! GitHub clients, working-tree bootstrap, the two dominance strategies,
//! per-target sync actors, and the coordinator that routes events to them.

pub mod bootstrap;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod git;
pub mod strategy;
pub mod target;
pub mod watcher;

// Re-exports for convenience.
pub use config::SyncTargetConfig;
pub use coordinator::SyncCoordinator;
pub use strategy::DominanceStrategy;
pub use target::SyncTarget;
