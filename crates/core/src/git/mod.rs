//! Git operations for gitmirror.

pub mod client;
pub mod github;
pub mod remote_url;

pub use client::GitClient;
pub use github::GitHubClient;
