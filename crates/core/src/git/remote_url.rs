//! Host-aware Git remote URL derivation.
//!
//! Constructs the HTTPS clone/push URL for a GitHub repository from the
//! configured API URL, covering both github.com and GitHub Enterprise
//! Server layouts.

/// Derive the HTTPS clone URL for a GitHub repository.
///
/// - `https://api.github.com` → `https://github.com`
/// - `https://<host>/api/v3`  → `https://<host>`
/// - anything else            → strip trailing slash, use as-is
///
/// The resulting URL is `{base}/{repo}.git` where `repo` is in
/// `owner/name` format.
pub fn derive_git_remote_url(api_url: &str, repo: &str) -> String {
    let url = api_url.trim().trim_end_matches('/');

    let base = if url.eq_ignore_ascii_case("https://api.github.com") {
        "https://github.com"
    } else if let Some(base) = url.strip_suffix("/api/v3") {
        base
    } else {
        url
    };

    format!("{base}/{repo}.git")
}
