//! GitHub REST API client.
//!
//! Only used at configuration-validation time, to check that the remote
//! repository exists and the credential is accepted.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use tracing::{debug, info, instrument};

use crate::errors::GitHubError;

/// Asynchronous GitHub REST API client.
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(api_url: impl Into<String>, token: Option<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("gitmirror/0.1"));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .expect("failed to build reqwest client");
        debug!(api_url = %api_url, "created GitHubClient");
        Self {
            http,
            api_url,
            token,
        }
    }

    /// Verify that a repository exists and the credential can see it.
    #[instrument(skip(self))]
    pub async fn verify_repo(&self, repo: &str) -> Result<(), GitHubError> {
        let url = format!("{}/repos/{}", self.api_url, repo);
        let mut req = self.http.get(&url);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        self.check_response(&resp, repo)?;
        info!(repo, "repository verified");
        Ok(())
    }

    fn check_response(&self, resp: &reqwest::Response, repo: &str) -> Result<(), GitHubError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        match status.as_u16() {
            401 | 403 => Err(GitHubError::AuthenticationFailed(format!("HTTP {status}"))),
            404 => Err(GitHubError::RepoNotFound(repo.to_string())),
            429 => {
                let reset = resp
                    .headers()
                    .get("x-ratelimit-reset")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown")
                    .to_string();
                Err(GitHubError::RateLimited { reset_at: reset })
            }
            _ => Err(GitHubError::ApiError {
                status: status.as_u16(),
                body: format!("HTTP {status}"),
            }),
        }
    }
}
