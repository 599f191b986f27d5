use std::time::Duration;

use reqwest::{Client as ReqwestClient, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use urlencoding::encode;

use crate::error::{Result, StoreError};

/// Per-call timeout for ordinary API reads.
pub const API_TIMEOUT: Duration = Duration::from_secs(30);
/// Shorter timeout for the token probe.
pub const AUTH_TIMEOUT: Duration = Duration::from_secs(20);

/// Read-only client for a Gitea-compatible forge (`/api/v1`).
///
/// Every call is a fresh round trip: no retries, no caching.
#[derive(Debug, Clone)]
pub struct ForgeClient {
    base_url: String,
    token: Option<String>,
    http: ReqwestClient,
}

impl ForgeClient {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
            http: ReqwestClient::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// `{base}/api/v1{path}`; `path` must already be encoded.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    /// `/repos/{owner}/{repo}` with both segments percent-encoded.
    pub(crate) fn repo_path(owner: &str, repo: &str) -> String {
        format!("/repos/{}/{}", encode(owner), encode(repo))
    }

    pub(crate) fn get(&self, path: &str) -> RequestBuilder {
        let req = self
            .http
            .get(self.api_url(path))
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(API_TIMEOUT);
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// GET and decode a 200 JSON body; any other status becomes a typed error.
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, what: &str, path: &str) -> Result<T> {
        let response = self.get(path).send().await?;
        let response = ensure_ok(what, response).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

pub(crate) async fn ensure_ok(what: &str, response: Response) -> Result<Response> {
    let status = response.status();
    tracing::debug!(what, %status, url = %response.url(), "forge response");
    if status == StatusCode::OK {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::from_status(what, status, body))
}
