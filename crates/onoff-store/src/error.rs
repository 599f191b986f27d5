//! Error type shared by the forge client, the ledger and the install service.

use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Transport failure or timeout talking to the forge.
    #[error("cannot reach forge: {0}")]
    Connectivity(#[from] reqwest::Error),

    /// 401/403 from the forge, usually an expired or revoked token.
    #[error("authentication failed ({status}): {body}")]
    Auth { status: StatusCode, body: String },

    /// 404: repo or release missing, or not visible with the current token.
    #[error("{what} not found: {body}")]
    NotFound { what: String, body: String },

    /// Any other non-200 answer.
    #[error("{what} fetch failed: {status} {body}")]
    Upstream {
        what: String,
        status: StatusCode,
        body: String,
    },

    #[error("{0}")]
    AmbiguousAsset(String),

    #[error("invalid package: {0}")]
    InvalidPackageSpec(String),

    #[error("executor failed: {0}")]
    Executor(String),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl StoreError {
    /// Classify a non-200 response from the forge.
    pub fn from_status(what: &str, status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Auth { status, body },
            StatusCode::NOT_FOUND => StoreError::NotFound {
                what: what.to_string(),
                body,
            },
            _ => StoreError::Upstream {
                what: what.to_string(),
                status,
                body,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
