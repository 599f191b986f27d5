use reqwest::StatusCode;
use tracing::{debug, info};

use super::setup::{AUTH_TIMEOUT, ForgeClient};
use crate::error::Result;
use crate::models::{Organization, Repository};

impl ForgeClient {
    /// `true` without a token (public-only mode) or when `GET /user` answers 200.
    ///
    /// Never fails: transport errors count as an invalid token.
    pub async fn test_auth(&self) -> bool {
        if !self.has_token() {
            info!("no token configured, using public access");
            return true;
        }
        match self.get("/user").timeout(AUTH_TIMEOUT).send().await {
            Ok(response) => {
                let ok = response.status() == StatusCode::OK;
                debug!(status = %response.status(), ok, "auth probe");
                ok
            }
            Err(e) => {
                debug!(error = %e, "auth probe failed");
                false
            }
        }
    }

    pub async fn get_user_orgs(&self) -> Result<Vec<Organization>> {
        self.get_json("User orgs", "/user/orgs").await
    }

    /// Repositories owned by or shared with the token's account.
    pub async fn get_user_repos(&self) -> Result<Vec<Repository>> {
        self.get_json("User repos", "/user/repos").await
    }
}
