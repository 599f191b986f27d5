use reqwest::StatusCode;
use urlencoding::encode;

use super::setup::{ForgeClient, ensure_ok};
use crate::error::Result;
use crate::models::Repository;

impl ForgeClient {
    pub async fn get_repo(&self, owner: &str, repo: &str) -> Result<Repository> {
        self.get_json("Repo", &Self::repo_path(owner, repo)).await
    }

    pub async fn get_org_repos(&self, org: &str) -> Result<Vec<Repository>> {
        self.get_json("Org repos", &format!("/orgs/{}/repos", encode(org)))
            .await
    }

    /// README text at the default branch; `None` when the repo has none.
    pub async fn get_readme(&self, owner: &str, repo: &str) -> Result<Option<String>> {
        let path = format!("{}/raw/README.md", Self::repo_path(owner, repo));
        let response = self.get(&path).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let text = ensure_ok("README", response).await?.text().await?;
        Ok(Some(text))
    }

    /// Forge-generated zip of the repository at `git_ref`.
    pub fn archive_zip_url(&self, owner: &str, repo: &str, git_ref: &str) -> String {
        self.api_url(&format!(
            "{}/archive/{}.zip",
            Self::repo_path(owner, repo),
            encode(git_ref)
        ))
    }
}
