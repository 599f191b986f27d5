use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RepoOwner {
    #[serde(default)]
    pub id: u64,
    pub login: String,
    #[serde(default)]
    pub full_name: String,
}

/// Repository metadata from `GET /repos/{owner}/{repo}` and the listing endpoints.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Repository {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub owner: Option<RepoOwner>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub updated_at: String,
}

impl Repository {
    pub fn owner_login(&self) -> &str {
        self.owner
            .as_ref()
            .map(|o| o.login.as_str())
            .unwrap_or("Unknown")
    }
}
