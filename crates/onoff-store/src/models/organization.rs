use serde::{Deserialize, Serialize};

/// Organization listed by `GET /user/orgs`.
///
/// Older Gitea releases only fill `username`, newer ones fill `name`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Organization {
    pub id: u64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub visibility: Option<String>,
}

impl Organization {
    /// Name usable in `/orgs/{org}/repos`.
    pub fn login(&self) -> Option<&str> {
        self.username
            .as_deref()
            .or(self.name.as_deref())
            .filter(|s| !s.is_empty())
    }
}
