use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Kind of installable unit; decides where its files land.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, Default, PartialEq, Eq, Hash, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PackageType {
    #[default]
    Integration,
    Lovelace,
    Blueprints,
}

impl PackageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageType::Integration => "integration",
            PackageType::Lovelace => "lovelace",
            PackageType::Blueprints => "blueprints",
        }
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "integration" => Ok(PackageType::Integration),
            "lovelace" => Ok(PackageType::Lovelace),
            "blueprints" => Ok(PackageType::Blueprints),
            other => Err(StoreError::InvalidPackageSpec(format!(
                "unsupported package type: {other}"
            ))),
        }
    }
}

/// How the release payload is located.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum InstallMode {
    /// A file attached to the release.
    Asset,
    /// The forge-generated source archive at the release tag.
    Zipball,
}

impl FromStr for InstallMode {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asset" => Ok(InstallMode::Asset),
            "zipball" => Ok(InstallMode::Zipball),
            other => Err(StoreError::InvalidPackageSpec(format!(
                "unsupported install mode: {other}"
            ))),
        }
    }
}

/// Ledger key for a repository: lowercase `owner_repo` with `-` turned into `_`.
pub fn package_id(owner: &str, repo: &str) -> String {
    format!("{}_{}", owner, repo).to_lowercase().replace('-', "_")
}

/// One tracked installation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub repo_name: String,
    pub owner: String,
    pub package_type: PackageType,
    pub installed_version: String,
    pub latest_version: String,
    pub update_available: bool,
    pub install_date: String,
    pub last_update: String,
    #[serde(default)]
    pub last_check: Option<String>,
    #[serde(default)]
    pub mode: Option<InstallMode>,
    #[serde(default)]
    pub asset_name: Option<String>,
}

impl PackageRecord {
    pub fn package_id(&self) -> String {
        package_id(&self.owner, &self.repo_name)
    }
}

/// An (owner, repo) pair the user added to or hid from the browse view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    pub fn new(owner: &str, repo: &str) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
        }
    }

    /// Case-insensitive match.
    pub fn matches(&self, owner: &str, repo: &str) -> bool {
        self.owner.eq_ignore_ascii_case(owner) && self.repo.eq_ignore_ascii_case(repo)
    }
}
