//! Browse view: the static store list, organization listings, the user's own
//! repos and custom repos merged into one list of installable packages.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::endpoints::ForgeClient;
use crate::error::Result;
use crate::ledger::LedgerDocument;
use crate::models::{InstallMode, PackageType, Repository};

/// Organizations listed even without a token.
pub const DEFAULT_ORGS: &[&str] = &["Zing", "OnOffPublic"];

/// One entry of `store_list.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreListEntry {
    #[serde(default)]
    pub name: Option<String>,
    pub owner: String,
    pub repo: String,
    #[serde(default, rename = "type")]
    pub package_type: Option<PackageType>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mode: Option<InstallMode>,
    #[serde(default)]
    pub asset_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreList {
    pub packages: Vec<StoreListEntry>,
}

#[derive(Debug, Deserialize)]
struct StoreListFile {
    #[serde(default)]
    packages: Vec<serde_yaml::Value>,
}

impl StoreList {
    /// Parse the YAML text; entries that are not complete mappings are skipped.
    pub fn parse(text: &str) -> Result<Self> {
        let file: Option<StoreListFile> = serde_yaml::from_str(text)?;
        let packages = file
            .map(|f| f.packages)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|value| match serde_yaml::from_value::<StoreListEntry>(value) {
                Ok(entry) if !entry.owner.is_empty() && !entry.repo.is_empty() => Some(entry),
                Ok(_) => None,
                Err(e) => {
                    warn!(error = %e, "skipping invalid store list entry");
                    None
                }
            })
            .collect();
        Ok(Self { packages })
    }

    /// Missing or unreadable files give an empty list.
    pub async fn load_or_empty(path: &Path) -> Self {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "store list not available");
                return Self::default();
            }
        };
        match Self::parse(&text) {
            Ok(list) => {
                info!(count = list.packages.len(), "loaded store list");
                list
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to parse store list");
                Self::default()
            }
        }
    }

    pub fn find(&self, owner: &str, repo: &str) -> Option<&StoreListEntry> {
        self.packages
            .iter()
            .find(|p| p.owner == owner && p.repo == repo)
    }
}

/// A row of the browse view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub name: String,
    pub repo_name: String,
    pub owner: String,
    #[serde(rename = "type")]
    pub package_type: PackageType,
    pub description: String,
    pub updated_at: String,
    pub mode: Option<InstallMode>,
    pub asset_name: Option<String>,
    pub is_installed: bool,
    pub update_available: bool,
    pub latest_version: Option<String>,
    pub is_hidden: bool,
}

fn lovelace_name() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)card|lovelace").expect("valid regex"))
}

fn lovelace_description() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)card|theme").expect("valid regex"))
}

fn blueprint() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)blueprint").expect("valid regex"))
}

/// Guess the package type of an untracked repository from its name and description.
pub fn detect_type(repo_name: &str, description: &str) -> PackageType {
    if lovelace_name().is_match(repo_name) || lovelace_description().is_match(description) {
        PackageType::Lovelace
    } else if blueprint().is_match(repo_name) || blueprint().is_match(description) {
        PackageType::Blueprints
    } else {
        PackageType::Integration
    }
}

/// Accumulates rows while the listings come in.
struct Rows<'a> {
    rows: Vec<CatalogEntry>,
    doc: &'a LedgerDocument,
    store_list: &'a StoreList,
    authenticated: bool,
}

impl Rows<'_> {
    fn contains(&self, owner: &str, repo: &str) -> bool {
        self.rows
            .iter()
            .any(|x| x.owner.eq_ignore_ascii_case(owner) && x.repo_name.eq_ignore_ascii_case(repo))
    }

    /// Add `r` unless already listed. `x-` repos need `bypass`, a valid
    /// session, or a custom-repo entry.
    fn fill(&mut self, r: &Repository, bypass: bool) {
        if r.full_name.is_empty() || self.rows.iter().any(|x| x.name == r.full_name) {
            return;
        }
        let owner = r.owner_login();
        let repo_name = r.name.as_str();
        if !bypass
            && !self.authenticated
            && repo_name.to_lowercase().starts_with("x-")
            && !self.doc.is_custom_repo(owner, repo_name)
        {
            return;
        }

        let description = r.description.clone().unwrap_or_default();
        let tracked = self.doc.package_by_repo(owner, repo_name);
        let listed = self.store_list.find(owner, repo_name);
        let package_type = match tracked {
            Some(p) => p.package_type,
            None => detect_type(repo_name, &description),
        };

        self.rows.push(CatalogEntry {
            name: r.full_name.clone(),
            repo_name: repo_name.to_string(),
            owner: owner.to_string(),
            package_type,
            description,
            updated_at: r.updated_at.clone(),
            mode: match tracked {
                Some(p) => p.mode,
                None => listed.and_then(|y| y.mode),
            },
            asset_name: match tracked {
                Some(p) => p.asset_name.clone(),
                None => listed.and_then(|y| y.asset_name.clone()),
            },
            is_installed: tracked.is_some(),
            update_available: tracked.is_some_and(|p| p.update_available),
            latest_version: tracked.map(|p| p.latest_version.clone()),
            is_hidden: self.doc.is_hidden_repo(owner, repo_name),
        });
    }
}

/// Where browse listings come from.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub store_list_path: PathBuf,
    pub default_orgs: Vec<String>,
}

impl Catalog {
    pub fn new(store_list_path: impl Into<PathBuf>, default_orgs: Vec<String>) -> Self {
        Self {
            store_list_path: store_list_path.into(),
            default_orgs,
        }
    }

    /// Build the browse list. Individual listing failures are logged and skipped.
    pub async fn browse(&self, client: &ForgeClient, doc: &LedgerDocument) -> Vec<CatalogEntry> {
        let authenticated = client.has_token() && client.test_auth().await;
        if client.has_token() && !authenticated {
            warn!("token provided but authentication failed (expired or revoked); using public access");
        }

        let store_list = StoreList::load_or_empty(&self.store_list_path).await;
        let mut rows = Rows {
            rows: Vec::new(),
            doc,
            store_list: &store_list,
            authenticated,
        };

        for y in &store_list.packages {
            match client.get_repo(&y.owner, &y.repo).await {
                Ok(r) => rows.fill(&r, true),
                Err(e) => debug!(owner = %y.owner, repo = %y.repo, error = %e, "store list repo unavailable"),
            }
        }

        let mut orgs: BTreeSet<String> = self.default_orgs.iter().cloned().collect();
        if authenticated {
            match client.get_user_orgs().await {
                Ok(user_orgs) => {
                    orgs.extend(user_orgs.iter().filter_map(|o| o.login().map(str::to_string)))
                }
                Err(e) => debug!(error = %e, "failed to fetch user orgs"),
            }
        }
        debug!(count = orgs.len(), "fetching organization repos");
        for org in &orgs {
            match client.get_org_repos(org).await {
                Ok(repos) => repos.iter().for_each(|r| rows.fill(r, false)),
                Err(e) => debug!(%org, error = %e, "org listing failed"),
            }
        }

        if authenticated {
            match client.get_user_repos().await {
                Ok(repos) => repos.iter().for_each(|r| rows.fill(r, true)),
                Err(e) => debug!(error = %e, "failed to fetch user repos"),
            }
        }

        for custom in &doc.custom_repos {
            if rows.contains(&custom.owner, &custom.repo) {
                continue;
            }
            match client.get_repo(&custom.owner, &custom.repo).await {
                Ok(r) => rows.fill(&r, true),
                Err(e) => debug!(owner = %custom.owner, repo = %custom.repo, error = %e, "custom repo unavailable"),
            }
        }

        rows.rows
    }
}
