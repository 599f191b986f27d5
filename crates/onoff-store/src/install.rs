//! Install and uninstall flows: resolve the release, hand the payload to an
//! [`Executor`], record the outcome in the ledger.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use either::Either;
use serde::Serialize;
use tracing::{debug, info};
use xshell::{Shell, cmd};

use crate::endpoints::ForgeClient;
use crate::error::{Result, StoreError};
use crate::ledger::Ledger;
use crate::models::{InstallMode, PackageType};

/// Validated install request.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallRequest {
    pub owner: String,
    pub repo: String,
    pub package_type: PackageType,
    pub mode: Option<InstallMode>,
    pub asset_name: Option<String>,
    /// Release tag to install; the latest release when absent.
    pub version: Option<String>,
}

impl InstallRequest {
    /// Build from loosely typed input. Blank owner/repo and unknown
    /// type/mode strings are rejected; a missing type means integration.
    pub fn parse(
        owner: Option<&str>,
        repo: Option<&str>,
        package_type: Option<&str>,
        mode: Option<&str>,
        asset_name: Option<&str>,
    ) -> Result<Self> {
        let (owner, repo) = require_repo(owner, repo)?;
        let package_type = match package_type.filter(|t| !t.is_empty()) {
            Some(t) => t.parse()?,
            None => PackageType::default(),
        };
        let mode = mode
            .filter(|m| !m.is_empty())
            .map(str::parse::<InstallMode>)
            .transpose()?;
        Ok(Self {
            owner,
            repo,
            package_type,
            mode,
            asset_name: asset_name.filter(|a| !a.is_empty()).map(str::to_string),
            version: None,
        })
    }

    /// Typed constructor; owner and repo go through [`require_repo`].
    pub fn new(owner: &str, repo: &str, package_type: PackageType) -> Result<Self> {
        let (owner, repo) = require_repo(Some(owner), Some(repo))?;
        Ok(Self {
            owner,
            repo,
            package_type,
            mode: None,
            asset_name: None,
            version: None,
        })
    }

    pub fn version(mut self, tag: &str) -> Self {
        self.version = Some(tag.to_string());
        self
    }
}

/// Trimmed, non-empty owner and repo, the repo being a valid directory name.
pub fn require_repo(owner: Option<&str>, repo: Option<&str>) -> Result<(String, String)> {
    let owner = owner.map(str::trim).unwrap_or_default();
    let repo = repo.map(str::trim).unwrap_or_default();
    if owner.is_empty() || repo.is_empty() {
        return Err(StoreError::InvalidPackageSpec(
            "owner and repo are required".to_string(),
        ));
    }
    check_repo_name(repo)?;
    Ok((owner.to_string(), repo.to_string()))
}

/// The repo name becomes a directory under the type dir, so it must be a
/// single normal path component.
pub fn check_repo_name(repo: &str) -> Result<()> {
    let mut parts = Path::new(repo).components();
    match (parts.next(), parts.next()) {
        (Some(Component::Normal(_)), None) if !repo.contains(['/', '\\']) => Ok(()),
        _ => Err(StoreError::InvalidPackageSpec(format!(
            "invalid repository name '{repo}'"
        ))),
    }
}

/// Everything an executor needs to put a package on disk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstallPlan {
    pub owner: String,
    pub repo: String,
    pub package_type: PackageType,
    pub version: String,
    pub mode: InstallMode,
    pub asset_name: Option<String>,
    pub download_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstallOutcome {
    pub package_id: String,
    pub version: String,
}

/// Puts package files on disk and takes them away again.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn install(&self, plan: &InstallPlan) -> Result<()>;
    async fn uninstall(&self, package_type: PackageType, repo: &str) -> Result<()>;
}

/// Lays packages out under the platform's config root. Unpacking is done by
/// an external program invoked as `<unpacker> <url> <dest>`.
#[derive(Debug, Clone)]
pub struct FsExecutor {
    root: PathBuf,
    unpacker: String,
    token: Option<String>,
}

impl FsExecutor {
    pub fn new(root: impl Into<PathBuf>, unpacker: &str, token: Option<String>) -> Self {
        Self {
            root: root.into(),
            unpacker: unpacker.to_string(),
            token,
        }
    }

    pub fn target_dir(&self, package_type: PackageType, repo: &str) -> Result<PathBuf> {
        check_repo_name(repo)?;
        Ok(type_dir(&self.root, package_type).join(repo))
    }
}

/// Directory holding all packages of one type.
pub fn type_dir(root: &Path, package_type: PackageType) -> PathBuf {
    match package_type {
        PackageType::Integration => root.join("custom_components"),
        PackageType::Lovelace => root.join("www").join("community"),
        PackageType::Blueprints => root.join("blueprints").join("automation"),
    }
}

#[async_trait]
impl Executor for FsExecutor {
    async fn install(&self, plan: &InstallPlan) -> Result<()> {
        let dest = self.target_dir(plan.package_type, &plan.repo)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let unpacker = self.unpacker.clone();
        let url = plan.download_url.clone();
        let token = self.token.clone().unwrap_or_default();
        info!(%url, dest = %dest.display(), "unpacking package");
        tokio::task::spawn_blocking(move || -> std::result::Result<(), xshell::Error> {
            let sh = Shell::new()?;
            cmd!(sh, "{unpacker} {url} {dest}")
                .env("ONOFF_STORE_TOKEN", token)
                .run()
        })
        .await
        .map_err(|e| StoreError::Executor(e.to_string()))?
        .map_err(|e| StoreError::Executor(e.to_string()))
    }

    async fn uninstall(&self, package_type: PackageType, repo: &str) -> Result<()> {
        let dest = self.target_dir(package_type, repo)?;
        match tokio::fs::remove_dir_all(&dest).await {
            Ok(()) => {
                info!(dest = %dest.display(), "package files removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(dest = %dest.display(), "nothing to remove");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Resolve the release, run the executor and track the result.
pub async fn install(
    client: &ForgeClient,
    ledger: &Ledger,
    executor: &dyn Executor,
    req: &InstallRequest,
) -> Result<InstallOutcome> {
    require_repo(Some(&req.owner), Some(&req.repo))?;
    info!(owner = %req.owner, repo = %req.repo, kind = %req.package_type, "installing package");
    let release = match &req.version {
        Some(tag) => client.get_release_by_tag(&req.owner, &req.repo, tag).await?,
        None => client.get_latest_release(&req.owner, &req.repo).await?,
    };
    let source = client.download_source(
        &req.owner,
        &req.repo,
        &release,
        req.mode,
        req.asset_name.as_deref(),
    )?;
    let (mode, asset_name, download_url) = match source {
        Either::Left(asset) => (
            InstallMode::Asset,
            Some(asset.name.clone()),
            asset.browser_download_url.clone(),
        ),
        Either::Right(url) => (InstallMode::Zipball, None, url),
    };
    let plan = InstallPlan {
        owner: req.owner.clone(),
        repo: req.repo.clone(),
        package_type: req.package_type,
        version: release.tag_name.clone(),
        mode,
        asset_name,
        download_url,
    };
    executor.install(&plan).await?;

    let package_id = ledger
        .add_or_update(
            &plan.repo,
            &plan.owner,
            plan.package_type,
            &plan.version,
            req.mode,
            plan.asset_name.as_deref(),
        )
        .await?;
    Ok(InstallOutcome {
        package_id,
        version: plan.version,
    })
}

/// Delete the files, then stop tracking. Returns whether it was tracked.
pub async fn uninstall(
    ledger: &Ledger,
    executor: &dyn Executor,
    owner: &str,
    repo: &str,
    package_type: PackageType,
) -> Result<bool> {
    let (owner, repo) = require_repo(Some(owner), Some(repo))?;
    info!(%owner, %repo, kind = %package_type, "uninstalling package");
    executor.uninstall(package_type, &repo).await?;
    ledger.remove(&owner, &repo).await
}
