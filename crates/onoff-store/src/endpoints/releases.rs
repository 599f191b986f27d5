use async_trait::async_trait;
use either::Either;
use urlencoding::encode;

use super::setup::ForgeClient;
use crate::error::{Result, StoreError};
use crate::models::{InstallMode, Release, ReleaseAsset};

impl ForgeClient {
    pub async fn get_latest_release(&self, owner: &str, repo: &str) -> Result<Release> {
        let path = format!("{}/releases/latest", Self::repo_path(owner, repo));
        self.get_json("Latest release", &path).await
    }

    pub async fn get_release_by_tag(&self, owner: &str, repo: &str, tag: &str) -> Result<Release> {
        let path = format!(
            "{}/releases/tags/{}",
            Self::repo_path(owner, repo),
            encode(tag)
        );
        self.get_json("Release-by-tag", &path).await
    }

    /// Where the payload for `release` comes from: an attached asset or the
    /// source archive at the release tag.
    ///
    /// Without an explicit mode an asset is used when the release has any.
    pub fn download_source<'a>(
        &self,
        owner: &str,
        repo: &str,
        release: &'a Release,
        mode: Option<InstallMode>,
        asset_name: Option<&str>,
    ) -> Result<Either<&'a ReleaseAsset, String>> {
        let mode = mode.unwrap_or(if release.assets.is_empty() {
            InstallMode::Zipball
        } else {
            InstallMode::Asset
        });
        match mode {
            InstallMode::Asset => pick_asset(release, asset_name).map(Either::Left),
            InstallMode::Zipball => Ok(Either::Right(self.archive_zip_url(
                owner,
                repo,
                &release.tag_name,
            ))),
        }
    }
}

/// Choose the release asset to download.
///
/// An explicit `asset_name` must match exactly. Otherwise a single `.zip`
/// wins, then a single asset of any kind; anything else is ambiguous.
pub fn pick_asset<'a>(release: &'a Release, asset_name: Option<&str>) -> Result<&'a ReleaseAsset> {
    let assets = &release.assets;
    if assets.is_empty() {
        return Err(StoreError::AmbiguousAsset(
            "Release has no assets. Attach a ZIP asset to the release, or use mode=zipball."
                .to_string(),
        ));
    }

    if let Some(name) = asset_name.filter(|n| !n.is_empty()) {
        return assets.iter().find(|a| a.name == name).ok_or_else(|| {
            StoreError::AmbiguousAsset(format!("Asset '{name}' not found in release assets."))
        });
    }

    let zips: Vec<&ReleaseAsset> = assets.iter().filter(|a| a.is_zip()).collect();
    if let [only] = zips.as_slice() {
        return Ok(*only);
    }
    if let [only] = assets.as_slice() {
        return Ok(only);
    }
    Err(StoreError::AmbiguousAsset(
        "Multiple assets found. Specify asset_name.".to_string(),
    ))
}

/// Anything that can report the newest release of a repository.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    async fn latest_release(&self, owner: &str, repo: &str) -> Result<Release>;
}

#[async_trait]
impl ReleaseSource for ForgeClient {
    async fn latest_release(&self, owner: &str, repo: &str) -> Result<Release> {
        self.get_latest_release(owner, repo).await
    }
}
