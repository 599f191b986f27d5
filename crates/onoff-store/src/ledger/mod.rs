//! Persisted table of installed packages and the user's custom/hidden repos.
//!
//! Every mutation saves the full document before returning. The update sweep
//! fetches releases without holding the table lock and applies the results
//! afterwards, so an install that lands mid-sweep is not blocked; whichever
//! write comes last wins.

pub mod observer;
pub mod poller;
pub mod storage;

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::endpoints::ReleaseSource;
use crate::error::{Result, StoreError};
use crate::models::{InstallMode, PackageRecord, PackageType, RepoRef, package_id};

pub use observer::{LedgerObserver, TracingObserver};
pub use storage::{JsonFileStorage, MemoryStorage, Storage};

/// Everything the ledger persists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerDocument {
    #[serde(default)]
    pub packages: BTreeMap<String, PackageRecord>,
    #[serde(default)]
    pub custom_repos: Vec<RepoRef>,
    #[serde(default)]
    pub hidden_repos: Vec<RepoRef>,
}

impl LedgerDocument {
    pub fn package_by_repo(&self, owner: &str, repo_name: &str) -> Option<&PackageRecord> {
        self.packages.get(&package_id(owner, repo_name))
    }

    pub fn is_custom_repo(&self, owner: &str, repo: &str) -> bool {
        self.custom_repos.iter().any(|r| r.matches(owner, repo))
    }

    pub fn is_hidden_repo(&self, owner: &str, repo: &str) -> bool {
        self.hidden_repos.iter().any(|r| r.matches(owner, repo))
    }
}

/// Outcome of one [`Ledger::check_updates`] pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepReport {
    pub checked: usize,
    pub updates_available: Vec<String>,
    pub failed: Vec<String>,
}

pub(crate) fn now() -> String {
    Utc::now().to_rfc3339()
}

pub struct Ledger {
    doc: Mutex<LedgerDocument>,
    storage: Arc<dyn Storage>,
    releases: Arc<dyn ReleaseSource>,
    observers: RwLock<Vec<Arc<dyn LedgerObserver>>>,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let observers = self.observers.read().map(|o| o.len()).unwrap_or(0);
        write!(f, "Ledger({observers} observers)")
    }
}

impl Ledger {
    /// Empty ledger; call [`Ledger::load`] to pull in the persisted state.
    pub fn new(storage: Arc<dyn Storage>, releases: Arc<dyn ReleaseSource>) -> Self {
        Self {
            doc: Mutex::new(LedgerDocument::default()),
            storage,
            releases,
            observers: RwLock::new(Vec::new()),
        }
    }

    pub async fn open(storage: Arc<dyn Storage>, releases: Arc<dyn ReleaseSource>) -> Result<Self> {
        let ledger = Self::new(storage, releases);
        ledger.load().await?;
        Ok(ledger)
    }

    pub async fn load(&self) -> Result<()> {
        info!("loading tracked packages");
        let loaded = self.storage.load().await?.unwrap_or_default();
        info!(count = loaded.packages.len(), "tracked packages loaded");
        *self.doc.lock().await = loaded;
        Ok(())
    }

    /// Observers are attached after construction and called synchronously
    /// after each mutation.
    pub fn attach_observer(&self, observer: Arc<dyn LedgerObserver>) {
        if let Ok(mut observers) = self.observers.write() {
            observers.push(observer);
        }
    }

    fn notify(&self, f: impl Fn(&dyn LedgerObserver)) {
        if let Ok(observers) = self.observers.read() {
            for observer in observers.iter() {
                f(observer.as_ref());
            }
        }
    }

    /// Save `next` and only then make it the current document, so a failed
    /// save leaves memory matching what is on disk.
    async fn commit(&self, doc: &mut LedgerDocument, next: LedgerDocument) -> Result<()> {
        debug!(count = next.packages.len(), "saving tracked packages");
        self.storage.save(&next).await?;
        *doc = next;
        Ok(())
    }

    /// Track a fresh install or a reinstall.
    ///
    /// The original `install_date` and `last_check` survive a reinstall; the
    /// update state is reset because the installed version is now the latest
    /// one we know of.
    pub async fn add_or_update(
        &self,
        repo_name: &str,
        owner: &str,
        package_type: PackageType,
        installed_version: &str,
        mode: Option<InstallMode>,
        asset_name: Option<&str>,
    ) -> Result<String> {
        let id = package_id(owner, repo_name);
        let mut doc = self.doc.lock().await;
        let existing = doc.packages.get(&id);
        let is_new = existing.is_none();
        let stamp = now();
        let record = PackageRecord {
            repo_name: repo_name.to_string(),
            owner: owner.to_string(),
            package_type,
            installed_version: installed_version.to_string(),
            latest_version: installed_version.to_string(),
            update_available: false,
            install_date: existing
                .map(|p| p.install_date.clone())
                .unwrap_or_else(|| stamp.clone()),
            last_update: stamp,
            last_check: existing.and_then(|p| p.last_check.clone()),
            mode,
            asset_name: asset_name.map(str::to_string),
        };
        info!(package = %id, new = is_new, version = installed_version, "tracking package");
        let mut next = doc.clone();
        next.packages.insert(id.clone(), record.clone());
        self.commit(&mut doc, next).await?;
        drop(doc);

        if is_new {
            self.notify(|o| o.package_added(&id, &record));
        } else {
            self.notify(|o| o.package_updated(&id, &record));
        }
        Ok(id)
    }

    /// Stop tracking; `false` when the package was not tracked.
    pub async fn remove(&self, owner: &str, repo_name: &str) -> Result<bool> {
        let id = package_id(owner, repo_name);
        let mut doc = self.doc.lock().await;
        let mut next = doc.clone();
        if next.packages.remove(&id).is_none() {
            debug!(package = %id, "remove: package not tracked");
            return Ok(false);
        }
        self.commit(&mut doc, next).await?;
        drop(doc);
        info!(package = %id, "package removed");
        self.notify(|o| o.package_removed(&id));
        Ok(true)
    }

    /// Ask the forge for the latest release of every tracked package.
    ///
    /// A failed lookup is logged and leaves that package's version state as
    /// it was; `last_check` is stamped either way. The batch is saved once.
    pub async fn check_updates(&self) -> Result<SweepReport> {
        let targets: Vec<(String, String, String, String)> = {
            let doc = self.doc.lock().await;
            doc.packages
                .iter()
                .map(|(id, p)| {
                    (
                        id.clone(),
                        p.owner.clone(),
                        p.repo_name.clone(),
                        p.installed_version.clone(),
                    )
                })
                .collect()
        };
        if targets.is_empty() {
            info!("no packages tracked yet, skipping update check");
            return Ok(SweepReport::default());
        }
        info!(count = targets.len(), "checking for updates");

        let mut outcomes = Vec::with_capacity(targets.len());
        for (id, owner, repo, installed) in targets {
            debug!(%owner, %repo, %installed, "checking package");
            let tag = match self.releases.latest_release(&owner, &repo).await {
                Ok(release) => Some(release.tag_name),
                Err(e @ StoreError::NotFound { .. }) => {
                    warn!(
                        %owner, %repo, error = %e,
                        "package not found (404); check owner/repo or token access"
                    );
                    None
                }
                Err(e) => {
                    error!(package = %id, error = %e, "error checking updates");
                    None
                }
            };
            outcomes.push((id, tag, now()));
        }

        let mut report = SweepReport::default();
        let mut doc = self.doc.lock().await;
        let mut next = doc.clone();
        for (id, tag, checked_at) in outcomes {
            // uninstalled while we were fetching
            let Some(record) = next.packages.get_mut(&id) else {
                continue;
            };
            report.checked += 1;
            record.last_check = Some(checked_at);
            match tag {
                Some(tag) => {
                    record.update_available = tag != record.installed_version;
                    if record.update_available {
                        info!(
                            package = %id,
                            installed = %record.installed_version,
                            latest = %tag,
                            "update available"
                        );
                        report.updates_available.push(id.clone());
                    }
                    record.latest_version = tag;
                }
                None => report.failed.push(id.clone()),
            }
        }
        self.commit(&mut doc, next).await?;
        drop(doc);

        self.notify(|o| o.updates_checked(&report));
        info!(
            checked = report.checked,
            updates = report.updates_available.len(),
            failed = report.failed.len(),
            "update check complete"
        );
        Ok(report)
    }

    pub async fn get(&self, package_id: &str) -> Option<PackageRecord> {
        self.doc.lock().await.packages.get(package_id).cloned()
    }

    pub async fn get_by_repo(&self, owner: &str, repo_name: &str) -> Option<PackageRecord> {
        self.get(&package_id(owner, repo_name)).await
    }

    pub async fn packages(&self) -> BTreeMap<String, PackageRecord> {
        self.doc.lock().await.packages.clone()
    }

    pub async fn document(&self) -> LedgerDocument {
        self.doc.lock().await.clone()
    }

    pub async fn add_custom_repo(&self, owner: &str, repo: &str) -> Result<()> {
        let mut doc = self.doc.lock().await;
        if doc.is_custom_repo(owner, repo) {
            return Ok(());
        }
        info!(%owner, %repo, "adding custom repo");
        let mut next = doc.clone();
        next.custom_repos.push(RepoRef::new(owner, repo));
        self.commit(&mut doc, next).await
    }

    pub async fn custom_repos(&self) -> Vec<RepoRef> {
        self.doc.lock().await.custom_repos.clone()
    }

    pub async fn is_custom_repo(&self, owner: &str, repo: &str) -> bool {
        self.doc.lock().await.is_custom_repo(owner, repo)
    }

    pub async fn hide_repo(&self, owner: &str, repo: &str) -> Result<()> {
        let mut doc = self.doc.lock().await;
        if doc.is_hidden_repo(owner, repo) {
            return Ok(());
        }
        info!(%owner, %repo, "hiding repo");
        let mut next = doc.clone();
        next.hidden_repos.push(RepoRef::new(owner, repo));
        self.commit(&mut doc, next).await
    }

    pub async fn unhide_repo(&self, owner: &str, repo: &str) -> Result<()> {
        let mut doc = self.doc.lock().await;
        let mut next = doc.clone();
        next.hidden_repos.retain(|r| !r.matches(owner, repo));
        if next.hidden_repos.len() == doc.hidden_repos.len() {
            return Ok(());
        }
        info!(%owner, %repo, "unhiding repo");
        self.commit(&mut doc, next).await
    }

    pub async fn is_hidden_repo(&self, owner: &str, repo: &str) -> bool {
        self.doc.lock().await.is_hidden_repo(owner, repo)
    }
}
