//! A configured store (forge client, ledger, catalog, executor) and the
//! lookup the gateway uses to find one.

use std::sync::Arc;

use tracing::info;

use crate::catalog::{Catalog, CatalogEntry};
use crate::config::Config;
use crate::endpoints::{ForgeClient, ReleaseSource};
use crate::error::Result;
use crate::install::{self, Executor, FsExecutor, InstallOutcome, InstallRequest};
use crate::ledger::{JsonFileStorage, Ledger, SweepReport};
use crate::models::PackageType;

pub struct StoreInstance {
    pub id: String,
    pub client: ForgeClient,
    pub ledger: Arc<Ledger>,
    pub catalog: Catalog,
    pub executor: Arc<dyn Executor>,
}

impl std::fmt::Debug for StoreInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreInstance")
            .field("id", &self.id)
            .field("forge", &self.client.base_url())
            .finish()
    }
}

impl StoreInstance {
    /// Wire up the default collaborators and load the ledger from disk.
    pub async fn from_config(id: &str, cfg: &Config) -> Result<Self> {
        let client = ForgeClient::new(&cfg.forge_url, cfg.token.clone());
        let releases: Arc<dyn ReleaseSource> = Arc::new(client.clone());
        let storage = Arc::new(JsonFileStorage::new(&cfg.data_path));
        let ledger = Arc::new(Ledger::open(storage, releases).await?);
        let executor = Arc::new(FsExecutor::new(
            &cfg.install_root,
            &cfg.unpacker,
            cfg.token.clone(),
        ));
        info!(id, forge = %client.base_url(), "store instance ready");
        Ok(Self {
            id: id.to_string(),
            client,
            ledger,
            catalog: Catalog::new(&cfg.store_list_path, cfg.default_orgs.clone()),
            executor,
        })
    }

    pub async fn browse(&self) -> Vec<CatalogEntry> {
        let doc = self.ledger.document().await;
        self.catalog.browse(&self.client, &doc).await
    }

    pub async fn install(&self, req: &InstallRequest) -> Result<InstallOutcome> {
        install::install(&self.client, &self.ledger, self.executor.as_ref(), req).await
    }

    pub async fn uninstall(&self, owner: &str, repo: &str, package_type: PackageType) -> Result<bool> {
        install::uninstall(&self.ledger, self.executor.as_ref(), owner, repo, package_type).await
    }

    pub async fn refresh(&self) -> Result<SweepReport> {
        self.ledger.check_updates().await
    }
}

/// Instances by entry id, in registration order.
#[derive(Debug, Default, Clone)]
pub struct Instances {
    entries: Vec<Arc<StoreInstance>>,
}

impl Instances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, instance: StoreInstance) -> Arc<StoreInstance> {
        let instance = Arc::new(instance);
        self.entries.retain(|i| i.id != instance.id);
        self.entries.push(instance.clone());
        instance
    }

    /// The instance named `id`; an unknown or absent id falls back to the
    /// first one registered.
    pub fn resolve(&self, id: Option<&str>) -> Option<Arc<StoreInstance>> {
        id.and_then(|id| self.entries.iter().find(|i| i.id == id))
            .or_else(|| self.entries.first())
            .cloned()
    }
}
