//! Durable backing for the ledger document.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::LedgerDocument;
use crate::error::Result;

pub const STORAGE_VERSION: u32 = 1;
pub const STORAGE_KEY: &str = "onoff_store.packages";

/// Whole-document load/save. Implementations serialize callers themselves.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn load(&self) -> Result<Option<LedgerDocument>>;
    async fn save(&self, doc: &LedgerDocument) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    version: u32,
    key: String,
    data: T,
}

/// JSON file written atomically through a sibling `.tmp` file.
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl Storage for JsonFileStorage {
    async fn load(&self) -> Result<Option<LedgerDocument>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no ledger file yet");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let envelope: Envelope<LedgerDocument> = serde_json::from_slice(&raw)?;
        if envelope.version != STORAGE_VERSION {
            warn!(
                found = envelope.version,
                expected = STORAGE_VERSION,
                "ledger file has a different storage version"
            );
        }
        Ok(Some(envelope.data))
    }

    async fn save(&self, doc: &LedgerDocument) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let envelope = Envelope {
            version: STORAGE_VERSION,
            key: STORAGE_KEY.to_string(),
            data: doc,
        };
        let json = serde_json::to_vec_pretty(&envelope)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Keeps the last saved document in memory; counts saves.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: Mutex<(Option<LedgerDocument>, usize)>,
}

impl MemoryStorage {
    pub async fn saved(&self) -> Option<LedgerDocument> {
        self.inner.lock().await.0.clone()
    }

    pub async fn save_count(&self) -> usize {
        self.inner.lock().await.1
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn load(&self) -> Result<Option<LedgerDocument>> {
        Ok(self.inner.lock().await.0.clone())
    }

    async fn save(&self, doc: &LedgerDocument) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.0 = Some(doc.clone());
        inner.1 += 1;
        Ok(())
    }
}
