use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use super::Ledger;

/// Shortest period accepted by [`UpdatePoller::spawn`].
pub const MIN_PERIOD: Duration = Duration::from_secs(1);

/// Background task re-running [`Ledger::check_updates`] on a fixed period.
#[derive(Debug)]
pub struct UpdatePoller {
    handle: JoinHandle<()>,
}

impl UpdatePoller {
    /// Start polling. The first sweep happens one `period` after startup.
    pub fn spawn(ledger: Arc<Ledger>, period: Duration) -> Self {
        if period.is_zero() {
            warn!(fallback_secs = MIN_PERIOD.as_secs(), "zero poll period, using the minimum");
        }
        let period = period.max(MIN_PERIOD);
        info!(period_secs = period.as_secs(), "starting update poller");
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = ledger.check_updates().await {
                    error!(error = %e, "scheduled update check failed");
                }
            }
        });
        Self { handle }
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoints::ReleaseSource;
    use crate::error::Result;
    use crate::ledger::MemoryStorage;
    use crate::models::{PackageType, Release};
    use async_trait::async_trait;

    struct Always(&'static str);

    #[async_trait]
    impl ReleaseSource for Always {
        async fn latest_release(&self, _owner: &str, _repo: &str) -> Result<Release> {
            Ok(Release {
                tag_name: self.0.to_string(),
                ..Default::default()
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sweeps_after_each_period() {
        let ledger = Arc::new(Ledger::new(
            Arc::new(MemoryStorage::default()),
            Arc::new(Always("v2")),
        ));
        ledger
            .add_or_update("cards", "acme", PackageType::Lovelace, "v1", None, None)
            .await
            .unwrap();

        let poller = UpdatePoller::spawn(ledger.clone(), Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(ledger.get("acme_cards").await.unwrap().last_check.is_none());

        tokio::time::sleep(Duration::from_secs(45)).await;
        let record = ledger.get("acme_cards").await.unwrap();
        assert!(record.update_available);
        assert!(record.last_check.is_some());
        poller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn zero_period_still_polls() {
        let ledger = Arc::new(Ledger::new(
            Arc::new(MemoryStorage::default()),
            Arc::new(Always("v2")),
        ));
        ledger
            .add_or_update("cards", "acme", PackageType::Lovelace, "v1", None, None)
            .await
            .unwrap();

        let poller = UpdatePoller::spawn(ledger.clone(), Duration::ZERO);
        tokio::time::sleep(MIN_PERIOD * 3).await;
        assert!(!poller.handle.is_finished());
        assert!(ledger.get("acme_cards").await.unwrap().update_available);
        poller.stop();
    }
}
