use tracing::info;

use super::SweepReport;
use crate::models::PackageRecord;

/// Presentation-side hook into ledger changes. All methods default to no-ops.
pub trait LedgerObserver: Send + Sync {
    fn package_added(&self, _id: &str, _record: &PackageRecord) {}
    fn package_updated(&self, _id: &str, _record: &PackageRecord) {}
    fn package_removed(&self, _id: &str) {}
    fn updates_checked(&self, _report: &SweepReport) {}
}

/// Emits one log event per ledger change.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl LedgerObserver for TracingObserver {
    fn package_added(&self, id: &str, record: &PackageRecord) {
        info!(
            package = id,
            kind = %record.package_type,
            version = %record.installed_version,
            "package installed"
        );
    }

    fn package_updated(&self, id: &str, record: &PackageRecord) {
        info!(package = id, version = %record.installed_version, "package reinstalled");
    }

    fn package_removed(&self, id: &str) {
        info!(package = id, "package uninstalled");
    }

    fn updates_checked(&self, report: &SweepReport) {
        for id in &report.updates_available {
            info!(package = %id, "update pending");
        }
    }
}
