use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Store counters, shared by clones of the owning store.
#[derive(Debug, Default)]
pub struct SnapMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    saves: AtomicU64,
    refused_saves: AtomicU64,
    failures_recorded: AtomicU64,
    warnings: AtomicU64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SnapMetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub saves: u64,
    pub refused_saves: u64,
    pub failures_recorded: u64,
    pub warnings: u64,
}

impl SnapMetrics {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_save(&self) {
        self.saves.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_refused_save(&self) {
        self.refused_saves.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_warn(&self, reason: &str) {
        self.warnings.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(target: "snapshot_store", reason, "snapshot store warning");
    }

    pub fn snapshot(&self) -> SnapMetricsSnapshot {
        SnapMetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            saves: self.saves.load(Ordering::Relaxed),
            refused_saves: self.refused_saves.load(Ordering::Relaxed),
            failures_recorded: self.failures_recorded.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
        }
    }
}
