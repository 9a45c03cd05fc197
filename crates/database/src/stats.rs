use crate::summary::UpdateStrategy;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for what the store has done since it was opened.
#[derive(Debug, Default)]
pub struct StoreStats {
    write_scopes: AtomicU64,
    summary_inserts: AtomicU64,
    stream_appends: AtomicU64,
    bulk_recounts: AtomicU64,
    backfill_aggregations: AtomicU64,
}

/// Point-in-time copy of [`StoreStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub write_scopes: u64,
    pub summary_inserts: u64,
    pub stream_appends: u64,
    pub bulk_recounts: u64,
    /// Full `GROUP BY` aggregations: one per lazy backfill or in-memory listing, one per
    /// `rebuild_summaries` covering both tables.
    pub backfill_aggregations: u64,
}

impl StoreStats {
    pub(crate) fn record_write_scope(&self) {
        self.write_scopes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_strategy(&self, strategy: UpdateStrategy) {
        let counter = match strategy {
            UpdateStrategy::Inserted => &self.summary_inserts,
            UpdateStrategy::StreamAppend => &self.stream_appends,
            UpdateStrategy::BulkRecount => &self.bulk_recounts,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_backfill(&self) {
        self.backfill_aggregations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            write_scopes: self.write_scopes.load(Ordering::Relaxed),
            summary_inserts: self.summary_inserts.load(Ordering::Relaxed),
            stream_appends: self.stream_appends.load(Ordering::Relaxed),
            bulk_recounts: self.bulk_recounts.load(Ordering::Relaxed),
            backfill_aggregations: self.backfill_aggregations.load(Ordering::Relaxed),
        }
    }
}
