use std::sync::atomic::{AtomicU64, Ordering};

/// Process-lifetime counters for everything §7 says must be counted rather
/// than silently dropped: timed-out sends, malformed records, resolver
/// failures, scattered exports. Logged on `stats_interval`; never reset.
#[derive(Default)]
pub struct Stats {
    pub records_received: AtomicU64,
    pub records_malformed: AtomicU64,
    pub records_bypassed: AtomicU64,
    pub sends_timed_out: AtomicU64,
    pub resolver_failures: AtomicU64,
    pub watchlist_write_failures: AtomicU64,
    pub scenarios_created: AtomicU64,
    pub scenarios_exported: AtomicU64,
    pub scenarios_pruned: AtomicU64,
    pub evidence_scatter_parts: AtomicU64,
    pub aggregator_events_emitted: AtomicU64,
    pub aggregator_events_split: AtomicU64,
    pub adaptive_entities_expired: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub records_received: u64,
    pub records_malformed: u64,
    pub records_bypassed: u64,
    pub sends_timed_out: u64,
    pub resolver_failures: u64,
    pub watchlist_write_failures: u64,
    pub scenarios_created: u64,
    pub scenarios_exported: u64,
    pub scenarios_pruned: u64,
    pub evidence_scatter_parts: u64,
    pub aggregator_events_emitted: u64,
    pub aggregator_events_split: u64,
    pub adaptive_entities_expired: u64,
}

impl Stats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            records_received: self.records_received.load(Ordering::Relaxed),
            records_malformed: self.records_malformed.load(Ordering::Relaxed),
            records_bypassed: self.records_bypassed.load(Ordering::Relaxed),
            sends_timed_out: self.sends_timed_out.load(Ordering::Relaxed),
            resolver_failures: self.resolver_failures.load(Ordering::Relaxed),
            watchlist_write_failures: self.watchlist_write_failures.load(Ordering::Relaxed),
            scenarios_created: self.scenarios_created.load(Ordering::Relaxed),
            scenarios_exported: self.scenarios_exported.load(Ordering::Relaxed),
            scenarios_pruned: self.scenarios_pruned.load(Ordering::Relaxed),
            evidence_scatter_parts: self.evidence_scatter_parts.load(Ordering::Relaxed),
            aggregator_events_emitted: self.aggregator_events_emitted.load(Ordering::Relaxed),
            aggregator_events_split: self.aggregator_events_split.load(Ordering::Relaxed),
            adaptive_entities_expired: self.adaptive_entities_expired.load(Ordering::Relaxed),
        }
    }

    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }
}
