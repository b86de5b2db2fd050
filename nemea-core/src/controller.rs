use std::sync::Arc;
use std::time::Duration as StdDuration;

use nemea_wire::{EvidenceRecord, ReporterMessage};
use tokio::sync::mpsc::Sender;

use crate::classifier::{Classification, Classifier};
use crate::clock::SharedClock;
use crate::exporter::Exporter;
use crate::record::InboundRecord;
use crate::resolver::DomainResolver;
use crate::stats::Stats;
use crate::table::ScenarioTable;
use crate::watchlist::WatchlistPublisher;

/// The adaptive correlation controller (C3-C7 combined). Owns the scenario
/// table and watchlist union; all mutating state access goes through it
/// (§9's "a single `Controller` owning the two tables").
pub struct Controller {
    classifier: Classifier,
    table: ScenarioTable,
    watchlist: WatchlistPublisher,
    exporter: Exporter,
    resolver: Arc<dyn DomainResolver>,
    clock: SharedClock,
    stats: Arc<Stats>,
    reporter_tx: Sender<ReporterMessage>,
    evidence_tx: Sender<EvidenceRecord>,
    send_timeout: StdDuration,
}

impl Controller {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        classifier: Classifier,
        table: ScenarioTable,
        watchlist: WatchlistPublisher,
        exporter: Exporter,
        resolver: Arc<dyn DomainResolver>,
        clock: SharedClock,
        stats: Arc<Stats>,
        reporter_tx: Sender<ReporterMessage>,
        evidence_tx: Sender<EvidenceRecord>,
        send_timeout: StdDuration,
    ) -> Self {
        Self {
            classifier,
            table,
            watchlist,
            exporter,
            resolver,
            clock,
            stats,
            reporter_tx,
            evidence_tx,
            send_timeout,
        }
    }

    /// Routes one decoded record (C3): fold into the scenario table on a
    /// match, forward to the reporter otherwise, and additionally forward
    /// on a match whose kind alerts immediately (§6).
    pub async fn handle_record(&self, record: InboundRecord) {
        Stats::incr(&self.stats.records_received);
        match self.classifier.classify(&record) {
            Classification::Matched(kind) => {
                let key = kind.key(&record);
                let now = self.clock.now();
                self.table
                    .observe(kind.id(), key, &record, now, &self.stats)
                    .await;
                if kind.id().alerts_immediately() {
                    self.send_reporter(ReporterMessage(record.to_value())).await;
                }
            }
            Classification::Bypass => {
                Stats::incr(&self.stats.records_bypassed);
                self.send_reporter(ReporterMessage(record.to_value())).await;
            }
        }
    }

    /// Correlates an adaptive re-detection back to its named scenario
    /// instances (§4.4 `ingest_satellite`).
    pub async fn handle_satellite(&self, scenario_ids: Vec<uuid::Uuid>, value: serde_json::Value) {
        self.table.ingest_satellite(&scenario_ids, value).await;
    }

    /// The C9-driven tick: derive-entities → collect-exports →
    /// publish-watchlist → prune, in that fixed order (§4.7).
    pub async fn run_tick(&self) {
        let now = self.clock.now();
        self.derive_entities(now).await;
        self.exporter.clear_idle_entities(&self.table, now, &self.stats).await;

        let (evidence, pruned) = self.exporter.collect_exports(&self.table, now, &self.stats).await;
        for record in evidence {
            self.send_evidence(record).await;
        }

        let union = self.table.union_entities().await;
        self.watchlist.publish_if_changed(union, &self.stats).await;

        self.table.prune(&pruned, &self.stats).await;
    }

    async fn derive_entities(&self, now: chrono::DateTime<chrono::Utc>) {
        let dirty = self.table.dirty_instances().await;
        for instance in dirty {
            let Some(kind) = self.classifier.kind(instance.kind) else {
                continue;
            };
            let entities = kind
                .derive_entities(&instance, self.resolver.as_ref(), &self.stats)
                .await;
            let key = (instance.kind, instance.key.clone());
            self.table
                .apply_derived_entities(&key, entities.into_iter().collect(), now)
                .await;
        }
    }

    async fn send_reporter(&self, message: ReporterMessage) {
        match tokio::time::timeout(self.send_timeout, self.reporter_tx.send(message)).await {
            Ok(Ok(())) => {}
            _ => {
                Stats::incr(&self.stats.sends_timed_out);
                tracing::warn!("reporter output send timed out, message dropped");
            }
        }
    }

    async fn send_evidence(&self, record: EvidenceRecord) {
        match tokio::time::timeout(self.send_timeout, self.evidence_tx.send(record)).await {
            Ok(Ok(())) => {}
            _ => {
                Stats::incr(&self.stats.sends_timed_out);
                tracing::warn!("evidence output send timed out, message dropped");
            }
        }
    }

    pub fn stats(&self) -> Arc<Stats> {
        self.stats.clone()
    }

    /// Forwards an already-serialized record to the reporter output as-is.
    /// Used by the portscan/host-scan aggregators (§4.2), which are not
    /// scenario inputs and bypass classification entirely.
    pub async fn forward_to_reporter(&self, value: serde_json::Value) {
        self.send_reporter(ReporterMessage(value)).await;
    }
}
