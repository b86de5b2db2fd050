use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::instance::ScenarioInstance;
use crate::record::InboundRecord;
use crate::scenario::ScenarioKindId;
use crate::stats::Stats;

pub type ScenarioKey = (ScenarioKindId, String);

/// C4: the scenario state table. A single coarse lock serializes the
/// inbound-record thread against the periodic-tick thread (§4.4, §5) —
/// acceptable because a single classifier feeds it and nothing nests this
/// lock inside another.
pub struct ScenarioTable {
    instances: Mutex<HashMap<ScenarioKey, ScenarioInstance>>,
    detection_cap: usize,
    satellite_cap: usize,
}

impl ScenarioTable {
    pub fn new(detection_cap: usize, satellite_cap: usize) -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
            detection_cap,
            satellite_cap,
        }
    }

    /// Folds one classified record into its scenario instance, creating a
    /// fresh one (with a new UUID) on first sight of the key.
    pub async fn observe(
        &self,
        kind: ScenarioKindId,
        key: String,
        record: &InboundRecord,
        now: DateTime<Utc>,
        stats: &Stats,
    ) -> Uuid {
        let mut instances = self.instances.lock().await;
        let entry = instances.entry((kind, key.clone())).or_insert_with(|| {
            Stats::incr(&stats.scenarios_created);
            ScenarioInstance::new(
                Uuid::new_v4(),
                kind,
                key,
                now,
                self.detection_cap,
                self.satellite_cap,
            )
        });
        entry.detections.push(record.to_value());
        entry.last_detection_ts = entry.last_detection_ts.max(record.timestamp()).max(now);
        entry.uuid
    }

    /// Appends a satellite record to every instance named in its UUID list
    /// (§3: correlated back by the comma-separated UUID list). Unknown
    /// UUIDs (instance already exported, or never existed) are skipped.
    pub async fn ingest_satellite(&self, scenario_ids: &[Uuid], record: serde_json::Value) {
        let mut instances = self.instances.lock().await;
        for instance in instances.values_mut() {
            if scenario_ids.contains(&instance.uuid) {
                instance.satellites.push(record.clone());
            }
        }
    }

    /// Instances whose evidence window has elapsed, ready for export.
    pub async fn snapshot_for_export(
        &self,
        now: DateTime<Utc>,
        evidence_timeout: chrono::Duration,
    ) -> Vec<ScenarioInstance> {
        let instances = self.instances.lock().await;
        instances
            .values()
            .filter(|instance| instance.is_exportable(now, evidence_timeout))
            .cloned()
            .collect()
    }

    /// All dirty instances, for C5's derive-entities pass.
    pub async fn dirty_instances(&self) -> Vec<ScenarioInstance> {
        let instances = self.instances.lock().await;
        instances.values().filter(|i| i.is_dirty()).cloned().collect()
    }

    /// Replaces an instance's derived entity set and advances `processed_ts`.
    /// No-op if the instance was pruned concurrently.
    pub async fn apply_derived_entities(
        &self,
        key: &ScenarioKey,
        entities: std::collections::HashSet<nemea_wire::AdaptiveEntity>,
        processed_at: DateTime<Utc>,
    ) {
        let mut instances = self.instances.lock().await;
        if let Some(instance) = instances.get_mut(key) {
            instance.entities = entities;
            instance.processed_ts = Some(processed_at);
        }
    }

    /// Clears the derived entity set of every instance that is idle past
    /// `adaptive_timeout` and not yet exportable (§10.6): the instance
    /// itself is left in place for `evidence_timeout` to eventually export
    /// or for a new detection to revive.
    pub async fn clear_idle_entities(
        &self,
        now: DateTime<Utc>,
        evidence_timeout: chrono::Duration,
        adaptive_timeout: chrono::Duration,
        stats: &Stats,
    ) {
        let mut instances = self.instances.lock().await;
        for instance in instances.values_mut() {
            let idle = instance.last_detection_ts + adaptive_timeout <= now;
            let exportable = instance.is_exportable(now, evidence_timeout);
            if idle && !exportable && !instance.entities.is_empty() {
                instance.entities.clear();
                Stats::incr(&stats.adaptive_entities_expired);
            }
        }
    }

    pub async fn prune(&self, keys: &[ScenarioKey], stats: &Stats) {
        let mut instances = self.instances.lock().await;
        for key in keys {
            if instances.remove(key).is_some() {
                Stats::incr(&stats.scenarios_pruned);
            }
        }
    }

    /// Union of every live instance's adaptive entities, for C6.
    pub async fn union_entities(&self) -> std::collections::HashSet<nemea_wire::AdaptiveEntity> {
        let instances = self.instances.lock().await;
        instances
            .values()
            .flat_map(|i| i.entities.iter().copied())
            .collect()
    }

    pub async fn key_for(&self, uuid: Uuid) -> Option<ScenarioKey> {
        let instances = self.instances.lock().await;
        instances
            .iter()
            .find(|(_, instance)| instance.uuid == uuid)
            .map(|(key, _)| key.clone())
    }
}
