use chrono::{DateTime, Utc};
use nemea_wire::EvidenceRecord;
use uuid::Uuid;

use crate::instance::ScenarioInstance;
use crate::stats::Stats;
use crate::table::{ScenarioKey, ScenarioTable};

/// Per-instance disposition the GC pass can reach on a given tick (§4.7,
/// §10.6): export once the evidence window has elapsed, clear stale
/// adaptive entities once the idle window has elapsed without exporting,
/// or leave the instance untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GcDecision {
    Export,
    ClearIdle,
    Keep,
}

/// C7: the evidence exporter / GC pass. Renders exportable instances into
/// evidence records, scatter-splitting oversized satellite lists (§4.7),
/// and returns the keys that should be pruned once publishing (C6) has run.
/// Also clears adaptive entities off instances that have gone idle past
/// `adaptive_timeout` without becoming exportable, per the instance's own
/// `last_detection_ts` rather than its age.
pub struct Exporter {
    evidence_timeout: chrono::Duration,
    adaptive_timeout: chrono::Duration,
    max_satellites_per_export: usize,
    export_without_satellites: bool,
}

impl Exporter {
    pub fn new(
        evidence_timeout: std::time::Duration,
        adaptive_timeout: std::time::Duration,
        max_satellites_per_export: usize,
        export_without_satellites: bool,
    ) -> Self {
        Self {
            evidence_timeout: chrono::Duration::from_std(evidence_timeout)
                .unwrap_or(chrono::Duration::seconds(600)),
            adaptive_timeout: chrono::Duration::from_std(adaptive_timeout)
                .unwrap_or(chrono::Duration::seconds(3600)),
            max_satellites_per_export,
            export_without_satellites,
        }
    }

    /// The GC disposition for one instance as of `now`. Exported takes
    /// priority over idle-clearing: an instance old enough to export is
    /// never also entity-cleared first.
    pub fn decide(&self, instance: &ScenarioInstance, now: DateTime<Utc>) -> GcDecision {
        if instance.is_exportable(now, self.evidence_timeout) {
            GcDecision::Export
        } else if instance.last_detection_ts + self.adaptive_timeout <= now {
            GcDecision::ClearIdle
        } else {
            GcDecision::Keep
        }
    }

    /// Clears derived entities off every instance this tick decides is
    /// idle (§10.6): the instance stays live, only its watchlist
    /// contribution is dropped until a new detection arrives.
    pub async fn clear_idle_entities(&self, table: &ScenarioTable, now: DateTime<Utc>, stats: &Stats) {
        table.clear_idle_entities(now, self.evidence_timeout, self.adaptive_timeout, stats).await;
    }

    pub async fn collect_exports(
        &self,
        table: &ScenarioTable,
        now: DateTime<Utc>,
        stats: &Stats,
    ) -> (Vec<EvidenceRecord>, Vec<ScenarioKey>) {
        let exportable = table.snapshot_for_export(now, self.evidence_timeout).await;
        let mut records = Vec::new();
        let mut pruned = Vec::new();

        for instance in exportable {
            if instance.satellites.is_empty() && !self.export_without_satellites {
                continue;
            }
            let produced = self.render(&instance, stats);
            let key: ScenarioKey = (instance.kind, instance.key.clone());
            Stats::incr(&stats.scenarios_exported);
            records.extend(produced);
            pruned.push(key);
        }

        (records, pruned)
    }

    fn render(&self, instance: &ScenarioInstance, stats: &Stats) -> Vec<EvidenceRecord> {
        let detections = instance.detections.as_vec();
        let satellites = instance.satellites.as_vec();

        if satellites.len() <= self.max_satellites_per_export {
            return vec![EvidenceRecord {
                event_id: Uuid::new_v4(),
                scenario_uuid: instance.uuid,
                scenario_kind: instance.kind.as_str().to_string(),
                scenario_key: instance.key.clone(),
                first_detection_ts: instance.first_detection_ts,
                last_detection_ts: instance.last_detection_ts,
                detections,
                satellites,
                event_scattered: false,
                scatter_part: None,
                scatter_of: None,
            }];
        }

        let event_id = Uuid::new_v4();
        let chunks: Vec<_> = satellites
            .chunks(self.max_satellites_per_export)
            .map(|c| c.to_vec())
            .collect();
        let total_parts = chunks.len() as u32;
        Stats::add(&stats.evidence_scatter_parts, total_parts as u64);

        chunks
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| EvidenceRecord {
                event_id,
                scenario_uuid: instance.uuid,
                scenario_kind: instance.kind.as_str().to_string(),
                scenario_key: instance.key.clone(),
                first_detection_ts: instance.first_detection_ts,
                last_detection_ts: instance.last_detection_ts,
                detections: detections.clone(),
                satellites: chunk,
                event_scattered: true,
                scatter_part: Some(i as u32 + 1),
                scatter_of: Some(total_parts),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::ScenarioKindId;
    use serde_json::json;

    fn instance_with_satellites(n: usize) -> ScenarioInstance {
        let now = Utc::now();
        let mut instance = ScenarioInstance::new(
            Uuid::new_v4(),
            ScenarioKindId::BotnetTargetWatch,
            "10.0.0.1".into(),
            now - chrono::Duration::seconds(1000),
            1000,
            n + 10,
        );
        for i in 0..n {
            instance.satellites.push(json!({"i": i}));
        }
        instance
    }

    #[test]
    fn scatters_when_satellites_exceed_cap() {
        let exporter = Exporter::new(std::time::Duration::from_secs(600), std::time::Duration::from_secs(3600), 10, true);
        let stats = Stats::default();
        let instance = instance_with_satellites(25);
        let records = exporter.render(&instance, &stats);
        assert_eq!(records.len(), 3);
        let total: usize = records.iter().map(|r| r.satellites.len()).sum();
        assert_eq!(total, 25);
        assert_eq!(records[0].scatter_part, Some(1));
        assert_eq!(records[2].scatter_part, Some(3));
    }

    #[test]
    fn single_message_when_under_cap() {
        let exporter = Exporter::new(std::time::Duration::from_secs(600), std::time::Duration::from_secs(3600), 10, true);
        let stats = Stats::default();
        let instance = instance_with_satellites(3);
        let records = exporter.render(&instance, &stats);
        assert_eq!(records.len(), 1);
        assert!(!records[0].event_scattered);
    }
}
