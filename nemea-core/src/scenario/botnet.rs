use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::str::FromStr;

use async_trait::async_trait;
use nemea_wire::{AdaptiveEntity, BlacklistId};

use crate::instance::ScenarioInstance;
use crate::record::InboundRecord;
use crate::resolver::DomainResolver;
use crate::stats::Stats;

use super::{ScenarioKind, ScenarioKindId};

/// §3: triggered when an aggregated IP/URL record carries a blacklist bit
/// in the configured botnet command-and-control subset. Key = blacklisted
/// address; entities = every peer the C&C contacted, across all detections
/// seen so far.
pub struct BotnetTargetWatch {
    botnet_ids: HashSet<BlacklistId>,
    adaptive_id: BlacklistId,
}

impl BotnetTargetWatch {
    pub fn new(botnet_ids: HashSet<BlacklistId>, adaptive_id: BlacklistId) -> Self {
        Self {
            botnet_ids,
            adaptive_id,
        }
    }
}

#[async_trait]
impl ScenarioKind for BotnetTargetWatch {
    fn id(&self) -> ScenarioKindId {
        ScenarioKindId::BotnetTargetWatch
    }

    fn fits(&self, record: &InboundRecord) -> bool {
        match record {
            InboundRecord::Aggregated(event) => self.botnet_ids.contains(&BlacklistId(event.blacklist_id)),
            _ => false,
        }
    }

    fn key(&self, record: &InboundRecord) -> String {
        match record {
            InboundRecord::Aggregated(event) => event.source.clone(),
            _ => unreachable!("key() called on a record that did not pass fits()"),
        }
    }

    async fn derive_entities(
        &self,
        instance: &ScenarioInstance,
        _resolver: &dyn DomainResolver,
        _stats: &Stats,
    ) -> Vec<AdaptiveEntity> {
        let mut targets: HashSet<Ipv4Addr> = HashSet::new();
        for detection in instance.detections.iter() {
            let Some(array) = detection.get("targets").and_then(|v| v.as_array()) else {
                continue;
            };
            for target in array {
                if let Some(addr) = target.as_str().and_then(|s| Ipv4Addr::from_str(s).ok()) {
                    targets.insert(addr);
                }
            }
        }
        targets
            .into_iter()
            .map(|addr| AdaptiveEntity::new(addr, self.adaptive_id, instance.uuid))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn sample_instance() -> ScenarioInstance {
        let mut instance = ScenarioInstance::new(
            uuid::Uuid::new_v4(),
            ScenarioKindId::BotnetTargetWatch,
            "10.0.0.1".into(),
            Utc::now(),
            100,
            100,
        );
        instance
            .detections
            .push(json!({"targets": ["192.0.2.10"]}));
        instance
            .detections
            .push(json!({"targets": ["192.0.2.11"]}));
        instance
            .detections
            .push(json!({"targets": ["192.0.2.10"]}));
        instance
    }

    #[tokio::test]
    async fn derives_union_of_targets_across_detections() {
        let kind = BotnetTargetWatch::new(HashSet::from([BlacklistId(1)]), BlacklistId(2));
        let instance = sample_instance();
        let resolver = crate::resolver::TokioDomainResolver;
        let stats = Stats::default();
        let mut entities = kind.derive_entities(&instance, &resolver, &stats).await;
        entities.sort();
        assert_eq!(entities.len(), 2);
    }

    #[test]
    fn fits_only_matches_configured_botnet_ids() {
        let kind = BotnetTargetWatch::new(HashSet::from([BlacklistId(1)]), BlacklistId(2));
        let matching = InboundRecord::Aggregated(nemea_wire::AggregatedBlacklistEvent {
            kind: nemea_wire::AggregatedKind::Ip,
            source: "10.0.0.1".into(),
            url_path: None,
            targets: vec!["192.0.2.10".into()],
            source_ports: vec![],
            ts_first: Utc::now(),
            ts_last: Utc::now(),
            protocol: 6,
            blacklist_id: 1,
            bytes: 0,
            packets: 0,
            flows: 0,
            agg_win_minutes: 5,
        });
        assert!(kind.fits(&matching));

        let non_matching = InboundRecord::Aggregated(nemea_wire::AggregatedBlacklistEvent {
            blacklist_id: 8,
            ..match matching {
                InboundRecord::Aggregated(event) => event,
                _ => unreachable!(),
            }
        });
        assert!(!kind.fits(&non_matching));
    }
}
