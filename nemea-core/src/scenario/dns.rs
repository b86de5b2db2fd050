use std::net::IpAddr;

use async_trait::async_trait;
use nemea_wire::{AdaptiveEntity, BlacklistId};

use crate::instance::ScenarioInstance;
use crate::record::InboundRecord;
use crate::resolver::DomainResolver;
use crate::stats::Stats;

use super::{ScenarioKind, ScenarioKindId};

/// §3: triggered when a DNS record names a blacklisted domain. Key is the
/// normalized domain; entities are the A/AAAA/CNAME answers obtained by
/// resolving it at derivation time, not the answers embedded in the
/// triggering record itself (those can be stale by the time C5 runs).
pub struct DnsNameWatch;

/// Lower-cases, strips a trailing root dot, and strips one leading `www.`
/// label, per §3's key definition.
pub fn normalize_domain(raw: &str) -> String {
    let lower = raw.to_ascii_lowercase();
    let trimmed = lower.strip_suffix('.').unwrap_or(&lower);
    trimmed
        .strip_prefix("www.")
        .unwrap_or(trimmed)
        .to_string()
}

#[async_trait]
impl ScenarioKind for DnsNameWatch {
    fn id(&self) -> ScenarioKindId {
        ScenarioKindId::DnsNameWatch
    }

    fn fits(&self, record: &InboundRecord) -> bool {
        matches!(record, InboundRecord::Dns(dns) if dns.blacklist != 0)
    }

    fn key(&self, record: &InboundRecord) -> String {
        match record {
            InboundRecord::Dns(dns) => normalize_domain(&dns.dns_name),
            _ => unreachable!("key() called on a record that did not pass fits()"),
        }
    }

    async fn derive_entities(
        &self,
        instance: &ScenarioInstance,
        resolver: &dyn DomainResolver,
        stats: &Stats,
    ) -> Vec<AdaptiveEntity> {
        let Some(adaptive_id) = instance
            .detections
            .iter()
            .rev()
            .find_map(|d| d.get("blacklist").and_then(|v| v.as_u64()))
            .and_then(|bitmap| BlacklistId::decompose(bitmap).into_iter().next())
        else {
            return Vec::new();
        };

        let answers = resolver.resolve(&instance.key).await;
        if answers.is_empty() {
            Stats::incr(&stats.resolver_failures);
            return Vec::new();
        }

        answers
            .into_iter()
            .filter_map(|addr| match addr {
                IpAddr::V4(v4) => Some(AdaptiveEntity::new(v4, adaptive_id, instance.uuid)),
                IpAddr::V6(_) => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_www_and_trailing_dot() {
        assert_eq!(normalize_domain("Www.Evil.Example."), "evil.example");
        assert_eq!(normalize_domain("plain.example"), "plain.example");
    }
}
