pub mod botnet;
pub mod dns;

use std::sync::Arc;

use async_trait::async_trait;
use nemea_wire::AdaptiveEntity;

use crate::instance::ScenarioInstance;
use crate::record::InboundRecord;
use crate::resolver::DomainResolver;
use crate::stats::Stats;

pub use botnet::BotnetTargetWatch;
pub use dns::DnsNameWatch;

/// The closed set of scenario kinds the classifier can return. Adding a new
/// kind is a compile-time change to this enum and to [`Registry::default`],
/// per §9's "closed, statically registered list" re-architecture.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ScenarioKindId {
    BotnetTargetWatch,
    DnsNameWatch,
}

impl ScenarioKindId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioKindId::BotnetTargetWatch => "botnet-target-watch",
            ScenarioKindId::DnsNameWatch => "dns-name-watch",
        }
    }

    /// Scenario kinds flagged "also alert immediately" forward their
    /// triggering record to the reporter in addition to normal evidence
    /// export (§6). Currently only botnet-target-watch.
    pub fn alerts_immediately(&self) -> bool {
        matches!(self, ScenarioKindId::BotnetTargetWatch)
    }
}

/// One registered `(fits, key, derive_entities)` triple (§9). Implementors
/// receive their activation sets (blacklist ids, etc.) at construction time
/// rather than importing controller-owned configuration, so scenario kinds
/// never depend on the controller.
#[async_trait]
pub trait ScenarioKind: Send + Sync {
    fn id(&self) -> ScenarioKindId;

    fn fits(&self, record: &InboundRecord) -> bool;

    /// Deterministic scenario key: what makes two detections "the same
    /// case". Only called after `fits` returns true.
    fn key(&self, record: &InboundRecord) -> String;

    async fn derive_entities(
        &self,
        instance: &ScenarioInstance,
        resolver: &dyn DomainResolver,
        stats: &Stats,
    ) -> Vec<AdaptiveEntity>;
}

/// Static, ordered list of scenario kinds. Dispatch returns the first match;
/// order is significant only in that it is fixed, not in that kinds are
/// expected to overlap.
pub struct Registry {
    kinds: Vec<Arc<dyn ScenarioKind>>,
}

impl Registry {
    pub fn new(kinds: Vec<Arc<dyn ScenarioKind>>) -> Self {
        Self { kinds }
    }

    pub fn classify(&self, record: &InboundRecord) -> Option<Arc<dyn ScenarioKind>> {
        self.kinds.iter().find(|k| k.fits(record)).cloned()
    }

    pub fn get(&self, id: ScenarioKindId) -> Option<Arc<dyn ScenarioKind>> {
        self.kinds.iter().find(|k| k.id() == id).cloned()
    }
}
