use std::sync::Arc;

use crate::record::InboundRecord;
use crate::scenario::{Registry, ScenarioKind, ScenarioKindId};

/// Result of classifying one inbound record (C3).
pub enum Classification {
    /// The record matched a registered scenario kind and should be folded
    /// into the scenario table (C4).
    Matched(Arc<dyn ScenarioKind>),
    /// No scenario kind claimed the record; it is forwarded verbatim to the
    /// reporter (C8).
    Bypass,
}

/// Stateless dispatcher over the closed scenario kind registry (§4.3).
pub struct Classifier {
    registry: Registry,
}

impl Classifier {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    pub fn classify(&self, record: &InboundRecord) -> Classification {
        match self.registry.classify(record) {
            Some(kind) => Classification::Matched(kind),
            None => Classification::Bypass,
        }
    }

    pub fn kind(&self, id: ScenarioKindId) -> Option<Arc<dyn ScenarioKind>> {
        self.registry.get(id)
    }
}
