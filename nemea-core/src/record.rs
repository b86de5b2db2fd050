use chrono::{DateTime, Utc};
use nemea_wire::{AdaptiveReDetectionRecord, AggregatedBlacklistEvent, ChannelId, DnsDetectionRecord};

/// The decoded form of whatever a receiver (C1) pulled off its channel,
/// tagged with the channel it arrived on. This is what the classifier (C3)
/// and the scenario table (C4) operate on; encoding/decoding the wire
/// format itself is the receiver's job, not the core's.
#[derive(Clone, Debug)]
pub enum InboundRecord {
    Aggregated(AggregatedBlacklistEvent),
    Dns(DnsDetectionRecord),
    AdaptiveRedetection(AdaptiveReDetectionRecord),
}

impl InboundRecord {
    pub fn channel(&self) -> ChannelId {
        match self {
            InboundRecord::Aggregated(_) => ChannelId::AggregatedBlacklist,
            InboundRecord::Dns(_) => ChannelId::Dns,
            InboundRecord::AdaptiveRedetection(_) => ChannelId::AdaptiveReDetection,
        }
    }

    /// Timestamp used to advance a scenario instance's `last_detection_ts`.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            InboundRecord::Aggregated(event) => event.ts_last,
            InboundRecord::Dns(record) => record.time_last,
            InboundRecord::AdaptiveRedetection(record) => record.time_last,
        }
    }

    /// Renders the record the way it is stored in a scenario instance's
    /// detection log and, later, an evidence record (§6: "all stored
    /// detections", byte-identical for the reporter-bypass path).
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            InboundRecord::Aggregated(event) => {
                serde_json::to_value(event).unwrap_or(serde_json::Value::Null)
            }
            InboundRecord::Dns(record) => {
                serde_json::to_value(record).unwrap_or(serde_json::Value::Null)
            }
            InboundRecord::AdaptiveRedetection(record) => {
                serde_json::to_value(record).unwrap_or(serde_json::Value::Null)
            }
        }
    }
}
