use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A consolidated report emitted once per exportable scenario instance (or,
/// for oversized instances, once per scatter part sharing `event_id`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub event_id: Uuid,
    pub scenario_uuid: Uuid,
    pub scenario_kind: String,
    pub scenario_key: String,
    pub first_detection_ts: DateTime<Utc>,
    pub last_detection_ts: DateTime<Utc>,
    pub detections: Vec<Value>,
    pub satellites: Vec<Value>,
    pub event_scattered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scatter_part: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scatter_of: Option<u32>,
}

/// A reporter-channel message: records that matched no scenario are
/// forwarded byte-identical; scenario kinds flagged "also alert
/// immediately" (currently only botnet-target-watch) forward their
/// triggering record here too.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReporterMessage(pub Value);
