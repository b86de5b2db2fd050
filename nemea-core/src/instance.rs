use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use nemea_wire::AdaptiveEntity;

use crate::scenario::ScenarioKindId;

/// A bounded ring of raw records. Pushing past `cap` drops the oldest entry
/// and reports how many have been dropped so far, since §9 leaves the cap
/// itself as an explicit implementation choice rather than unbounded growth.
#[derive(Clone, Debug, Default)]
pub struct CappedLog {
    items: VecDeque<Value>,
    cap: usize,
    overflowed: u64,
}

impl CappedLog {
    pub fn new(cap: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(cap.min(64)),
            cap,
            overflowed: 0,
        }
    }

    pub fn push(&mut self, value: Value) {
        if self.items.len() >= self.cap {
            self.items.pop_front();
            self.overflowed += 1;
        }
        self.items.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Value> {
        self.items.iter()
    }

    pub fn as_vec(&self) -> Vec<Value> {
        self.items.iter().cloned().collect()
    }
}

/// One live occurrence of a scenario kind: the unit of state the table (C4)
/// owns and mutates, and the unit the exporter (C7) turns into evidence.
#[derive(Clone, Debug)]
pub struct ScenarioInstance {
    pub uuid: Uuid,
    pub kind: ScenarioKindId,
    pub key: String,
    pub detections: CappedLog,
    pub satellites: CappedLog,
    pub first_detection_ts: DateTime<Utc>,
    pub last_detection_ts: DateTime<Utc>,
    pub processed_ts: Option<DateTime<Utc>>,
    pub entities: std::collections::HashSet<AdaptiveEntity>,
}

impl ScenarioInstance {
    pub fn new(
        uuid: Uuid,
        kind: ScenarioKindId,
        key: String,
        now: DateTime<Utc>,
        detection_cap: usize,
        satellite_cap: usize,
    ) -> Self {
        Self {
            uuid,
            kind,
            key,
            detections: CappedLog::new(detection_cap),
            satellites: CappedLog::new(satellite_cap),
            first_detection_ts: now,
            last_detection_ts: now,
            processed_ts: None,
            entities: std::collections::HashSet::new(),
        }
    }

    /// True when a new detection has arrived since entities were last
    /// derived — the trigger condition for C5 (§4.5).
    pub fn is_dirty(&self) -> bool {
        match self.processed_ts {
            Some(processed) => self.last_detection_ts > processed,
            None => true,
        }
    }

    pub fn is_exportable(&self, now: DateTime<Utc>, evidence_timeout: chrono::Duration) -> bool {
        self.first_detection_ts + evidence_timeout <= now
    }
}
