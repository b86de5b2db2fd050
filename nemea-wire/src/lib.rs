//! Wire-format record schemas shared between the aggregation core
//! ([`nemea_core`]) and the controller binary.
//!
//! Every type here is a plain, serde-derived DTO: decoding/encoding the
//! external channels is the controller's job, folding and correlating
//! them is the core's. Keeping the schemas in their own crate means
//! neither side needs to depend on the other to agree on a shape.

pub mod blacklist;
pub mod channel;
pub mod entity;
pub mod evidence;
pub mod flow;

pub use blacklist::{BlacklistCatalog, BlacklistEntry, BlacklistId};
pub use channel::ChannelId;
pub use entity::AdaptiveEntity;
pub use evidence::{EvidenceRecord, ReporterMessage};
pub use flow::{
    AdaptiveReDetectionRecord, AggregatedBlacklistEvent, AggregatedKind, AggregatedScanEvent,
    BlacklistDetectionFlow, DnsDetectionRecord, ScanAggregateKind, ScanFlow,
};
