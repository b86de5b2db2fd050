//! Multi-stream aggregation and adaptive-correlation engine sitting between
//! raw flow detectors and the reporting layer: per-detector windowed
//! aggregators, the adaptive correlation controller, and the periodic
//! evidence exporter.

pub mod aggregator;
pub mod classifier;
pub mod clock;
pub mod controller;
pub mod error;
pub mod exporter;
pub mod instance;
pub mod receiver;
pub mod record;
pub mod resolver;
pub mod scenario;
pub mod stats;
pub mod table;
pub mod timer;
pub mod watchlist;

pub use classifier::{Classification, Classifier};
pub use clock::{Clock, SharedClock, SystemClock};
pub use controller::Controller;
pub use error::{CoreError, Result};
pub use exporter::Exporter;
pub use instance::ScenarioInstance;
pub use record::InboundRecord;
pub use resolver::{DomainResolver, TokioDomainResolver};
pub use scenario::{BotnetTargetWatch, DnsNameWatch, Registry, ScenarioKind, ScenarioKindId};
pub use stats::{Stats, StatsSnapshot};
pub use table::{ScenarioKey, ScenarioTable};
pub use watchlist::WatchlistPublisher;
