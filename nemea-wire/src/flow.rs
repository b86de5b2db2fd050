use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A raw per-flow blacklist hit, as produced by the upstream IP/URL
/// blacklist detector. Feeds the blacklist-IP and blacklist-URL aggregators
/// (C2); the URL aggregator additionally requires `http_host`/`http_url`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlacklistDetectionFlow {
    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: u8,
    pub time_first: DateTime<Utc>,
    pub time_last: DateTime<Utc>,
    pub bytes: u64,
    pub packets: u64,
    #[serde(default = "one")]
    pub flows: u64,
    /// Bitmap of blacklists the source endpoint matched.
    pub src_blacklist: u64,
    /// Bitmap of blacklists the destination endpoint matched.
    pub dst_blacklist: u64,
    #[serde(default)]
    pub http_host: Option<String>,
    #[serde(default)]
    pub http_url: Option<String>,
}

fn one() -> u64 {
    1
}

/// A raw per-flow record destined for the portscan/host-scan aggregators.
/// No blacklist bitmap: these aggregators key purely on traffic shape.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScanFlow {
    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: u8,
    pub time_first: DateTime<Utc>,
    pub time_last: DateTime<Utc>,
    pub bytes: u64,
    pub packets: u64,
    #[serde(default = "one")]
    pub flows: u64,
}

/// Which side of an aggregated blacklist event the blacklisted address was.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregatedKind {
    Ip,
    Url,
}

/// §6 input channel 1: aggregated blacklist events, as emitted by the
/// blacklist-IP / blacklist-URL aggregators and consumed by the controller.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AggregatedBlacklistEvent {
    #[serde(rename = "type")]
    pub kind: AggregatedKind,
    #[serde(alias = "source_ip")]
    pub source: String,
    #[serde(default)]
    pub url_path: Option<String>,
    pub targets: Vec<String>,
    #[serde(default)]
    pub source_ports: Vec<u16>,
    pub ts_first: DateTime<Utc>,
    pub ts_last: DateTime<Utc>,
    pub protocol: u8,
    pub blacklist_id: u64,
    #[serde(default)]
    pub bytes: u64,
    #[serde(default)]
    pub packets: u64,
    #[serde(default)]
    pub flows: u64,
    #[serde(default)]
    pub agg_win_minutes: u32,
}

/// §6 input channel 2: DNS-enriched flow record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DnsDetectionRecord {
    pub dst_ip: IpAddr,
    pub src_ip: IpAddr,
    pub bytes: u64,
    pub time_first: DateTime<Utc>,
    pub time_last: DateTime<Utc>,
    pub packets: u64,
    pub protocol: u8,
    pub dst_port: u16,
    pub src_port: u16,
    pub dns_id: u16,
    pub dns_answers: u16,
    pub dns_name: String,
    pub dns_qtype: u16,
    pub dns_rlength: u16,
    pub dns_rcode: u8,
    #[serde(default)]
    pub dns_rdata: Vec<u8>,
    #[serde(default)]
    pub dns_do: bool,
    pub dns_class: u16,
    pub dns_psize: u16,
    pub dns_rr_ttl: u32,
    /// Bitmap of blacklists the queried name matched.
    pub blacklist: u64,
}

/// §6 input channel 3: a re-detection produced downstream of the adaptive
/// watchlist, correlated back to one or more scenario instances.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdaptiveReDetectionRecord {
    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: u8,
    pub time_first: DateTime<Utc>,
    pub time_last: DateTime<Utc>,
    pub bytes: u64,
    pub packets: u64,
    pub src_blacklist: u64,
    pub dst_blacklist: u64,
    /// Comma-separated list of scenario UUIDs this re-detection correlates to.
    pub adaptive_ids: String,
}

/// Which scan aggregator produced an [`AggregatedScanEvent`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanAggregateKind {
    Portscan,
    HostScan,
}

/// Output of the portscan/host-scan aggregators (§3). Unlike
/// [`AggregatedBlacklistEvent`] this stream is not an input to the adaptive
/// controller — it feeds the reporter directly — but it shares the same
/// window-fold shape, so it gets the same kind of DTO.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AggregatedScanEvent {
    pub kind: ScanAggregateKind,
    pub source: IpAddr,
    pub protocol: u8,
    pub targets: Vec<String>,
    #[serde(default)]
    pub source_ports: Vec<u16>,
    #[serde(default)]
    pub dst_port: Option<u16>,
    pub ts_first: DateTime<Utc>,
    pub ts_last: DateTime<Utc>,
    #[serde(default)]
    pub bytes: u64,
    #[serde(default)]
    pub packets: u64,
    #[serde(default)]
    pub flows: u64,
}

impl AdaptiveReDetectionRecord {
    /// Parses `adaptive_ids` into the list of scenario UUIDs it names.
    /// Malformed entries are skipped, not fatal: a partially-parseable list
    /// still correlates to the UUIDs that do parse.
    pub fn scenario_ids(&self) -> Vec<uuid::Uuid> {
        self.adaptive_ids
            .split(',')
            .filter_map(|s| uuid::Uuid::parse_str(s.trim()).ok())
            .collect()
    }
}
