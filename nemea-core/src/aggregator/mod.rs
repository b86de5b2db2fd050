pub mod keys;

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use nemea_wire::{
    AggregatedBlacklistEvent, AggregatedKind, AggregatedScanEvent, BlacklistDetectionFlow,
    BlacklistId, ScanAggregateKind, ScanFlow,
};
use tokio::sync::Mutex;

pub use keys::{normalize_host, AggregatorKey};

use crate::stats::Stats;

/// Accumulated state for one fold key, shared shape across all four
/// aggregator variants (§3's "Aggregated event" accumulators). Which output
/// type it renders into at flush time is decided by the key variant.
#[derive(Clone, Debug)]
struct Accumulator {
    targets: HashSet<String>,
    source_ports: HashSet<u16>,
    ts_first: DateTime<Utc>,
    ts_last: DateTime<Utc>,
    bytes: u64,
    packets: u64,
    flows: u64,
}

impl Accumulator {
    fn start(now: DateTime<Utc>) -> Self {
        Self {
            targets: HashSet::new(),
            source_ports: HashSet::new(),
            ts_first: now,
            ts_last: now,
            bytes: 0,
            packets: 0,
            flows: 0,
        }
    }

    fn fold_in(&mut self, target: String, src_port: u16, min_src_port: u16, flow_ts_first: DateTime<Utc>, flow_ts_last: DateTime<Utc>, bytes: u64, packets: u64, flows: u64) {
        self.targets.insert(target);
        if src_port < min_src_port {
            self.source_ports.insert(src_port);
        }
        self.ts_first = self.ts_first.min(flow_ts_first);
        self.ts_last = self.ts_last.max(flow_ts_last);
        self.bytes += bytes;
        self.packets += packets;
        self.flows += flows;
    }
}

/// C2: a windowed aggregator. A receiver task (not modeled here; see
/// [`crate::receiver`]) decodes flows and calls `fold_*`; a periodic
/// flusher calls `flush`, which swaps the table out from under the lock and
/// renders each bucket — never holding the lock across the render/emit step
/// (§4.2's "swap-and-emit" requirement).
pub struct AggregatorTable {
    buckets: Mutex<HashMap<AggregatorKey, Accumulator>>,
    min_src_port: u16,
    max_targets_per_event: usize,
}

impl AggregatorTable {
    pub fn new(min_src_port: u16, max_targets_per_event: usize) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            min_src_port,
            max_targets_per_event,
        }
    }

    /// Folds a blacklist-detection flow into the IP or URL aggregator.
    /// Multi-bit bitmaps are decomposed into one fold per bit (§4.2).
    pub async fn fold_blacklist(&self, flow: &BlacklistDetectionFlow, is_url_variant: bool) {
        let (address, bitmap, target) = if flow.src_blacklist != 0 {
            (flow.src_ip, flow.src_blacklist, flow.dst_ip)
        } else {
            (flow.dst_ip, flow.dst_blacklist, flow.src_ip)
        };
        if bitmap == 0 {
            return;
        }
        let mut buckets = self.buckets.lock().await;
        for blacklist in BlacklistId::decompose(bitmap) {
            let key = if is_url_variant {
                AggregatorKey::BlacklistUrl {
                    normalized_host: normalize_host(flow.http_host.as_deref().unwrap_or_default()),
                    url_path: flow.http_url.clone().unwrap_or_default(),
                    dst_ip: flow.dst_ip,
                    protocol: flow.protocol,
                    blacklist,
                }
            } else {
                AggregatorKey::BlacklistIp {
                    address,
                    protocol: flow.protocol,
                    blacklist,
                }
            };
            let bucket = buckets
                .entry(key)
                .or_insert_with(|| Accumulator::start(flow.time_first));
            bucket.fold_in(
                target.to_string(),
                flow.src_port,
                self.min_src_port,
                flow.time_first,
                flow.time_last,
                flow.bytes,
                flow.packets,
                flow.flows,
            );
        }
    }

    /// Folds a scan flow into the portscan aggregator. `block_mode` selects
    /// the `(src_ip, protocol)` key over the `(src_ip, dst_ip, protocol)`
    /// pair key (§4.2).
    pub async fn fold_portscan(&self, flow: &ScanFlow, block_mode: bool) {
        let key = if block_mode {
            AggregatorKey::PortscanBlock {
                src_ip: flow.src_ip,
                protocol: flow.protocol,
            }
        } else {
            AggregatorKey::PortscanPair {
                src_ip: flow.src_ip,
                dst_ip: flow.dst_ip,
                protocol: flow.protocol,
            }
        };
        self.fold_scan_flow(key, flow).await;
    }

    pub async fn fold_hostscan(&self, flow: &ScanFlow) {
        let key = AggregatorKey::HostScan {
            src_ip: flow.src_ip,
            dst_port: flow.dst_port,
        };
        self.fold_scan_flow(key, flow).await;
    }

    async fn fold_scan_flow(&self, key: AggregatorKey, flow: &ScanFlow) {
        let mut buckets = self.buckets.lock().await;
        let bucket = buckets
            .entry(key)
            .or_insert_with(|| Accumulator::start(flow.time_first));
        bucket.fold_in(
            flow.dst_ip.to_string(),
            flow.src_port,
            self.min_src_port,
            flow.time_first,
            flow.time_last,
            flow.bytes,
            flow.packets,
            flow.flows,
        );
    }

    /// Swaps the bucket table out and renders every bucket into one or more
    /// output events, splitting any bucket whose target set exceeds
    /// `max_targets_per_event` into several disjoint-target copies sharing
    /// identifying metadata (§4.2, invariant 9). Counts every event emitted
    /// and every bucket that had to be split across more than one event,
    /// per §7.
    pub async fn flush(&self, stats: &Stats) -> (Vec<AggregatedBlacklistEvent>, Vec<AggregatedScanEvent>) {
        let drained: HashMap<AggregatorKey, Accumulator> = {
            let mut buckets = self.buckets.lock().await;
            std::mem::take(&mut *buckets)
        };

        let mut blacklist_events = Vec::new();
        let mut scan_events = Vec::new();

        for (key, bucket) in drained {
            let target_chunks = self.split_targets(&bucket.targets);
            if target_chunks.len() > 1 {
                Stats::incr(&stats.aggregator_events_split);
            }
            Stats::add(&stats.aggregator_events_emitted, target_chunks.len() as u64);
            match key {
                AggregatorKey::BlacklistIp {
                    address,
                    protocol,
                    blacklist,
                } => {
                    for targets in target_chunks {
                        blacklist_events.push(AggregatedBlacklistEvent {
                            kind: AggregatedKind::Ip,
                            source: address.to_string(),
                            url_path: None,
                            targets,
                            source_ports: bucket.source_ports.iter().copied().collect(),
                            ts_first: bucket.ts_first,
                            ts_last: bucket.ts_last,
                            protocol,
                            blacklist_id: blacklist.0,
                            bytes: bucket.bytes,
                            packets: bucket.packets,
                            flows: bucket.flows,
                            agg_win_minutes: 0,
                        });
                    }
                }
                AggregatorKey::BlacklistUrl {
                    normalized_host,
                    url_path,
                    dst_ip,
                    protocol,
                    blacklist,
                } => {
                    for targets in target_chunks {
                        blacklist_events.push(AggregatedBlacklistEvent {
                            kind: AggregatedKind::Url,
                            source: normalized_host.clone(),
                            url_path: Some(url_path.clone()),
                            targets,
                            source_ports: bucket.source_ports.iter().copied().collect(),
                            ts_first: bucket.ts_first,
                            ts_last: bucket.ts_last,
                            protocol,
                            blacklist_id: blacklist.0,
                            bytes: bucket.bytes,
                            packets: bucket.packets,
                            flows: bucket.flows,
                            agg_win_minutes: 0,
                        });
                    }
                    let _ = dst_ip;
                }
                AggregatorKey::PortscanBlock { src_ip, protocol }
                | AggregatorKey::PortscanPair { src_ip, protocol, .. } => {
                    for targets in target_chunks {
                        scan_events.push(scan_event(
                            ScanAggregateKind::Portscan,
                            src_ip,
                            protocol,
                            targets,
                            &bucket,
                            None,
                        ));
                    }
                }
                AggregatorKey::HostScan { src_ip, dst_port } => {
                    for targets in target_chunks {
                        scan_events.push(scan_event(
                            ScanAggregateKind::HostScan,
                            src_ip,
                            0,
                            targets,
                            &bucket,
                            Some(dst_port),
                        ));
                    }
                }
            }
        }

        (blacklist_events, scan_events)
    }

    fn split_targets(&self, targets: &HashSet<String>) -> Vec<Vec<String>> {
        if targets.len() <= self.max_targets_per_event {
            return vec![targets.iter().cloned().collect()];
        }
        targets
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .chunks(self.max_targets_per_event)
            .map(|chunk| chunk.to_vec())
            .collect()
    }
}

fn scan_event(
    kind: ScanAggregateKind,
    source: IpAddr,
    protocol: u8,
    targets: Vec<String>,
    bucket: &Accumulator,
    dst_port: Option<u16>,
) -> AggregatedScanEvent {
    AggregatedScanEvent {
        kind,
        source,
        protocol,
        targets,
        source_ports: bucket.source_ports.iter().copied().collect(),
        dst_port,
        ts_first: bucket.ts_first,
        ts_last: bucket.ts_last,
        bytes: bucket.bytes,
        packets: bucket.packets,
        flows: bucket.flows,
    }
}
