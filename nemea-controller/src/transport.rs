//! TCP transport for the three adaptive-controller input channels, the two
//! output streams, and the four raw per-flow channels feeding the
//! aggregators (C2).
//!
//! §6 describes channel 1 as JSON-framed and channels 2/3 as "binary
//! records"; the exact NEMEA UniRec wire format is an external collaborator
//! concern (§1 Non-goals: "does not parse wire protocols" beyond what the
//! core needs). This binary frames every channel identically — newline-
//! delimited JSON over a TCP listener — so the controller never has to
//! guess at a binary layout the spec leaves unspecified. See DESIGN.md.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use nemea_core::aggregator::AggregatorTable;
use nemea_core::controller::Controller;
use nemea_core::receiver::{RecordSource, SourceEvent};
use nemea_core::stats::Stats;
use nemea_core::InboundRecord;
use nemea_wire::{AdaptiveReDetectionRecord, AggregatedBlacklistEvent, BlacklistDetectionFlow, DnsDetectionRecord, ScanFlow};
use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

/// Accepts connections serially and yields newline-delimited JSON values,
/// one per line. When one connection drops, the next `accept` picks up the
/// following one — "terminal end-of-stream token stops only that reader"
/// from §4.1, at connection granularity.
pub struct JsonLineListener {
    listener: TcpListener,
    current: Option<BufReader<TcpStream>>,
}

impl JsonLineListener {
    pub async fn bind(addr: SocketAddr) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            current: None,
        })
    }

    async fn next_line(&mut self) -> Option<std::io::Result<String>> {
        loop {
            if self.current.is_none() {
                let (stream, peer) = self.listener.accept().await.ok()?;
                tracing::info!(%peer, "accepted connection");
                self.current = Some(BufReader::new(stream));
            }
            let reader = self.current.as_mut().unwrap();
            let mut line = String::new();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    self.current = None;
                    continue;
                }
                Ok(_) => return Some(Ok(line)),
                Err(error) => {
                    self.current = None;
                    return Some(Err(error));
                }
            }
        }
    }

    async fn next_value<T: DeserializeOwned>(&mut self) -> Option<Result<T, String>> {
        match self.next_line().await? {
            Err(error) => Some(Err(error.to_string())),
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    return Some(Err("empty line".into()));
                }
                Some(serde_json::from_str(trimmed).map_err(|e| e.to_string()))
            }
        }
    }
}

/// Adapts a [`JsonLineListener`] into a [`RecordSource`] for one of the
/// adaptive controller's own input channels.
pub struct JsonLineSource<T> {
    listener: JsonLineListener,
    wrap: fn(T) -> InboundRecord,
}

impl<T> JsonLineSource<T> {
    pub async fn bind(addr: SocketAddr, wrap: fn(T) -> InboundRecord) -> std::io::Result<Self> {
        Ok(Self {
            listener: JsonLineListener::bind(addr).await?,
            wrap,
        })
    }
}

#[async_trait]
impl<T: DeserializeOwned + Send> RecordSource for JsonLineSource<T> {
    async fn recv(&mut self) -> SourceEvent {
        match self.listener.next_value::<T>().await {
            None => SourceEvent::EndOfStream,
            Some(Err(reason)) => SourceEvent::Malformed(reason),
            Some(Ok(value)) => SourceEvent::Record((self.wrap)(value)),
        }
    }
}

pub fn aggregated_blacklist_source() -> fn(AggregatedBlacklistEvent) -> InboundRecord {
    InboundRecord::Aggregated
}

pub fn dns_source() -> fn(DnsDetectionRecord) -> InboundRecord {
    InboundRecord::Dns
}

pub fn adaptive_redetection_source() -> fn(AdaptiveReDetectionRecord) -> InboundRecord {
    InboundRecord::AdaptiveRedetection
}

/// Drives one raw blacklist-detection flow channel into the shared
/// aggregator table until cancelled (feeds the blacklist-IP or
/// blacklist-URL variant depending on `is_url_variant`).
pub async fn run_blacklist_flow_listener(
    channel_name: &'static str,
    addr: SocketAddr,
    is_url_variant: bool,
    aggregator: Arc<AggregatorTable>,
    stats: Arc<Stats>,
    stop: CancellationToken,
) -> std::io::Result<()> {
    let mut listener = JsonLineListener::bind(addr).await?;
    loop {
        if stop.is_cancelled() {
            return Ok(());
        }
        let next = tokio::select! {
            _ = stop.cancelled() => return Ok(()),
            next = listener.next_value::<BlacklistDetectionFlow>() => next,
        };
        match next {
            None => return Ok(()),
            Some(Err(reason)) => {
                Stats::incr(&stats.records_malformed);
                tracing::warn!(channel = channel_name, reason, "dropping malformed flow");
            }
            Some(Ok(flow)) => aggregator.fold_blacklist(&flow, is_url_variant).await,
        }
    }
}

/// Drives one raw scan flow channel (portscan or host-scan) into the shared
/// aggregator table until cancelled.
pub async fn run_scan_flow_listener(
    channel_name: &'static str,
    addr: SocketAddr,
    kind: ScanListenerKind,
    aggregator: Arc<AggregatorTable>,
    stats: Arc<Stats>,
    stop: CancellationToken,
) -> std::io::Result<()> {
    let mut listener = JsonLineListener::bind(addr).await?;
    loop {
        if stop.is_cancelled() {
            return Ok(());
        }
        let next = tokio::select! {
            _ = stop.cancelled() => return Ok(()),
            next = listener.next_value::<ScanFlow>() => next,
        };
        match next {
            None => return Ok(()),
            Some(Err(reason)) => {
                Stats::incr(&stats.records_malformed);
                tracing::warn!(channel = channel_name, reason, "dropping malformed flow");
            }
            Some(Ok(flow)) => match kind {
                ScanListenerKind::Portscan { block_mode } => {
                    aggregator.fold_portscan(&flow, block_mode).await
                }
                ScanListenerKind::HostScan => aggregator.fold_hostscan(&flow).await,
            },
        }
    }
}

#[derive(Clone, Copy)]
pub enum ScanListenerKind {
    Portscan { block_mode: bool },
    HostScan,
}

/// Ticks the shared aggregator table at `aggregation_window`: blacklist
/// events feed straight into the controller as channel-1 records (the
/// aggregator's "own output" is, in this single-process wiring, the
/// controller's input); scan events bypass classification entirely and go
/// to the reporter (§4.2, §4.8).
pub async fn run_aggregator_flusher(
    aggregator: Arc<AggregatorTable>,
    controller: Arc<Controller>,
    stats: Arc<Stats>,
    period: std::time::Duration,
    stop: CancellationToken,
) {
    nemea_core::timer::run_ticker(period, stop, || {
        let aggregator = aggregator.clone();
        let controller = controller.clone();
        let stats = stats.clone();
        async move {
            let (blacklist_events, scan_events) = aggregator.flush(&stats).await;
            for event in blacklist_events {
                controller
                    .handle_record(InboundRecord::Aggregated(event))
                    .await;
            }
            for event in scan_events {
                let value = serde_json::to_value(&event).unwrap_or(serde_json::Value::Null);
                controller.forward_to_reporter(value).await;
            }
        }
    })
    .await;
}
