//! End-to-end scenario tests driving a fully wired [`Controller`] with a
//! manual clock and a stubbed resolver, matching the seeds in §8 of the
//! specification this crate implements.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use nemea_core::classifier::Classifier;
use nemea_core::clock::test_util::ManualClock;
use nemea_core::controller::Controller;
use nemea_core::exporter::Exporter;
use nemea_core::resolver::test_util::MockDomainResolver;
use nemea_core::scenario::{BotnetTargetWatch, DnsNameWatch, Registry};
use nemea_core::stats::Stats;
use nemea_core::table::ScenarioTable;
use nemea_core::watchlist::WatchlistPublisher;
use nemea_core::InboundRecord;
use nemea_wire::{
    AdaptiveEntity, AggregatedBlacklistEvent, AggregatedKind, BlacklistId, DnsDetectionRecord,
    EvidenceRecord, ReporterMessage,
};

struct Harness {
    controller: Controller,
    clock: Arc<ManualClock>,
    watchlist_path: std::path::PathBuf,
    reporter_rx: tokio::sync::mpsc::Receiver<ReporterMessage>,
    evidence_rx: tokio::sync::mpsc::Receiver<EvidenceRecord>,
    _tempdir: tempfile::TempDir,
}

/// Storage cap for satellites on the scenario table. Kept well above the
/// exporter's scatter threshold (see `SATELLITE_SCATTER_THRESHOLD` below) so
/// an instance can actually accumulate enough satellites to scatter-split
/// at export, matching how `main.rs` wires `max_satellites_per_instance`
/// distinct from `max_satellites_per_export`.
const SATELLITE_STORAGE_CAP: usize = 1000;
/// The exporter's per-message scatter threshold (`max_satellites_per_export`).
const SATELLITE_SCATTER_THRESHOLD: usize = 100;

fn harness(resolver: MockDomainResolver, evidence_timeout: Duration) -> Harness {
    harness_with_adaptive_timeout(resolver, evidence_timeout, Duration::from_secs(3600))
}

fn harness_with_adaptive_timeout(
    resolver: MockDomainResolver,
    evidence_timeout: Duration,
    adaptive_timeout: Duration,
) -> Harness {
    let botnet_ids = std::collections::HashSet::from([BlacklistId(1)]);
    let adaptive_id = BlacklistId(1);
    let registry = Registry::new(vec![
        Arc::new(BotnetTargetWatch::new(botnet_ids, adaptive_id)),
        Arc::new(DnsNameWatch),
    ]);
    let classifier = Classifier::new(registry);
    let table = ScenarioTable::new(1000, SATELLITE_STORAGE_CAP);
    let dir = tempfile::tempdir().unwrap();
    let watchlist_path = dir.path().join("adaptive_blacklist.txt");
    let watchlist = WatchlistPublisher::new(watchlist_path.clone());
    let exporter = Exporter::new(
        evidence_timeout,
        adaptive_timeout,
        SATELLITE_SCATTER_THRESHOLD,
        true,
    );
    let stats = Arc::new(Stats::default());
    let clock = ManualClock::new(Utc::now());

    let (reporter_tx, reporter_rx) = tokio::sync::mpsc::channel(16);
    let (evidence_tx, evidence_rx) = tokio::sync::mpsc::channel(16);

    let shared_clock: nemea_core::SharedClock = clock.clone();
    let controller = Controller::new(
        classifier,
        table,
        watchlist,
        exporter,
        Arc::new(resolver),
        shared_clock,
        stats,
        reporter_tx,
        evidence_tx,
        Duration::from_secs(2),
    );

    Harness {
        controller,
        clock,
        watchlist_path,
        reporter_rx,
        evidence_rx,
        _tempdir: dir,
    }
}

fn aggregated_ip_event(source: &str, blacklist_id: u64, targets: Vec<&str>) -> AggregatedBlacklistEvent {
    let now = Utc::now();
    AggregatedBlacklistEvent {
        kind: AggregatedKind::Ip,
        source: source.to_string(),
        url_path: None,
        targets: targets.into_iter().map(String::from).collect(),
        source_ports: vec![],
        ts_first: now,
        ts_last: now,
        protocol: 6,
        blacklist_id,
        bytes: 0,
        packets: 0,
        flows: 1,
        agg_win_minutes: 5,
    }
}

fn watchlist_lines(path: &std::path::Path) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => contents.lines().map(String::from).collect(),
        Err(_) => Vec::new(),
    }
}

/// S1 — Botnet C&C fan-out: three detections fold into one instance, the
/// watchlist picks up the union of targets, and nothing is exported before
/// `evidence_timeout`.
#[tokio::test]
async fn s1_botnet_fanout_derives_watchlist_without_early_export() {
    let mut harness = harness(MockDomainResolver::new(), Duration::from_secs(600));

    for targets in [vec!["192.0.2.10"], vec!["192.0.2.11"], vec!["192.0.2.10"]] {
        harness
            .controller
            .handle_record(InboundRecord::Aggregated(aggregated_ip_event(
                "10.0.0.1", 1, targets,
            )))
            .await;
    }

    harness.controller.run_tick().await;

    let lines = watchlist_lines(&harness.watchlist_path);
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().any(|l| l.starts_with("192.0.2.10,1,")));
    assert!(lines.iter().any(|l| l.starts_with("192.0.2.11,1,")));

    assert!(harness.evidence_rx.try_recv().is_err());
}

/// S2 — Evidence release: once the evidence window elapses the instance is
/// exported exactly once and, after the pruned state is reflected in the
/// next publish, the watchlist returns to empty.
#[tokio::test]
async fn s2_evidence_release_exports_once_and_drains_watchlist() {
    let mut harness = harness(MockDomainResolver::new(), Duration::from_secs(600));

    harness
        .controller
        .handle_record(InboundRecord::Aggregated(aggregated_ip_event(
            "10.0.0.1",
            1,
            vec!["192.0.2.10"],
        )))
        .await;

    harness.controller.run_tick().await;
    assert!(harness.evidence_rx.try_recv().is_err());
    assert_eq!(watchlist_lines(&harness.watchlist_path).len(), 1);

    harness.clock.advance(chrono::Duration::seconds(601));
    harness.controller.run_tick().await;

    let evidence = harness.evidence_rx.try_recv().expect("one evidence record");
    assert_eq!(evidence.scenario_key, "10.0.0.1");
    assert!(harness.evidence_rx.try_recv().is_err());

    // The instance is pruned at the end of this tick, after the watchlist
    // was already published with its (still-live) entities; the file only
    // reflects the removal on the following publish (§4.7's fixed
    // derive/export/publish/prune order).
    harness.controller.run_tick().await;
    assert!(watchlist_lines(&harness.watchlist_path).is_empty());
}

/// S3 — DNS scenario with resolver: a blacklisted domain resolves through a
/// stub resolver into two watchlist entries, keyed by the normalized name.
#[tokio::test]
async fn s3_dns_scenario_resolves_entities() {
    let mut resolver = MockDomainResolver::new();
    resolver.expect_resolve().returning(|_| {
        vec![
            IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)),
            IpAddr::V4(Ipv4Addr::new(1, 2, 3, 5)),
        ]
    });
    let mut harness = harness(resolver, Duration::from_secs(600));

    let now = Utc::now();
    let record = DnsDetectionRecord {
        dst_ip: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)),
        src_ip: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 6)),
        bytes: 0,
        time_first: now,
        time_last: now,
        packets: 1,
        protocol: 17,
        dst_port: 53,
        src_port: 5353,
        dns_id: 1,
        dns_answers: 1,
        dns_name: "Www.Evil.Example.".to_string(),
        dns_qtype: 1,
        dns_rlength: 4,
        dns_rcode: 0,
        dns_rdata: vec![],
        dns_do: false,
        dns_class: 1,
        dns_psize: 512,
        dns_rr_ttl: 300,
        blacklist: 1,
    };
    harness
        .controller
        .handle_record(InboundRecord::Dns(record))
        .await;
    harness.controller.run_tick().await;

    let lines = watchlist_lines(&harness.watchlist_path);
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().any(|l| l.starts_with("1.2.3.4,1,")));
    assert!(lines.iter().any(|l| l.starts_with("1.2.3.5,1,")));
    assert!(harness.evidence_rx.try_recv().is_err());
}

/// S6 — Bypass: a DNS record with no blacklist bit set fits no scenario and
/// is forwarded verbatim to the reporter, with no scenario or watchlist
/// state created.
#[tokio::test]
async fn s6_unmatched_record_bypasses_to_reporter() {
    let mut harness = harness(MockDomainResolver::new(), Duration::from_secs(600));

    let now = Utc::now();
    let record = DnsDetectionRecord {
        dst_ip: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)),
        src_ip: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 6)),
        bytes: 0,
        time_first: now,
        time_last: now,
        packets: 1,
        protocol: 17,
        dst_port: 53,
        src_port: 5353,
        dns_id: 1,
        dns_answers: 1,
        dns_name: "benign.example".to_string(),
        dns_qtype: 1,
        dns_rlength: 4,
        dns_rcode: 0,
        dns_rdata: vec![],
        dns_do: false,
        dns_class: 1,
        dns_psize: 512,
        dns_rr_ttl: 300,
        blacklist: 0,
    };
    let expected_payload = serde_json::to_value(&record).unwrap();

    harness
        .controller
        .handle_record(InboundRecord::Dns(record))
        .await;

    let message = harness
        .reporter_rx
        .try_recv()
        .expect("bypassed record forwarded to reporter");
    assert_eq!(message.0, expected_payload);
    assert!(harness.reporter_rx.try_recv().is_err());

    harness.controller.run_tick().await;
    assert!(watchlist_lines(&harness.watchlist_path).is_empty());
    assert!(harness.evidence_rx.try_recv().is_err());
}

/// Testable property 5: every adaptive entity the watchlist carries embeds
/// the UUID of the scenario instance that produced it, and it is the same
/// UUID across every entity from that instance.
#[tokio::test]
async fn every_entity_from_one_instance_shares_its_scenario_uuid() {
    let mut harness = harness(MockDomainResolver::new(), Duration::from_secs(600));
    harness
        .controller
        .handle_record(InboundRecord::Aggregated(aggregated_ip_event(
            "10.0.0.1",
            1,
            vec!["192.0.2.10"],
        )))
        .await;
    harness
        .controller
        .handle_record(InboundRecord::Aggregated(aggregated_ip_event(
            "10.0.0.1",
            1,
            vec!["192.0.2.11"],
        )))
        .await;
    harness.controller.run_tick().await;

    let entities: Vec<AdaptiveEntity> = watchlist_lines(&harness.watchlist_path)
        .iter()
        .map(|line| AdaptiveEntity::parse_line(line).expect("valid watchlist line"))
        .collect();
    assert_eq!(entities.len(), 2);
    assert_eq!(entities[0].scenario_uuid, entities[1].scenario_uuid);
}

/// Spec invariants 2 and 10, §4.7 `scatter_part`: with the scenario table's
/// satellite storage cap wired above the exporter's scatter threshold (as
/// `main.rs` now wires `max_satellites_per_instance` above
/// `max_satellites_per_export`), an instance that accumulates more
/// satellites than the threshold is exported as several `event_scattered`
/// messages sharing one `event_id`, rather than a single oversized one.
#[tokio::test]
async fn satellite_overflow_scatters_across_multiple_evidence_messages() {
    let mut harness = harness(MockDomainResolver::new(), Duration::from_secs(600));

    harness
        .controller
        .handle_record(InboundRecord::Aggregated(aggregated_ip_event(
            "10.0.0.1",
            1,
            vec!["192.0.2.10"],
        )))
        .await;
    harness.controller.run_tick().await;

    let scenario_uuid = watchlist_lines(&harness.watchlist_path)
        .iter()
        .find_map(|line| AdaptiveEntity::parse_line(line))
        .expect("instance derived at least one watchlist entity")
        .scenario_uuid;

    let satellite_count = SATELLITE_SCATTER_THRESHOLD + 50;
    for i in 0..satellite_count {
        harness
            .controller
            .handle_satellite(vec![scenario_uuid], serde_json::json!({ "i": i }))
            .await;
    }

    harness.clock.advance(chrono::Duration::seconds(601));
    harness.controller.run_tick().await;

    let mut records = Vec::new();
    while let Ok(record) = harness.evidence_rx.try_recv() {
        records.push(record);
    }

    assert_eq!(records.len(), 2, "oversized satellite list must scatter into multiple messages");
    assert!(records.iter().all(|r| r.event_scattered));
    let event_ids: std::collections::HashSet<_> = records.iter().map(|r| r.event_id).collect();
    assert_eq!(event_ids.len(), 1, "scatter parts share one event_id");
    let total: usize = records.iter().map(|r| r.satellites.len()).sum();
    assert_eq!(total, satellite_count);
}

/// §10.6: an instance idle past `adaptive_timeout` without becoming
/// exportable has its watchlist contribution cleared, while the instance
/// itself survives (a later detection can still extend it).
#[tokio::test]
async fn idle_instance_past_adaptive_timeout_clears_watchlist_entry() {
    let mut harness = harness_with_adaptive_timeout(
        MockDomainResolver::new(),
        Duration::from_secs(3600),
        Duration::from_secs(120),
    );

    harness
        .controller
        .handle_record(InboundRecord::Aggregated(aggregated_ip_event(
            "10.0.0.1",
            1,
            vec!["192.0.2.10"],
        )))
        .await;
    harness.controller.run_tick().await;
    assert_eq!(watchlist_lines(&harness.watchlist_path).len(), 1);

    harness.clock.advance(chrono::Duration::seconds(121));
    harness.controller.run_tick().await;

    assert!(watchlist_lines(&harness.watchlist_path).is_empty());
    assert!(harness.evidence_rx.try_recv().is_err(), "idle-clearing must not export");
}
