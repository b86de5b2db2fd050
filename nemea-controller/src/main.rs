mod sinks;
mod transport;

use std::sync::Arc;

use clap::Parser;
use nemea_config::{CliArgs, ConfigLoader};
use nemea_core::aggregator::AggregatorTable;
use nemea_core::clock::SystemClock;
use nemea_core::controller::Controller;
use nemea_core::exporter::Exporter;
use nemea_core::receiver::run_receiver;
use nemea_core::resolver::TokioDomainResolver;
use nemea_core::scenario::{BotnetTargetWatch, DnsNameWatch, Registry};
use nemea_core::stats::Stats;
use nemea_core::table::ScenarioTable;
use nemea_core::timer::run_ticker;
use nemea_core::watchlist::WatchlistPublisher;
use nemea_core::{Classifier, InboundRecord};
use nemea_wire::{BlacklistId, EvidenceRecord, ReporterMessage};
use tokio_util::sync::CancellationToken;
use transport::{
    adaptive_redetection_source, aggregated_blacklist_source, dns_source,
    run_aggregator_flusher, run_blacklist_flow_listener, run_scan_flow_listener, JsonLineSource,
    ScanListenerKind,
};

/// Dedicated exit codes so an operator's process supervisor can tell a bad
/// config apart from a transport that failed to bind (§6 CLI/lifecycle).
const EXIT_CONFIG_ERROR: i32 = 2;
const EXIT_INTERFACE_ERROR: i32 = 3;

fn init_tracing(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let default_directive = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    init_tracing(args.verbose);

    let config = match ConfigLoader::load(&args) {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(%error, "configuration load failed");
            std::process::exit(EXIT_CONFIG_ERROR);
        }
    };

    let catalog = match nemea_config::blacklist_xml::load(&config.blacklist_config_path) {
        Ok(catalog) => catalog,
        Err(error) => {
            tracing::error!(%error, "failed to load blacklist catalog");
            std::process::exit(EXIT_CONFIG_ERROR);
        }
    };
    let botnet_ids = catalog.botnet_ids();
    // The adaptive watchlist tags botnet-target-watch entities with
    // whichever botnet blacklist bit is configured first; dns-name-watch
    // instead picks its bit per instance from the triggering detection (see
    // DnsNameWatch).
    let botnet_adaptive_id = botnet_ids.iter().copied().next().unwrap_or(BlacklistId(1));
    let registry = Registry::new(vec![
        Arc::new(BotnetTargetWatch::new(botnet_ids.clone(), botnet_adaptive_id)),
        Arc::new(DnsNameWatch),
    ]);
    let classifier = Classifier::new(registry);
    let table = ScenarioTable::new(
        config.max_detections_per_instance,
        config.max_satellites_per_instance,
    );
    let watchlist = WatchlistPublisher::new(config.adaptive_blacklist_path.clone());
    let exporter = Exporter::new(
        config.evidence_timeout,
        config.adaptive_timeout,
        config.max_satellites_per_export,
        config.export_instances_without_satellites,
    );
    let stats = Arc::new(Stats::default());
    let resolver: Arc<dyn nemea_core::DomainResolver> = Arc::new(TokioDomainResolver);
    let clock: nemea_core::SharedClock = Arc::new(SystemClock);

    let (reporter_tx, reporter_rx) = tokio::sync::mpsc::channel::<ReporterMessage>(config.inbound_queue_capacity);
    let (evidence_tx, evidence_rx) = tokio::sync::mpsc::channel::<EvidenceRecord>(config.inbound_queue_capacity);
    let (inbound_tx, mut inbound_rx) = tokio::sync::mpsc::channel::<InboundRecord>(config.inbound_queue_capacity);

    let controller = Arc::new(Controller::new(
        classifier,
        table,
        watchlist,
        exporter,
        resolver,
        clock,
        stats.clone(),
        reporter_tx,
        evidence_tx,
        config.send_timeout,
    ));

    let aggregator = Arc::new(AggregatorTable::new(
        config.min_src_port,
        config.max_targets_per_event,
    ));

    let stop = CancellationToken::new();
    let mut tasks = Vec::new();

    tasks.push(tokio::spawn(sinks::run_output_writer(
        reporter_rx,
        config.reporter_output.clone(),
        "reporter",
    )));
    tasks.push(tokio::spawn(sinks::run_output_writer(
        evidence_rx,
        config.evidence_output.clone(),
        "evidence",
    )));

    // The controller's own three input channels: aggregated blacklist
    // events, DNS detections, and adaptive re-detections.
    let aggregated_source = match JsonLineSource::bind(
        config.aggregated_blacklist_channel.bind,
        aggregated_blacklist_source(),
    )
    .await
    {
        Ok(source) => source,
        Err(error) => {
            tracing::error!(%error, "failed to bind aggregated blacklist channel");
            std::process::exit(EXIT_INTERFACE_ERROR);
        }
    };
    let dns_src = match JsonLineSource::bind(config.dns_channel.bind, dns_source()).await {
        Ok(source) => source,
        Err(error) => {
            tracing::error!(%error, "failed to bind DNS channel");
            std::process::exit(EXIT_INTERFACE_ERROR);
        }
    };
    let adaptive_src = match JsonLineSource::bind(
        config.adaptive_redetection_channel.bind,
        adaptive_redetection_source(),
    )
    .await
    {
        Ok(source) => source,
        Err(error) => {
            tracing::error!(%error, "failed to bind adaptive re-detection channel");
            std::process::exit(EXIT_INTERFACE_ERROR);
        }
    };

    {
        let tx = inbound_tx.clone();
        let stop = stop.clone();
        let stats = stats.clone();
        tasks.push(tokio::spawn(run_receiver(
            "aggregated-blacklist",
            aggregated_source,
            tx,
            stop,
            stats,
        )));
    }
    {
        let tx = inbound_tx.clone();
        let stop = stop.clone();
        let stats = stats.clone();
        tasks.push(tokio::spawn(run_receiver("dns", dns_src, tx, stop, stats)));
    }
    {
        let tx = inbound_tx.clone();
        let stop = stop.clone();
        let stats = stats.clone();
        tasks.push(tokio::spawn(run_receiver(
            "adaptive-redetection",
            adaptive_src,
            tx,
            stop,
            stats,
        )));
    }
    drop(inbound_tx);

    // Drains the shared inbound queue into the controller. Adaptive
    // re-detections take the satellite-correlation path (§4.4); everything
    // else goes through classify-and-observe (§4.3).
    {
        let controller = controller.clone();
        let stop = stop.clone();
        tasks.push(tokio::spawn(async move {
            loop {
                let record = tokio::select! {
                    _ = stop.cancelled() => break,
                    record = inbound_rx.recv() => match record {
                        Some(record) => record,
                        None => break,
                    },
                };
                if let InboundRecord::AdaptiveRedetection(ref redetection) = record {
                    let scenario_ids = redetection.scenario_ids();
                    let value = record.to_value();
                    controller.handle_satellite(scenario_ids, value).await;
                } else {
                    controller.handle_record(record).await;
                }
            }
        }));
    }

    // Raw per-flow channels feeding the in-process aggregators (C2). Their
    // flush output loops back into the same controller rather than
    // round-tripping over TCP; see DESIGN.md.
    {
        let aggregator = aggregator.clone();
        let stats = stats.clone();
        let stop = stop.clone();
        let addr = config.blacklist_ip_detect_channel.bind;
        tasks.push(tokio::spawn(async move {
            if let Err(error) =
                run_blacklist_flow_listener("blacklist-ip-detect", addr, false, aggregator, stats, stop)
                    .await
            {
                tracing::error!(%error, "blacklist-ip-detect listener failed");
            }
        }));
    }
    {
        let aggregator = aggregator.clone();
        let stats = stats.clone();
        let stop = stop.clone();
        let addr = config.blacklist_url_detect_channel.bind;
        tasks.push(tokio::spawn(async move {
            if let Err(error) =
                run_blacklist_flow_listener("blacklist-url-detect", addr, true, aggregator, stats, stop)
                    .await
            {
                tracing::error!(%error, "blacklist-url-detect listener failed");
            }
        }));
    }
    {
        let aggregator = aggregator.clone();
        let stats = stats.clone();
        let stop = stop.clone();
        let addr = config.portscan_detect_channel.bind;
        let kind = ScanListenerKind::Portscan {
            block_mode: config.portscan_block_mode,
        };
        tasks.push(tokio::spawn(async move {
            if let Err(error) =
                run_scan_flow_listener("portscan-detect", addr, kind, aggregator, stats, stop).await
            {
                tracing::error!(%error, "portscan-detect listener failed");
            }
        }));
    }
    {
        let aggregator = aggregator.clone();
        let stats = stats.clone();
        let stop = stop.clone();
        let addr = config.hostscan_detect_channel.bind;
        tasks.push(tokio::spawn(async move {
            if let Err(error) = run_scan_flow_listener(
                "hostscan-detect",
                addr,
                ScanListenerKind::HostScan,
                aggregator,
                stats,
                stop,
            )
            .await
            {
                tracing::error!(%error, "hostscan-detect listener failed");
            }
        }));
    }

    tasks.push(tokio::spawn(run_aggregator_flusher(
        aggregator.clone(),
        controller.clone(),
        stats.clone(),
        config.aggregation_window,
        stop.clone(),
    )));

    // C9's single repeating tick: derive-entities -> export -> publish -> prune.
    {
        let controller = controller.clone();
        let stop_clone = stop.clone();
        tasks.push(tokio::spawn(async move {
            run_ticker(config.process_interval, stop_clone, || {
                let controller = controller.clone();
                async move { controller.run_tick().await }
            })
            .await;
        }));
    }

    // Periodic stats logging, independent of the process tick.
    {
        let stats = stats.clone();
        let stop_clone = stop.clone();
        tasks.push(tokio::spawn(async move {
            run_ticker(config.stats_interval, stop_clone, || {
                let snapshot = stats.snapshot();
                async move {
                    tracing::info!(?snapshot, "periodic stats");
                }
            })
            .await;
        }));
    }

    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received, stopping tasks");
    stop.cancel();

    for task in tasks {
        let _ = task.await;
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
