use std::path::PathBuf;

use clap::Parser;

/// Adaptive correlation controller: aggregates blacklist/DNS detections into
/// scenario instances, maintains the adaptive watchlist, and exports
/// evidence once instances age past the evidence window.
#[derive(Parser, Clone, Debug, Default)]
#[command(name = "nemea-controller", version, about)]
pub struct CliArgs {
    /// Path to a TOML configuration file. Missing file is not an error;
    /// defaults apply.
    #[arg(long, env = "NEMEA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Overrides `blacklist_config_path`.
    #[arg(long, env = "NEMEA_BLACKLIST_CONFIG_PATH")]
    pub blacklist_config_path: Option<PathBuf>,

    /// Overrides `adaptive_blacklist_path`.
    #[arg(long, env = "NEMEA_ADAPTIVE_BLACKLIST_PATH")]
    pub adaptive_blacklist_path: Option<PathBuf>,

    /// Overrides `process_interval`, in seconds.
    #[arg(long, env = "NEMEA_PROCESS_INTERVAL")]
    pub process_interval_secs: Option<u64>,

    /// Overrides `evidence_timeout`, in seconds.
    #[arg(long, env = "NEMEA_EVIDENCE_TIMEOUT")]
    pub evidence_timeout_secs: Option<u64>,

    /// Overrides `aggregation_window`, in seconds.
    #[arg(long, env = "NEMEA_AGGREGATION_WINDOW")]
    pub aggregation_window_secs: Option<u64>,

    /// Overrides `max_targets_per_event`.
    #[arg(long, env = "NEMEA_MAX_TARGETS_PER_EVENT")]
    pub max_targets_per_event: Option<usize>,

    /// Overrides `max_satellites_per_export`.
    #[arg(long, env = "NEMEA_MAX_SATELLITES_PER_EXPORT")]
    pub max_satellites_per_export: Option<usize>,

    /// Overrides `max_satellites_per_instance`.
    #[arg(long, env = "NEMEA_MAX_SATELLITES_PER_INSTANCE")]
    pub max_satellites_per_instance: Option<usize>,

    /// Gates the older "skip instances without satellites" export behavior
    /// (see the open question in the design notes). Default is to export
    /// unconditionally once `evidence_timeout` fires.
    #[arg(long, env = "NEMEA_SKIP_EMPTY_SATELLITE_EXPORTS")]
    pub skip_empty_satellite_exports: bool,

    /// Increases log verbosity; stacks with `RUST_LOG`.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
