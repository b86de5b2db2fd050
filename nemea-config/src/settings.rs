use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::loader::ConfigError;

/// Where a long-lived output stream writes. Stdout is the default so the
/// service is usable without any filesystem setup; a file sink is what a
/// real deployment behind a log shipper would use.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "path")]
pub enum OutputSink {
    Stdout,
    File(PathBuf),
}

impl Default for OutputSink {
    fn default() -> Self {
        OutputSink::Stdout
    }
}

/// The bind address and queue sizing for one input channel's receiver task.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChannelEndpoint {
    pub bind: SocketAddr,
}

/// Resolved configuration for the adaptive controller. Built by
/// [`crate::loader::ConfigLoader`] from defaults, an optional TOML file,
/// environment variables, and CLI overrides, in that order of precedence.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tick period for derive-entities / export / publish / prune (C5-C7, C9).
    #[serde(with = "humantime_serde_secs")]
    pub process_interval: Duration,
    /// Minimum scenario instance age before it becomes exportable.
    #[serde(with = "humantime_serde_secs")]
    pub evidence_timeout: Duration,
    /// Aggregator flush period (C2).
    #[serde(with = "humantime_serde_secs")]
    pub aggregation_window: Duration,
    /// If a scenario instance goes this long without a new detection and is
    /// not yet exportable, its adaptive entities are cleared (but the
    /// instance itself is kept until `evidence_timeout` fires).
    #[serde(with = "humantime_serde_secs")]
    pub adaptive_timeout: Duration,
    /// How often aggregate stats counters are logged.
    #[serde(with = "humantime_serde_secs")]
    pub stats_interval: Duration,

    /// Destination file for the adaptive watchlist (C6).
    pub adaptive_blacklist_path: PathBuf,
    /// XML file enumerating named blacklists.
    pub blacklist_config_path: PathBuf,

    /// C2 oversize-split threshold: max targets per emitted event.
    pub max_targets_per_event: usize,
    /// C7 scatter threshold: max satellites per evidence message.
    pub max_satellites_per_export: usize,
    /// C4 storage cap: max satellites retained per instance before the
    /// oldest are dropped. Must stay above `max_satellites_per_export` or
    /// an instance can never accumulate enough satellites to scatter-split
    /// at export (§4.7, spec invariants 2 and 10).
    pub max_satellites_per_instance: usize,
    /// Per-instance cap on retained raw detections (excess triggers
    /// scatter-splitting at export, never truncation of live state).
    pub max_detections_per_instance: usize,
    /// Ephemeral-port cutoff for C2: source ports above this are dropped
    /// from the retained port set.
    pub min_src_port: u16,

    /// When true, a scenario instance with zero satellites is still
    /// exported once `evidence_timeout` fires (this is the default,
    /// newest-copy behavior per the source's design notes). When false,
    /// such instances are skipped at export and retried next tick.
    pub export_instances_without_satellites: bool,

    /// Bounded channel capacity shared by all receivers feeding the
    /// classifier (C1's shared queue).
    pub inbound_queue_capacity: usize,
    /// How long an output send may block before it is counted as dropped.
    #[serde(with = "humantime_serde_secs")]
    pub send_timeout: Duration,

    pub aggregated_blacklist_channel: ChannelEndpoint,
    pub dns_channel: ChannelEndpoint,
    pub adaptive_redetection_channel: ChannelEndpoint,

    /// Raw per-flow channels feeding the blacklist-IP/URL and
    /// portscan/host-scan aggregators (C2), upstream of the adaptive
    /// controller's own input channels.
    pub blacklist_ip_detect_channel: ChannelEndpoint,
    pub blacklist_url_detect_channel: ChannelEndpoint,
    pub portscan_detect_channel: ChannelEndpoint,
    pub hostscan_detect_channel: ChannelEndpoint,
    /// When true, the portscan aggregator keys on `(src_ip, protocol)`
    /// ("block-scan" mode); when false it keys on `(src_ip, dst_ip,
    /// protocol)` (§4.2).
    pub portscan_block_mode: bool,

    pub reporter_output: OutputSink,
    pub evidence_output: OutputSink,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            process_interval: Duration::from_secs(30),
            evidence_timeout: Duration::from_secs(600),
            aggregation_window: Duration::from_secs(300),
            adaptive_timeout: Duration::from_secs(3600),
            stats_interval: Duration::from_secs(60),
            adaptive_blacklist_path: PathBuf::from("adaptive_blacklist.txt"),
            blacklist_config_path: PathBuf::from("blacklist_config.xml"),
            max_targets_per_event: 1000,
            max_satellites_per_export: 100,
            max_satellites_per_instance: 1000,
            max_detections_per_instance: 1000,
            min_src_port: 49_152,
            export_instances_without_satellites: true,
            inbound_queue_capacity: 4096,
            send_timeout: Duration::from_secs(2),
            aggregated_blacklist_channel: ChannelEndpoint {
                bind: "127.0.0.1:25000".parse().unwrap(),
            },
            dns_channel: ChannelEndpoint {
                bind: "127.0.0.1:25001".parse().unwrap(),
            },
            adaptive_redetection_channel: ChannelEndpoint {
                bind: "127.0.0.1:25002".parse().unwrap(),
            },
            blacklist_ip_detect_channel: ChannelEndpoint {
                bind: "127.0.0.1:25010".parse().unwrap(),
            },
            blacklist_url_detect_channel: ChannelEndpoint {
                bind: "127.0.0.1:25011".parse().unwrap(),
            },
            portscan_detect_channel: ChannelEndpoint {
                bind: "127.0.0.1:25012".parse().unwrap(),
            },
            hostscan_detect_channel: ChannelEndpoint {
                bind: "127.0.0.1:25013".parse().unwrap(),
            },
            portscan_block_mode: true,
            reporter_output: OutputSink::Stdout,
            evidence_output: OutputSink::Stdout,
        }
    }
}

impl Config {
    /// Validates numeric ranges and filesystem writability. Called once at
    /// startup before any task is spawned; failures are configuration
    /// errors (fatal, distinct exit code).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.process_interval.is_zero() {
            return Err(ConfigError::Invalid("process_interval must be > 0".into()));
        }
        if self.aggregation_window.is_zero() {
            return Err(ConfigError::Invalid("aggregation_window must be > 0".into()));
        }
        if self.max_targets_per_event == 0 {
            return Err(ConfigError::Invalid(
                "max_targets_per_event must be > 0".into(),
            ));
        }
        if self.max_satellites_per_export == 0 {
            return Err(ConfigError::Invalid(
                "max_satellites_per_export must be > 0".into(),
            ));
        }
        if self.max_satellites_per_instance < self.max_satellites_per_export {
            return Err(ConfigError::Invalid(
                "max_satellites_per_instance must be >= max_satellites_per_export, or instances can never accumulate enough satellites to scatter-split".into(),
            ));
        }
        if self.max_detections_per_instance == 0 {
            return Err(ConfigError::Invalid(
                "max_detections_per_instance must be > 0".into(),
            ));
        }
        if !self.blacklist_config_path.exists() {
            return Err(ConfigError::Invalid(format!(
                "blacklist_config_path {:?} does not exist",
                self.blacklist_config_path
            )));
        }
        if let Some(parent) = self.adaptive_blacklist_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ConfigError::Invalid(format!(
                        "cannot create adaptive_blacklist_path parent {parent:?}: {e}"
                    ))
                })?;
            }
        }
        Ok(())
    }
}

/// `humantime`-backed serde helper so the TOML file can say `"30s"` while the
/// in-memory type stays a plain [`Duration`].
mod humantime_serde_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        humantime::format_duration(*value).to_string().serialize(ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(de)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_table() {
        let config = Config::default();
        assert_eq!(config.process_interval, Duration::from_secs(30));
        assert_eq!(config.evidence_timeout, Duration::from_secs(600));
        assert_eq!(config.aggregation_window, Duration::from_secs(300));
        assert_eq!(config.max_targets_per_event, 1000);
        assert_eq!(config.max_satellites_per_export, 100);
        assert_eq!(config.max_satellites_per_instance, 1000);
        assert_eq!(config.min_src_port, 49_152);
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.process_interval = Duration::from_secs(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_satellite_storage_cap_below_scatter_threshold() {
        let mut config = Config::default();
        config.max_satellites_per_instance = config.max_satellites_per_export - 1;
        assert!(config.validate().is_err());
    }
}
