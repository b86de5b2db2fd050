use std::fmt;

/// Identifies one of the fixed input channels the pipeline understands.
///
/// The set is closed: new channels are a schema change, not a runtime
/// registration. Channel identity is what a [`crate::flow`] decoder uses to
/// pick a schema, and what the scenario classifier uses to pick a predicate.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ChannelId {
    /// Raw per-flow blacklist hits feeding the IP aggregator.
    BlacklistIpDetect,
    /// Raw per-flow blacklist hits (HTTP-enriched) feeding the URL aggregator.
    BlacklistUrlDetect,
    /// Raw per-flow records feeding the portscan aggregator.
    PortscanDetect,
    /// Raw per-flow records feeding the host-scan aggregator.
    HostScanDetect,
    /// Aggregated blacklist events (IP or URL) consumed by the controller.
    AggregatedBlacklist,
    /// DNS-enriched flow records consumed by the controller.
    Dns,
    /// Re-detections produced by the external adaptive detector.
    AdaptiveReDetection,
}

impl ChannelId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelId::BlacklistIpDetect => "blacklist_ip_detect",
            ChannelId::BlacklistUrlDetect => "blacklist_url_detect",
            ChannelId::PortscanDetect => "portscan_detect",
            ChannelId::HostScanDetect => "hostscan_detect",
            ChannelId::AggregatedBlacklist => "aggregated_blacklist",
            ChannelId::Dns => "dns",
            ChannelId::AdaptiveReDetection => "adaptive_redetection",
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
