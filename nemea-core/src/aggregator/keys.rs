use std::net::IpAddr;

use nemea_wire::BlacklistId;

/// Fold key for one of the four aggregator variants (§4.2). Each variant's
/// key shape is fixed by the spec; there is no generic "key extractor"
/// beyond this enum because the fold logic genuinely differs per variant
/// (URL normalization, block-scan vs pair-scan mode).
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum AggregatorKey {
    BlacklistIp {
        address: IpAddr,
        protocol: u8,
        blacklist: BlacklistId,
    },
    BlacklistUrl {
        normalized_host: String,
        url_path: String,
        dst_ip: IpAddr,
        protocol: u8,
        blacklist: BlacklistId,
    },
    PortscanBlock {
        src_ip: IpAddr,
        protocol: u8,
    },
    PortscanPair {
        src_ip: IpAddr,
        dst_ip: IpAddr,
        protocol: u8,
    },
    HostScan {
        src_ip: IpAddr,
        dst_port: u16,
    },
}

/// Strips a single leading `www.` label, case-sensitively (hosts are
/// expected already lower-cased by the upstream detector).
pub fn normalize_host(host: &str) -> String {
    host.strip_prefix("www.").unwrap_or(host).to_string()
}
