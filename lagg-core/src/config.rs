//! Aggregator configuration and its `key=value` file format.
//!
//! One setting per line; blank lines and lines starting with `#` are ignored.
//! List values are separated by whitespace:
//!
//! ```text
//! destination_ip=10.0.0.2
//! link_peers=02:00:00:00:00:0b 02:00:00:00:00:0d
//! link_if_names=eth1 eth2
//! reorder_timeout=50ms
//! ```
//!
//! Unknown keys are logged and skipped so older binaries accept newer files.

use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use crate::client::tun::{DEFAULT_TUN_MTU, DEFAULT_TUN_NAME};
use crate::proto::MacAddress;
use crate::reorder::DEFAULT_REORDER_TIMEOUT;

/// Default interval between health log lines
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(10);

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Line {line}: expected key=value, got {text:?}")]
    Syntax { line: usize, text: String },

    #[error("Line {line}: invalid value for '{key}': {reason}")]
    InvalidValue {
        line: usize,
        key: String,
        reason: String,
    },

    #[error("Missing required setting '{0}'")]
    Missing(&'static str),

    #[error("Number of interfaces ({if_names}) does not match number of peer addresses ({peers})")]
    LinkCountMismatch { peers: usize, if_names: usize },

    #[error("At least one link is required")]
    NoLinks,
}

/// One configured path: local interface and the peer's hardware address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    pub if_name: String,
    pub peer: MacAddress,
}

/// Configuration for one aggregator endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatorConfig {
    /// Remote IP whose traffic is carried over the links
    pub destination_ip: Ipv4Addr,
    /// Paths, in configuration order
    pub links: Vec<LinkConfig>,
    /// How long a gap may hold back later frames
    pub reorder_timeout: Duration,
    /// TUN device name
    pub tun_name: String,
    /// TUN device MTU
    pub tun_mtu: u16,
    /// Interval between health log lines
    pub health_interval: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            destination_ip: Ipv4Addr::UNSPECIFIED,
            links: Vec::new(),
            reorder_timeout: DEFAULT_REORDER_TIMEOUT,
            tun_name: DEFAULT_TUN_NAME.to_string(),
            tun_mtu: DEFAULT_TUN_MTU,
            health_interval: DEFAULT_HEALTH_INTERVAL,
        }
    }
}

impl AggregatorConfig {
    /// Load and parse a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&raw)
    }

    /// Parse configuration text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        let mut destination = None;
        let mut peers: Vec<MacAddress> = Vec::new();
        let mut if_names: Vec<String> = Vec::new();

        for (idx, raw_line) in text.lines().enumerate() {
            let line = idx + 1;
            let trimmed = raw_line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(ConfigError::Syntax {
                    line,
                    text: trimmed.to_string(),
                });
            };
            let key = key.trim();
            let value = value.trim();

            let invalid = |reason: String| ConfigError::InvalidValue {
                line,
                key: key.to_string(),
                reason,
            };

            match key {
                "destination_ip" => {
                    destination = Some(value.parse().map_err(|e| invalid(format!("{e}")))?);
                }
                "link_peers" => {
                    peers = value
                        .split_whitespace()
                        .map(|s| s.parse::<MacAddress>())
                        .collect::<Result<_, _>>()
                        .map_err(|e| invalid(e.to_string()))?;
                }
                "link_if_names" => {
                    if_names = value.split_whitespace().map(str::to_string).collect();
                }
                "reorder_timeout" => {
                    cfg.reorder_timeout =
                        humantime::parse_duration(value).map_err(|e| invalid(e.to_string()))?;
                }
                "tun_name" => {
                    if value.is_empty() {
                        return Err(invalid("must not be empty".to_string()));
                    }
                    cfg.tun_name = value.to_string();
                }
                "tun_mtu" => {
                    cfg.tun_mtu = value.parse().map_err(|e| invalid(format!("{e}")))?;
                }
                "health_interval" => {
                    let interval =
                        humantime::parse_duration(value).map_err(|e| invalid(e.to_string()))?;
                    if interval.is_zero() {
                        return Err(invalid("must be greater than zero".to_string()));
                    }
                    cfg.health_interval = interval;
                }
                other => {
                    tracing::warn!("config line {line}: ignoring unknown key '{other}'");
                }
            }
        }

        cfg.destination_ip = destination.ok_or(ConfigError::Missing("destination_ip"))?;

        if peers.len() != if_names.len() {
            return Err(ConfigError::LinkCountMismatch {
                peers: peers.len(),
                if_names: if_names.len(),
            });
        }
        if peers.is_empty() {
            return Err(ConfigError::NoLinks);
        }

        cfg.links = if_names
            .into_iter()
            .zip(peers)
            .map(|(if_name, peer)| LinkConfig { if_name, peer })
            .collect();

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# two links
destination_ip=10.0.0.2
link_peers=02:00:00:00:00:0b 02:00:00:00:00:0d
link_if_names=eth1 eth2
";

    #[test]
    fn test_parse_minimal() {
        let cfg = AggregatorConfig::parse(SAMPLE).expect("parse");

        assert_eq!(cfg.destination_ip, Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(cfg.links.len(), 2);
        assert_eq!(cfg.links[0].if_name, "eth1");
        assert_eq!(cfg.links[0].peer, MacAddress([2, 0, 0, 0, 0, 0x0b]));
        assert_eq!(cfg.links[1].if_name, "eth2");
        assert_eq!(cfg.links[1].peer, MacAddress([2, 0, 0, 0, 0, 0x0d]));

        // Defaults
        assert_eq!(cfg.reorder_timeout, Duration::from_millis(50));
        assert_eq!(cfg.tun_name, "lagg0");
        assert_eq!(cfg.tun_mtu, 1400);
        assert_eq!(cfg.health_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_parse_optional_keys() {
        let text = format!(
            "{SAMPLE}reorder_timeout = 120ms\ntun_name=agg1\ntun_mtu=1300\nhealth_interval=1m\n"
        );
        let cfg = AggregatorConfig::parse(&text).expect("parse");

        assert_eq!(cfg.reorder_timeout, Duration::from_millis(120));
        assert_eq!(cfg.tun_name, "agg1");
        assert_eq!(cfg.tun_mtu, 1300);
        assert_eq!(cfg.health_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_unknown_key_ignored() {
        let text = format!("{SAMPLE}colour=blue\n");
        assert!(AggregatorConfig::parse(&text).is_ok());
    }

    #[test]
    fn test_link_count_mismatch() {
        let text = "destination_ip=10.0.0.2\nlink_peers=02:00:00:00:00:0b\nlink_if_names=eth1 eth2\n";
        let err = AggregatorConfig::parse(text).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::LinkCountMismatch { peers: 1, if_names: 2 }
        ));
    }

    #[test]
    fn test_no_links() {
        let err = AggregatorConfig::parse("destination_ip=10.0.0.2\n").unwrap_err();
        assert!(matches!(err, ConfigError::NoLinks));
    }

    #[test]
    fn test_missing_destination() {
        let text = "link_peers=02:00:00:00:00:0b\nlink_if_names=eth1\n";
        let err = AggregatorConfig::parse(text).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("destination_ip")));
    }

    #[test]
    fn test_bad_values() {
        let bad_mac = "destination_ip=10.0.0.2\nlink_peers=02:00:zz:00:00:0b\nlink_if_names=eth1\n";
        assert!(matches!(
            AggregatorConfig::parse(bad_mac),
            Err(ConfigError::InvalidValue { line: 2, .. })
        ));

        let bad_ip = "destination_ip=10.0.0\n";
        assert!(matches!(
            AggregatorConfig::parse(bad_ip),
            Err(ConfigError::InvalidValue { line: 1, .. })
        ));

        let bad_timeout = format!("{SAMPLE}reorder_timeout=soon\n");
        assert!(matches!(
            AggregatorConfig::parse(&bad_timeout),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_syntax_error() {
        let err = AggregatorConfig::parse("destination_ip 10.0.0.2\n").unwrap_err();
        assert!(matches!(err, ConfigError::Syntax { line: 1, .. }));
    }

    #[test]
    fn test_from_file_missing() {
        let err = AggregatorConfig::from_file(Path::new("/nonexistent/lagg.conf")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
