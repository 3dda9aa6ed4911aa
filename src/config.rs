//! Client configuration.
//!
//! Both configs have protocol defaults and builder-style setters. They can also
//! be read from a `KEY=VALUE` block, one entry per line:
//!
//! ```text
//! # tunnelling
//! KNX_GATEWAY_IP=192.168.1.10
//! KNX_GATEWAY_PORT=3671
//! KNX_CONNECT_TIMEOUT_MS=5000
//! KNX_RETRANSMIT_INTERVAL_MS=1000
//! KNX_MAX_RETRANSMITS=3          # or "none"
//! KNX_HEARTBEAT_INTERVAL_S=60    # 0 disables
//!
//! # routing
//! KNX_MULTICAST_GROUP=224.0.23.12
//! KNX_ROUTING_PORT=3671
//! KNX_INTERFACE_IP=0.0.0.0
//! KNX_MULTICAST_LOOPBACK=false
//! ```
//!
//! Unknown keys and comments are ignored, so one block can configure both.

use core::net::{Ipv4Addr, SocketAddrV4};
use core::str::FromStr;

use embassy_time::Duration;

use crate::error::{KnxError, Result};
use crate::protocol::constants::{KNXNETIP_DEFAULT_PORT, KNXNETIP_MULTICAST_ADDR};
use crate::protocol::queue::MAX_QUEUE_CAPACITY;

/// Gateway used when none is configured
pub const DEFAULT_GATEWAY_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 10);
/// Time to wait for `CONNECT_RESPONSE`
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);
/// Time to wait for `TUNNELING_ACK` before retransmitting
pub const DEFAULT_RETRANSMIT_INTERVAL: Duration = Duration::from_millis(1000);
/// Retransmissions of one request before the tunnel gives up
pub const DEFAULT_MAX_RETRANSMITS: u32 = 3;
/// `CONNECTIONSTATE_REQUEST` period
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);
/// Time to wait for `CONNECTIONSTATE_RESPONSE`
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(10);
/// Unanswered heartbeats before the connection is considered lost
pub const DEFAULT_HEARTBEAT_ATTEMPTS: u8 = 3;
/// Outbound queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = MAX_QUEUE_CAPACITY;

/// Iterate over `KEY=VALUE` pairs, skipping blanks, comments and malformed lines.
fn entries(text: &str) -> impl Iterator<Item = (&str, &str)> {
    text.lines().filter_map(|line| {
        let line = line.split('#').next().unwrap_or_default().trim();
        let (key, value) = line.split_once('=')?;
        Some((key.trim(), value.trim()))
    })
}

fn parse_value<T: FromStr>(key: &'static str, value: &str) -> Result<T> {
    value.parse().map_err(|_| KnxError::invalid_config_value(key))
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool> {
    match value {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(KnxError::invalid_config_value(key)),
    }
}

/// Tunnelling connection settings
///
/// # Examples
///
/// ```
/// use knx_ip_client::config::TunnelConfig;
///
/// let config = TunnelConfig::from_config_str("KNX_GATEWAY_IP=10.0.0.7\nKNX_MAX_RETRANSMITS=none")?;
/// assert_eq!(config.gateway.ip().octets(), [10, 0, 0, 7]);
/// assert_eq!(config.gateway.port(), 3671);
/// assert_eq!(config.max_retransmits, None);
/// # Ok::<(), knx_ip_client::KnxError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TunnelConfig {
    /// Gateway control endpoint
    pub gateway: SocketAddrV4,
    /// Time to wait for `CONNECT_RESPONSE`
    pub connect_timeout: Duration,
    /// Time to wait for `TUNNELING_ACK` before retransmitting
    pub retransmit_interval: Duration,
    /// Retransmissions before giving up (`None` retransmits until disconnect)
    pub max_retransmits: Option<u32>,
    /// Heartbeat period (`None` disables the heartbeat)
    pub heartbeat_interval: Option<Duration>,
    /// Time to wait for each `CONNECTIONSTATE_RESPONSE`
    pub heartbeat_timeout: Duration,
    /// Outbound queue capacity
    pub queue_capacity: usize,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            gateway: SocketAddrV4::new(DEFAULT_GATEWAY_IP, KNXNETIP_DEFAULT_PORT),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            retransmit_interval: DEFAULT_RETRANSMIT_INTERVAL,
            max_retransmits: Some(DEFAULT_MAX_RETRANSMITS),
            heartbeat_interval: Some(DEFAULT_HEARTBEAT_INTERVAL),
            heartbeat_timeout: DEFAULT_HEARTBEAT_TIMEOUT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl TunnelConfig {
    /// Defaults for a gateway at `gateway`
    pub fn new(gateway: SocketAddrV4) -> Self {
        Self {
            gateway,
            ..Self::default()
        }
    }

    /// Set the gateway endpoint
    #[must_use]
    pub const fn with_gateway(mut self, gateway: SocketAddrV4) -> Self {
        self.gateway = gateway;
        self
    }

    /// Set the connect timeout
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the retransmission interval
    #[must_use]
    pub const fn with_retransmit_interval(mut self, interval: Duration) -> Self {
        self.retransmit_interval = interval;
        self
    }

    /// Set the retransmission limit
    #[must_use]
    pub const fn with_max_retransmits(mut self, max: Option<u32>) -> Self {
        self.max_retransmits = max;
        self
    }

    /// Set or disable the heartbeat
    #[must_use]
    pub const fn with_heartbeat_interval(mut self, interval: Option<Duration>) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the heartbeat response timeout
    #[must_use]
    pub const fn with_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = timeout;
        self
    }

    /// Set the outbound queue capacity
    #[must_use]
    pub const fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Read settings from a `KEY=VALUE` block on top of the defaults.
    ///
    /// # Errors
    ///
    /// Returns `Config/InvalidValue` naming the first key whose value does not parse.
    pub fn from_config_str(text: &str) -> Result<Self> {
        let mut config = Self::default();
        for (key, value) in entries(text) {
            match key {
                "KNX_GATEWAY_IP" => {
                    config.gateway.set_ip(parse_value("KNX_GATEWAY_IP", value)?);
                }
                "KNX_GATEWAY_PORT" => {
                    config.gateway.set_port(parse_value("KNX_GATEWAY_PORT", value)?);
                }
                "KNX_CONNECT_TIMEOUT_MS" => {
                    config.connect_timeout = Duration::from_millis(parse_value("KNX_CONNECT_TIMEOUT_MS", value)?);
                }
                "KNX_RETRANSMIT_INTERVAL_MS" => {
                    config.retransmit_interval =
                        Duration::from_millis(parse_value("KNX_RETRANSMIT_INTERVAL_MS", value)?);
                }
                "KNX_MAX_RETRANSMITS" => {
                    config.max_retransmits = if value.eq_ignore_ascii_case("none") {
                        None
                    } else {
                        Some(parse_value("KNX_MAX_RETRANSMITS", value)?)
                    };
                }
                "KNX_HEARTBEAT_INTERVAL_S" => {
                    let secs: u64 = parse_value("KNX_HEARTBEAT_INTERVAL_S", value)?;
                    config.heartbeat_interval = (secs > 0).then(|| Duration::from_secs(secs));
                }
                _ => {}
            }
        }
        Ok(config)
    }
}

/// Routing (multicast) settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingConfig {
    /// Multicast group and port
    pub multicast_group: SocketAddrV4,
    /// Local interface used to join the group
    pub interface: Ipv4Addr,
    /// Receive our own datagrams
    pub multicast_loopback: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            multicast_group: SocketAddrV4::new(KNXNETIP_MULTICAST_ADDR, KNXNETIP_DEFAULT_PORT),
            interface: Ipv4Addr::UNSPECIFIED,
            multicast_loopback: false,
        }
    }
}

impl RoutingConfig {
    /// Set the multicast group endpoint
    #[must_use]
    pub const fn with_multicast_group(mut self, group: SocketAddrV4) -> Self {
        self.multicast_group = group;
        self
    }

    /// Set the local interface
    #[must_use]
    pub const fn with_interface(mut self, interface: Ipv4Addr) -> Self {
        self.interface = interface;
        self
    }

    /// Enable or disable multicast loopback
    #[must_use]
    pub const fn with_multicast_loopback(mut self, loopback: bool) -> Self {
        self.multicast_loopback = loopback;
        self
    }

    /// Read settings from a `KEY=VALUE` block on top of the defaults.
    ///
    /// # Errors
    ///
    /// Returns `Config/InvalidValue` naming the first key whose value does not
    /// parse, or when the group is not a multicast address.
    pub fn from_config_str(text: &str) -> Result<Self> {
        let mut config = Self::default();
        for (key, value) in entries(text) {
            match key {
                "KNX_MULTICAST_GROUP" => {
                    let group: Ipv4Addr = parse_value("KNX_MULTICAST_GROUP", value)?;
                    if !group.is_multicast() {
                        return Err(KnxError::invalid_config_value("KNX_MULTICAST_GROUP"));
                    }
                    config.multicast_group.set_ip(group);
                }
                "KNX_ROUTING_PORT" => {
                    config.multicast_group.set_port(parse_value("KNX_ROUTING_PORT", value)?);
                }
                "KNX_INTERFACE_IP" => config.interface = parse_value("KNX_INTERFACE_IP", value)?,
                "KNX_MULTICAST_LOOPBACK" => {
                    config.multicast_loopback = parse_bool("KNX_MULTICAST_LOOPBACK", value)?;
                }
                _ => {}
            }
        }
        Ok(config)
    }
}
