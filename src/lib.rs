#![cfg_attr(all(not(test), not(feature = "std")), no_std)]

//! # knx-ip-client
//!
//! KNXnet/IP client: tunnelling to a gateway and routing over multicast.
//!
//! The protocol core (frame and cEMI codecs, datapoint codec, the delivery
//! queue and the tunnel state machine) is `no_std`, allocation free and
//! sans-IO: it takes received bytes and the current time and hands back
//! datagrams to send, events and deadlines. The `std` feature adds tokio
//! drivers and a UDP transport on top.
//!
//! ## Features
//!
//! - `std` (default): [`client::TunnelClient`], [`client::RoutingClient`],
//!   the tokio UDP transport and a mock transport for tests
//! - `defmt`: log through `defmt` instead of `log`
//! - `serde`: serde derives on addresses and datapoint values
//!
//! ## Example
//!
//! ```rust,no_run
//! # #[cfg(feature = "std")]
//! # async fn run() -> knx_ip_client::Result<()> {
//! use knx_ip_client::client::TunnelClient;
//! use knx_ip_client::config::TunnelConfig;
//! use knx_ip_client::net::udp::UdpTransport;
//! use knx_ip_client::{ga, ia, DatapointValue};
//!
//! let config = TunnelConfig::from_config_str("KNX_GATEWAY_IP=192.168.1.10")?;
//! let mut client = TunnelClient::new(UdpTransport::new(), config);
//! client.connect_and_wait().await?;
//! client.write_value(ia!(1, 1, 250), ga!(1/2/3), &DatapointValue::Bool(true)).await?;
//! client.disconnect().await?;
//! # Ok(())
//! # }
//! ```

// Macro modules (must be declared before use)
#[macro_use]
pub mod macros;
#[macro_use]
pub mod logging;

pub mod addressing;
pub mod config;
pub mod dpt;
pub mod error;
pub mod net;
pub mod protocol;

#[cfg(feature = "std")]
pub mod client;

// Re-export commonly used types
#[doc(inline)]
pub use addressing::{GroupAddress, IndividualAddress};
#[doc(inline)]
pub use dpt::{decode_datapoint, encode_datapoint, DatapointType, DatapointValue};
#[doc(inline)]
pub use error::{KnxError, Result, TunnelFailure};
#[doc(inline)]
pub use protocol::cemi::CemiMessage;
