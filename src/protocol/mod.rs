//! KNXnet/IP protocol implementation.
//!
//! Frame and cEMI codecs plus the sans-IO engines: the tunnelling state
//! machine with its outbound delivery queue, and the routing message path.
//! Nothing in here performs I/O or reads a clock.

pub mod cemi;
pub mod constants;
pub mod frame;
pub mod queue;
pub mod routing;
pub mod services;
pub mod tunnel;

pub use cemi::{Apci, CemiMessage, Destination, Tpci, Tpdu};
pub use constants::{CemiService, Priority, ServiceType};
pub use frame::{Hpai, KnxnetIpFrame, KnxnetIpHeader};
pub use queue::{OutboundDeliveryQueue, QueueTimeout, Transmission};
pub use routing::Router;
pub use services::{decode_frame, encode_frame, Datagram, Frame};
pub use tunnel::{ConnectionState, Transmit, TunnelConnection, TunnelEvent};
