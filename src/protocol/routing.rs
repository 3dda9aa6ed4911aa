//! KNXnet/IP routing (multicast) message path.
//!
//! Routing is connectionless: every frame is a `ROUTING_INDICATION` sent to the
//! multicast group, with no sequencing, acknowledgment or flow control on the
//! client side. [`Router`] builds outgoing indications and filters incoming
//! datagrams down to the cEMI messages worth dispatching.

use crate::addressing::IndividualAddress;
use crate::error::Result;
use crate::knx_log;
use crate::protocol::cemi::{CemiMessage, Destination};
use crate::protocol::constants::CemiService;
use crate::protocol::services::{decode_frame, encode_frame, Datagram, Frame};

/// Sans-IO routing endpoint
///
/// # Examples
///
/// ```
/// use knx_ip_client::protocol::routing::Router;
/// use knx_ip_client::{GroupAddress, IndividualAddress};
///
/// let router = Router::new();
/// let datagram = router.build_indication(IndividualAddress::from(0x1105), GroupAddress::from(2563), &[0x01])?;
/// let message = router.accept(&datagram).expect("own indications are accepted");
/// assert_eq!(message.destination().raw(), 2563);
/// # Ok::<(), knx_ip_client::KnxError>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Router;

impl Router {
    /// Create a router
    pub const fn new() -> Self {
        Self
    }

    /// Encode an `L_Data.ind` group write as a `ROUTING_INDICATION`.
    pub fn build_indication(
        &self,
        source: IndividualAddress,
        destination: impl Into<Destination>,
        payload: &[u8],
    ) -> Result<Datagram> {
        let message = CemiMessage::group_write(CemiService::Indication, source, destination, payload)?;
        self.build(&message)
    }

    /// Encode any cEMI message as a `ROUTING_INDICATION`.
    pub fn build(&self, message: &CemiMessage) -> Result<Datagram> {
        encode_frame(&Frame::RoutingIndication(message.clone()))
    }

    /// Filter a received datagram.
    ///
    /// Returns the carried message for `ROUTING_INDICATION` frames with an
    /// `L_Data.req`, `.ind` or `.con` body. Everything else is dropped:
    /// undecodable datagrams and other services silently, lost-message and
    /// busy reports after logging them.
    pub fn accept(&self, data: &[u8]) -> Option<CemiMessage> {
        match decode_frame(data) {
            Ok(Frame::RoutingIndication(message)) => Some(message),
            Ok(Frame::RoutingLostMessage(lost)) => {
                knx_log!(
                    warn,
                    "router lost {} message(s), device state 0x{:02X}",
                    lost.lost_messages,
                    lost.device_state
                );
                None
            }
            Ok(Frame::RoutingBusy(busy)) => {
                knx_log!(warn, "router busy, asked to wait {} ms", busy.wait_time_ms);
                None
            }
            Ok(other) => {
                knx_log!(trace, "ignoring {:?} on routing socket", other.service_type());
                None
            }
            Err(e) => {
                knx_log!(trace, "dropping undecodable datagram: {}", e);
                None
            }
        }
    }
}
