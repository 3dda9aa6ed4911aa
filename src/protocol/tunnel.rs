//! KNXnet/IP tunnelling connection state machine.
//!
//! [`TunnelConnection`] owns the protocol state of one tunnel: connection
//! lifecycle, the outbound delivery queue, inbound sequencing and the
//! heartbeat. It never touches a socket or a clock. Callers feed it received
//! datagrams and the current [`Instant`], then drain what it produced:
//!
//! - [`poll_transmit`](TunnelConnection::poll_transmit): datagrams to send
//! - [`poll_event`](TunnelConnection::poll_event): [`TunnelEvent`]s for the application
//! - [`poll_timeout`](TunnelConnection::poll_timeout): when to call
//!   [`handle_timeout`](TunnelConnection::handle_timeout) next
//! - [`poll_close`](TunnelConnection::poll_close): whether to close the transport
//!
//! ## State Machine
//!
//! ```text
//!                  connect()
//!  Disconnected ──────────────► Connecting
//!       ▲                          │  CONNECT_RESPONSE ok
//!       │  refused / timeout       ▼
//!       ├───────────────────── Connected ◄──┐ TUNNELING_REQUEST / ACK
//!       │                          │        │ CONNECTIONSTATE
//!       │                          └────────┘
//!       │   disconnect() / peer DISCONNECT_REQUEST /
//!       │   retries exhausted / heartbeat lost
//!       └──────────────────── Disconnecting
//! ```
//!
//! ## Example
//!
//! ```
//! use embassy_time::Instant;
//! use knx_ip_client::config::TunnelConfig;
//! use knx_ip_client::protocol::tunnel::{ConnectionState, TunnelConnection, TunnelEvent};
//!
//! let mut tunnel = TunnelConnection::new(TunnelConfig::default());
//! tunnel.connect(Instant::from_millis(0))?;
//! assert_eq!(tunnel.state(), ConnectionState::Connecting);
//! assert_eq!(tunnel.poll_event(), Some(TunnelEvent::Connecting));
//!
//! let connect_request = tunnel.poll_transmit().expect("CONNECT_REQUEST");
//! assert_eq!(&connect_request.datagram[2..4], &[0x02, 0x05]);
//! # Ok::<(), knx_ip_client::KnxError>(())
//! ```

use core::net::SocketAddrV4;

use embassy_time::Instant;
use heapless::Deque;

use crate::addressing::{GroupAddress, IndividualAddress};
use crate::config::{TunnelConfig, DEFAULT_HEARTBEAT_ATTEMPTS};
use crate::dpt::DatapointValue;
use crate::error::{KnxError, Result, TunnelFailure};
use crate::knx_log;
use crate::protocol::cemi::{CemiMessage, Destination};
use crate::protocol::constants::{CemiService, E_NO_ERROR};
use crate::protocol::frame::Hpai;
use crate::protocol::queue::{OutboundDeliveryQueue, QueueTimeout, Transmission};
use crate::protocol::services::{
    encode_frame, decode_frame, ChannelRequest, ChannelResponse, ConnectRequest, ConnectResponse, Datagram,
    Frame, TunnelingAck, TunnelingRequest,
};

/// Events buffered between two `poll_event` drains
const MAX_PENDING_EVENTS: usize = 32;

/// Datagrams buffered between two `poll_transmit` drains
const MAX_PENDING_TRANSMITS: usize = 8;

/// Lifecycle state of a tunnel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    /// No channel; `connect` may be called
    Disconnected,
    /// `CONNECT_REQUEST` sent, waiting for the response
    Connecting,
    /// Channel established
    Connected,
    /// Tearing the channel down
    Disconnecting,
}

/// Something the application should know about
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TunnelEvent {
    /// A connection attempt started
    Connecting,
    /// The gateway accepted the connection
    Connected {
        /// Channel assigned by the gateway
        channel_id: u8,
    },
    /// The channel is being torn down
    Disconnecting,
    /// The channel is gone
    Disconnected {
        /// Status supplied by the gateway, 0 for local disconnects
        status: u8,
    },
    /// Inbound cEMI message that is neither an indication nor a confirmation
    Message(CemiMessage),
    /// Inbound `L_Data.ind`
    Indication(CemiMessage),
    /// Inbound `L_Data.con`
    Confirmation(CemiMessage),
    /// The gateway acknowledged our request with this sequence number
    Ack {
        /// Sequence number of the acknowledged request
        sequence: u8,
    },
    /// The connection failed
    Error(TunnelFailure),
}

/// A datagram to put on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmit {
    /// Where to send it
    pub destination: SocketAddrV4,
    /// Encoded KNXnet/IP frame
    pub datagram: Datagram,
}

#[derive(Debug, Clone, Copy)]
struct Heartbeat {
    next_request: Instant,
    response_deadline: Option<Instant>,
    unanswered: u8,
}

impl Heartbeat {
    fn deadline(&self) -> Instant {
        self.response_deadline.unwrap_or(self.next_request)
    }
}

/// Sans-IO tunnelling connection
#[derive(Debug)]
pub struct TunnelConnection {
    config: TunnelConfig,
    state: ConnectionState,
    channel_id: Option<u8>,
    data_endpoint: Option<SocketAddrV4>,
    assigned_address: Option<IndividualAddress>,
    receive_sequence: u8,
    last_inbound: Option<u8>,
    queue: OutboundDeliveryQueue,
    connect_deadline: Option<Instant>,
    heartbeat: Option<Heartbeat>,
    transmits: Deque<Transmit, MAX_PENDING_TRANSMITS>,
    events: Deque<TunnelEvent, MAX_PENDING_EVENTS>,
    close_requested: bool,
}

impl TunnelConnection {
    /// Create a disconnected tunnel
    pub fn new(config: TunnelConfig) -> Self {
        let queue = OutboundDeliveryQueue::new(config.retransmit_interval)
            .with_max_retransmits(config.max_retransmits)
            .with_capacity(config.queue_capacity);
        Self {
            config,
            state: ConnectionState::Disconnected,
            channel_id: None,
            data_endpoint: None,
            assigned_address: None,
            receive_sequence: 0,
            last_inbound: None,
            queue,
            connect_deadline: None,
            heartbeat: None,
            transmits: Deque::new(),
            events: Deque::new(),
            close_requested: false,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Current lifecycle state
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Channel assigned by the gateway while connected
    pub const fn channel_id(&self) -> Option<u8> {
        self.channel_id
    }

    /// Individual address the gateway assigned to this tunnel
    pub const fn assigned_address(&self) -> Option<IndividualAddress> {
        self.assigned_address
    }

    /// Next inbound sequence number expected from the gateway
    pub const fn receive_sequence(&self) -> u8 {
        self.receive_sequence
    }

    /// Configuration in use
    pub const fn config(&self) -> &TunnelConfig {
        &self.config
    }

    /// Outbound messages not yet acknowledged (in flight included)
    pub fn pending_requests(&self) -> usize {
        self.queue.len()
    }

    /// True when no channel is held and no attempt is running
    pub fn is_closed(&self) -> bool {
        self.state == ConnectionState::Disconnected
    }

    // =========================================================================
    // Caller operations
    // =========================================================================

    /// Start a connection attempt.
    ///
    /// # Errors
    ///
    /// Returns `Connection/AlreadyConnected` unless the tunnel is disconnected.
    pub fn connect(&mut self, now: Instant) -> Result<()> {
        if self.state != ConnectionState::Disconnected {
            return Err(KnxError::already_connected());
        }
        knx_log!(info, "connecting to gateway port {}", self.config.gateway.port());

        self.close_requested = false;
        self.state = ConnectionState::Connecting;
        self.connect_deadline = Some(now + self.config.connect_timeout);
        self.emit(TunnelEvent::Connecting);
        self.transmit_control(&Frame::ConnectRequest(ConnectRequest::new(Hpai::NAT, Hpai::NAT)))
    }

    /// Tear the channel down without waiting for the gateway.
    ///
    /// Sends `DISCONNECT_REQUEST` if a channel is held. Does nothing when
    /// already disconnected.
    pub fn disconnect(&mut self) -> Result<()> {
        self.disconnect_locally(E_NO_ERROR)
    }

    /// Hard local teardown: no `DISCONNECT_REQUEST`, no events, unsent
    /// datagrams and queued messages are dropped.
    pub fn dispose(&mut self) {
        if self.state != ConnectionState::Disconnected {
            knx_log!(info, "tunnel disposed");
        }
        self.transmits.clear();
        self.teardown();
    }

    /// Queue a cEMI message for delivery.
    ///
    /// # Errors
    ///
    /// Returns `Connection/NotConnected` unless connected, and
    /// `Tunneling/QueueFull` when the outbound queue is full.
    pub fn send(&mut self, message: CemiMessage, now: Instant) -> Result<()> {
        if self.state != ConnectionState::Connected {
            return Err(KnxError::not_connected());
        }
        if let Some(transmission) = self.queue.enqueue(message, now)? {
            self.transmit_request(transmission)?;
        }
        Ok(())
    }

    /// Queue an `A_GroupValue_Write` (`L_Data.req`) carrying raw `payload`.
    pub fn write(
        &mut self,
        source: IndividualAddress,
        destination: impl Into<Destination>,
        payload: &[u8],
        now: Instant,
    ) -> Result<()> {
        let message = CemiMessage::group_write(CemiService::Request, source, destination, payload)?;
        self.send(message, now)
    }

    /// Queue an `A_GroupValue_Write` carrying an encoded datapoint value.
    pub fn write_value(
        &mut self,
        source: IndividualAddress,
        destination: impl Into<Destination>,
        value: &DatapointValue,
        now: Instant,
    ) -> Result<()> {
        let payload = value.encode()?;
        self.write(source, destination, &payload, now)
    }

    /// Queue an `A_GroupValue_Read` for `destination`.
    pub fn read(&mut self, source: IndividualAddress, destination: GroupAddress, now: Instant) -> Result<()> {
        self.send(CemiMessage::group_read(CemiService::Request, source, destination), now)
    }

    // =========================================================================
    // Driver interface
    // =========================================================================

    /// Next datagram to send
    pub fn poll_transmit(&mut self) -> Option<Transmit> {
        self.transmits.pop_front()
    }

    /// Next event for the application
    pub fn poll_event(&mut self) -> Option<TunnelEvent> {
        self.events.pop_front()
    }

    /// Returns `true` once after the tunnel released its transport.
    pub fn poll_close(&mut self) -> bool {
        core::mem::take(&mut self.close_requested)
    }

    /// Earliest instant at which [`handle_timeout`](Self::handle_timeout) has work
    pub fn poll_timeout(&self) -> Option<Instant> {
        match self.state {
            ConnectionState::Connecting => self.connect_deadline,
            ConnectionState::Connected => {
                let heartbeat = self.heartbeat.map(|hb| hb.deadline());
                match (self.queue.next_deadline(), heartbeat) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                }
            }
            ConnectionState::Disconnected | ConnectionState::Disconnecting => None,
        }
    }

    /// Process expired timers.
    ///
    /// Timers that belong to a state the tunnel already left are ignored.
    pub fn handle_timeout(&mut self, now: Instant) -> Result<()> {
        match self.state {
            ConnectionState::Connecting => {
                if self.connect_deadline.is_some_and(|deadline| now >= deadline) {
                    knx_log!(warn, "no CONNECT_RESPONSE within {} ms", self.config.connect_timeout.as_millis());
                    self.fail(TunnelFailure::Timeout);
                }
                Ok(())
            }
            ConnectionState::Connected => {
                match self.queue.poll_timeout(now) {
                    Some(QueueTimeout::Retransmit(transmission)) => self.transmit_request(transmission)?,
                    Some(QueueTimeout::Exhausted { sequence, .. }) => {
                        knx_log!(error, "request {} was never acknowledged, giving up", sequence);
                        self.emit(TunnelEvent::Error(TunnelFailure::RetriesExhausted { sequence }));
                        return self.disconnect_locally(E_NO_ERROR);
                    }
                    None => {}
                }
                self.poll_heartbeat(now)
            }
            ConnectionState::Disconnected | ConnectionState::Disconnecting => Ok(()),
        }
    }

    /// Process one datagram received from the gateway.
    ///
    /// Errors are informational: malformed frames and frames for a foreign
    /// channel are dropped and reported here, the tunnel state is unchanged.
    pub fn handle_datagram(&mut self, data: &[u8], now: Instant) -> Result<()> {
        if self.state == ConnectionState::Disconnected {
            knx_log!(debug, "tunnel closed, dropping {} byte datagram", data.len());
            return Ok(());
        }
        let frame = match decode_frame(data) {
            Ok(frame) => frame,
            Err(e) => {
                knx_log!(debug, "dropping malformed frame: {}", e);
                return Err(e);
            }
        };

        match frame {
            Frame::ConnectResponse(response) => {
                self.on_connect_response(&response, now);
                Ok(())
            }
            Frame::TunnelingAck(ack) => self.on_ack(ack, now),
            Frame::TunnelingRequest(request) => self.on_request(request),
            Frame::ConnectionStateResponse(response) => self.on_heartbeat_response(response, now),
            Frame::DisconnectRequest(request) => self.on_disconnect_request(request),
            other => {
                knx_log!(debug, "ignoring {:?} frame", other.service_type());
                Ok(())
            }
        }
    }

    // =========================================================================
    // Inbound handlers
    // =========================================================================

    fn on_connect_response(&mut self, response: &ConnectResponse, now: Instant) {
        if self.state != ConnectionState::Connecting {
            knx_log!(debug, "unexpected CONNECT_RESPONSE");
            return;
        }
        if !response.is_ok() {
            knx_log!(warn, "gateway refused connection, status 0x{:02X}", response.status);
            self.fail(TunnelFailure::Refused {
                status: response.status,
            });
            return;
        }

        let channel_id = response.channel_id;
        knx_log!(info, "tunnel connected on channel {}", channel_id);

        self.connect_deadline = None;
        self.channel_id = Some(channel_id);
        self.data_endpoint = response
            .data_endpoint
            .filter(|endpoint| !endpoint.ip_address.is_unspecified() && endpoint.port != 0)
            .map(SocketAddrV4::from);
        self.assigned_address = response.assigned_address;
        self.receive_sequence = 0;
        self.last_inbound = None;
        self.heartbeat = self.config.heartbeat_interval.map(|interval| Heartbeat {
            next_request: now + interval,
            response_deadline: None,
            unanswered: 0,
        });
        self.state = ConnectionState::Connected;
        self.emit(TunnelEvent::Connected { channel_id });
    }

    fn on_ack(&mut self, ack: TunnelingAck, now: Instant) -> Result<()> {
        self.check_channel(ack.channel_id)?;
        if !ack.is_ok() {
            knx_log!(
                warn,
                "gateway rejected request {} with status 0x{:02X}",
                ack.sequence,
                ack.status
            );
            return Ok(());
        }
        if let Some((_, next)) = self.queue.confirm(ack.sequence, now) {
            self.emit(TunnelEvent::Ack { sequence: ack.sequence });
            if let Some(transmission) = next {
                self.transmit_request(transmission)?;
            }
        }
        Ok(())
    }

    fn on_request(&mut self, request: TunnelingRequest) -> Result<()> {
        let channel_id = self.check_channel(request.channel_id)?;
        let sequence = request.sequence;
        self.transmit_data(&Frame::TunnelingAck(TunnelingAck::new(channel_id, sequence, E_NO_ERROR)))?;

        if self.last_inbound == Some(sequence) {
            knx_log!(debug, "duplicate request {}, acknowledged again and dropped", sequence);
            return Ok(());
        }
        if sequence != self.receive_sequence {
            knx_log!(
                debug,
                "request sequence {} out of order, expected {}",
                sequence,
                self.receive_sequence
            );
        }
        self.last_inbound = Some(sequence);
        self.receive_sequence = sequence.wrapping_add(1);

        let message = request.cemi;
        self.emit(match message.service() {
            CemiService::Indication => TunnelEvent::Indication(message),
            CemiService::Confirmation => TunnelEvent::Confirmation(message),
            CemiService::Request => TunnelEvent::Message(message),
        });
        Ok(())
    }

    fn on_heartbeat_response(&mut self, response: ChannelResponse, now: Instant) -> Result<()> {
        self.check_channel(response.channel_id)?;
        if !response.is_ok() {
            knx_log!(warn, "gateway reports channel dead, status 0x{:02X}", response.status);
            return self.lose_connection(response.status);
        }
        if let (Some(hb), Some(interval)) = (self.heartbeat.as_mut(), self.config.heartbeat_interval) {
            hb.response_deadline = None;
            hb.unanswered = 0;
            hb.next_request = now + interval;
        }
        Ok(())
    }

    fn on_disconnect_request(&mut self, request: ChannelRequest) -> Result<()> {
        let channel_id = self.check_channel(request.channel_id)?;
        knx_log!(info, "gateway closed channel {}", channel_id);

        self.state = ConnectionState::Disconnecting;
        self.emit(TunnelEvent::Disconnecting);
        let response = Frame::DisconnectResponse(ChannelResponse::new(channel_id, E_NO_ERROR));
        let sent = self.transmit_control(&response);
        self.teardown();
        self.emit(TunnelEvent::Disconnected {
            status: request.status,
        });
        sent
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn poll_heartbeat(&mut self, now: Instant) -> Result<()> {
        let Some(mut hb) = self.heartbeat else {
            return Ok(());
        };
        if now < hb.deadline() {
            return Ok(());
        }
        if hb.response_deadline.is_some() {
            hb.unanswered += 1;
            if hb.unanswered >= DEFAULT_HEARTBEAT_ATTEMPTS {
                knx_log!(warn, "{} heartbeats unanswered", hb.unanswered);
                return self.lose_connection(E_NO_ERROR);
            }
        }
        hb.response_deadline = Some(now + self.config.heartbeat_timeout);
        self.heartbeat = Some(hb);

        let channel_id = self.channel_id.ok_or_else(KnxError::not_connected)?;
        self.transmit_control(&Frame::ConnectionStateRequest(ChannelRequest::new(channel_id, Hpai::NAT)))
    }

    fn lose_connection(&mut self, status: u8) -> Result<()> {
        self.emit(TunnelEvent::Error(TunnelFailure::ConnectionLost));
        self.disconnect_locally(status)
    }

    fn disconnect_locally(&mut self, status: u8) -> Result<()> {
        if self.state == ConnectionState::Disconnected {
            return Ok(());
        }
        knx_log!(info, "disconnecting channel {}", self.channel_id.unwrap_or_default());
        self.state = ConnectionState::Disconnecting;
        self.emit(TunnelEvent::Disconnecting);

        let sent = match self.channel_id {
            Some(channel_id) => {
                self.transmit_control(&Frame::DisconnectRequest(ChannelRequest::new(channel_id, Hpai::NAT)))
            }
            None => Ok(()),
        };
        self.teardown();
        self.emit(TunnelEvent::Disconnected { status });
        sent
    }

    /// Refused or timed out attempt: no channel, so no disconnect handshake
    fn fail(&mut self, failure: TunnelFailure) {
        self.teardown();
        self.emit(TunnelEvent::Error(failure));
    }

    fn teardown(&mut self) {
        self.queue.dispose();
        self.connect_deadline = None;
        self.heartbeat = None;
        self.channel_id = None;
        self.data_endpoint = None;
        self.assigned_address = None;
        self.receive_sequence = 0;
        self.last_inbound = None;
        self.state = ConnectionState::Disconnected;
        self.close_requested = true;
    }

    fn check_channel(&self, channel_id: u8) -> Result<u8> {
        match self.channel_id {
            Some(own) if own == channel_id && self.state == ConnectionState::Connected => Ok(own),
            _ => {
                knx_log!(debug, "frame for foreign channel {}", channel_id);
                Err(KnxError::channel_mismatch())
            }
        }
    }

    fn transmit_request(&mut self, transmission: Transmission) -> Result<()> {
        let channel_id = self.channel_id.ok_or_else(KnxError::not_connected)?;
        let frame = TunnelingRequest::new(channel_id, transmission.sequence, transmission.message);
        self.transmit_data(&Frame::TunnelingRequest(frame))
    }

    fn transmit_control(&mut self, frame: &Frame) -> Result<()> {
        self.transmit_to(self.config.gateway, frame)
    }

    fn transmit_data(&mut self, frame: &Frame) -> Result<()> {
        self.transmit_to(self.data_endpoint.unwrap_or(self.config.gateway), frame)
    }

    fn transmit_to(&mut self, destination: SocketAddrV4, frame: &Frame) -> Result<()> {
        let datagram = encode_frame(frame)?;
        if self.transmits.is_full() {
            knx_log!(warn, "transmit buffer full, dropping oldest datagram");
            self.transmits.pop_front();
        }
        let _ = self.transmits.push_back(Transmit { destination, datagram });
        Ok(())
    }

    fn emit(&mut self, event: TunnelEvent) {
        if self.events.is_full() {
            knx_log!(warn, "event buffer full, dropping oldest event");
            self.events.pop_front();
        }
        let _ = self.events.push_back(event);
    }
}

#[cfg(test)]
mod tests {
    use core::net::Ipv4Addr;

    use embassy_time::Duration;

    use super::*;
    use crate::protocol::constants::E_NO_MORE_CONNECTIONS;

    const GATEWAY: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 10), 3671);

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    fn gateway_frame(frame: &Frame) -> Datagram {
        encode_frame(frame).unwrap()
    }

    fn drain(tunnel: &mut TunnelConnection) -> heapless::Vec<Frame, 16> {
        let mut frames = heapless::Vec::new();
        while let Some(t) = tunnel.poll_transmit() {
            frames.push(decode_frame(&t.datagram).unwrap()).unwrap();
        }
        frames
    }

    fn connected(channel_id: u8) -> TunnelConnection {
        let mut tunnel = TunnelConnection::new(TunnelConfig::new(GATEWAY));
        tunnel.connect(at(0)).unwrap();
        let response = ConnectResponse::accepted(channel_id, Hpai::from(GATEWAY), IndividualAddress::from(0x11FA));
        tunnel
            .handle_datagram(&gateway_frame(&Frame::ConnectResponse(response)), at(100))
            .unwrap();
        drain(&mut tunnel);
        while tunnel.poll_event().is_some() {}
        tunnel
    }

    fn inbound(channel_id: u8, sequence: u8, service: CemiService) -> Datagram {
        let cemi = CemiMessage::group_write(service, IndividualAddress::from(0x1101), GroupAddress::from(1), &[1]).unwrap();
        gateway_frame(&Frame::TunnelingRequest(TunnelingRequest::new(channel_id, sequence, cemi)))
    }

    #[test]
    fn test_connect_sends_request() {
        let mut tunnel = TunnelConnection::new(TunnelConfig::new(GATEWAY));
        tunnel.connect(at(0)).unwrap();
        let t = tunnel.poll_transmit().unwrap();
        assert_eq!(t.destination, GATEWAY);
        assert!(matches!(decode_frame(&t.datagram).unwrap(), Frame::ConnectRequest(_)));
        assert_eq!(tunnel.poll_timeout(), Some(at(5000)));
        assert!(tunnel.connect(at(1)).is_err());
    }

    #[test]
    fn test_connect_response_ok() {
        let tunnel = connected(5);
        assert_eq!(tunnel.state(), ConnectionState::Connected);
        assert_eq!(tunnel.channel_id(), Some(5));
        assert_eq!(tunnel.assigned_address(), Some(IndividualAddress::from_parts(1, 1, 250)));
        // heartbeat armed
        assert_eq!(tunnel.poll_timeout(), Some(at(100) + Duration::from_secs(60)));
    }

    #[test]
    fn test_refused() {
        let mut tunnel = TunnelConnection::new(TunnelConfig::new(GATEWAY));
        tunnel.connect(at(0)).unwrap();
        let refusal = gateway_frame(&Frame::ConnectResponse(ConnectResponse::refused(E_NO_MORE_CONNECTIONS)));
        tunnel.handle_datagram(&refusal, at(50)).unwrap();

        assert_eq!(tunnel.poll_event(), Some(TunnelEvent::Connecting));
        assert_eq!(
            tunnel.poll_event(),
            Some(TunnelEvent::Error(TunnelFailure::Refused {
                status: E_NO_MORE_CONNECTIONS
            }))
        );
        assert_eq!(tunnel.poll_event(), None);
        assert!(tunnel.is_closed());
        assert!(tunnel.poll_close());
        assert!(!tunnel.poll_close());
    }

    #[test]
    fn test_send_requires_connection() {
        let mut tunnel = TunnelConnection::new(TunnelConfig::new(GATEWAY));
        let err = tunnel.write(IndividualAddress::from(0), GroupAddress::from(1), &[1], at(0)).unwrap_err();
        assert!(matches!(err, KnxError::Connection(ref e) if e.is_not_connected()));
    }

    #[test]
    fn test_inbound_request_acked_and_dispatched() {
        let mut tunnel = connected(5);
        tunnel.handle_datagram(&inbound(5, 0, CemiService::Indication), at(200)).unwrap();

        let frames = drain(&mut tunnel);
        assert_eq!(frames.as_slice(), &[Frame::TunnelingAck(TunnelingAck::new(5, 0, 0))]);
        assert!(matches!(tunnel.poll_event(), Some(TunnelEvent::Indication(_))));
        assert_eq!(tunnel.receive_sequence(), 1);

        tunnel.handle_datagram(&inbound(5, 1, CemiService::Confirmation), at(300)).unwrap();
        tunnel.handle_datagram(&inbound(5, 2, CemiService::Request), at(300)).unwrap();
        assert!(matches!(tunnel.poll_event(), Some(TunnelEvent::Confirmation(_))));
        assert!(matches!(tunnel.poll_event(), Some(TunnelEvent::Message(_))));
    }

    #[test]
    fn test_duplicate_request_reacked_not_redelivered() {
        let mut tunnel = connected(5);
        tunnel.handle_datagram(&inbound(5, 0, CemiService::Indication), at(200)).unwrap();
        tunnel.handle_datagram(&inbound(5, 0, CemiService::Indication), at(250)).unwrap();

        assert_eq!(drain(&mut tunnel).len(), 2);
        assert!(tunnel.poll_event().is_some());
        assert_eq!(tunnel.poll_event(), None);
    }

    #[test]
    fn test_foreign_channel_ignored() {
        let mut tunnel = connected(5);
        let err = tunnel.handle_datagram(&inbound(9, 0, CemiService::Indication), at(200)).unwrap_err();
        assert!(matches!(err, KnxError::Connection(ref e) if e.is_channel_mismatch()));
        assert!(tunnel.poll_transmit().is_none());
        assert!(tunnel.poll_event().is_none());
        assert_eq!(tunnel.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_malformed_datagram_ignored() {
        let mut tunnel = connected(5);
        assert!(tunnel.handle_datagram(&[0x06, 0x10, 0x04], at(200)).is_err());
        assert_eq!(tunnel.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_ack_with_error_status_does_not_confirm() {
        let mut tunnel = connected(5);
        tunnel.write(IndividualAddress::from(0), GroupAddress::from(1), &[1], at(200)).unwrap();
        drain(&mut tunnel);

        let nack = gateway_frame(&Frame::TunnelingAck(TunnelingAck::new(5, 0, 0x29)));
        tunnel.handle_datagram(&nack, at(300)).unwrap();
        assert_eq!(tunnel.poll_event(), None);
        assert_eq!(tunnel.pending_requests(), 1);

        let ack = gateway_frame(&Frame::TunnelingAck(TunnelingAck::new(5, 0, 0)));
        tunnel.handle_datagram(&ack, at(400)).unwrap();
        assert_eq!(tunnel.poll_event(), Some(TunnelEvent::Ack { sequence: 0 }));
        assert_eq!(tunnel.pending_requests(), 0);
    }

    #[test]
    fn test_peer_disconnect() {
        let mut tunnel = connected(5);
        let mut request = ChannelRequest::new(5, Hpai::NAT);
        request.status = 0x27;
        tunnel
            .handle_datagram(&gateway_frame(&Frame::DisconnectRequest(request)), at(200))
            .unwrap();

        assert_eq!(
            drain(&mut tunnel).as_slice(),
            &[Frame::DisconnectResponse(ChannelResponse::new(5, 0))]
        );
        assert_eq!(tunnel.poll_event(), Some(TunnelEvent::Disconnecting));
        assert_eq!(tunnel.poll_event(), Some(TunnelEvent::Disconnected { status: 0x27 }));
        assert_eq!(tunnel.channel_id(), None);
        assert!(tunnel.poll_close());
    }

    #[test]
    fn test_local_disconnect_is_fire_and_forget() {
        let mut tunnel = connected(5);
        tunnel.write(IndividualAddress::from(0), GroupAddress::from(1), &[1], at(200)).unwrap();
        drain(&mut tunnel);

        tunnel.disconnect().unwrap();
        assert!(tunnel.is_closed());
        assert_eq!(tunnel.pending_requests(), 0);
        assert_eq!(
            drain(&mut tunnel).as_slice(),
            &[Frame::DisconnectRequest(ChannelRequest::new(5, Hpai::NAT))]
        );
        assert_eq!(tunnel.poll_event(), Some(TunnelEvent::Disconnecting));
        assert_eq!(tunnel.poll_event(), Some(TunnelEvent::Disconnected { status: 0 }));
        assert_eq!(tunnel.poll_timeout(), None);

        // second disconnect is a no-op
        tunnel.disconnect().unwrap();
        assert_eq!(tunnel.poll_event(), None);
    }

    #[test]
    fn test_dispose_is_silent() {
        let mut tunnel = connected(5);
        tunnel.write(IndividualAddress::from(0), GroupAddress::from(1), &[1], at(200)).unwrap();
        tunnel.dispose();
        assert!(tunnel.poll_transmit().is_none());
        assert!(tunnel.poll_event().is_none());
        assert!(tunnel.poll_close());

        // late datagrams are not dispatched
        tunnel.handle_datagram(&inbound(5, 0, CemiService::Indication), at(300)).unwrap();
        assert!(tunnel.poll_event().is_none());
        assert!(tunnel.poll_transmit().is_none());
    }

    #[test]
    fn test_heartbeat_cycle() {
        let mut tunnel = connected(5);
        let due = at(100) + Duration::from_secs(60);
        tunnel.handle_timeout(due).unwrap();
        assert_eq!(
            drain(&mut tunnel).as_slice(),
            &[Frame::ConnectionStateRequest(ChannelRequest::new(5, Hpai::NAT))]
        );
        assert_eq!(tunnel.poll_timeout(), Some(due + Duration::from_secs(10)));

        let ok = gateway_frame(&Frame::ConnectionStateResponse(ChannelResponse::new(5, 0)));
        tunnel.handle_datagram(&ok, due + Duration::from_secs(1)).unwrap();
        assert_eq!(tunnel.poll_timeout(), Some(due + Duration::from_secs(61)));
    }

    #[test]
    fn test_heartbeat_lost_after_three_unanswered() {
        let mut tunnel = connected(5);
        let mut now = at(100) + Duration::from_secs(60);
        for _ in 0..3 {
            tunnel.handle_timeout(now).unwrap();
            assert!(matches!(drain(&mut tunnel).as_slice(), [Frame::ConnectionStateRequest(_)]));
            now = now + Duration::from_secs(10);
        }
        tunnel.handle_timeout(now).unwrap();

        assert_eq!(tunnel.poll_event(), Some(TunnelEvent::Error(TunnelFailure::ConnectionLost)));
        assert_eq!(tunnel.poll_event(), Some(TunnelEvent::Disconnecting));
        assert_eq!(tunnel.poll_event(), Some(TunnelEvent::Disconnected { status: 0 }));
        assert!(matches!(drain(&mut tunnel).as_slice(), [Frame::DisconnectRequest(_)]));
    }

    #[test]
    fn test_heartbeat_error_status() {
        let mut tunnel = connected(5);
        let dead = gateway_frame(&Frame::ConnectionStateResponse(ChannelResponse::new(5, 0x21)));
        tunnel.handle_datagram(&dead, at(500)).unwrap();
        assert_eq!(tunnel.poll_event(), Some(TunnelEvent::Error(TunnelFailure::ConnectionLost)));
        assert!(tunnel.is_closed());
    }

    #[test]
    fn test_retries_exhausted_disconnects() {
        let config = TunnelConfig::new(GATEWAY).with_max_retransmits(Some(1)).with_heartbeat_interval(None);
        let mut tunnel = TunnelConnection::new(config);
        tunnel.connect(at(0)).unwrap();
        let response = ConnectResponse::accepted(3, Hpai::NAT, IndividualAddress::from(0x11FA));
        tunnel.handle_datagram(&gateway_frame(&Frame::ConnectResponse(response)), at(10)).unwrap();
        while tunnel.poll_event().is_some() {}
        tunnel.write(IndividualAddress::from(0), GroupAddress::from(1), &[1], at(20)).unwrap();
        drain(&mut tunnel);

        tunnel.handle_timeout(at(1020)).unwrap();
        assert!(matches!(drain(&mut tunnel).as_slice(), [Frame::TunnelingRequest(r)] if r.sequence == 0));
        tunnel.handle_timeout(at(2020)).unwrap();

        assert_eq!(
            tunnel.poll_event(),
            Some(TunnelEvent::Error(TunnelFailure::RetriesExhausted { sequence: 0 }))
        );
        assert_eq!(tunnel.poll_event(), Some(TunnelEvent::Disconnecting));
        assert_eq!(tunnel.poll_event(), Some(TunnelEvent::Disconnected { status: 0 }));
        assert!(tunnel.is_closed());
    }

    #[test]
    fn test_data_endpoint_used_for_tunnelling() {
        let data_endpoint = SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 10), 3672);
        let mut tunnel = TunnelConnection::new(TunnelConfig::new(GATEWAY));
        tunnel.connect(at(0)).unwrap();
        let response = ConnectResponse::accepted(5, Hpai::from(data_endpoint), IndividualAddress::from(0x11FA));
        tunnel.handle_datagram(&gateway_frame(&Frame::ConnectResponse(response)), at(10)).unwrap();
        drain(&mut tunnel);

        tunnel.write(IndividualAddress::from(0), GroupAddress::from(1), &[1], at(20)).unwrap();
        assert_eq!(tunnel.poll_transmit().unwrap().destination, data_endpoint);
        tunnel.disconnect().unwrap();
        assert_eq!(tunnel.poll_transmit().unwrap().destination, GATEWAY);
    }
}
