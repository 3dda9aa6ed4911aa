//! KNXnet/IP service bodies and the frame codec.
//!
//! Each service a tunnelling or routing client exchanges has a typed body with
//! `parse` (body bytes after the header) and `write_body`. [`Frame`] ties them
//! together; [`encode_frame`] and [`decode_frame`] convert whole datagrams.
//!
//! ## Protocol Flow
//!
//! ```text
//! Client                          Gateway
//!   |                                |
//!   |------- CONNECT_REQUEST ------->|
//!   |<------ CONNECT_RESPONSE -------|
//!   |                                |
//!   |------ TUNNELING_REQUEST ------>|
//!   |<------ TUNNELING_ACK ----------|
//!   |                                |
//!   |--- CONNECTIONSTATE_REQUEST --->|  (every 60s)
//!   |<-- CONNECTIONSTATE_RESPONSE ---|
//!   |                                |
//!   |------ DISCONNECT_REQUEST ----->|
//!   |<----- DISCONNECT_RESPONSE -----|
//! ```
//!
//! ## Example
//!
//! ```
//! use knx_ip_client::protocol::frame::Hpai;
//! use knx_ip_client::protocol::services::{decode_frame, encode_frame, ConnectRequest, Frame};
//!
//! let frame = Frame::ConnectRequest(ConnectRequest::new(Hpai::NAT, Hpai::NAT));
//! let datagram = encode_frame(&frame)?;
//! assert_eq!(datagram.len(), 26);
//! assert_eq!(decode_frame(&datagram)?, frame);
//! # Ok::<(), knx_ip_client::KnxError>(())
//! ```

use crate::addressing::IndividualAddress;
use crate::error::{KnxError, Result};
use crate::protocol::cemi::CemiMessage;
use crate::protocol::constants::{ServiceType, E_NO_ERROR, MAX_FRAME_SIZE, TUNNEL_CONNECTION, TUNNEL_LINKLAYER};
use crate::protocol::frame::{build_frame, Hpai, KnxnetIpFrame};

/// One encoded KNXnet/IP datagram
pub type Datagram = heapless::Vec<u8, MAX_FRAME_SIZE>;

/// Split `[channel_id, status_or_reserved]` off the front of a body.
fn channel_pair(data: &[u8]) -> Result<(u8, u8, &[u8])> {
    match data {
        [channel_id, second, rest @ ..] => Ok((*channel_id, *second, rest)),
        _ => Err(KnxError::invalid_frame()),
    }
}

fn write_bytes(buf: &mut [u8], bytes: &[u8]) -> Result<usize> {
    buf.get_mut(..bytes.len())
        .ok_or_else(KnxError::buffer_too_small)?
        .copy_from_slice(bytes);
    Ok(bytes.len())
}

// =============================================================================
// Connection management
// =============================================================================

/// `CONNECT_REQUEST` (0x0205) for a link-layer tunnel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectRequest {
    /// Control endpoint (connection management)
    pub control_endpoint: Hpai,
    /// Data endpoint (tunnelling data)
    pub data_endpoint: Hpai,
}

impl ConnectRequest {
    /// Connection Request Information for `TUNNEL_CONNECTION` / `TUNNEL_LINKLAYER`
    const CRI: [u8; 4] = [4, TUNNEL_CONNECTION, TUNNEL_LINKLAYER, 0x00];

    /// Create a new `CONNECT_REQUEST`
    pub const fn new(control_endpoint: Hpai, data_endpoint: Hpai) -> Self {
        Self {
            control_endpoint,
            data_endpoint,
        }
    }

    /// Parse from frame body
    pub fn parse(data: &[u8]) -> Result<Self> {
        let control_endpoint = Hpai::parse(data)?;
        let data_endpoint = Hpai::parse(data.get(Hpai::SIZE..).unwrap_or_default())?;
        match data.get(2 * Hpai::SIZE..) {
            Some(&[4, TUNNEL_CONNECTION, _, _, ..]) => Ok(Self::new(control_endpoint, data_endpoint)),
            _ => Err(KnxError::invalid_frame()),
        }
    }

    /// Encode the body
    pub fn write_body(&self, buf: &mut [u8]) -> Result<usize> {
        let mut offset = self.control_endpoint.encode(buf)?;
        offset += self.data_endpoint.encode(buf.get_mut(offset..).unwrap_or_default())?;
        offset += write_bytes(buf.get_mut(offset..).unwrap_or_default(), &Self::CRI)?;
        Ok(offset)
    }
}

/// `CONNECT_RESPONSE` (0x0206)
///
/// Gateways answer refusals with only the channel and status bytes, so the
/// data endpoint and CRD are optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectResponse {
    /// Communication channel ID
    pub channel_id: u8,
    /// Status code (0 = OK)
    pub status: u8,
    /// Data endpoint assigned by the gateway
    pub data_endpoint: Option<Hpai>,
    /// Individual address the gateway assigned to this tunnel (from the CRD)
    pub assigned_address: Option<IndividualAddress>,
}

impl ConnectResponse {
    /// Successful response
    pub const fn accepted(channel_id: u8, data_endpoint: Hpai, assigned_address: IndividualAddress) -> Self {
        Self {
            channel_id,
            status: E_NO_ERROR,
            data_endpoint: Some(data_endpoint),
            assigned_address: Some(assigned_address),
        }
    }

    /// Refusal carrying only channel and status
    pub const fn refused(status: u8) -> Self {
        Self {
            channel_id: 0,
            status,
            data_endpoint: None,
            assigned_address: None,
        }
    }

    /// Parse from frame body
    pub fn parse(data: &[u8]) -> Result<Self> {
        let (channel_id, status, rest) = channel_pair(data)?;
        if status == E_NO_ERROR && rest.len() < Hpai::SIZE {
            return Err(KnxError::invalid_frame());
        }
        let data_endpoint = if rest.is_empty() { None } else { Some(Hpai::parse(rest)?) };
        let assigned_address = match rest.get(Hpai::SIZE..) {
            Some(&[4, TUNNEL_CONNECTION, hi, lo, ..]) => Some(IndividualAddress::from(u16::from_be_bytes([hi, lo]))),
            _ => None,
        };
        Ok(Self {
            channel_id,
            status,
            data_endpoint,
            assigned_address,
        })
    }

    /// Encode the body
    pub fn write_body(&self, buf: &mut [u8]) -> Result<usize> {
        let mut offset = write_bytes(buf, &[self.channel_id, self.status])?;
        if let Some(endpoint) = self.data_endpoint {
            offset += endpoint.encode(buf.get_mut(offset..).unwrap_or_default())?;
            if let Some(address) = self.assigned_address {
                let [hi, lo] = address.raw().to_be_bytes();
                offset += write_bytes(buf.get_mut(offset..).unwrap_or_default(), &[4, TUNNEL_CONNECTION, hi, lo])?;
            }
        }
        Ok(offset)
    }

    /// Check if connection was successful
    pub const fn is_ok(&self) -> bool {
        self.status == E_NO_ERROR
    }
}

/// `CONNECTIONSTATE_REQUEST` (0x0207) and `DISCONNECT_REQUEST` (0x0209) body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelRequest {
    /// Communication channel ID
    pub channel_id: u8,
    /// Reserved octet; gateways use it as a reason code on disconnect
    pub status: u8,
    /// Control endpoint
    pub control_endpoint: Hpai,
}

impl ChannelRequest {
    /// Create a new request body
    pub const fn new(channel_id: u8, control_endpoint: Hpai) -> Self {
        Self {
            channel_id,
            status: E_NO_ERROR,
            control_endpoint,
        }
    }

    /// Parse from frame body
    pub fn parse(data: &[u8]) -> Result<Self> {
        let (channel_id, status, rest) = channel_pair(data)?;
        Ok(Self {
            channel_id,
            status,
            control_endpoint: Hpai::parse(rest)?,
        })
    }

    /// Encode the body
    pub fn write_body(&self, buf: &mut [u8]) -> Result<usize> {
        let offset = write_bytes(buf, &[self.channel_id, self.status])?;
        Ok(offset + self.control_endpoint.encode(buf.get_mut(offset..).unwrap_or_default())?)
    }
}

/// `CONNECTIONSTATE_RESPONSE` (0x0208) and `DISCONNECT_RESPONSE` (0x020A) body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelResponse {
    /// Communication channel ID
    pub channel_id: u8,
    /// Status code (0 = OK)
    pub status: u8,
}

impl ChannelResponse {
    /// Create a new response body
    pub const fn new(channel_id: u8, status: u8) -> Self {
        Self { channel_id, status }
    }

    /// Parse from frame body
    pub fn parse(data: &[u8]) -> Result<Self> {
        let (channel_id, status, _) = channel_pair(data)?;
        Ok(Self::new(channel_id, status))
    }

    /// Encode the body
    pub fn write_body(&self, buf: &mut [u8]) -> Result<usize> {
        write_bytes(buf, &[self.channel_id, self.status])
    }

    /// Check if the gateway reported success
    pub const fn is_ok(&self) -> bool {
        self.status == E_NO_ERROR
    }
}

// =============================================================================
// Tunnelling
// =============================================================================

/// Connection header of tunnelling requests and acks
///
/// ```text
/// ┌──────────┬────────────┬──────────┬──────────────────┐
/// │ Len (04) │ Channel ID │ Sequence │ Status/Reserved  │
/// └──────────┴────────────┴──────────┴──────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionHeader {
    /// Communication channel ID
    pub channel_id: u8,
    /// Sequence counter of the sending side
    pub sequence: u8,
    /// Status (acks) or reserved (requests)
    pub status: u8,
}

impl ConnectionHeader {
    /// Size of the connection header
    pub const SIZE: usize = 4;

    /// Create a new connection header
    pub const fn new(channel_id: u8, sequence: u8, status: u8) -> Self {
        Self {
            channel_id,
            sequence,
            status,
        }
    }

    /// Parse from bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        let &[4, channel_id, sequence, status, ..] = data else {
            return Err(KnxError::invalid_frame());
        };
        Ok(Self::new(channel_id, sequence, status))
    }

    /// Encode into bytes
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        write_bytes(buf, &[4, self.channel_id, self.sequence, self.status])
    }
}

/// `TUNNELING_REQUEST` (0x0420)
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TunnelingRequest {
    /// Communication channel ID
    pub channel_id: u8,
    /// Sender's sequence number
    pub sequence: u8,
    /// Carried cEMI message
    pub cemi: CemiMessage,
}

impl TunnelingRequest {
    /// Create a new `TUNNELING_REQUEST`
    pub const fn new(channel_id: u8, sequence: u8, cemi: CemiMessage) -> Self {
        Self {
            channel_id,
            sequence,
            cemi,
        }
    }

    /// Parse from frame body
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = ConnectionHeader::parse(data)?;
        let cemi = CemiMessage::decode(&data[ConnectionHeader::SIZE..])?;
        Ok(Self::new(header.channel_id, header.sequence, cemi))
    }

    /// Encode the body
    pub fn write_body(&self, buf: &mut [u8]) -> Result<usize> {
        let offset = ConnectionHeader::new(self.channel_id, self.sequence, 0).encode(buf)?;
        Ok(offset + self.cemi.encode(&mut buf[offset..])?)
    }
}

/// `TUNNELING_ACK` (0x0421)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TunnelingAck {
    /// Communication channel ID
    pub channel_id: u8,
    /// Sequence number being acknowledged
    pub sequence: u8,
    /// Status code (0 = OK)
    pub status: u8,
}

impl TunnelingAck {
    /// Create a new `TUNNELING_ACK`
    pub const fn new(channel_id: u8, sequence: u8, status: u8) -> Self {
        Self {
            channel_id,
            sequence,
            status,
        }
    }

    /// Parse from frame body
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = ConnectionHeader::parse(data)?;
        Ok(Self::new(header.channel_id, header.sequence, header.status))
    }

    /// Encode the body
    pub fn write_body(&self, buf: &mut [u8]) -> Result<usize> {
        ConnectionHeader::new(self.channel_id, self.sequence, self.status).encode(buf)
    }

    /// Check if acknowledgment is OK
    pub const fn is_ok(&self) -> bool {
        self.status == E_NO_ERROR
    }
}

// =============================================================================
// Routing
// =============================================================================

/// `ROUTING_LOST_MESSAGE` (0x0531)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RoutingLostMessage {
    /// Device state of the reporting router
    pub device_state: u8,
    /// Number of frames the router dropped
    pub lost_messages: u16,
}

impl RoutingLostMessage {
    /// Parse from frame body
    pub fn parse(data: &[u8]) -> Result<Self> {
        let &[4, device_state, hi, lo, ..] = data else {
            return Err(KnxError::invalid_frame());
        };
        Ok(Self {
            device_state,
            lost_messages: u16::from_be_bytes([hi, lo]),
        })
    }

    /// Encode the body
    pub fn write_body(&self, buf: &mut [u8]) -> Result<usize> {
        let [hi, lo] = self.lost_messages.to_be_bytes();
        write_bytes(buf, &[4, self.device_state, hi, lo])
    }
}

/// `ROUTING_BUSY` (0x0532)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RoutingBusy {
    /// Device state of the reporting router
    pub device_state: u8,
    /// Requested pause in milliseconds
    pub wait_time_ms: u16,
    /// Busy control field
    pub control: u16,
}

impl RoutingBusy {
    /// Parse from frame body
    pub fn parse(data: &[u8]) -> Result<Self> {
        let &[6, device_state, w_hi, w_lo, c_hi, c_lo, ..] = data else {
            return Err(KnxError::invalid_frame());
        };
        Ok(Self {
            device_state,
            wait_time_ms: u16::from_be_bytes([w_hi, w_lo]),
            control: u16::from_be_bytes([c_hi, c_lo]),
        })
    }

    /// Encode the body
    pub fn write_body(&self, buf: &mut [u8]) -> Result<usize> {
        let [w_hi, w_lo] = self.wait_time_ms.to_be_bytes();
        let [c_hi, c_lo] = self.control.to_be_bytes();
        write_bytes(buf, &[6, self.device_state, w_hi, w_lo, c_hi, c_lo])
    }
}

// =============================================================================
// Frame codec
// =============================================================================

/// A decoded KNXnet/IP frame
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Frame {
    /// `CONNECT_REQUEST`
    ConnectRequest(ConnectRequest),
    /// `CONNECT_RESPONSE`
    ConnectResponse(ConnectResponse),
    /// `CONNECTIONSTATE_REQUEST`
    ConnectionStateRequest(ChannelRequest),
    /// `CONNECTIONSTATE_RESPONSE`
    ConnectionStateResponse(ChannelResponse),
    /// `DISCONNECT_REQUEST`
    DisconnectRequest(ChannelRequest),
    /// `DISCONNECT_RESPONSE`
    DisconnectResponse(ChannelResponse),
    /// `TUNNELING_REQUEST`
    TunnelingRequest(TunnelingRequest),
    /// `TUNNELING_ACK`
    TunnelingAck(TunnelingAck),
    /// `ROUTING_INDICATION`
    RoutingIndication(CemiMessage),
    /// `ROUTING_LOST_MESSAGE`
    RoutingLostMessage(RoutingLostMessage),
    /// `ROUTING_BUSY`
    RoutingBusy(RoutingBusy),
}

impl Frame {
    /// Service type identifier of this frame
    pub const fn service_type(&self) -> ServiceType {
        match self {
            Self::ConnectRequest(_) => ServiceType::ConnectRequest,
            Self::ConnectResponse(_) => ServiceType::ConnectResponse,
            Self::ConnectionStateRequest(_) => ServiceType::ConnectionstateRequest,
            Self::ConnectionStateResponse(_) => ServiceType::ConnectionstateResponse,
            Self::DisconnectRequest(_) => ServiceType::DisconnectRequest,
            Self::DisconnectResponse(_) => ServiceType::DisconnectResponse,
            Self::TunnelingRequest(_) => ServiceType::TunnellingRequest,
            Self::TunnelingAck(_) => ServiceType::TunnellingAck,
            Self::RoutingIndication(_) => ServiceType::RoutingIndication,
            Self::RoutingLostMessage(_) => ServiceType::RoutingLostMessage,
            Self::RoutingBusy(_) => ServiceType::RoutingBusy,
        }
    }

    /// Build the complete frame (header + body) into `buf`
    ///
    /// Returns the number of bytes written.
    pub fn build(&self, buf: &mut [u8]) -> Result<usize> {
        build_frame(self.service_type(), buf, |body| match self {
            Self::ConnectRequest(req) => req.write_body(body),
            Self::ConnectResponse(resp) => resp.write_body(body),
            Self::ConnectionStateRequest(req) | Self::DisconnectRequest(req) => req.write_body(body),
            Self::ConnectionStateResponse(resp) | Self::DisconnectResponse(resp) => resp.write_body(body),
            Self::TunnelingRequest(req) => req.write_body(body),
            Self::TunnelingAck(ack) => ack.write_body(body),
            Self::RoutingIndication(cemi) => cemi.encode(body),
            Self::RoutingLostMessage(lost) => lost.write_body(body),
            Self::RoutingBusy(busy) => busy.write_body(body),
        })
    }

    /// Parse the body of an already validated frame
    pub fn parse(frame: &KnxnetIpFrame<'_>) -> Result<Self> {
        let body = frame.body();
        Ok(match frame.service_type() {
            ServiceType::ConnectRequest => Self::ConnectRequest(ConnectRequest::parse(body)?),
            ServiceType::ConnectResponse => Self::ConnectResponse(ConnectResponse::parse(body)?),
            ServiceType::ConnectionstateRequest => Self::ConnectionStateRequest(ChannelRequest::parse(body)?),
            ServiceType::ConnectionstateResponse => Self::ConnectionStateResponse(ChannelResponse::parse(body)?),
            ServiceType::DisconnectRequest => Self::DisconnectRequest(ChannelRequest::parse(body)?),
            ServiceType::DisconnectResponse => Self::DisconnectResponse(ChannelResponse::parse(body)?),
            ServiceType::TunnellingRequest => Self::TunnelingRequest(TunnelingRequest::parse(body)?),
            ServiceType::TunnellingAck => Self::TunnelingAck(TunnelingAck::parse(body)?),
            ServiceType::RoutingIndication => Self::RoutingIndication(CemiMessage::decode(body)?),
            ServiceType::RoutingLostMessage => Self::RoutingLostMessage(RoutingLostMessage::parse(body)?),
            ServiceType::RoutingBusy => Self::RoutingBusy(RoutingBusy::parse(body)?),
        })
    }
}

/// Encode a frame into an owned datagram.
pub fn encode_frame(frame: &Frame) -> Result<Datagram> {
    let mut buf = [0u8; MAX_FRAME_SIZE];
    let len = frame.build(&mut buf)?;
    Datagram::from_slice(&buf[..len]).map_err(|_| KnxError::payload_too_large())
}

/// Decode a received datagram.
///
/// # Errors
///
/// Returns a protocol error for malformed headers, unknown service types and
/// undecodable bodies.
pub fn decode_frame(data: &[u8]) -> Result<Frame> {
    Frame::parse(&KnxnetIpFrame::parse(data)?)
}

#[cfg(test)]
mod tests {
    use core::net::Ipv4Addr;

    use super::*;
    use crate::addressing::GroupAddress;
    use crate::protocol::constants::{CemiService, E_NO_MORE_CONNECTIONS};

    #[test]
    fn test_connect_request_bytes() {
        let datagram = encode_frame(&Frame::ConnectRequest(ConnectRequest::new(Hpai::NAT, Hpai::NAT))).unwrap();
        assert_eq!(
            datagram.as_slice(),
            &[
                0x06, 0x10, 0x02, 0x05, 0x00, 0x1A, // header
                0x08, 0x01, 0, 0, 0, 0, 0, 0, // control HPAI
                0x08, 0x01, 0, 0, 0, 0, 0, 0, // data HPAI
                0x04, 0x04, 0x02, 0x00, // CRI
            ]
        );
    }

    #[test]
    fn test_connect_response_with_crd() {
        let data = [
            0x06, 0x10, 0x02, 0x06, 0x00, 0x14, // header
            0x05, 0x00, // channel 5, OK
            0x08, 0x01, 192, 168, 1, 10, 0x0E, 0x57, // data endpoint
            0x04, 0x04, 0x11, 0xFA, // CRD, 1.1.250
        ];
        let Frame::ConnectResponse(resp) = decode_frame(&data).unwrap() else {
            panic!("expected connect response");
        };
        assert!(resp.is_ok());
        assert_eq!(resp.channel_id, 5);
        assert_eq!(resp.data_endpoint, Some(Hpai::new(Ipv4Addr::new(192, 168, 1, 10), 3671)));
        assert_eq!(resp.assigned_address, Some(IndividualAddress::from_parts(1, 1, 250)));
    }

    #[test]
    fn test_connect_response_short_refusal() {
        let data = [0x06, 0x10, 0x02, 0x06, 0x00, 0x08, 0x00, E_NO_MORE_CONNECTIONS];
        let Frame::ConnectResponse(resp) = decode_frame(&data).unwrap() else {
            panic!("expected connect response");
        };
        assert!(!resp.is_ok());
        assert_eq!(resp.data_endpoint, None);
        assert_eq!(resp, ConnectResponse::refused(E_NO_MORE_CONNECTIONS));
    }

    #[test]
    fn test_connect_response_ok_without_endpoint_rejected() {
        let data = [0x06, 0x10, 0x02, 0x06, 0x00, 0x08, 0x05, 0x00];
        assert!(decode_frame(&data).is_err());
    }

    #[test]
    fn test_tunneling_request_bytes() {
        let cemi = CemiMessage::group_write(
            CemiService::Request,
            IndividualAddress::from(0x1105),
            GroupAddress::from(0x0A03),
            &[0x01],
        )
        .unwrap();
        let datagram = encode_frame(&Frame::TunnelingRequest(TunnelingRequest::new(7, 3, cemi.clone()))).unwrap();
        assert_eq!(
            datagram.as_slice(),
            &[
                0x06, 0x10, 0x04, 0x20, 0x00, 0x15, // header
                0x04, 0x07, 0x03, 0x00, // connection header
                0x11, 0x00, 0xBC, 0xE0, 0x11, 0x05, 0x0A, 0x03, 0x01, 0x00, 0x81,
            ]
        );
        let Frame::TunnelingRequest(req) = decode_frame(&datagram).unwrap() else {
            panic!("expected tunneling request");
        };
        assert_eq!(req.cemi, cemi);
    }

    #[test]
    fn test_tunneling_ack() {
        let data = [0x06, 0x10, 0x04, 0x21, 0x00, 0x0A, 0x04, 0x07, 0x03, 0x00];
        assert_eq!(decode_frame(&data).unwrap(), Frame::TunnelingAck(TunnelingAck::new(7, 3, 0)));
    }

    #[test]
    fn test_connection_header_requires_length_four() {
        let data = [0x06, 0x10, 0x04, 0x21, 0x00, 0x0A, 0x05, 0x07, 0x03, 0x00];
        assert!(decode_frame(&data).is_err());
    }

    #[test]
    fn test_disconnect_request_bytes() {
        let frame = Frame::DisconnectRequest(ChannelRequest::new(5, Hpai::NAT));
        let datagram = encode_frame(&frame).unwrap();
        assert_eq!(
            datagram.as_slice(),
            &[0x06, 0x10, 0x02, 0x09, 0x00, 0x10, 0x05, 0x00, 0x08, 0x01, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_connectionstate_response() {
        let data = [0x06, 0x10, 0x02, 0x08, 0x00, 0x08, 0x05, 0x21];
        let Frame::ConnectionStateResponse(resp) = decode_frame(&data).unwrap() else {
            panic!("expected connectionstate response");
        };
        assert_eq!(resp.channel_id, 5);
        assert!(!resp.is_ok());
    }

    #[test]
    fn test_routing_frames() {
        let lost = [0x06, 0x10, 0x05, 0x31, 0x00, 0x0A, 0x04, 0x01, 0x00, 0x03];
        assert_eq!(
            decode_frame(&lost).unwrap(),
            Frame::RoutingLostMessage(RoutingLostMessage {
                device_state: 1,
                lost_messages: 3
            })
        );

        let busy = [0x06, 0x10, 0x05, 0x32, 0x00, 0x0C, 0x06, 0x00, 0x00, 0x64, 0x00, 0x00];
        let Frame::RoutingBusy(busy) = decode_frame(&busy).unwrap() else {
            panic!("expected routing busy");
        };
        assert_eq!(busy.wait_time_ms, 100);
    }

    #[test]
    fn test_routing_indication_body_is_cemi() {
        let cemi = CemiMessage::group_write(
            CemiService::Indication,
            IndividualAddress::from(0x1105),
            GroupAddress::from(2563),
            &[0x00, 0x00, 0x2A],
        )
        .unwrap();
        let datagram = encode_frame(&Frame::RoutingIndication(cemi.clone())).unwrap();
        assert_eq!(&datagram[..6], &[0x06, 0x10, 0x05, 0x30, 0x00, 0x13]);
        assert_eq!(decode_frame(&datagram).unwrap(), Frame::RoutingIndication(cemi));
    }

    #[test]
    fn test_unknown_service_rejected() {
        // DESCRIPTION_REQUEST
        let data = [0x06, 0x10, 0x02, 0x03, 0x00, 0x0E, 0x08, 0x01, 0, 0, 0, 0, 0, 0];
        assert!(decode_frame(&data).is_err());
    }
}
