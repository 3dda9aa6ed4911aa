//! KNXnet/IP protocol constants and closed code enumerations.
//!
//! Every wire code the client interprets is a closed enum with a fallible
//! `from_*` conversion; unknown codes never pass through as integers.

use core::net::Ipv4Addr;

/// KNXnet/IP protocol version 1.0
pub const KNXNETIP_VERSION_10: u8 = 0x10;

/// Standard KNXnet/IP header length (6 bytes)
pub const HEADER_SIZE_10: u8 = 0x06;

/// Standard UDP port for KNXnet/IP communication
pub const KNXNETIP_DEFAULT_PORT: u16 = 3671;

/// KNXnet/IP routing multicast group
pub const KNXNETIP_MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(224, 0, 23, 12);

/// Maximum size of a KNXnet/IP frame
pub const MAX_FRAME_SIZE: usize = 256;

/// Maximum size of a cEMI frame
pub const MAX_CEMI_SIZE: usize = 64;

/// Maximum APDU payload carried by one cEMI `L_Data` frame
pub const MAX_PAYLOAD_SIZE: usize = 48;

/// Host protocol code for IPv4 UDP
pub const IPV4_UDP: u8 = 0x01;

/// Connection type for `TUNNEL_CONNECTION`
pub const TUNNEL_CONNECTION: u8 = 0x04;

/// KNX layer for link-layer tunnelling
pub const TUNNEL_LINKLAYER: u8 = 0x02;

// =============================================================================
// Service Type Identifiers
// =============================================================================

/// KNXnet/IP service type identifiers this client exchanges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum ServiceType {
    /// `CONNECT_REQUEST`
    ConnectRequest = 0x0205,
    /// `CONNECT_RESPONSE`
    ConnectResponse = 0x0206,
    /// `CONNECTIONSTATE_REQUEST` (heartbeat)
    ConnectionstateRequest = 0x0207,
    /// `CONNECTIONSTATE_RESPONSE`
    ConnectionstateResponse = 0x0208,
    /// `DISCONNECT_REQUEST`
    DisconnectRequest = 0x0209,
    /// `DISCONNECT_RESPONSE`
    DisconnectResponse = 0x020A,
    /// `TUNNELLING_REQUEST`
    TunnellingRequest = 0x0420,
    /// `TUNNELLING_ACK`
    TunnellingAck = 0x0421,
    /// `ROUTING_INDICATION`
    RoutingIndication = 0x0530,
    /// `ROUTING_LOST_MESSAGE`
    RoutingLostMessage = 0x0531,
    /// `ROUTING_BUSY`
    RoutingBusy = 0x0532,
}

impl ServiceType {
    /// Convert a u16 to `ServiceType`
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0205 => Some(Self::ConnectRequest),
            0x0206 => Some(Self::ConnectResponse),
            0x0207 => Some(Self::ConnectionstateRequest),
            0x0208 => Some(Self::ConnectionstateResponse),
            0x0209 => Some(Self::DisconnectRequest),
            0x020A => Some(Self::DisconnectResponse),
            0x0420 => Some(Self::TunnellingRequest),
            0x0421 => Some(Self::TunnellingAck),
            0x0530 => Some(Self::RoutingIndication),
            0x0531 => Some(Self::RoutingLostMessage),
            0x0532 => Some(Self::RoutingBusy),
            _ => None,
        }
    }

    /// Convert `ServiceType` to u16
    pub const fn to_u16(self) -> u16 {
        self as u16
    }
}

// =============================================================================
// Status Codes
// =============================================================================

/// Status code for success
pub const E_NO_ERROR: u8 = 0x00;

/// Requested channel id is not active
pub const E_CONNECTION_ID: u8 = 0x21;

/// Connection type not supported
pub const E_CONNECTION_TYPE: u8 = 0x22;

/// Gateway has no free tunnelling slot
pub const E_NO_MORE_CONNECTIONS: u8 = 0x24;

/// Error on the data connection
pub const E_DATA_CONNECTION: u8 = 0x26;

/// Error on the KNX subnetwork connection
pub const E_KNX_CONNECTION: u8 = 0x27;

// =============================================================================
// cEMI Message Codes
// =============================================================================

/// cEMI `L_Data` message codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum CemiService {
    /// `L_Data.req`
    Request = 0x11,
    /// `L_Data.ind`
    Indication = 0x29,
    /// `L_Data.con`
    Confirmation = 0x2E,
}

impl CemiService {
    /// Convert u8 to `CemiService`
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x11 => Some(Self::Request),
            0x29 => Some(Self::Indication),
            0x2E => Some(Self::Confirmation),
            _ => None,
        }
    }

    /// Convert `CemiService` to u8
    pub const fn to_u8(self) -> u8 {
        self as u8
    }
}

// =============================================================================
// KNX Priority
// =============================================================================

/// KNX message priority levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Priority {
    /// System priority
    System = 0b00,
    /// Normal priority
    Normal = 0b01,
    /// Urgent priority
    Urgent = 0b10,
    /// Low priority (default for group communication)
    #[default]
    Low = 0b11,
}

impl Priority {
    /// Convert the two priority bits to Priority
    pub const fn from_bits(value: u8) -> Self {
        match value & 0b11 {
            0b00 => Self::System,
            0b01 => Self::Normal,
            0b10 => Self::Urgent,
            _ => Self::Low,
        }
    }

    /// Convert Priority to u8
    pub const fn to_u8(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_type_round_trip() {
        for raw in [0x0205, 0x0206, 0x0209, 0x020A, 0x0420, 0x0421, 0x0530] {
            assert_eq!(ServiceType::from_u16(raw).map(ServiceType::to_u16), Some(raw));
        }
    }

    #[test]
    fn test_unknown_codes_rejected() {
        // SEARCH_REQUEST is not spoken by this client
        assert_eq!(ServiceType::from_u16(0x0201), None);
        assert_eq!(CemiService::from_u8(0x2B), None);
    }

    #[test]
    fn test_priority_bits() {
        assert_eq!(Priority::from_bits(0b11), Priority::Low);
        assert_eq!(Priority::from_bits(0b101), Priority::Normal);
        assert_eq!(Priority::default(), Priority::Low);
    }
}
