//! KNXnet/IP frame header and endpoint structures.
//!
//! ## Frame Structure
//!
//! ```text
//! ┌─────────────────────────────┐
//! │  Header (6 bytes)           │
//! │  - Header Length: 0x06      │
//! │  - Protocol Version: 0x10   │
//! │  - Service Type: 2 bytes    │
//! │  - Total Length: 2 bytes    │
//! ├─────────────────────────────┤
//! │  Body (variable)            │
//! │  - Service-specific data    │
//! └─────────────────────────────┘
//! ```
//!
//! [`KnxnetIpFrame`] is a zero-copy view used on the receive path; the typed
//! service bodies live in [`services`](super::services).

use core::net::{Ipv4Addr, SocketAddrV4};

use crate::error::{KnxError, Result};
use crate::protocol::constants::{ServiceType, HEADER_SIZE_10, IPV4_UDP, KNXNETIP_VERSION_10, MAX_FRAME_SIZE};

/// KNXnet/IP frame header (6 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KnxnetIpHeader {
    /// Service type identifier
    pub service_type: ServiceType,
    /// Total length of frame (header + body)
    pub total_length: u16,
}

impl KnxnetIpHeader {
    /// Size of the header in bytes
    pub const SIZE: usize = 6;

    /// Create a header for a body of `body_length` bytes
    pub const fn new(service_type: ServiceType, body_length: u16) -> Self {
        Self {
            service_type,
            total_length: Self::SIZE as u16 + body_length,
        }
    }

    /// Parse a header from a byte slice
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the buffer is shorter than 6 bytes, the
    /// header length or version is wrong, or the service type is unknown.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let &[header_length, protocol_version, st_hi, st_lo, len_hi, len_lo, ..] = data else {
            return Err(KnxError::invalid_frame());
        };

        if header_length != HEADER_SIZE_10 {
            return Err(KnxError::invalid_frame());
        }
        if protocol_version != KNXNETIP_VERSION_10 {
            return Err(KnxError::unsupported_version());
        }

        let service_type = ServiceType::from_u16(u16::from_be_bytes([st_hi, st_lo]))
            .ok_or_else(KnxError::unsupported_service_type)?;

        Ok(Self {
            service_type,
            total_length: u16::from_be_bytes([len_hi, len_lo]),
        })
    }

    /// Encode the header into a byte buffer
    ///
    /// # Errors
    ///
    /// Returns a transport error if the buffer is shorter than 6 bytes
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let dst = buf.get_mut(..Self::SIZE).ok_or_else(KnxError::buffer_too_small)?;
        dst[0] = HEADER_SIZE_10;
        dst[1] = KNXNETIP_VERSION_10;
        dst[2..4].copy_from_slice(&self.service_type.to_u16().to_be_bytes());
        dst[4..6].copy_from_slice(&self.total_length.to_be_bytes());
        Ok(Self::SIZE)
    }

    /// Get the expected body length from the header
    pub const fn body_length(&self) -> u16 {
        self.total_length.saturating_sub(Self::SIZE as u16)
    }
}

/// Zero-copy view of a KNXnet/IP frame
#[derive(Debug)]
pub struct KnxnetIpFrame<'a> {
    data: &'a [u8],
    header: KnxnetIpHeader,
}

impl<'a> KnxnetIpFrame<'a> {
    /// Parse a KNXnet/IP frame from a byte slice
    ///
    /// Trailing bytes beyond the header's total length are ignored.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the header is invalid, the total length is
    /// shorter than the header, or the buffer is shorter than the total length.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let header = KnxnetIpHeader::parse(data)?;
        let total = usize::from(header.total_length);
        if total < KnxnetIpHeader::SIZE || data.len() < total {
            return Err(KnxError::invalid_frame());
        }
        Ok(Self {
            data: &data[..total],
            header,
        })
    }

    /// Get the frame header
    pub const fn header(&self) -> &KnxnetIpHeader {
        &self.header
    }

    /// Get the service type
    pub const fn service_type(&self) -> ServiceType {
        self.header.service_type
    }

    /// Get the frame body (payload after header)
    pub fn body(&self) -> &'a [u8] {
        &self.data[KnxnetIpHeader::SIZE..]
    }
}

/// Write header plus a body produced by `write_body` into `buf`.
///
/// The closure receives the buffer after the header and returns the body length.
pub(crate) fn build_frame(
    service_type: ServiceType,
    buf: &mut [u8],
    write_body: impl FnOnce(&mut [u8]) -> Result<usize>,
) -> Result<usize> {
    let body_buf = buf.get_mut(KnxnetIpHeader::SIZE..).ok_or_else(KnxError::buffer_too_small)?;
    let body_len = write_body(body_buf)?;
    let total = KnxnetIpHeader::SIZE + body_len;
    if total > MAX_FRAME_SIZE {
        return Err(KnxError::payload_too_large());
    }
    KnxnetIpHeader::new(service_type, body_len as u16).encode(buf)?;
    Ok(total)
}

/// Host Protocol Address Information (HPAI)
///
/// ```text
/// ┌──────────────┬──────────────┬─────────────────────┐
/// │ Structure Len│ Host Protocol│   IP Address        │
/// │   (1 byte)   │   (1 byte)   │   (4 bytes IPv4)    │
/// ├──────────────┴──────────────┴─────────────────────┤
/// │                Port (2 bytes)                      │
/// └────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hpai {
    /// IPv4 address
    pub ip_address: Ipv4Addr,
    /// UDP port
    pub port: u16,
}

impl Hpai {
    /// Size of HPAI structure for IPv4
    pub const SIZE: usize = 8;

    /// "Route back" endpoint: the gateway answers to the datagram's source address.
    pub const NAT: Self = Self::new(Ipv4Addr::UNSPECIFIED, 0);

    /// Create a new HPAI for IPv4 UDP
    pub const fn new(ip_address: Ipv4Addr, port: u16) -> Self {
        Self { ip_address, port }
    }

    /// Check if this is the NAT (0.0.0.0:0) endpoint
    pub fn is_nat(&self) -> bool {
        *self == Self::NAT
    }

    /// Parse HPAI from bytes
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the structure is truncated or its length
    /// byte is not 8.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let &[len, _protocol, a, b, c, d, port_hi, port_lo, ..] = data else {
            return Err(KnxError::invalid_frame());
        };
        if usize::from(len) != Self::SIZE {
            return Err(KnxError::invalid_frame());
        }
        Ok(Self {
            ip_address: Ipv4Addr::new(a, b, c, d),
            port: u16::from_be_bytes([port_hi, port_lo]),
        })
    }

    /// Encode HPAI into bytes
    ///
    /// # Errors
    ///
    /// Returns a transport error if the buffer is shorter than 8 bytes
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let dst = buf.get_mut(..Self::SIZE).ok_or_else(KnxError::buffer_too_small)?;
        dst[0] = Self::SIZE as u8;
        dst[1] = IPV4_UDP;
        dst[2..6].copy_from_slice(&self.ip_address.octets());
        dst[6..8].copy_from_slice(&self.port.to_be_bytes());
        Ok(Self::SIZE)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Hpai {
    fn format(&self, f: defmt::Formatter<'_>) {
        let [a, b, c, d] = self.ip_address.octets();
        defmt::write!(f, "{}.{}.{}.{}:{}", a, b, c, d, self.port);
    }
}

impl Default for Hpai {
    fn default() -> Self {
        Self::NAT
    }
}

impl From<SocketAddrV4> for Hpai {
    fn from(addr: SocketAddrV4) -> Self {
        Self::new(*addr.ip(), addr.port())
    }
}

impl From<Hpai> for SocketAddrV4 {
    fn from(hpai: Hpai) -> Self {
        SocketAddrV4::new(hpai.ip_address, hpai.port)
    }
}
