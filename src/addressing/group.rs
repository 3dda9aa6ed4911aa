//! KNX Group Address.
//!
//! Group addresses name functions rather than devices (e.g. "kitchen light").
//! They are written in 3-level notation `main/middle/sub` and stored in 16 bits:
//! - Main: 4 bits (0-15), bits 14-11
//! - Middle: 3 bits (0-7), bits 10-8
//! - Sub: 8 bits (0-255), bits 7-0

use super::{format_group, pack_group, parse_components, unpack_group, AddressString};
use crate::error::{KnxError, Result};
use core::fmt;

/// KNX Group Address (`main/middle/sub`)
///
/// # Examples
///
/// ```
/// use knx_ip_client::GroupAddress;
///
/// let addr = GroupAddress::new(1, 2, 3).unwrap();
/// assert_eq!(addr.to_string(), "1/2/3");
/// assert_eq!(addr.raw(), 2563);
///
/// let addr: GroupAddress = "1/2/3".parse().unwrap();
/// assert_eq!(u16::from(addr), 0x0A03);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupAddress {
    raw: u16,
}

impl GroupAddress {
    /// Maximum main group value (4 bits)
    pub const MAX_MAIN: u8 = 15;
    /// Maximum middle group value (3 bits)
    pub const MAX_MIDDLE: u8 = 7;

    /// Create a new Group Address from its three levels.
    ///
    /// # Errors
    ///
    /// Returns an addressing error if `main` is above 15 or `middle` above 7.
    pub fn new(main: u8, middle: u8, sub: u8) -> Result<Self> {
        if main > Self::MAX_MAIN || middle > Self::MAX_MIDDLE {
            return Err(KnxError::address_out_of_range());
        }
        Ok(Self::from_parts(main, middle, sub))
    }

    /// Create from components, masking each to its bit width.
    #[inline]
    pub const fn from_parts(main: u8, middle: u8, sub: u8) -> Self {
        Self {
            raw: pack_group(main, middle, sub),
        }
    }

    /// Get the raw u16 representation of the address.
    #[inline]
    pub const fn raw(self) -> u16 {
        self.raw
    }

    /// Get the main group component (0-15).
    #[inline]
    pub const fn main(self) -> u8 {
        unpack_group(self.raw).0
    }

    /// Get the middle group component (0-7).
    #[inline]
    pub const fn middle(self) -> u8 {
        unpack_group(self.raw).1
    }

    /// Get the sub group component (0-255).
    #[inline]
    pub const fn sub(self) -> u8 {
        unpack_group(self.raw).2
    }

    /// Format as `main/middle/sub` without allocation.
    pub fn to_string_3level(&self) -> AddressString {
        format_group(self.raw)
    }

    /// Encode the address into a byte buffer (big-endian).
    ///
    /// # Errors
    ///
    /// Returns a transport error if the buffer is shorter than 2 bytes.
    #[inline]
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let dst = buf.get_mut(..2).ok_or_else(KnxError::buffer_too_small)?;
        dst.copy_from_slice(&self.raw.to_be_bytes());
        Ok(2)
    }

    /// Decode an address from a byte buffer (big-endian).
    ///
    /// # Errors
    ///
    /// Returns a transport error if the buffer is shorter than 2 bytes.
    #[inline]
    pub fn decode(buf: &[u8]) -> Result<Self> {
        match buf {
            [hi, lo, ..] => Ok(Self {
                raw: u16::from_be_bytes([*hi, *lo]),
            }),
            _ => Err(KnxError::buffer_too_small()),
        }
    }
}

impl fmt::Display for GroupAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_3level())
    }
}

impl From<u16> for GroupAddress {
    #[inline]
    fn from(raw: u16) -> Self {
        Self { raw }
    }
}

impl From<GroupAddress> for u16 {
    #[inline]
    fn from(addr: GroupAddress) -> u16 {
        addr.raw
    }
}

impl core::str::FromStr for GroupAddress {
    type Err = KnxError;

    fn from_str(s: &str) -> Result<Self> {
        let [main, middle, sub] =
            parse_components(s, '/').ok_or_else(KnxError::invalid_group_address)?;
        Self::new(main, middle, sub)
    }
}
