//! KNX Individual Address.
//!
//! Individual addresses identify physical devices on the KNX bus.
//! Format: `area.line.device` (e.g., 1.1.5)
//! - Area: 0-15 (4 bits)
//! - Line: 0-15 (4 bits)
//! - Device: 0-255 (8 bits)

use super::{format_individual, pack_individual, parse_components, unpack_individual, AddressString};
use crate::error::{KnxError, Result};
use core::fmt;

/// KNX Individual Address (`area.line.device`)
///
/// # Examples
///
/// ```
/// use knx_ip_client::IndividualAddress;
///
/// let addr = IndividualAddress::new(1, 1, 5).unwrap();
/// assert_eq!(addr.to_string(), "1.1.5");
///
/// let addr = IndividualAddress::from(0x1105u16);
/// assert_eq!(addr.area(), 1);
/// assert_eq!(addr.device(), 5);
///
/// let addr: IndividualAddress = "1.1.5".parse().unwrap();
/// assert_eq!(u16::from(addr), 0x1105);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndividualAddress {
    raw: u16,
}

impl IndividualAddress {
    /// Maximum area value (4 bits)
    pub const MAX_AREA: u8 = 15;
    /// Maximum line value (4 bits)
    pub const MAX_LINE: u8 = 15;

    /// Create a new Individual Address from components.
    ///
    /// # Errors
    ///
    /// Returns an addressing error if `area` or `line` is above 15.
    pub fn new(area: u8, line: u8, device: u8) -> Result<Self> {
        if area > Self::MAX_AREA || line > Self::MAX_LINE {
            return Err(KnxError::address_out_of_range());
        }
        Ok(Self::from_parts(area, line, device))
    }

    /// Create from components, masking each to its bit width.
    #[inline]
    pub const fn from_parts(area: u8, line: u8, device: u8) -> Self {
        Self {
            raw: pack_individual(area, line, device),
        }
    }

    /// Get the raw u16 representation of the address.
    #[inline]
    pub const fn raw(self) -> u16 {
        self.raw
    }

    /// Get the area component (0-15).
    #[inline]
    pub const fn area(self) -> u8 {
        unpack_individual(self.raw).0
    }

    /// Get the line component (0-15).
    #[inline]
    pub const fn line(self) -> u8 {
        unpack_individual(self.raw).1
    }

    /// Get the device component (0-255).
    #[inline]
    pub const fn device(self) -> u8 {
        unpack_individual(self.raw).2
    }

    /// Canonical text form without allocation.
    pub fn to_text(self) -> AddressString {
        format_individual(self.raw)
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

impl fmt::Display for IndividualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<u16> for IndividualAddress {
    #[inline]
    fn from(raw: u16) -> Self {
        Self { raw }
    }
}

impl From<IndividualAddress> for u16 {
    #[inline]
    fn from(addr: IndividualAddress) -> u16 {
        addr.raw
    }
}

impl core::str::FromStr for IndividualAddress {
    type Err = KnxError;

    fn from_str(s: &str) -> Result<Self> {
        let [area, line, device] =
            parse_components(s, '.').ok_or_else(KnxError::invalid_individual_address)?;
        Self::new(area, line, device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_valid() {
        let addr = IndividualAddress::new(1, 2, 3).unwrap();
        assert_eq!(addr.area(), 1);
        assert_eq!(addr.line(), 2);
        assert_eq!(addr.device(), 3);
        assert_eq!(addr.raw(), 0x1203);
    }

    #[test]
    fn test_new_rejects_out_of_range() {
        assert!(IndividualAddress::new(16, 0, 0).is_err());
        assert!(IndividualAddress::new(0, 16, 0).is_err());
    }

    #[test]
    fn test_from_parts_masks() {
        assert_eq!(IndividualAddress::from_parts(16, 1, 1).raw(), 0x0101);
    }

    #[test]
    fn test_decode_short_buffer() {
        assert!(IndividualAddress::decode(&[0x11]).is_err());
        let addr = IndividualAddress::decode(&[0x11, 0x05, 0xFF]).unwrap();
        assert_eq!(addr.to_string(), "1.1.5");
    }

    #[test]
    fn test_from_str() {
        let addr: IndividualAddress = "15.15.255".parse().unwrap();
        assert_eq!(u16::from(addr), 0xFFFF);

        assert!("1.2".parse::<IndividualAddress>().is_err());
        assert!("16.0.0".parse::<IndividualAddress>().is_err());
        assert!("1.2.3.4".parse::<IndividualAddress>().is_err());
        assert!("a.b.c".parse::<IndividualAddress>().is_err());
        assert!("".parse::<IndividualAddress>().is_err());
    }
}
