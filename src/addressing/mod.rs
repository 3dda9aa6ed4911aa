//! KNX addressing.
//!
//! KNX uses two kinds of 16-bit addresses:
//! - Individual addresses for physical devices (`area.line.device`)
//! - Group addresses for functional groups (`main/middle/sub`)
//!
//! The free functions below are the raw codec. They mask every field to its bit
//! width instead of rejecting it, so out-of-range components silently wrap. The
//! checked constructors on [`IndividualAddress`] and [`GroupAddress`] reject them.

use core::fmt::Write;

pub mod group;
pub mod individual;

pub use group::GroupAddress;
pub use individual::IndividualAddress;

/// Text buffer large enough for any formatted address.
pub type AddressString = heapless::String<16>;

/// Pack `area.line.device` into a raw individual address.
///
/// ```
/// use knx_ip_client::addressing::pack_individual;
///
/// assert_eq!(pack_individual(1, 1, 5), 0x1105);
/// // area is 4 bits wide: 17 wraps to 1
/// assert_eq!(pack_individual(17, 1, 5), 0x1105);
/// ```
#[inline]
pub const fn pack_individual(area: u8, line: u8, device: u8) -> u16 {
    ((area as u16 & 0x0F) << 12) | ((line as u16 & 0x0F) << 8) | device as u16
}

/// Split a raw individual address into `(area, line, device)`.
#[inline]
pub const fn unpack_individual(raw: u16) -> (u8, u8, u8) {
    (((raw >> 12) & 0x0F) as u8, ((raw >> 8) & 0x0F) as u8, (raw & 0xFF) as u8)
}

/// Pack `main/middle/sub` into a raw group address.
///
/// ```
/// use knx_ip_client::addressing::pack_group;
///
/// assert_eq!(pack_group(1, 2, 3), 2563);
/// ```
#[inline]
pub const fn pack_group(main: u8, middle: u8, sub: u8) -> u16 {
    ((main as u16 & 0x0F) << 11) | ((middle as u16 & 0x07) << 8) | sub as u16
}

/// Split a raw group address into `(main, middle, sub)`.
///
/// Bit 15 is outside the 4-bit main group and is ignored.
#[inline]
pub const fn unpack_group(raw: u16) -> (u8, u8, u8) {
    (((raw >> 11) & 0x0F) as u8, ((raw >> 8) & 0x07) as u8, (raw & 0xFF) as u8)
}

/// Render a raw individual address as `area.line.device`.
pub fn format_individual(raw: u16) -> AddressString {
    let (area, line, device) = unpack_individual(raw);
    let mut s = AddressString::new();
    // 15.15.255 is 9 characters, the buffer cannot overflow
    let _ = write!(s, "{area}.{line}.{device}");
    s
}

/// Render a raw group address as `main/middle/sub`.
pub fn format_group(raw: u16) -> AddressString {
    let (main, middle, sub) = unpack_group(raw);
    let mut s = AddressString::new();
    let _ = write!(s, "{main}/{middle}/{sub}");
    s
}

/// Parse three separated `u8` components, rejecting missing or extra parts.
pub(crate) fn parse_components(s: &str, separator: char) -> Option<[u8; 3]> {
    let mut parts = s.split(separator);
    let mut out = [0u8; 3];
    for slot in &mut out {
        *slot = parts.next()?.trim().parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(out)
}
