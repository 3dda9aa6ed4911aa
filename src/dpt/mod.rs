//! KNX Datapoint Types (DPT).
//!
//! A datapoint type says how the payload bytes of a group telegram are to be
//! read. Payload bytes here are the APDU data exactly as carried after the APCI:
//! the first byte holds the 6-bit short data field, so types of six bits or less
//! fit in one byte and wider types start with an unused zero byte.
//!
//! | Type        | DPT   | Width | Layout                                   |
//! |-------------|-------|-------|------------------------------------------|
//! | `Bool`      | 1     | 1     | `000000b`                                |
//! | `CValue`    | 2     | 1     | `0000cv`                                 |
//! | `CStep`     | 3     | 1     | `00csss`                                 |
//! | `Char`      | 4     | 2     | `0, latin-1`                             |
//! | `Unsigned8` | 5     | 2     | `0, u8`                                  |
//! | `Signed8`   | 6     | 2     | `0, i8`                                  |
//! | `Unsigned16`| 7     | 3     | `0, u16 BE`                              |
//! | `Signed16`  | 8     | 3     | `0, i16 BE`                              |
//! | `Float16`   | 9     | 3     | `0, KNX float BE`                        |
//! | `TimeOfDay` | 10    | 4     | `0, dddhhhhh, 00mmmmmm, 00ssssss`        |
//! | `Date`      | 11    | 4     | `0, 000ddddd, 0000mmmm, 0yyyyyyy`        |
//! | `Unsigned32`| 12    | 5     | `0, u32 BE`                              |
//! | `Signed32`  | 13    | 5     | `0, i32 BE`                              |
//! | `Float32`   | 14    | 5     | `0, IEEE 754 BE`                         |
//!
//! ## Usage
//!
//! ```
//! use knx_ip_client::dpt::{decode_datapoint, encode_datapoint, DatapointType, DatapointValue};
//!
//! let bytes = encode_datapoint(DatapointType::Unsigned16, &DatapointValue::Unsigned16(42))?;
//! assert_eq!(bytes.as_slice(), &[0x00, 0x00, 0x2A]);
//!
//! let value = decode_datapoint(DatapointType::Unsigned16, &bytes)?;
//! assert_eq!(value, DatapointValue::Unsigned16(42));
//! # Ok::<(), knx_ip_client::KnxError>(())
//! ```

use crate::error::{KnxError, Result};

pub mod float16;

pub use float16::{decode_float16, encode_float16};

/// Widest datapoint payload in bytes.
pub const MAX_DATAPOINT_WIDTH: usize = 5;

/// Encoded datapoint payload.
pub type DatapointBytes = heapless::Vec<u8, MAX_DATAPOINT_WIDTH>;

/// Datapoint type tag selecting an encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DatapointType {
    /// 1 bit boolean (DPT 1)
    Bool,
    /// 1 bit value with control bit (DPT 2)
    CValue,
    /// 3 bit step with control bit (DPT 3)
    CStep,
    /// ISO 8859-1 character (DPT 4)
    Char,
    /// 8 bit unsigned (DPT 5)
    Unsigned8,
    /// 8 bit signed (DPT 6)
    Signed8,
    /// 16 bit unsigned (DPT 7)
    Unsigned16,
    /// 16 bit signed (DPT 8)
    Signed16,
    /// KNX 2-byte float (DPT 9)
    Float16,
    /// Day of week and time (DPT 10)
    TimeOfDay,
    /// Calendar date (DPT 11)
    Date,
    /// 32 bit unsigned (DPT 12)
    Unsigned32,
    /// 32 bit signed (DPT 13)
    Signed32,
    /// IEEE 754 single precision (DPT 14)
    Float32,
}

impl DatapointType {
    /// Payload width in bytes, including the short data byte.
    pub const fn width(self) -> usize {
        match self {
            Self::Bool | Self::CValue | Self::CStep => 1,
            Self::Char | Self::Unsigned8 | Self::Signed8 => 2,
            Self::Unsigned16 | Self::Signed16 | Self::Float16 => 3,
            Self::TimeOfDay | Self::Date => 4,
            Self::Unsigned32 | Self::Signed32 | Self::Float32 => 5,
        }
    }

    /// Decode a payload of exactly [`width`](Self::width) bytes.
    ///
    /// # Errors
    ///
    /// Returns a `MalformedPayload` DPT error when the length does not match.
    pub fn decode(self, bytes: &[u8]) -> Result<DatapointValue> {
        decode_datapoint(self, bytes)
    }
}

/// Decoded datapoint value.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DatapointValue {
    Bool(bool),
    CValue {
        control: bool,
        value: bool,
    },
    CStep {
        control: bool,
        /// 0 stops, 1-7 select the step size
        step: u8,
    },
    Char(char),
    Unsigned8(u8),
    Signed8(i8),
    Unsigned16(u16),
    Signed16(i16),
    Float16(f32),
    TimeOfDay {
        /// 1 = Monday .. 7 = Sunday, 0 = no day
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    },
    Date {
        day: u8,
        month: u8,
        /// Two digit year (0-99)
        year: u8,
    },
    Unsigned32(u32),
    Signed32(i32),
    Float32(f32),
}

impl DatapointValue {
    /// Datapoint type this value encodes as.
    pub const fn datapoint_type(&self) -> DatapointType {
        match self {
            Self::Bool(_) => DatapointType::Bool,
            Self::CValue { .. } => DatapointType::CValue,
            Self::CStep { .. } => DatapointType::CStep,
            Self::Char(_) => DatapointType::Char,
            Self::Unsigned8(_) => DatapointType::Unsigned8,
            Self::Signed8(_) => DatapointType::Signed8,
            Self::Unsigned16(_) => DatapointType::Unsigned16,
            Self::Signed16(_) => DatapointType::Signed16,
            Self::Float16(_) => DatapointType::Float16,
            Self::TimeOfDay { .. } => DatapointType::TimeOfDay,
            Self::Date { .. } => DatapointType::Date,
            Self::Unsigned32(_) => DatapointType::Unsigned32,
            Self::Signed32(_) => DatapointType::Signed32,
            Self::Float32(_) => DatapointType::Float32,
        }
    }

    /// Encode with the value's own datapoint type.
    ///
    /// Bit fields (step, time and date parts) are masked to their width.
    ///
    /// # Errors
    ///
    /// Fails for a `Float16` outside the KNX float range and for a `Char`
    /// outside ISO 8859-1.
    pub fn encode(&self) -> Result<DatapointBytes> {
        let out = match *self {
            Self::Bool(v) => bytes_of(&[u8::from(v)]),
            Self::CValue { control, value } => bytes_of(&[(u8::from(control) << 1) | u8::from(value)]),
            Self::CStep { control, step } => bytes_of(&[(u8::from(control) << 3) | (step & 0x07)]),
            Self::Char(c) => {
                let latin1 = u8::try_from(u32::from(c)).map_err(|_| KnxError::dpt_value_out_of_range())?;
                bytes_of(&[0, latin1])
            }
            Self::Unsigned8(v) => bytes_of(&[0, v]),
            Self::Signed8(v) => prefixed(v.to_be_bytes()),
            Self::Unsigned16(v) => prefixed(v.to_be_bytes()),
            Self::Signed16(v) => prefixed(v.to_be_bytes()),
            Self::Float16(v) => prefixed(encode_float16(v)?.to_be_bytes()),
            Self::TimeOfDay {
                day,
                hour,
                minute,
                second,
            } => bytes_of(&[0, ((day & 0x07) << 5) | (hour & 0x1F), minute & 0x3F, second & 0x3F]),
            Self::Date { day, month, year } => bytes_of(&[0, day & 0x1F, month & 0x0F, year & 0x7F]),
            Self::Unsigned32(v) => prefixed(v.to_be_bytes()),
            Self::Signed32(v) => prefixed(v.to_be_bytes()),
            Self::Float32(v) => prefixed(v.to_be_bytes()),
        };
        Ok(out)
    }
}

fn bytes_of(raw: &[u8]) -> DatapointBytes {
    let mut out = DatapointBytes::new();
    for &b in raw.iter().take(MAX_DATAPOINT_WIDTH) {
        let _ = out.push(b);
    }
    out
}

/// Prepend the unused short-data byte to a big-endian value.
fn prefixed<const N: usize>(be: [u8; N]) -> DatapointBytes {
    let mut out = DatapointBytes::new();
    let _ = out.push(0);
    for b in be.into_iter().take(MAX_DATAPOINT_WIDTH - 1) {
        let _ = out.push(b);
    }
    out
}

/// Encode `value` as datapoint type `kind`.
///
/// # Errors
///
/// Returns a `TypeMismatch` DPT error when `value` is not a `kind` value,
/// otherwise the errors of [`DatapointValue::encode`].
pub fn encode_datapoint(kind: DatapointType, value: &DatapointValue) -> Result<DatapointBytes> {
    if value.datapoint_type() != kind {
        return Err(KnxError::dpt_type_mismatch());
    }
    value.encode()
}

/// Decode a payload as datapoint type `kind`.
///
/// # Errors
///
/// Returns a `MalformedPayload` DPT error when `bytes` is not exactly
/// `kind.width()` long.
pub fn decode_datapoint(kind: DatapointType, bytes: &[u8]) -> Result<DatapointValue> {
    if bytes.len() != kind.width() {
        return Err(KnxError::malformed_payload());
    }

    let short = bytes[0] & 0x3F;
    let be2 = || [bytes[1], bytes[2]];
    let be4 = || [bytes[1], bytes[2], bytes[3], bytes[4]];

    let value = match kind {
        DatapointType::Bool => DatapointValue::Bool(short & 0x01 != 0),
        DatapointType::CValue => DatapointValue::CValue {
            control: short & 0x02 != 0,
            value: short & 0x01 != 0,
        },
        DatapointType::CStep => DatapointValue::CStep {
            control: short & 0x08 != 0,
            step: short & 0x07,
        },
        DatapointType::Char => DatapointValue::Char(char::from(bytes[1])),
        DatapointType::Unsigned8 => DatapointValue::Unsigned8(bytes[1]),
        DatapointType::Signed8 => DatapointValue::Signed8(i8::from_be_bytes([bytes[1]])),
        DatapointType::Unsigned16 => DatapointValue::Unsigned16(u16::from_be_bytes(be2())),
        DatapointType::Signed16 => DatapointValue::Signed16(i16::from_be_bytes(be2())),
        DatapointType::Float16 => DatapointValue::Float16(decode_float16(u16::from_be_bytes(be2()))),
        DatapointType::TimeOfDay => DatapointValue::TimeOfDay {
            day: bytes[1] >> 5,
            hour: bytes[1] & 0x1F,
            minute: bytes[2] & 0x3F,
            second: bytes[3] & 0x3F,
        },
        DatapointType::Date => DatapointValue::Date {
            day: bytes[1] & 0x1F,
            month: bytes[2] & 0x0F,
            year: bytes[3] & 0x7F,
        },
        DatapointType::Unsigned32 => DatapointValue::Unsigned32(u32::from_be_bytes(be4())),
        DatapointType::Signed32 => DatapointValue::Signed32(i32::from_be_bytes(be4())),
        DatapointType::Float32 => DatapointValue::Float32(f32::from_be_bytes(be4())),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsigned16_round_trip() {
        let bytes = encode_datapoint(DatapointType::Unsigned16, &DatapointValue::Unsigned16(42)).unwrap();
        assert_eq!(
            decode_datapoint(DatapointType::Unsigned16, &bytes).unwrap(),
            DatapointValue::Unsigned16(42)
        );
    }

    #[test]
    fn test_short_types_use_one_byte() {
        assert_eq!(DatapointValue::Bool(true).encode().unwrap().as_slice(), &[0x01]);
        assert_eq!(
            DatapointValue::CValue { control: true, value: false }.encode().unwrap().as_slice(),
            &[0x02]
        );
        assert_eq!(
            DatapointValue::CStep { control: true, step: 3 }.encode().unwrap().as_slice(),
            &[0x0B]
        );
    }

    #[test]
    fn test_short_data_ignores_apci_bits() {
        // 0x81 is what a GroupValueWrite(on) byte looks like before masking
        assert_eq!(
            decode_datapoint(DatapointType::Bool, &[0x81]).unwrap(),
            DatapointValue::Bool(true)
        );
    }

    #[test]
    fn test_wrong_width_is_malformed() {
        let err = decode_datapoint(DatapointType::Unsigned16, &[0x00, 0x2A]).unwrap_err();
        assert!(err.is_malformed_payload());
        assert!(decode_datapoint(DatapointType::Bool, &[]).unwrap_err().is_malformed_payload());
        assert!(decode_datapoint(DatapointType::Unsigned8, &[0, 1, 2]).is_err());
    }

    #[test]
    fn test_type_mismatch() {
        let err = encode_datapoint(DatapointType::Bool, &DatapointValue::Unsigned8(1)).unwrap_err();
        assert!(matches!(err, KnxError::Dpt(ref e) if e.is_type_mismatch()));
    }

    #[test]
    fn test_signed_values() {
        let bytes = DatapointValue::Signed16(-300).encode().unwrap();
        assert_eq!(bytes.as_slice(), &[0x00, 0xFE, 0xD4]);
        assert_eq!(
            DatapointType::Signed32.decode(&DatapointValue::Signed32(-1).encode().unwrap()).unwrap(),
            DatapointValue::Signed32(-1)
        );
        assert_eq!(
            DatapointType::Signed8.decode(&[0x00, 0x80]).unwrap(),
            DatapointValue::Signed8(-128)
        );
    }

    #[test]
    fn test_float16_payload() {
        let bytes = DatapointValue::Float16(21.5).encode().unwrap();
        assert_eq!(bytes.as_slice(), &[0x00, 0x0C, 0x33]);
        assert!(DatapointValue::Float16(1.0e9).encode().is_err());
    }

    #[test]
    fn test_float32_payload() {
        let bytes = DatapointValue::Float32(1.5).encode().unwrap();
        assert_eq!(bytes.as_slice(), &[0x00, 0x3F, 0xC0, 0x00, 0x00]);
    }

    #[test]
    fn test_time_of_day() {
        let value = DatapointValue::TimeOfDay {
            day: 3,
            hour: 14,
            minute: 30,
            second: 5,
        };
        let bytes = value.encode().unwrap();
        assert_eq!(bytes.as_slice(), &[0x00, 0x6E, 0x1E, 0x05]);
        assert_eq!(DatapointType::TimeOfDay.decode(&bytes).unwrap(), value);
    }

    #[test]
    fn test_date() {
        let value = DatapointValue::Date {
            day: 24,
            month: 12,
            year: 99,
        };
        let bytes = value.encode().unwrap();
        assert_eq!(bytes.as_slice(), &[0x00, 24, 12, 99]);
        assert_eq!(DatapointType::Date.decode(&bytes).unwrap(), value);
    }

    #[test]
    fn test_char_latin1() {
        assert_eq!(DatapointValue::Char('é').encode().unwrap().as_slice(), &[0x00, 0xE9]);
        assert!(DatapointValue::Char('€').encode().is_err());
        assert_eq!(
            DatapointType::Char.decode(&[0x00, b'K']).unwrap(),
            DatapointValue::Char('K')
        );
    }

    #[test]
    fn test_widths_match_encoding() {
        let samples = [
            DatapointValue::Bool(false),
            DatapointValue::Unsigned8(200),
            DatapointValue::Unsigned32(u32::MAX),
            DatapointValue::Date { day: 1, month: 1, year: 0 },
        ];
        for value in samples {
            assert_eq!(value.encode().unwrap().len(), value.datapoint_type().width());
        }
    }
}
