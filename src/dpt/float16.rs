//! KNX 2-byte floating point (DPT 9.xxx).
//!
//! ```text
//! bit 15    : sign
//! bits 14-11: exponent E (0-15)
//! bits 10-0 : mantissa
//! value = 0.01 * M * 2^E
//! ```
//!
//! `M` is the 12-bit two's complement number formed by the sign bit and the
//! 11 mantissa bits, so it spans -2048..=2047. This is not IEEE 754 half precision.

use crate::error::{KnxError, Result};

/// Largest encodable value (2047 * 2^15 * 0.01).
pub const FLOAT16_MAX: f32 = 670_760.96;
/// Smallest encodable value (-2048 * 2^15 * 0.01).
pub const FLOAT16_MIN: f32 = -671_088.64;

const MANTISSA_MIN: i32 = -2048;
const MANTISSA_MAX: i32 = 2047;

/// Decode a raw 16-bit KNX float.
pub fn decode_float16(raw: u16) -> f32 {
    let exponent = (raw >> 11) & 0x0F;
    let mut mantissa = i32::from(raw & 0x07FF);
    if raw & 0x8000 != 0 {
        mantissa -= 2048;
    }
    0.01 * mantissa as f32 * (1u32 << exponent) as f32
}

/// Encode a value as a raw 16-bit KNX float.
///
/// The smallest exponent that fits the mantissa is chosen, which keeps the
/// 0.01 resolution for values up to 20.47.
///
/// # Errors
///
/// Returns a DPT error if the value is not finite or outside
/// [`FLOAT16_MIN`]..=[`FLOAT16_MAX`].
pub fn encode_float16(value: f32) -> Result<u16> {
    if !value.is_finite() {
        return Err(KnxError::dpt_value_out_of_range());
    }

    let mut scaled = value * 100.0;
    let mut exponent = 0u16;
    while !(MANTISSA_MIN as f32..=MANTISSA_MAX as f32).contains(&scaled) && exponent < 15 {
        scaled /= 2.0;
        exponent += 1;
    }

    // Round half away from zero; no_std has no f32::round
    let mut mantissa = if scaled >= 0.0 {
        (scaled + 0.5) as i32
    } else {
        (scaled - 0.5) as i32
    };

    // Rounding can push 2047.6 up to 2048
    if mantissa > MANTISSA_MAX && exponent < 15 {
        mantissa /= 2;
        exponent += 1;
    }
    if !(MANTISSA_MIN..=MANTISSA_MAX).contains(&mantissa) {
        return Err(KnxError::dpt_value_out_of_range());
    }

    let sign = if mantissa < 0 { 0x8000 } else { 0 };
    Ok(sign | (exponent << 11) | (mantissa as u16 & 0x07FF))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f32, b: f32, epsilon: f32) {
        assert!((a - b).abs() < epsilon, "expected {b}, got {a}");
    }

    #[test]
    fn test_zero() {
        assert_eq!(encode_float16(0.0).unwrap(), 0x0000);
        assert_close(decode_float16(0x0000), 0.0, f32::EPSILON);
    }

    #[test]
    fn test_small_value_keeps_exponent_zero() {
        // 10.0 -> M = 1000, E = 0
        assert_eq!(encode_float16(10.0).unwrap(), 0x03E8);
    }

    #[test]
    fn test_room_temperature() {
        // 21.5 -> 2150 does not fit, E = 1, M = 1075
        let raw = encode_float16(21.5).unwrap();
        assert_eq!(raw, 0x0C33);
        assert_close(decode_float16(raw), 21.5, 0.01);
    }

    #[test]
    fn test_negative() {
        // -5.0 -> M = -500, 12-bit two's complement 0xE0C
        let raw = encode_float16(-5.0).unwrap();
        assert_eq!(raw, 0x860C);
        assert_close(decode_float16(raw), -5.0, 0.01);
    }

    #[test]
    fn test_decode_bus_values() {
        // E = 1, M = 1050
        assert_close(decode_float16(0x0C1A), 21.0, 0.001);
        // E = 1, M = 1024
        assert_close(decode_float16(0x0C00), 20.48, 0.001);
        // 0x87F8: sign set, E = 0, M = 0x7F8 - 2048 = -8
        assert_close(decode_float16(0x87F8), -0.08, 0.001);
    }

    #[test]
    fn test_extremes() {
        assert_close(decode_float16(encode_float16(FLOAT16_MAX).unwrap()), FLOAT16_MAX, 1.0);
        assert_close(decode_float16(encode_float16(FLOAT16_MIN).unwrap()), FLOAT16_MIN, 1.0);
    }

    #[test]
    fn test_out_of_range() {
        assert!(encode_float16(700_000.0).is_err());
        assert!(encode_float16(-700_000.0).is_err());
        assert!(encode_float16(f32::NAN).is_err());
        assert!(encode_float16(f32::INFINITY).is_err());
    }

    #[test]
    fn test_large_value_precision() {
        let raw = encode_float16(5000.0).unwrap();
        assert_close(decode_float16(raw), 5000.0, 5.0);
    }
}
