//! IEEE 754 binary16 conversions with directed rounding.
//!
//! The serialized tree stores node bounds as half floats. Minimum planes
//! round toward negative infinity and maximum planes toward positive
//! infinity so the decoded box always contains the box that was encoded.
//! The registry `half` crate only offers round-to-nearest, which would
//! break that containment guarantee, hence the hand-written conversions.

use glam::Vec4;

/// Largest finite half float value.
pub const HALF_FLT_MAX: f32 = 65504.0;

/// Bit pattern of the largest finite half float.
pub const HALF_FLT_MAX_BITS: u16 = 0x7bff;

/// Converts to half precision truncating toward zero.
/// Returns the truncated bits and whether the conversion was exact.
fn float_to_half_trunc(value: f32) -> (u16, bool) {
    debug_assert!(!value.is_nan(), "Bounds must not be NaN.");
    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exp = ((bits >> 23) & 0xff) as i32;
    let man = bits & 0x007f_ffff;

    if exp == 0xff {
        // Infinity maps to infinity.
        return (sign | 0x7c00, true);
    }
    if exp == 0 {
        // Zero is exact; f32 subnormals are far below the half subnormal range.
        return (sign, man == 0);
    }

    let e = exp - 127;
    let m = man | 0x0080_0000;
    let half_exp = e + 15;

    if half_exp >= 31 {
        // Beyond the half range; truncation toward zero lands on the largest finite half.
        return (sign | HALF_FLT_MAX_BITS, false);
    }
    if half_exp <= 0 {
        // Half subnormal range: the value is a count of 2^-24 units.
        if e < -24 {
            return (sign, false);
        }
        let shift = (-(e + 1)) as u32;
        let half_man = (m >> shift) as u16;
        let exact = m & ((1u32 << shift) - 1) == 0;
        return (sign | half_man, exact);
    }

    let half_man = (man >> 13) as u16;
    let exact = man & 0x1fff == 0;
    (sign | ((half_exp as u16) << 10) | half_man, exact)
}

/// Converts to half precision rounding toward positive infinity.
#[inline]
pub fn to_half_float_round_up(value: f32) -> u16 {
    let (bits, exact) = float_to_half_trunc(value);
    // Incrementing the bit pattern moves the magnitude away from zero,
    // which is toward positive infinity for positive values.
    if !exact && value > 0.0 {
        bits + 1
    } else {
        bits
    }
}

/// Converts to half precision rounding toward negative infinity.
#[inline]
pub fn to_half_float_round_down(value: f32) -> u16 {
    let (bits, exact) = float_to_half_trunc(value);
    if !exact && value < 0.0 {
        bits + 1
    } else {
        bits
    }
}

/// Converts a half float bit pattern to single precision.
#[inline]
pub fn half_to_float(half: u16) -> f32 {
    let sign = ((half & 0x8000) as u32) << 16;
    let exp = ((half >> 10) & 0x1f) as u32;
    let man = (half & 0x03ff) as u32;

    if exp == 0x1f {
        return f32::from_bits(sign | 0x7f80_0000 | (man << 13));
    }
    if exp == 0 {
        if man == 0 {
            return f32::from_bits(sign);
        }
        // Subnormal: a count of 2^-24 units.
        let magnitude = man as f32 * (1.0 / 16_777_216.0);
        return if sign != 0 { -magnitude } else { magnitude };
    }
    f32::from_bits(sign | ((exp + 112) << 23) | (man << 13))
}

/// Decodes four consecutive little-endian half floats into a `Vec4`.
#[inline(always)]
pub fn half_to_float4(bytes: &[u8]) -> Vec4 {
    Vec4::new(
        half_to_float(u16::from_le_bytes([bytes[0], bytes[1]])),
        half_to_float(u16::from_le_bytes([bytes[2], bytes[3]])),
        half_to_float(u16::from_le_bytes([bytes[4], bytes[5]])),
        half_to_float(u16::from_le_bytes([bytes[6], bytes[7]])),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_values_round_trip() {
        for value in [
            0.0f32, -0.0, 1.0, -1.0, 0.5, 2.25, -2.25, 65504.0, -65504.0, 0.00006103515625, // 2^-14
            f32::INFINITY,
            f32::NEG_INFINITY,
        ] {
            let up = to_half_float_round_up(value);
            let down = to_half_float_round_down(value);
            assert_eq!(up, down, "representable value {value} should be exact");
            assert_eq!(half_to_float(up), value);
        }
    }

    #[test]
    fn directed_rounding_brackets_the_input() {
        let values = [
            1.0000001f32,
            -1.0000001,
            3.14159265,
            -3.14159265,
            1.0e-6,
            -1.0e-6,
            1.0e-30,
            -1.0e-30,
            12345.678,
            -12345.678,
            70000.0,
            -70000.0,
            0.1,
            -0.1,
        ];
        for value in values {
            let lower = half_to_float(to_half_float_round_down(value));
            let upper = half_to_float(to_half_float_round_up(value));
            assert!(lower <= value, "round down {lower} > {value}");
            assert!(upper >= value, "round up {upper} < {value}");
        }
    }

    #[test]
    fn overflow_saturates_conservatively() {
        assert_eq!(half_to_float(to_half_float_round_up(70000.0)), f32::INFINITY);
        assert_eq!(half_to_float(to_half_float_round_down(70000.0)), HALF_FLT_MAX);
        assert_eq!(half_to_float(to_half_float_round_down(-70000.0)), f32::NEG_INFINITY);
        assert_eq!(half_to_float(to_half_float_round_up(-70000.0)), -HALF_FLT_MAX);
    }

    #[test]
    fn subnormal_halves_decode() {
        // Smallest positive subnormal half.
        assert_eq!(half_to_float(1), 1.0 / 16_777_216.0);
        // Largest subnormal half.
        assert_eq!(half_to_float(0x03ff), 1023.0 / 16_777_216.0);
    }

    #[test]
    fn four_wide_decode() {
        let mut bytes = Vec::new();
        for value in [1.0f32, -2.0, 0.25, 8.0] {
            bytes.extend_from_slice(&to_half_float_round_down(value).to_le_bytes());
        }
        assert_eq!(half_to_float4(&bytes), Vec4::new(1.0, -2.0, 0.25, 8.0));
    }
}
