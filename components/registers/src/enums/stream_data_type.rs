//! Field Enum: STREAM_DATA
//!
//! Per-element encoding of a vertex attribute stream (spec §6 "Vertex
//! attribute binary formats"). [`StreamDataType::byte_width`] and
//! [`StreamDataType::decode_to_f32`] give the exact byte width and
//! float-conversion rule for each tag.

use crate::encode::UnknownVariant;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StreamDataType {
    Unorm8 = 0,
    Snorm8 = 1,
    Unorm16 = 2,
    Snorm16 = 3,
    Unorm32 = 4,
    Snorm32 = 5,
    Float16 = 6,
    Float32 = 7,
    Uint8 = 8,
    Sint8 = 9,
    Uint16 = 10,
    Sint16 = 11,
    Uint32 = 12,
    Sint32 = 13,
}

impl StreamDataType {
    /// Decode a bit pattern into an encoded enum variant.
    ///
    /// # Errors
    /// Returns an error if the bit pattern does not match any encoded variants.
    pub const fn from_bits(bits: u8) -> Result<Self, UnknownVariant<u8>> {
        match bits {
            0 => Ok(Self::Unorm8),
            1 => Ok(Self::Snorm8),
            2 => Ok(Self::Unorm16),
            3 => Ok(Self::Snorm16),
            4 => Ok(Self::Unorm32),
            5 => Ok(Self::Snorm32),
            6 => Ok(Self::Float16),
            7 => Ok(Self::Float32),
            8 => Ok(Self::Uint8),
            9 => Ok(Self::Sint8),
            10 => Ok(Self::Uint16),
            11 => Ok(Self::Sint16),
            12 => Ok(Self::Uint32),
            13 => Ok(Self::Sint32),
            bits => Err(UnknownVariant::new(bits)),
        }
    }

    /// The bit pattern of the variant.
    #[must_use]
    pub const fn bits(&self) -> u8 {
        *self as u8
    }

    /// Byte width of a single element of this type.
    pub const fn byte_width(&self) -> u32 {
        match self {
            Self::Unorm8 | Self::Snorm8 | Self::Uint8 | Self::Sint8 => 1,
            Self::Unorm16 | Self::Snorm16 | Self::Float16 | Self::Uint16 | Self::Sint16 => 2,
            Self::Unorm32 | Self::Snorm32 | Self::Float32 | Self::Uint32 | Self::Sint32 => 4,
        }
    }

    /// True for the integer (non-normalized) tags, whose values are
    /// zero/sign-extended to `i32` rather than converted to a float
    /// (spec §6).
    pub const fn is_raw_integer(&self) -> bool {
        matches!(
            self,
            Self::Uint8 | Self::Sint8 | Self::Uint16 | Self::Sint16 | Self::Uint32 | Self::Sint32
        )
    }

    /// Decodes one element's little-endian bytes into a float component,
    /// per the exact per-tag rule (spec §6 "Vertex attribute binary
    /// formats"). `bytes` must be exactly `byte_width()` long.
    ///
    /// # Panics
    /// Panics if called on a raw-integer tag ([`Self::is_raw_integer`]) or
    /// if `bytes` is the wrong length; callers route those through
    /// [`Self::decode_to_i32`] instead.
    pub fn decode_to_f32(&self, bytes: &[u8]) -> f32 {
        assert_eq!(bytes.len() as u32, self.byte_width());
        match self {
            Self::Unorm8 => bytes[0] as f32 / 255.0,
            Self::Snorm8 => (bytes[0] as i8 as f32 / 127.0).max(-1.0),
            Self::Unorm16 => u16::from_le_bytes([bytes[0], bytes[1]]) as f32 / 65535.0,
            Self::Snorm16 => (i16::from_le_bytes([bytes[0], bytes[1]]) as f32 / 32767.0).max(-1.0),
            Self::Unorm32 => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32 / (u32::MAX as f32),
            Self::Snorm32 => {
                (i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32 / (i32::MAX as f32)).max(-1.0)
            }
            Self::Float16 => f16_to_f32(u16::from_le_bytes([bytes[0], bytes[1]])),
            Self::Float32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            Self::Uint8 | Self::Sint8 | Self::Uint16 | Self::Sint16 | Self::Uint32 | Self::Sint32 => {
                panic!("decode_to_f32 called on a raw-integer stream data type")
            }
        }
    }

    /// Decodes one element's little-endian bytes by zero/sign-extending
    /// to `i32`, for the raw-integer tags (spec §6).
    ///
    /// # Panics
    /// Panics if called on a normalized or floating-point tag, or if
    /// `bytes` is the wrong length.
    pub fn decode_to_i32(&self, bytes: &[u8]) -> i32 {
        assert_eq!(bytes.len() as u32, self.byte_width());
        match self {
            Self::Uint8 => bytes[0] as i32,
            Self::Sint8 => bytes[0] as i8 as i32,
            Self::Uint16 => u16::from_le_bytes([bytes[0], bytes[1]]) as i32,
            Self::Sint16 => i16::from_le_bytes([bytes[0], bytes[1]]) as i32,
            Self::Uint32 => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as i32,
            Self::Sint32 => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            _ => panic!("decode_to_i32 called on a normalized or floating-point stream data type"),
        }
    }
}

/// IEEE 754 binary16 to binary32, via the exponent/mantissa bit layout.
fn f16_to_f32(bits: u16) -> f32 {
    let sign = ((bits >> 15) & 0x1) as u32;
    let exponent = ((bits >> 10) & 0x1f) as u32;
    let mantissa = (bits & 0x3ff) as u32;

    let bits32 = if exponent == 0 {
        if mantissa == 0 {
            sign << 31
        } else {
            // Subnormal half: normalize by shifting until the leading bit
            // clears the implicit-one position, adjusting the exponent.
            let mut e = -1i32;
            let mut m = mantissa;
            while m & 0x400 == 0 {
                m <<= 1;
                e -= 1;
            }
            m &= 0x3ff;
            let exp32 = (e + 127 - 15 + 1) as u32;
            (sign << 31) | (exp32 << 23) | (m << 13)
        }
    } else if exponent == 0x1f {
        (sign << 31) | (0xff << 23) | (mantissa << 13)
    } else {
        let exp32 = exponent - 15 + 127;
        (sign << 31) | (exp32 << 23) | (mantissa << 13)
    };

    f32::from_bits(bits32)
}

#[cfg(test)]
mod decode_tests {
    use super::*;

    #[test]
    fn unorm8_maps_full_range() {
        assert_eq!(StreamDataType::Unorm8.decode_to_f32(&[255]), 1.0);
        assert_eq!(StreamDataType::Unorm8.decode_to_f32(&[0]), 0.0);
    }

    #[test]
    fn snorm8_clamps_minimum_to_negative_one() {
        assert_eq!(StreamDataType::Snorm8.decode_to_f32(&[0x80]), -1.0);
        assert_eq!(StreamDataType::Snorm8.decode_to_f32(&[0x7f]), 1.0);
    }

    #[test]
    fn float32_is_identity() {
        let bytes = 1.5f32.to_le_bytes();
        assert_eq!(StreamDataType::Float32.decode_to_f32(&bytes), 1.5);
    }

    #[test]
    fn float16_decodes_one_point_five() {
        // binary16 1.5 = 0x3E00 (sign=0, exp=15, mantissa=0x200)
        assert_eq!(StreamDataType::Float16.decode_to_f32(&[0x00, 0x3e]), 1.5);
    }

    #[test]
    fn sint16_sign_extends() {
        assert_eq!(StreamDataType::Sint16.decode_to_i32(&(-5i16).to_le_bytes()), -5);
    }

    #[test]
    fn uint8_zero_extends() {
        assert_eq!(StreamDataType::Uint8.decode_to_i32(&[200]), 200);
    }
}
