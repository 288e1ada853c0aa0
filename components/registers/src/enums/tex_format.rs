//! Field Enum: TEX_FORMAT
//!
//! Texture sampling hardware is out of scope for this core (spec §1); this
//! tag exists only so `REG_WRITE` payloads naming a texture format round
//! -trip through the register interface without a binding error.

use crate::encode::UnknownVariant;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TexFormat {
    Rgba8888 = 0,
    Rgb565 = 1,
    R8 = 2,
}

impl TexFormat {
    /// Decode a bit pattern into an encoded enum variant.
    ///
    /// # Errors
    /// Returns an error if the bit pattern does not match any encoded variants.
    pub const fn from_bits(bits: u8) -> Result<Self, UnknownVariant<u8>> {
        match bits {
            0 => Ok(Self::Rgba8888),
            1 => Ok(Self::Rgb565),
            2 => Ok(Self::R8),
            bits => Err(UnknownVariant::new(bits)),
        }
    }

    /// The bit pattern of the variant.
    #[must_use]
    pub const fn bits(&self) -> u8 {
        *self as u8
    }
}
