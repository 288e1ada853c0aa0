//! Field Enum: FACEMODE

use crate::encode::UnknownVariant;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FaceMode {
    /// Clockwise winding is front-facing.
    Cw = 0,
    /// Counter-clockwise winding is front-facing.
    Ccw = 1,
}

impl FaceMode {
    /// Decode a bit pattern into an encoded enum variant.
    ///
    /// # Errors
    /// Returns an error if the bit pattern does not match any encoded variants.
    pub const fn from_bits(bits: u8) -> Result<Self, UnknownVariant<u8>> {
        match bits {
            0 => Ok(Self::Cw),
            1 => Ok(Self::Ccw),
            bits => Err(UnknownVariant::new(bits)),
        }
    }

    /// The bit pattern of the variant.
    #[must_use]
    pub const fn bits(&self) -> u8 {
        *self as u8
    }
}
