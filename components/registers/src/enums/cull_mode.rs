//! Field Enum: CULLING

use crate::encode::UnknownVariant;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CullMode {
    /// Cull nothing; rasterize every triangle regardless of facing.
    None = 0,
    /// Cull front-facing triangles.
    Front = 1,
    /// Cull back-facing triangles.
    Back = 2,
    /// Cull every triangle, front or back.
    FrontAndBack = 3,
}

impl CullMode {
    /// Decode a bit pattern into an encoded enum variant.
    ///
    /// # Errors
    /// Returns an error if the bit pattern does not match any encoded variants.
    pub const fn from_bits(bits: u8) -> Result<Self, UnknownVariant<u8>> {
        match bits {
            0 => Ok(Self::None),
            1 => Ok(Self::Front),
            2 => Ok(Self::Back),
            3 => Ok(Self::FrontAndBack),
            bits => Err(UnknownVariant::new(bits)),
        }
    }

    /// The bit pattern of the variant.
    #[must_use]
    pub const fn bits(&self) -> u8 {
        *self as u8
    }
}
