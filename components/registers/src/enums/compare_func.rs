//! Field Enum: DEPTH_FUNCTION / STENCIL_FUNCTION
//!
//! Shared between the depth test and the stencil test; the Hierarchical-Z
//! early-cull path only accelerates `Less`, `Lequal`, and `Equal`
//! (spec §4.3) — the others still apply the per-fragment test downstream,
//! they simply aren't HZ-accelerated.

use crate::encode::UnknownVariant;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CompareFunc {
    /// Never pass.
    Never = 0,
    /// Less than (`<`).
    Less = 1,
    /// Less than or equal (`<=`).
    Lequal = 2,
    /// Equal (`=`).
    Equal = 3,
    /// Greater than or equal (`>=`).
    Gequal = 4,
    /// Greater than (`>`).
    Greater = 5,
    /// Not equal (`!=`).
    Notequal = 6,
    /// Always pass.
    Always = 7,
}

impl CompareFunc {
    /// Decode a bit pattern into an encoded enum variant.
    ///
    /// # Errors
    /// Returns an error if the bit pattern does not match any encoded variants.
    pub const fn from_bits(bits: u8) -> Result<Self, UnknownVariant<u8>> {
        match bits {
            0 => Ok(Self::Never),
            1 => Ok(Self::Less),
            2 => Ok(Self::Lequal),
            3 => Ok(Self::Equal),
            4 => Ok(Self::Gequal),
            5 => Ok(Self::Greater),
            6 => Ok(Self::Notequal),
            7 => Ok(Self::Always),
            bits => Err(UnknownVariant::new(bits)),
        }
    }

    /// The bit pattern of the variant.
    #[must_use]
    pub const fn bits(&self) -> u8 {
        *self as u8
    }

    /// True if the Hierarchical-Z stage (spec §4.3/§4.6) can accelerate
    /// this compare function. `Equal` is accelerated conservatively as
    /// `sZ <= bZ` (spec §9 Open Question, resolved: intended).
    pub const fn is_hz_accelerated(&self) -> bool {
        matches!(self, Self::Less | Self::Lequal | Self::Equal)
    }
}
