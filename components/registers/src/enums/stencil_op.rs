//! Field Enum: STENCIL_*_UPDATE

use crate::encode::UnknownVariant;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StencilOp {
    /// Keep the current stencil value.
    Keep = 0,
    /// Set to zero.
    Zero = 1,
    /// Replace with the stencil reference value.
    Replace = 2,
    /// Increment, clamping at the maximum representable value.
    IncrClamp = 3,
    /// Decrement, clamping at zero.
    DecrClamp = 4,
    /// Bitwise invert.
    Invert = 5,
    /// Increment, wrapping to zero on overflow.
    IncrWrap = 6,
    /// Decrement, wrapping to the maximum value on underflow.
    DecrWrap = 7,
}

impl StencilOp {
    /// Decode a bit pattern into an encoded enum variant.
    ///
    /// # Errors
    /// Returns an error if the bit pattern does not match any encoded variants.
    pub const fn from_bits(bits: u8) -> Result<Self, UnknownVariant<u8>> {
        match bits {
            0 => Ok(Self::Keep),
            1 => Ok(Self::Zero),
            2 => Ok(Self::Replace),
            3 => Ok(Self::IncrClamp),
            4 => Ok(Self::DecrClamp),
            5 => Ok(Self::Invert),
            6 => Ok(Self::IncrWrap),
            7 => Ok(Self::DecrWrap),
            bits => Err(UnknownVariant::new(bits)),
        }
    }

    /// The bit pattern of the variant.
    #[must_use]
    pub const fn bits(&self) -> u8 {
        *self as u8
    }
}
