use crate::enums::{CompareFunc, CullMode, FaceMode, Primitive, StencilOp, StreamDataType, TexFormat};

/// A vertex attribute's source binding: either a stream index or
/// `Inactive` (spec §6: `VERTEX_ATTRIBUTE_MAP[a]:stream_id_or_INACTIVE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AttributeBinding {
    Inactive,
    Stream(u32),
}

/// The register payload tagged union (spec §6): "Payload is a tagged union:
/// `uint|int|float|vec4|compare_fn|cull_mode|face_mode|stencil_op|primitive
/// |stream_data|tex_format|bool|address`."
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RegisterPayload {
    UInt(u32),
    Int(i32),
    Float(f32),
    Vec4([f32; 4]),
    CompareFn(CompareFunc),
    CullMode(CullMode),
    FaceMode(FaceMode),
    StencilOp(StencilOp),
    Primitive(Primitive),
    StreamData(StreamDataType),
    TexFormat(TexFormat),
    Bool(bool),
    /// An opaque GPU memory address (spec GLOSSARY: "Memory descriptor").
    Address(u32),
    /// Extension of `address` for the `VERTEX_ATTRIBUTE_MAP` tag, which
    /// names a stream id or the `INACTIVE` sentinel rather than a raw
    /// address.
    AttributeBinding(AttributeBinding),
}

macro_rules! payload_accessor {
    ($name:ident, $variant:ident, $ty:ty) => {
        /// Extract this payload as its expected variant, or `None` if the
        /// tag does not match (spec §7.4: a mismatched tag is a binding
        /// error at the call site, which the caller turns into
        /// `SimError::InconsistentBinding`).
        pub fn $name(&self) -> Option<$ty> {
            match self {
                RegisterPayload::$variant(v) => Some(*v),
                _ => None,
            }
        }
    };
}

impl RegisterPayload {
    payload_accessor!(as_uint, UInt, u32);
    payload_accessor!(as_int, Int, i32);
    payload_accessor!(as_float, Float, f32);
    payload_accessor!(as_vec4, Vec4, [f32; 4]);
    payload_accessor!(as_compare_fn, CompareFn, CompareFunc);
    payload_accessor!(as_cull_mode, CullMode, CullMode);
    payload_accessor!(as_face_mode, FaceMode, FaceMode);
    payload_accessor!(as_stencil_op, StencilOp, StencilOp);
    payload_accessor!(as_primitive, Primitive, Primitive);
    payload_accessor!(as_stream_data, StreamData, StreamDataType);
    payload_accessor!(as_tex_format, TexFormat, TexFormat);
    payload_accessor!(as_bool, Bool, bool);
    payload_accessor!(as_address, Address, u32);
    payload_accessor!(as_attribute_binding, AttributeBinding, AttributeBinding);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessor_returns_none_on_tag_mismatch() {
        let payload = RegisterPayload::UInt(7);
        assert_eq!(payload.as_uint(), Some(7));
        assert_eq!(payload.as_bool(), None);
    }
}
