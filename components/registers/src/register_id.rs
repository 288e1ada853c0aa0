//! Register identifiers, grouped per spec §6. Registers marked with a
//! trailing note take a `subreg` index (attribute index or stream index);
//! others ignore `subreg`.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RegisterId {
    // --- Viewport ---
    ViewportIniX,
    ViewportIniY,
    ViewportWidth,
    ViewportHeight,

    // --- Scissor ---
    ScissorTest,
    ScissorIniX,
    ScissorIniY,
    ScissorWidth,
    ScissorHeight,

    // --- Depth ---
    DepthTest,
    DepthFunction,
    DepthMask,
    DepthRangeNear,
    DepthRangeFar,
    D3d9DepthRange,
    DepthSlopeFactor,
    DepthUnitOffset,
    ZBufferClear,
    ZBufferBitPrecision,

    // --- Stencil ---
    StencilTest,
    StencilFunctionFront,
    StencilFunctionBack,
    StencilReferenceFront,
    StencilReferenceBack,
    StencilCompareMaskFront,
    StencilCompareMaskBack,
    StencilFailUpdateFront,
    StencilFailUpdateBack,
    StencilDepthFailUpdateFront,
    StencilDepthFailUpdateBack,
    StencilDepthPassUpdateFront,
    StencilDepthPassUpdateBack,
    StencilUpdateMask,
    StencilBufferClear,

    // --- Rasterizer ---
    Culling,
    FaceMode,
    D3d9RasterizationRules,
    D3d9PixelCoordinates,
    HierarchicalZ,
    Multisampling,
    MsaaSamples,
    /// Topology the next `DRAW` assembles committed vertices into (spec
    /// §6 GLOSSARY; carried as ordinary pipeline state rather than a
    /// `DRAW` command argument, same as every other draw-time register).
    Primitive,

    // --- Interpolation (subreg = attribute index, 0..MAX_VERTEX_ATTRIBUTES) ---
    Interpolation,
    VertexOutputAttribute,
    FragmentInputAttributes,
    VertexAttributeMap,
    VertexAttributeDefaultValue,

    // --- Streams (subreg = stream index) ---
    StreamAddress,
    StreamStride,
    StreamData,
    StreamElements,
    StreamFrequency,
    D3d9ColorStream,
    IndexMode,
    IndexStream,
    StreamStart,
    StreamCount,
    StreamInstances,
    AttributeLoadBypass,

    // --- Display ---
    DisplayXRes,
    DisplayYRes,
}

impl RegisterId {
    /// True for registers that are indexed by a per-attribute or
    /// per-stream `subreg`.
    pub const fn takes_subreg(&self) -> bool {
        matches!(
            self,
            Self::Interpolation
                | Self::VertexOutputAttribute
                | Self::FragmentInputAttributes
                | Self::VertexAttributeMap
                | Self::VertexAttributeDefaultValue
                | Self::StreamAddress
                | Self::StreamStride
                | Self::StreamData
                | Self::StreamElements
                | Self::StreamFrequency
                | Self::D3d9ColorStream
        )
    }
}
