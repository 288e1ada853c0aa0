use rsim_registers::MAX_VERTEX_ATTRIBUTES;

/// A single vertex attribute: a 4-lane float (spec §3). Attribute 0 is
/// always the post-projection position `(x, y, z, w)`, `w` carrying the
/// reciprocal homogeneous coordinate used for perspective-correct
/// interpolation.
pub type AttributeValue = [f32; 4];

/// A vertex's full attribute set, as assembled by the streamer and
/// consumed by triangle setup.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vertex {
    pub attrs: [AttributeValue; MAX_VERTEX_ATTRIBUTES],
}

impl Vertex {
    pub const ZERO: Vertex = Vertex {
        attrs: [[0.0; 4]; MAX_VERTEX_ATTRIBUTES],
    };

    /// Convenience constructor setting only the position attribute
    /// (attribute 0); all others default to zero.
    pub fn from_position(x: f32, y: f32, z: f32, w: f32) -> Self {
        let mut v = Self::ZERO;
        v.attrs[0] = [x, y, z, w];
        v
    }

    pub fn position(&self) -> AttributeValue {
        self.attrs[0]
    }
}
