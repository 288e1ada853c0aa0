//! Primitive assembly: turns an incoming sequence of committed vertices
//! into ordered triangle triples per `PRIMITIVE`'s topology.
//!
//! `Points`, `Lines`, `LineStrip`, and `LineLoop` are not rasterized by
//! this core: a draw naming one of them is dropped with a logged
//! warning rather than rejected outright, matching
//! [`Primitive::is_supported`].

use log::warn;
use rsim_rasterizer::vertex::Vertex;
use rsim_registers::Primitive;

/// Accumulates committed vertices in submission order and yields
/// complete triangle triples as soon as enough are available, honoring
/// `TriangleStrip`'s alternating winding and `TriangleFan`'s shared
/// first vertex.
pub struct PrimitiveAssembler {
    primitive: Primitive,
    supported: bool,
    pending: Vec<Vertex>,
    strip_parity: usize,
}

impl PrimitiveAssembler {
    pub fn new(primitive: Primitive) -> Self {
        let supported = primitive.is_supported();
        if !supported {
            warn!("primitive {primitive:?} is not rasterized by this core; draw will be dropped");
        }
        Self {
            primitive,
            supported,
            pending: Vec::new(),
            strip_parity: 0,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.supported
    }

    /// Feeds one more committed vertex, returning every new triangle
    /// triple this vertex completes (in winding order, ready for
    /// `setup_triangle`).
    pub fn push(&mut self, vertex: Vertex) -> Vec<[Vertex; 3]> {
        if !self.supported {
            return Vec::new();
        }

        match self.primitive {
            Primitive::Triangles => {
                self.pending.push(vertex);
                if self.pending.len() == 3 {
                    let tri = [self.pending[0], self.pending[1], self.pending[2]];
                    self.pending.clear();
                    vec![tri]
                } else {
                    Vec::new()
                }
            }
            Primitive::TriangleStrip => {
                self.pending.push(vertex);
                if self.pending.len() < 3 {
                    return Vec::new();
                }
                let n = self.pending.len();
                let (a, b, c) = (self.pending[n - 3], self.pending[n - 2], self.pending[n - 1]);
                // Every other triangle in a strip has its winding
                // reversed to keep the front face consistent.
                let tri = if self.strip_parity % 2 == 0 { [a, b, c] } else { [b, a, c] };
                self.strip_parity += 1;
                vec![tri]
            }
            Primitive::TriangleFan => {
                self.pending.push(vertex);
                if self.pending.len() < 3 {
                    return Vec::new();
                }
                let anchor = self.pending[0];
                let n = self.pending.len();
                vec![[anchor, self.pending[n - 2], self.pending[n - 1]]]
            }
            Primitive::Points | Primitive::Lines | Primitive::LineStrip | Primitive::LineLoop => Vec::new(),
        }
    }

    pub fn reset(&mut self, primitive: Primitive) {
        self.primitive = primitive;
        self.supported = primitive.is_supported();
        if !self.supported {
            warn!("primitive {primitive:?} is not rasterized by this core; draw will be dropped");
        }
        self.pending.clear();
        self.strip_parity = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: f32) -> Vertex {
        Vertex::from_position(x, 0.0, 0.0, 1.0)
    }

    #[test]
    fn triangles_emits_one_triple_per_three_vertices() {
        let mut asm = PrimitiveAssembler::new(Primitive::Triangles);
        assert!(asm.push(v(0.0)).is_empty());
        assert!(asm.push(v(1.0)).is_empty());
        let tris = asm.push(v(2.0));
        assert_eq!(tris.len(), 1);
        assert_eq!(tris[0][2].position()[0], 2.0);
    }

    #[test]
    fn triangle_strip_alternates_winding() {
        let mut asm = PrimitiveAssembler::new(Primitive::TriangleStrip);
        asm.push(v(0.0));
        asm.push(v(1.0));
        let first = asm.push(v(2.0));
        assert_eq!(first[0].map(|v| v.position()[0]), [0.0, 1.0, 2.0]);
        let second = asm.push(v(3.0));
        // parity flips: b, a, c relative to the new window (1,2,3)
        assert_eq!(second[0].map(|v| v.position()[0]), [2.0, 1.0, 3.0]);
    }

    #[test]
    fn triangle_fan_shares_first_vertex() {
        let mut asm = PrimitiveAssembler::new(Primitive::TriangleFan);
        asm.push(v(0.0));
        asm.push(v(1.0));
        let first = asm.push(v(2.0));
        assert_eq!(first[0].map(|v| v.position()[0]), [0.0, 1.0, 2.0]);
        let second = asm.push(v(3.0));
        assert_eq!(second[0].map(|v| v.position()[0]), [0.0, 2.0, 3.0]);
    }

    #[test]
    fn unsupported_primitive_yields_no_triangles() {
        let mut asm = PrimitiveAssembler::new(Primitive::Points);
        assert!(!asm.is_supported());
        assert!(asm.push(v(0.0)).is_empty());
    }
}
