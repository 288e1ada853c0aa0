//! [`FragmentInterpolator`]: barycentric attribute interpolation and MSAA
//! sample coverage (spec §4.5). Grounded on
//! `original_source/arch/funcmodel/Rasterizer/cmInterpolator.h`.

use fixedpt::SubpixelFormat;
use rsim_registers::MAX_VERTEX_ATTRIBUTES;

use crate::setup::SetupTriangle;
use crate::stamp::{Fragment, MAX_SAMPLES};

/// Per-attribute interpolation mode (spec §4.5, §6
/// `INTERPOLATION[attr]:bool`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterpolationMode {
    /// Perspective-correct: weights scaled by each vertex's `1/w`.
    Perspective,
    /// Linear in screen space, ignoring perspective.
    Linear,
    /// Copied verbatim from the provoking vertex.
    Flat,
}

/// Which triangle corner supplies flat-shaded attribute values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProvokingVertex {
    First,
    Second,
    Third,
}

/// Construction-time interpolator configuration.
#[derive(Clone, Copy, Debug)]
pub struct InterpolatorConfig {
    pub modes: [InterpolationMode; MAX_VERTEX_ATTRIBUTES],
    pub provoking_vertex: ProvokingVertex,
    pub near_depth: f32,
    pub far_depth: f32,
    /// Depth-buffer integer precision in bits (spec §6: 16 or 24).
    pub depth_bits: u32,
    /// `None` disables MSAA; otherwise the configured sample count
    /// (2/4/6/8) and its fixed per-sample offset table.
    pub msaa_samples: Option<u32>,
}

impl InterpolatorConfig {
    pub fn new_no_msaa() -> Self {
        Self {
            modes: [InterpolationMode::Linear; MAX_VERTEX_ATTRIBUTES],
            provoking_vertex: ProvokingVertex::Third,
            near_depth: 0.0,
            far_depth: 1.0,
            depth_bits: 24,
            msaa_samples: None,
        }
    }
}

/// Fixed sample-offset table for a given MSAA sample count (spec §4.5,
/// scenario 6). Offsets are fractions of a pixel in `[0, 1)`.
fn sample_offsets(count: u32) -> &'static [(f64, f64)] {
    const S2: [(f64, f64); 2] = [(0.75, 0.75), (0.25, 0.25)];
    const S4: [(f64, f64); 4] = [(0.375, 0.125), (0.875, 0.375), (0.125, 0.625), (0.625, 0.875)];
    const S6: [(f64, f64); 6] = [
        (0.166, 0.083),
        (0.5, 0.25),
        (0.833, 0.417),
        (0.166, 0.583),
        (0.5, 0.75),
        (0.833, 0.917),
    ];
    const S8: [(f64, f64); 8] = [
        (0.0625, 0.375),
        (0.3125, 0.0625),
        (0.5625, 0.3125),
        (0.8125, 0.6875),
        (0.0625, 0.8125),
        (0.375, 0.5625),
        (0.6875, 0.9375),
        (0.9375, 0.1875),
    ];
    match count {
        2 => &S2,
        4 => &S4,
        6 => &S6,
        8 => &S8,
        _ => &S4,
    }
}

fn quantize_depth(z: f64, near: f32, far: f32, depth_bits: u32) -> u32 {
    let clamped = z.clamp(near as f64, far as f64);
    let normalized = if (far - near).abs() < f32::EPSILON {
        0.0
    } else {
        (clamped - near as f64) / (far as f64 - near as f64) as f64
    };
    let max_value = (1u64 << depth_bits) - 1;
    (normalized.clamp(0.0, 1.0) * max_value as f64).round() as u32
}

/// Computes fragments from a [`SetupTriangle`] at a given pixel.
pub struct FragmentInterpolator {
    cfg: InterpolatorConfig,
}

impl FragmentInterpolator {
    pub fn new(cfg: InterpolatorConfig) -> Self {
        Self { cfg }
    }

    /// Evaluate a single fragment at pixel `(x, y)` of `tri`.
    ///
    /// `subpixel` and `pixel_center_shift` determine the exact sample
    /// point (spec §9: the top-left / D3D9 rule shifts the sample point by
    /// half a subpixel unit).
    pub fn interpolate(
        &self,
        tri: &SetupTriangle,
        x: i32,
        y: i32,
        subpixel: SubpixelFormat,
        pixel_center_shift: bool,
        d3d9_rasterization_rules: bool,
    ) -> Fragment {
        let sx = subpixel.to_pixels(subpixel.pixel_center(x, pixel_center_shift));
        let sy = subpixel.to_pixels(subpixel.pixel_center(y, pixel_center_shift));

        let raw_edges = [
            tri.edges[0].evaluate(sx, sy),
            tri.edges[1].evaluate(sx, sy),
            tri.edges[2].evaluate(sx, sy),
        ];
        let inside = tri
            .edges
            .iter()
            .zip(raw_edges.iter())
            .all(|(e, &v)| e.passes(v, d3d9_rasterization_rules));

        let area = tri.area.abs();
        let barycentric = [raw_edges[0] / area, raw_edges[1] / area, raw_edges[2] / area];

        let z = tri.z_plane.evaluate(sx, sy);
        let z_int = quantize_depth(z, self.cfg.near_depth, self.cfg.far_depth, self.cfg.depth_bits);

        let attributes = self.interpolate_attributes(tri, barycentric);

        let (coverage, sample_z, early_z) = if let Some(samples) = self.cfg.msaa_samples {
            self.msaa_samples(tri, sx, sy, samples, d3d9_rasterization_rules)
        } else {
            let mut sample_z = [0u32; MAX_SAMPLES];
            sample_z[0] = z_int;
            (if inside { 1u32 } else { 0u32 }, sample_z, z_int)
        };

        Fragment {
            x,
            y,
            z: early_z,
            barycentric,
            inside,
            attributes,
            coverage,
            sample_z,
            triangle_id: tri.id,
        }
    }

    fn interpolate_attributes(&self, tri: &SetupTriangle, barycentric: [f64; 3]) -> [[f32; 4]; MAX_VERTEX_ATTRIBUTES] {
        let verts = [tri.v1, tri.v2, tri.v3];
        let inv_w = [
            verts[0].attrs[0][3] as f64,
            verts[1].attrs[0][3] as f64,
            verts[2].attrs[0][3] as f64,
        ];
        let provoking = match self.cfg.provoking_vertex {
            ProvokingVertex::First => 0,
            ProvokingVertex::Second => 1,
            ProvokingVertex::Third => 2,
        };

        let mut out = [[0f32; 4]; MAX_VERTEX_ATTRIBUTES];
        for attr in 0..MAX_VERTEX_ATTRIBUTES {
            match self.cfg.modes[attr] {
                InterpolationMode::Flat => {
                    out[attr] = verts[provoking].attrs[attr];
                }
                InterpolationMode::Linear => {
                    for lane in 0..4 {
                        let v = (0..3)
                            .map(|i| barycentric[i] * verts[i].attrs[attr][lane] as f64)
                            .sum::<f64>();
                        out[attr][lane] = v as f32;
                    }
                }
                InterpolationMode::Perspective => {
                    let weights: [f64; 3] = std::array::from_fn(|i| barycentric[i] * inv_w[i]);
                    let denom: f64 = weights.iter().sum();
                    for lane in 0..4 {
                        if denom.abs() < f64::EPSILON {
                            out[attr][lane] = verts[provoking].attrs[attr][lane];
                        } else {
                            let num: f64 = (0..3).map(|i| weights[i] * verts[i].attrs[attr][lane] as f64).sum();
                            out[attr][lane] = (num / denom) as f32;
                        }
                    }
                }
            }
        }
        out
    }

    /// Per-sample coverage and depth (spec §4.5 MSAA extension). Returns
    /// `(coverage_mask, per_sample_z, early_hz_z)`, the last being the min
    /// depth across covered samples only.
    fn msaa_samples(
        &self,
        tri: &SetupTriangle,
        sx: f64,
        sy: f64,
        count: u32,
        d3d9_rasterization_rules: bool,
    ) -> (u32, [u32; MAX_SAMPLES], u32) {
        let offsets = sample_offsets(count);
        let mut coverage = bitvec_narrow::BitVec::zero(MAX_SAMPLES as u32);
        let mut sample_z = [0u32; MAX_SAMPLES];
        let mut min_z: Option<u32> = None;

        for (s, &(dx, dy)) in offsets.iter().enumerate() {
            let (px, py) = (sx + dx, sy + dy);
            let values = [
                tri.edges[0].evaluate(px, py),
                tri.edges[1].evaluate(px, py),
                tri.edges[2].evaluate(px, py),
            ];
            let covered = tri.edges.iter().zip(values.iter()).all(|(e, &v)| e.passes(v, d3d9_rasterization_rules));
            let z = tri.z_plane.evaluate(px, py);
            let z_int = quantize_depth(z, self.cfg.near_depth, self.cfg.far_depth, self.cfg.depth_bits);
            sample_z[s] = z_int;
            if covered {
                coverage.set(s as u32, true);
                min_z = Some(min_z.map_or(z_int, |m| m.min(z_int)));
            }
        }
        let coverage = coverage.raw();

        (coverage, sample_z, min_z.unwrap_or(u32::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::{setup_triangle, BoundingBox, SetupConfig, SetupTrianglePool};
    use crate::vertex::Vertex;
    use rsim_registers::{CullMode, FaceMode};

    fn tri_8x8() -> (SetupTrianglePool, usize) {
        let cfg = SetupConfig {
            face_mode: FaceMode::Ccw,
            cull_mode: CullMode::None,
            d3d9_rasterization_rules: true,
            d3d9_pixel_coordinates: false,
            viewport: BoundingBox { xmin: 0, ymin: 0, xmax: 7, ymax: 7 },
            scissor: None,
            thin_triangle_bias: None,
        };
        let mut pool = SetupTrianglePool::new(4);
        let outcome = setup_triangle(
            &mut pool,
            Vertex::from_position(0.0, 0.0, 0.5, 1.0),
            Vertex::from_position(4.0, 0.0, 0.5, 1.0),
            Vertex::from_position(0.0, 4.0, 0.5, 1.0),
            &cfg,
        );
        let crate::setup::SetupOutcome::Setup(id) = outcome else { panic!() };
        (pool, id)
    }

    #[test]
    fn inside_fragment_has_constant_z() {
        let (pool, id) = tri_8x8();
        let tri = pool.get(id).unwrap();
        let interp = FragmentInterpolator::new(InterpolatorConfig::new_no_msaa());
        let subpixel = SubpixelFormat::new(4);
        let frag = interp.interpolate(tri, 1, 1, subpixel, true, true);
        assert!(frag.inside);
        let normalized = frag.z as f64 / ((1u64 << 24) - 1) as f64;
        assert!((normalized - 0.5).abs() < 1e-3);
    }

    #[test]
    fn barycentric_weights_sum_to_one_inside_triangle() {
        let (pool, id) = tri_8x8();
        let tri = pool.get(id).unwrap();
        let interp = FragmentInterpolator::new(InterpolatorConfig::new_no_msaa());
        let subpixel = SubpixelFormat::new(4);
        let frag = interp.interpolate(tri, 1, 1, subpixel, true, true);
        let sum: f64 = frag.barycentric.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn msaa_coverage_has_some_bits_for_edge_crossing_stamp() {
        let (pool, id) = tri_8x8();
        let tri = pool.get(id).unwrap();
        let mut cfg = InterpolatorConfig::new_no_msaa();
        cfg.msaa_samples = Some(4);
        let interp = FragmentInterpolator::new(cfg);
        let subpixel = SubpixelFormat::new(4);
        // (3,0) straddles the triangle's hypotenuse (x+y<4 boundary at x=3,y=0..1).
        let frag = interp.interpolate(tri, 3, 0, subpixel, true, true);
        assert!(frag.coverage > 0 && frag.coverage < 0b1111);
    }
}
