//! [`SetupTrianglePool`] and the [`setup_triangle`] operation (spec §4.2).
//!
//! Grounded on `original_source/arch/funcmodel/Rasterizer/cmTriangleSetup.h`
//! for the edge/Z-plane derivation and the micro-triangle test, and on the
//! small-pool-with-free-list idiom this codebase uses for every other
//! stable-id arena.

use rsim_registers::{CullMode, FaceMode};

use crate::vertex::{AttributeValue, Vertex};

/// Screen-space bounding box, inclusive of both corners, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32,
}

impl BoundingBox {
    pub fn is_empty(&self) -> bool {
        self.xmin > self.xmax || self.ymin > self.ymax
    }

    pub fn intersect(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            xmin: self.xmin.max(other.xmin),
            ymin: self.ymin.max(other.ymin),
            xmax: self.xmax.min(other.xmax),
            ymax: self.ymax.min(other.ymax),
        }
    }

    pub fn width(&self) -> u32 {
        if self.is_empty() {
            0
        } else {
            (self.xmax - self.xmin + 1) as u32
        }
    }

    pub fn height(&self) -> u32 {
        if self.is_empty() {
            0
        } else {
            (self.ymax - self.ymin + 1) as u32
        }
    }
}

/// A triangle edge's line equation `A*x + B*y + C`, plus its top-left
/// tie-break classification (spec §3, §4.2).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeEquation {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    /// True if this is a "top" or "left" edge under the D3D9 fill
    /// convention, which uses an inclusive (`>= 0`) test; other edges use
    /// a strict (`> 0`) test when `d3d9_rasterization_rules` is enabled,
    /// so that shared edges between adjacent triangles are rasterized
    /// exactly once.
    pub top_left: bool,
}

impl EdgeEquation {
    pub fn evaluate(&self, x: f64, y: f64) -> f64 {
        self.a * x + self.b * y + self.c
    }

    /// Whether a fragment at this edge's evaluated `value` is inside,
    /// under the configured fill convention.
    pub fn passes(&self, value: f64, d3d9_rasterization_rules: bool) -> bool {
        if !d3d9_rasterization_rules || self.top_left {
            value >= 0.0
        } else {
            value > 0.0
        }
    }
}

/// The Z plane `Az*x + By*y + Cz`, evaluated per fragment for depth.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZPlane {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl ZPlane {
    pub fn evaluate(&self, x: f64, y: f64) -> f64 {
        self.a * x + self.b * y + self.c
    }
}

/// Triangle facing, relative to the configured [`FaceMode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Facing {
    Front,
    Back,
}

/// Lifecycle of a pool slot (spec §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupState {
    Allocated,
    SetupComplete,
    Rasterizing,
    Done,
    Free,
}

/// Saved neighbor positions for the scanline traversal's save-stacks
/// (spec §4.4.1). Each save is a scan-tile coordinate pair, pushed when a
/// neighbor tile is found inside the triangle's bbox but deferred.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TileSave {
    pub x: i32,
    pub y: i32,
}

/// Scanline traversal's transient per-triangle state (spec §3: "saved tile
/// positions for the scanline fallback"). `current` holds the scan-tile
/// currently being walked and `cursor` the index of the next generation
/// tile within it; `visited` guards against a scan tile being queued twice
/// when it is reachable as a neighbor from more than one direction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanlineTraversalState {
    pub current: Option<TileSave>,
    pub cursor: i32,
    pub right_scan: Option<TileSave>,
    pub up_scan: Option<TileSave>,
    pub down_scan: Option<TileSave>,
    pub tile_save_left: Vec<TileSave>,
    pub tile_save_right: Vec<TileSave>,
    pub tile_save_up: Vec<TileSave>,
    pub tile_save_down: Vec<TileSave>,
    pub visited: std::collections::HashSet<(i32, i32)>,
    pub last_fragment: bool,
}

/// Recursive-descent traversal's transient per-triangle state (spec §3:
/// "current subtile-level pointer for recursive"). Populated only when
/// this triangle is the one currently being refined within its batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecursiveTraversalState {
    pub current_level: u32,
}

/// Per-triangle transient traversal state (spec §3); which variant is
/// populated depends on which [`crate::traversal::TraversalMode`] the
/// simulator is configured with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TraversalState {
    NotStarted,
    Scanline(ScanlineTraversalState),
    Recursive(RecursiveTraversalState),
}

/// A fully set-up triangle: edge and Z plane equations, facing, bbox, and
/// lifecycle state (spec §3).
#[derive(Clone, Debug, PartialEq)]
pub struct SetupTriangle {
    pub v1: Vertex,
    pub v2: Vertex,
    pub v3: Vertex,
    pub edges: [EdgeEquation; 3],
    pub z_plane: ZPlane,
    /// Signed setup determinant; its sign (before any facing-normalization
    /// negation) gives the raw facing.
    pub area: f64,
    pub facing: Facing,
    pub bbox: BoundingBox,
    pub state: SetupState,
    /// Two-sided lighting: true if the secondary (back-facing) color
    /// attribute should be sampled instead of the primary one (spec §4.2).
    pub use_secondary_color: bool,
    pub traversal: TraversalState,
    /// Stable index into the [`SetupTrianglePool`] this triangle lives in.
    pub id: usize,
}

/// Outcome of [`setup_triangle`] (spec §4.2 "Failure modes").
#[derive(Debug)]
pub enum SetupOutcome {
    /// Triangle accepted; holds its stable pool id.
    Setup(usize),
    /// Degenerate (zero area) or culled by facing; dropped silently.
    Culled,
    /// The pool has no free slot this cycle; caller must back off and
    /// retry (spec §7.3: resource exhaustion self-heals via backpressure).
    PoolFull,
}

/// Construction-time parameters for [`setup_triangle`].
#[derive(Clone, Copy, Debug)]
pub struct SetupConfig {
    pub face_mode: FaceMode,
    pub cull_mode: CullMode,
    pub d3d9_rasterization_rules: bool,
    /// Pixel-center sample-point shift (D3D9 pixel coordinate rule).
    pub d3d9_pixel_coordinates: bool,
    pub viewport: BoundingBox,
    pub scissor: Option<BoundingBox>,
    /// Additive thin-triangle bias folded into each edge's `C` coefficient
    /// to avoid gaps on thin diagonals (spec §4.4); `None` disables it.
    pub thin_triangle_bias: Option<f64>,
}

/// Fixed-capacity pool of setup triangles with a free-list (spec §3, §8:
/// "For all setup-triangle pool states: free + live = poolCapacity").
pub struct SetupTrianglePool {
    slots: Vec<Option<SetupTriangle>>,
    free_list: Vec<usize>,
}

impl SetupTrianglePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            free_list: (0..capacity).rev().collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn live_count(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    pub fn free_count(&self) -> usize {
        self.free_list.len()
    }

    pub fn get(&self, id: usize) -> Option<&SetupTriangle> {
        self.slots.get(id).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut SetupTriangle> {
        self.slots.get_mut(id).and_then(Option::as_mut)
    }

    /// Free a live triangle's slot back to the pool.
    pub fn free(&mut self, id: usize) {
        if let Some(slot) = self.slots.get_mut(id) {
            if slot.is_some() {
                *slot = None;
                self.free_list.push(id);
            }
        }
    }

    pub fn reset(&mut self) {
        let capacity = self.slots.len();
        self.slots.iter_mut().for_each(|s| *s = None);
        self.free_list = (0..capacity).rev().collect();
    }

    fn allocate(&mut self) -> Option<usize> {
        self.free_list.pop()
    }
}

fn cross_edge(a: AttributeValue, b: AttributeValue) -> (f64, f64, f64) {
    let (ax, ay) = (a[0] as f64, a[1] as f64);
    let (bx, by) = (b[0] as f64, b[1] as f64);
    (ay - by, bx - ax, ax * by - ay * bx)
}

fn is_top_left(a: f64, b: f64) -> bool {
    // A "top" edge is horizontal and goes right-to-left in the winding
    // (b == 0 && a < 0); a "left" edge goes downward (b > 0), matching the
    // classic D3D/OpenGL top-left fill convention.
    b > 0.0 || (b == 0.0 && a < 0.0)
}

/// Compute the Z plane `Az*x + Bz*y + Cz` through three `(x, y, z)` points,
/// given the 2D signed area `denom` already computed for the edges.
fn z_plane(v1: AttributeValue, v2: AttributeValue, v3: AttributeValue, denom: f64) -> ZPlane {
    let (x1, y1, z1) = (v1[0] as f64, v1[1] as f64, v1[2] as f64);
    let (x2, y2, z2) = (v2[0] as f64, v2[1] as f64, v2[2] as f64);
    let (x3, y3, z3) = (v3[0] as f64, v3[1] as f64, v3[2] as f64);

    let dzdx = ((z2 - z1) * (y3 - y1) - (z3 - z1) * (y2 - y1)) / denom;
    let dzdy = ((z3 - z1) * (x2 - x1) - (z2 - z1) * (x3 - x1)) / denom;
    let c = z1 - dzdx * x1 - dzdy * y1;

    ZPlane { a: dzdx, b: dzdy, c }
}

/// Micro-triangle size limit (spec §4.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MicroTriangleLimit {
    OnePixel,
    OneStamp,
    /// A configured `width x height` group of stamps (e.g. 2x2, 1x4, 4x1).
    StampGroup { width: u32, height: u32 },
}

/// Result of the micro-triangle test: the (possibly narrower) bbox and the
/// covered pixel/stamp counts per axis (spec §4.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MicroTriangleFit {
    pub bbox: BoundingBox,
    pub covered_x: u32,
    pub covered_y: u32,
}

/// Tests whether `bbox` fits inside the given micro-triangle limit.
/// Returns `None` if it doesn't.
pub fn micro_triangle_test(bbox: BoundingBox, limit: MicroTriangleLimit, stamp_px: (u32, u32)) -> Option<MicroTriangleFit> {
    if bbox.is_empty() {
        return None;
    }
    let (max_x, max_y) = match limit {
        MicroTriangleLimit::OnePixel => (1, 1),
        MicroTriangleLimit::OneStamp => stamp_px,
        MicroTriangleLimit::StampGroup { width, height } => (stamp_px.0 * width, stamp_px.1 * height),
    };
    if bbox.width() <= max_x && bbox.height() <= max_y {
        Some(MicroTriangleFit {
            bbox,
            covered_x: bbox.width(),
            covered_y: bbox.height(),
        })
    } else {
        None
    }
}

/// Compute setup for a triangle and, unless culled or degenerate, insert
/// it into `pool`.
///
/// Per spec §4.2: computes the signed area, the three edge equations, the
/// Z plane, applies facing-based culling or edge negation, and clips the
/// bounding box to `viewport ∩ scissor`.
pub fn setup_triangle(pool: &mut SetupTrianglePool, v1: Vertex, v2: Vertex, v3: Vertex, config: &SetupConfig) -> SetupOutcome {
    let p1 = v1.position();
    let p2 = v2.position();
    let p3 = v3.position();

    let area = (p2[0] as f64 - p1[0] as f64) * (p3[1] as f64 - p1[1] as f64)
        - (p3[0] as f64 - p1[0] as f64) * (p2[1] as f64 - p1[1] as f64);

    if area == 0.0 {
        return SetupOutcome::Culled;
    }

    let is_ccw = area > 0.0;
    let is_front = matches!(
        (config.face_mode, is_ccw),
        (FaceMode::Ccw, true) | (FaceMode::Cw, false)
    );

    if config.cull_mode == CullMode::FrontAndBack {
        return SetupOutcome::Culled;
    }
    if is_front && config.cull_mode == CullMode::Front {
        return SetupOutcome::Culled;
    }
    if !is_front && config.cull_mode == CullMode::Back {
        return SetupOutcome::Culled;
    }

    let (e1_raw, e2_raw, e3_raw) = (cross_edge(p2, p3), cross_edge(p3, p1), cross_edge(p1, p2));
    let negate = !is_front;
    let sign = if negate { -1.0 } else { 1.0 };
    let bias = config.thin_triangle_bias.unwrap_or(0.0);

    let make_edge = |(a, b, c): (f64, f64, f64)| {
        let (a, b, c) = (a * sign, b * sign, c * sign + bias);
        EdgeEquation {
            a,
            b,
            c,
            top_left: is_top_left(a, b),
        }
    };
    let edges = [make_edge(e1_raw), make_edge(e2_raw), make_edge(e3_raw)];
    let z_plane = z_plane(p1, p2, p3, area);

    let xs = [p1[0] as f64, p2[0] as f64, p3[0] as f64];
    let ys = [p1[1] as f64, p2[1] as f64, p3[1] as f64];
    let raw_bbox = BoundingBox {
        xmin: xs.iter().cloned().fold(f64::INFINITY, f64::min).floor() as i32,
        ymin: ys.iter().cloned().fold(f64::INFINITY, f64::min).floor() as i32,
        xmax: xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max).ceil() as i32 - 1,
        ymax: ys.iter().cloned().fold(f64::NEG_INFINITY, f64::max).ceil() as i32 - 1,
    };
    let mut bbox = raw_bbox.intersect(&config.viewport);
    if let Some(scissor) = config.scissor {
        bbox = bbox.intersect(&scissor);
    }

    let Some(id) = pool.allocate() else {
        log::debug!("setup triangle pool full; caller retries next cycle");
        return SetupOutcome::PoolFull;
    };

    let triangle = SetupTriangle {
        v1,
        v2,
        v3,
        edges,
        z_plane,
        area,
        facing: if is_front { Facing::Front } else { Facing::Back },
        bbox,
        state: SetupState::SetupComplete,
        use_secondary_color: !is_front,
        traversal: TraversalState::NotStarted,
        id,
    };
    pool.slots[id] = Some(triangle);
    SetupOutcome::Setup(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SetupConfig {
        SetupConfig {
            face_mode: FaceMode::Ccw,
            cull_mode: CullMode::None,
            d3d9_rasterization_rules: true,
            d3d9_pixel_coordinates: false,
            viewport: BoundingBox { xmin: 0, ymin: 0, xmax: 7, ymax: 7 },
            scissor: None,
            thin_triangle_bias: None,
        }
    }

    fn v(x: f32, y: f32, z: f32) -> Vertex {
        Vertex::from_position(x, y, z, 1.0)
    }

    #[test]
    fn ccw_triangle_is_front_facing_and_not_negated() {
        let mut pool = SetupTrianglePool::new(4);
        let outcome = setup_triangle(&mut pool, v(0.0, 0.0, 0.5), v(4.0, 0.0, 0.5), v(0.0, 4.0, 0.5), &config());
        let SetupOutcome::Setup(id) = outcome else { panic!("expected Setup") };
        let tri = pool.get(id).unwrap();
        assert_eq!(tri.facing, Facing::Front);
        // All three edges evaluate non-negative at their own opposite vertex.
        assert!(tri.edges[0].evaluate(0.0, 0.0) >= 0.0);
        assert!(tri.edges[1].evaluate(4.0, 0.0) >= 0.0);
        assert!(tri.edges[2].evaluate(0.0, 4.0) >= 0.0);
    }

    #[test]
    fn degenerate_triangle_is_culled() {
        let mut pool = SetupTrianglePool::new(4);
        let outcome = setup_triangle(&mut pool, v(0.0, 0.0, 0.0), v(1.0, 1.0, 0.0), v(2.0, 2.0, 0.0), &config());
        assert!(matches!(outcome, SetupOutcome::Culled));
        assert_eq!(pool.live_count(), 0);
    }

    #[test]
    fn back_cull_mode_culls_back_facing_and_keeps_front() {
        let mut cfg = config();
        cfg.cull_mode = CullMode::Back;
        let mut pool = SetupTrianglePool::new(4);
        // CW winding is back-facing under FaceMode::Ccw.
        let back = setup_triangle(&mut pool, v(0.0, 0.0, 0.5), v(0.0, 4.0, 0.5), v(4.0, 0.0, 0.5), &cfg);
        assert!(matches!(back, SetupOutcome::Culled));
        let front = setup_triangle(&mut pool, v(0.0, 0.0, 0.5), v(4.0, 0.0, 0.5), v(0.0, 4.0, 0.5), &cfg);
        assert!(matches!(front, SetupOutcome::Setup(_)));
    }

    #[test]
    fn bbox_clips_to_viewport_and_scissor() {
        let mut cfg = config();
        cfg.scissor = Some(BoundingBox { xmin: 2, ymin: 2, xmax: 5, ymax: 5 });
        let mut pool = SetupTrianglePool::new(4);
        let outcome = setup_triangle(&mut pool, v(0.0, 0.0, 0.5), v(8.0, 0.0, 0.5), v(0.0, 8.0, 0.5), &cfg);
        let SetupOutcome::Setup(id) = outcome else { panic!() };
        let tri = pool.get(id).unwrap();
        assert_eq!(tri.bbox, BoundingBox { xmin: 2, ymin: 2, xmax: 5, ymax: 5 });
    }

    #[test]
    fn pool_exhaustion_reports_pool_full() {
        let mut pool = SetupTrianglePool::new(1);
        let cfg = config();
        let _ = setup_triangle(&mut pool, v(0.0, 0.0, 0.5), v(4.0, 0.0, 0.5), v(0.0, 4.0, 0.5), &cfg);
        let second = setup_triangle(&mut pool, v(0.0, 0.0, 0.5), v(4.0, 0.0, 0.5), v(0.0, 4.0, 0.5), &cfg);
        assert!(matches!(second, SetupOutcome::PoolFull));
    }

    #[test]
    fn freeing_a_slot_makes_it_reusable() {
        let mut pool = SetupTrianglePool::new(1);
        let cfg = config();
        let SetupOutcome::Setup(id) = setup_triangle(&mut pool, v(0.0, 0.0, 0.5), v(4.0, 0.0, 0.5), v(0.0, 4.0, 0.5), &cfg) else {
            panic!()
        };
        pool.free(id);
        assert_eq!(pool.free_count(), 1);
        let second = setup_triangle(&mut pool, v(0.0, 0.0, 0.5), v(4.0, 0.0, 0.5), v(0.0, 4.0, 0.5), &cfg);
        assert!(matches!(second, SetupOutcome::Setup(_)));
    }

    #[test]
    fn micro_triangle_fits_in_one_stamp() {
        let bbox = BoundingBox { xmin: 0, ymin: 0, xmax: 1, ymax: 1 };
        let fit = micro_triangle_test(bbox, MicroTriangleLimit::OneStamp, (2, 2));
        assert!(fit.is_some());
        let fit = fit.unwrap();
        assert!(fit.covered_x <= 2 && fit.covered_y <= 2);
    }

    #[test]
    fn micro_triangle_rejects_oversized_bbox() {
        let bbox = BoundingBox { xmin: 0, ymin: 0, xmax: 3, ymax: 3 };
        assert!(micro_triangle_test(bbox, MicroTriangleLimit::OneStamp, (2, 2)).is_none());
    }
}
