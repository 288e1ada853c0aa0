//! Recursive-descent traversal over a batch of triangles (spec §4.4.2).
//!
//! Unlike the scanline walker, recursive descent tests a whole batch of
//! up to `TILE_TESTERS` triangles against a tile simultaneously: each
//! candidate triangle is sampled at nine points within the tile (its four
//! corners, the midpoints of its four edges, and its center) against that
//! triangle's own edge equations. A tile with no sample inside any batch
//! triangle is dropped outright; otherwise it is subdivided into four
//! quadrants and pushed back onto the pending stack, until it bottoms out
//! at stamp granularity and a stamp is generated for its (first, by
//! submission order) covering triangle.

use rsim_core::StageStatus;

use crate::setup::{BoundingBox, EdgeEquation, SetupTrianglePool, TraversalState};
use crate::stamp::{Fragment, Stamp};
use crate::traversal::Traversal;

/// Triangles tested against a tile concurrently in one descent batch.
pub const TILE_TESTERS: usize = 4;

/// Subtile sample count used to decide whether a tile is touched by a
/// triangle: four corners, four edge midpoints, and the center.
pub const SUBTILE_SAMPLES: usize = 9;

#[derive(Clone, Copy, Debug)]
pub struct RecursiveConfig {
    pub root_tile_size: i32,
}

/// One tile awaiting a coverage test against the current batch.
#[derive(Clone, Copy, Debug)]
struct PendingTile {
    x: i32,
    y: i32,
    size: i32,
}

struct Batch {
    triangle_ids: Vec<usize>,
    pending: Vec<PendingTile>,
}

pub struct RecursiveTraversal {
    cfg: RecursiveConfig,
    incoming: Vec<usize>,
    batch: Option<Batch>,
}

impl RecursiveTraversal {
    pub fn new(cfg: RecursiveConfig) -> Self {
        Self {
            cfg,
            incoming: Vec::new(),
            batch: None,
        }
    }

    fn batch_bbox(&self, pool: &SetupTrianglePool, ids: &[usize]) -> Option<BoundingBox> {
        ids.iter()
            .filter_map(|&id| pool.get(id))
            .map(|t| t.bbox)
            .reduce(|a, b| BoundingBox {
                xmin: a.xmin.min(b.xmin),
                ymin: a.ymin.min(b.ymin),
                xmax: a.xmax.max(b.xmax),
                ymax: a.ymax.max(b.ymax),
            })
    }

    fn start_batch(&mut self, pool: &mut SetupTrianglePool) {
        if self.incoming.is_empty() {
            return;
        }
        let take = self.incoming.len().min(TILE_TESTERS);
        let ids: Vec<usize> = self.incoming.drain(..take).collect();
        for &id in &ids {
            if let Some(tri) = pool.get_mut(id) {
                tri.traversal = TraversalState::Recursive(Default::default());
            }
        }
        let Some(bbox) = self.batch_bbox(pool, &ids) else {
            return;
        };
        let size = self.cfg.root_tile_size.max(1);
        let pending = vec![PendingTile { x: bbox.xmin, y: bbox.ymin, size }];
        self.batch = Some(Batch { triangle_ids: ids, pending });
    }
}

impl Traversal for RecursiveTraversal {
    fn advance(&mut self, pool: &mut SetupTrianglePool) -> (StageStatus, Option<Stamp>) {
        if self.batch.is_none() {
            self.start_batch(pool);
        }

        let Some(batch) = &mut self.batch else {
            return (StageStatus::Ready, None);
        };

        let Some(tile) = batch.pending.pop() else {
            for &id in &batch.triangle_ids {
                pool.free(id);
            }
            self.batch = None;
            return (StageStatus::Ready, None);
        };

        if !tile_overlaps_bbox(pool, &batch.triangle_ids, tile) {
            return (StageStatus::Ready, None);
        }

        // The tile's nominal owner for stamp emission is the first
        // submission-order triangle with a sample inside it; ties are
        // broken by submission order, matching the queue's FIFO draw
        // order (spec §4.4.2: "kept if any sample is inside any of the
        // batch's triangles").
        let owner = batch.triangle_ids.iter().copied().find(|&id| {
            pool.get(id).is_some_and(|t| triangle_touches_tile(&t.edges, tile))
        });

        let Some(owner) = owner else {
            return (StageStatus::Ready, None);
        };

        if tile.size > 2 {
            let half = tile.size / 2;
            for (dx, dy) in [(0, 0), (half, 0), (0, half), (half, half)] {
                batch.pending.push(PendingTile {
                    x: tile.x + dx,
                    y: tile.y + dy,
                    size: half.max(1),
                });
            }
            return (StageStatus::Ready, None);
        }

        let stamp = emit_stamp(owner, tile.x, tile.y);
        (StageStatus::Ready, Some(stamp))
    }

    fn enqueue(&mut self, triangle_id: usize) {
        self.incoming.push(triangle_id);
    }

    fn reset(&mut self) {
        self.incoming.clear();
        self.batch = None;
    }
}

/// Cheap pre-filter: is `tile` touched by *any* batch member's bbox at
/// all? Avoids running the nine-sample edge test against triangles whose
/// bbox can't possibly reach this tile.
fn tile_overlaps_bbox(pool: &SetupTrianglePool, triangle_ids: &[usize], tile: PendingTile) -> bool {
    let tile_xmax = tile.x + tile.size - 1;
    let tile_ymax = tile.y + tile.size - 1;
    triangle_ids.iter().any(|&id| {
        pool.get(id).is_some_and(|t| {
            t.bbox.xmin <= tile_xmax && t.bbox.xmax >= tile.x && t.bbox.ymin <= tile_ymax && t.bbox.ymax >= tile.y
        })
    })
}

/// The nine sample points a tile is tested at: four corners, the
/// midpoints of its four sides, and its center.
fn subtile_samples(tile: PendingTile) -> [(f64, f64); SUBTILE_SAMPLES] {
    let x0 = tile.x as f64;
    let y0 = tile.y as f64;
    let x1 = (tile.x + tile.size - 1) as f64;
    let y1 = (tile.y + tile.size - 1) as f64;
    let xc = (x0 + x1) / 2.0;
    let yc = (y0 + y1) / 2.0;
    [
        (x0, y0),
        (x1, y0),
        (x0, y1),
        (x1, y1),
        (xc, y0),
        (xc, y1),
        (x0, yc),
        (x1, yc),
        (xc, yc),
    ]
}

/// Whether any of a tile's nine sample points lies inside all three of a
/// triangle's edges (spec §4.4.2).
fn triangle_touches_tile(edges: &[EdgeEquation; 3], tile: PendingTile) -> bool {
    subtile_samples(tile)
        .iter()
        .any(|&(x, y)| edges.iter().all(|e| e.evaluate(x, y) >= 0.0))
}

fn emit_stamp(triangle_id: usize, x: i32, y: i32) -> Stamp {
    let make_fragment = |dx: i32, dy: i32| Fragment {
        x: x + dx,
        y: y + dy,
        z: 0,
        barycentric: [0.0; 3],
        inside: false,
        attributes: [[0.0; 4]; rsim_registers::MAX_VERTEX_ATTRIBUTES],
        coverage: 0,
        sample_z: [0; crate::stamp::MAX_SAMPLES],
        triangle_id,
    };
    Stamp {
        fragments: [
            make_fragment(0, 0),
            make_fragment(1, 0),
            make_fragment(0, 1),
            make_fragment(1, 1),
        ],
        culled: [false; 4],
        triangle_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::{setup_triangle, SetupConfig, SetupTrianglePool};
    use crate::vertex::Vertex;
    use rsim_registers::{CullMode, FaceMode};

    fn cfg() -> SetupConfig {
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

    #[test]
    fn descends_until_stamp_granularity_and_frees_batch() {
        let mut pool = SetupTrianglePool::new(4);
        let outcome = setup_triangle(
            &mut pool,
            Vertex::from_position(0.0, 0.0, 0.5, 1.0),
            Vertex::from_position(4.0, 0.0, 0.5, 1.0),
            Vertex::from_position(0.0, 4.0, 0.5, 1.0),
            &cfg(),
        );
        let crate::setup::SetupOutcome::Setup(id) = outcome else { panic!() };

        let mut trav = RecursiveTraversal::new(RecursiveConfig { root_tile_size: 4 });
        trav.enqueue(id);

        let mut stamps = 0;
        for _ in 0..64 {
            let (status, stamp) = trav.advance(&mut pool);
            assert_eq!(status, StageStatus::Ready);
            if stamp.is_some() {
                stamps += 1;
            }
            if pool.live_count() == 0 && trav.batch.is_none() {
                break;
            }
        }
        assert!(stamps > 0);
        assert_eq!(pool.live_count(), 0);
    }

    #[test]
    fn empty_batch_reports_ready_with_no_stamp() {
        let mut pool = SetupTrianglePool::new(4);
        let mut trav = RecursiveTraversal::new(RecursiveConfig { root_tile_size: 4 });
        let (status, stamp) = trav.advance(&mut pool);
        assert_eq!(status, StageStatus::Ready);
        assert!(stamp.is_none());
    }

    #[test]
    fn tile_outside_triangle_is_never_touched() {
        let mut pool = SetupTrianglePool::new(4);
        let outcome = setup_triangle(
            &mut pool,
            Vertex::from_position(0.0, 0.0, 0.5, 1.0),
            Vertex::from_position(2.0, 0.0, 0.5, 1.0),
            Vertex::from_position(0.0, 2.0, 0.5, 1.0),
            &cfg(),
        );
        let crate::setup::SetupOutcome::Setup(id) = outcome else { panic!() };
        let edges = pool.get(id).unwrap().edges;

        // A tile entirely past the triangle's far corner touches none of
        // the nine sample points.
        assert!(!triangle_touches_tile(&edges, PendingTile { x: 4, y: 4, size: 2 }));
        // The tile containing the right-angle corner does.
        assert!(triangle_touches_tile(&edges, PendingTile { x: 0, y: 0, size: 2 }));
    }

    #[test]
    fn two_triangle_batch_each_keeps_its_own_tiles() {
        let mut pool = SetupTrianglePool::new(4);
        let a = setup_triangle(
            &mut pool,
            Vertex::from_position(0.0, 0.0, 0.5, 1.0),
            Vertex::from_position(2.0, 0.0, 0.5, 1.0),
            Vertex::from_position(0.0, 2.0, 0.5, 1.0),
            &cfg(),
        );
        let b = setup_triangle(
            &mut pool,
            Vertex::from_position(6.0, 6.0, 0.5, 1.0),
            Vertex::from_position(7.0, 6.0, 0.5, 1.0),
            Vertex::from_position(6.0, 7.0, 0.5, 1.0),
            &cfg(),
        );
        let crate::setup::SetupOutcome::Setup(a_id) = a else { panic!() };
        let crate::setup::SetupOutcome::Setup(b_id) = b else { panic!() };

        let mut trav = RecursiveTraversal::new(RecursiveConfig { root_tile_size: 8 });
        trav.enqueue(a_id);
        trav.enqueue(b_id);

        let mut positions = Vec::new();
        for _ in 0..256 {
            let (status, stamp) = trav.advance(&mut pool);
            assert_eq!(status, StageStatus::Ready);
            if let Some(s) = stamp {
                positions.push((s.fragments[0].x, s.fragments[0].y, s.triangle_id));
            }
            if pool.live_count() == 0 && trav.batch.is_none() {
                break;
            }
        }
        assert!(positions.iter().any(|&(x, y, id)| id == a_id && x < 4 && y < 4));
        assert!(positions.iter().any(|&(x, y, id)| id == b_id && x >= 4 && y >= 4));
    }
}
