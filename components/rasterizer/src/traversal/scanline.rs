//! Scanline-with-save-stacks traversal (spec §4.4.1).
//!
//! Walks one setup triangle at a time over a three-level tile hierarchy
//! (scan tile > generation tile, with an over-tile grouping used only to
//! classify saves): at each scan tile, the three edge equations are
//! evaluated at the tile's four corners to trivially reject tiles the
//! triangle cannot touch. A tile that survives has its generation tiles
//! (really: its stamp-granularity steps — a stamp is always the 2x2
//! fragment quad handed downstream) emitted in raster order, and its four
//! neighbor tiles are queued for a later visit: a neighbor inside the
//! current over-tile becomes a *scan save*, a neighbor outside it becomes
//! a *tile save*. Restoring always prefers a scan save (right, then up,
//! then down) over a tile save (left, then right, then up, then down);
//! there is no *left* scan save; a left neighbor is always filed as a
//! tile save so the rightward-first sweep never reverses direction
//! mid-row (spec §9 Open Questions).

use rsim_core::StageStatus;

use crate::setup::{BoundingBox, EdgeEquation, SetupTrianglePool, TileSave, TraversalState};
use crate::stamp::{Fragment, Stamp};
use crate::traversal::Traversal;

/// Generation-tile pixel extent: the stamp-stepping granularity within a
/// scan tile (a stamp is always 2x2 fragments; this is its pixel size).
#[derive(Clone, Copy, Debug)]
pub struct ScanlineConfig {
    pub gen_tile_width: i32,
    pub gen_tile_height: i32,
    /// Scan tile size in pixels; must be an integer multiple of the
    /// generation tile size on each axis.
    pub scan_tile_width: i32,
    pub scan_tile_height: i32,
    /// Over-tile size, in scan tiles, used only to classify a neighbor
    /// save as a scan save (inside the current over-tile) or a tile save
    /// (outside it).
    pub over_tile_scan_x: i32,
    pub over_tile_scan_y: i32,
}

/// Scanline traversal state machine: one entry in `queue` per triangle
/// awaiting or undergoing traversal, processed strictly in FIFO order so
/// stamp output preserves submission order (spec §8).
pub struct ScanlineTraversal {
    cfg: ScanlineConfig,
    queue: Vec<usize>,
    active: Option<usize>,
}

enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl ScanlineTraversal {
    pub fn new(cfg: ScanlineConfig) -> Self {
        Self {
            cfg,
            queue: Vec::new(),
            active: None,
        }
    }

    fn start_next(&mut self, pool: &mut SetupTrianglePool) {
        while let Some(id) = self.queue.first().copied() {
            self.queue.remove(0);
            let Some(tri) = pool.get_mut(id) else { continue };
            if tri.bbox.is_empty() {
                pool.free(id);
                continue;
            }
            let tile = (tri.bbox.xmin.div_euclid(self.cfg.scan_tile_width), tri.bbox.ymin.div_euclid(self.cfg.scan_tile_height));
            let mut state = crate::setup::ScanlineTraversalState::default();
            state.current = Some(TileSave { x: tile.0, y: tile.1 });
            state.visited.insert(tile);
            tri.traversal = TraversalState::Scanline(state);
            self.active = Some(id);
            return;
        }
    }

    /// Whether `tile` (scan-tile index) lies within its triangle's bbox
    /// at all, i.e. is worth ever visiting.
    fn tile_in_bbox(&self, tile: (i32, i32), bbox: BoundingBox) -> bool {
        let (x0, y0) = (tile.0 * self.cfg.scan_tile_width, tile.1 * self.cfg.scan_tile_height);
        let (x1, y1) = (x0 + self.cfg.scan_tile_width - 1, y0 + self.cfg.scan_tile_height - 1);
        x1 >= bbox.xmin && x0 <= bbox.xmax && y1 >= bbox.ymin && y0 <= bbox.ymax
    }

    /// Trivial-reject test: a scan tile is rejected if some edge is
    /// strictly outside at all four of the tile's corners (spec §4.4.1
    /// "evaluate the three edge equations at the tile's reference corner
    /// and at four neighbour probes").
    fn tile_rejected(&self, edges: &[EdgeEquation; 3], tile: (i32, i32)) -> bool {
        let (x0, y0) = (tile.0 * self.cfg.scan_tile_width, tile.1 * self.cfg.scan_tile_height);
        let (x1, y1) = (x0 + self.cfg.scan_tile_width - 1, y0 + self.cfg.scan_tile_height - 1);
        let corners = [(x0 as f64, y0 as f64), (x1 as f64, y0 as f64), (x0 as f64, y1 as f64), (x1 as f64, y1 as f64)];
        edges.iter().any(|e| corners.iter().map(|&(x, y)| e.evaluate(x, y)).fold(f64::NEG_INFINITY, f64::max) < 0.0)
    }

    /// Queues this tile's four unvisited in-bbox neighbors into the
    /// appropriate save slot/stack, per the over-tile classification
    /// (spec §4.4.1).
    fn queue_neighbors(&self, state: &mut crate::setup::ScanlineTraversalState, tile: (i32, i32), bbox: BoundingBox) {
        let over = (tile.0.div_euclid(self.cfg.over_tile_scan_x), tile.1.div_euclid(self.cfg.over_tile_scan_y));
        for (dx, dy, dir) in [(1, 0, Direction::Right), (0, 1, Direction::Up), (0, -1, Direction::Down), (-1, 0, Direction::Left)] {
            let neighbor = (tile.0 + dx, tile.1 + dy);
            if state.visited.contains(&neighbor) || !self.tile_in_bbox(neighbor, bbox) {
                continue;
            }
            state.visited.insert(neighbor);
            let save = TileSave { x: neighbor.0, y: neighbor.1 };
            let neighbor_over = (neighbor.0.div_euclid(self.cfg.over_tile_scan_x), neighbor.1.div_euclid(self.cfg.over_tile_scan_y));
            let inside_over_tile = neighbor_over == over;
            match dir {
                // No LEFT scan save exists (spec §9): a left neighbor is
                // always a tile save regardless of over-tile membership,
                // so the active front never reverses direction mid-row.
                Direction::Left => state.tile_save_left.push(save),
                Direction::Right if inside_over_tile => state.right_scan = Some(save),
                Direction::Up if inside_over_tile => state.up_scan = Some(save),
                Direction::Down if inside_over_tile => state.down_scan = Some(save),
                Direction::Right => state.tile_save_right.push(save),
                Direction::Up => state.tile_save_up.push(save),
                Direction::Down => state.tile_save_down.push(save),
            }
        }
    }

    /// Restore priority: `right-scan > up-scan > down-scan >
    /// tile-saves(L > R > U > D)` (spec §4.4.1, §9).
    fn restore_next(state: &mut crate::setup::ScanlineTraversalState) -> Option<(i32, i32)> {
        if let Some(t) = state.right_scan.take() {
            return Some((t.x, t.y));
        }
        if let Some(t) = state.up_scan.take() {
            return Some((t.x, t.y));
        }
        if let Some(t) = state.down_scan.take() {
            return Some((t.x, t.y));
        }
        for stack in [&mut state.tile_save_left, &mut state.tile_save_right, &mut state.tile_save_up, &mut state.tile_save_down] {
            if let Some(t) = stack.pop() {
                return Some((t.x, t.y));
            }
        }
        None
    }
}

impl Traversal for ScanlineTraversal {
    fn advance(&mut self, pool: &mut SetupTrianglePool) -> (StageStatus, Option<Stamp>) {
        if self.active.is_none() {
            self.start_next(pool);
        }
        let Some(id) = self.active else {
            return (StageStatus::Ready, None);
        };
        let Some(tri) = pool.get(id) else {
            self.active = None;
            return (StageStatus::Ready, None);
        };
        let edges = tri.edges;
        let bbox = tri.bbox;

        // Exactly one edge/Z-equation evaluation group is charged per
        // cycle (spec §4.3): a tile-level transition (restore, reject) or
        // a single generation-tile step, never both in the same call.
        let Some(tri) = pool.get_mut(id) else {
            self.active = None;
            return (StageStatus::Ready, None);
        };
        let TraversalState::Scanline(state) = &mut tri.traversal else {
            self.active = None;
            return (StageStatus::Ready, None);
        };

        let Some(tile) = state.current.map(|t| (t.x, t.y)) else {
            match Self::restore_next(state) {
                Some(next) => {
                    state.current = Some(TileSave { x: next.0, y: next.1 });
                    state.cursor = 0;
                }
                None => {
                    state.last_fragment = true;
                    pool.free(id);
                    self.active = None;
                }
            }
            return (StageStatus::Ready, None);
        };

        if self.tile_rejected(&edges, tile) {
            state.current = None;
            state.cursor = 0;
            return (StageStatus::Ready, None);
        }

        if state.cursor == 0 {
            self.queue_neighbors(state, tile, bbox);
        }

        let steps_x = (self.cfg.scan_tile_width / self.cfg.gen_tile_width).max(1);
        let steps_y = (self.cfg.scan_tile_height / self.cfg.gen_tile_height).max(1);
        let total = steps_x * steps_y;

        if state.cursor >= total {
            // This tile's steps are exhausted; move on to the next save.
            state.current = None;
            state.cursor = 0;
            return (StageStatus::Ready, None);
        }

        let idx = state.cursor;
        state.cursor += 1;
        let gx = tile.0 * self.cfg.scan_tile_width + (idx % steps_x) * self.cfg.gen_tile_width;
        let gy = tile.1 * self.cfg.scan_tile_height + (idx / steps_x) * self.cfg.gen_tile_height;
        let gx1 = gx + self.cfg.gen_tile_width - 1;
        let gy1 = gy + self.cfg.gen_tile_height - 1;
        if gx1 < bbox.xmin || gx > bbox.xmax || gy1 < bbox.ymin || gy > bbox.ymax {
            return (StageStatus::Ready, None);
        }

        (StageStatus::Ready, Some(emit_stamp(id, gx, gy)))
    }

    fn enqueue(&mut self, triangle_id: usize) {
        self.queue.push(triangle_id);
    }

    fn reset(&mut self) {
        self.queue.clear();
        self.active = None;
    }
}

fn emit_stamp(triangle_id: usize, gx: i32, gy: i32) -> Stamp {
    let make_fragment = |dx: i32, dy: i32| Fragment {
        x: gx + dx,
        y: gy + dy,
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

    fn scanline_cfg() -> ScanlineConfig {
        ScanlineConfig {
            gen_tile_width: 2,
            gen_tile_height: 2,
            scan_tile_width: 4,
            scan_tile_height: 4,
            over_tile_scan_x: 2,
            over_tile_scan_y: 2,
        }
    }

    fn drain(trav: &mut ScanlineTraversal, pool: &mut SetupTrianglePool, max_cycles: u32) -> Vec<Stamp> {
        let mut stamps = Vec::new();
        for _ in 0..max_cycles {
            let (status, stamp) = trav.advance(pool);
            assert_eq!(status, StageStatus::Ready);
            if let Some(s) = stamp {
                stamps.push(s);
            }
            if pool.live_count() == 0 {
                break;
            }
        }
        stamps
    }

    #[test]
    fn walks_entire_bbox_and_frees_triangle() {
        let mut pool = SetupTrianglePool::new(4);
        let outcome = setup_triangle(
            &mut pool,
            Vertex::from_position(0.0, 0.0, 0.5, 1.0),
            Vertex::from_position(4.0, 0.0, 0.5, 1.0),
            Vertex::from_position(0.0, 4.0, 0.5, 1.0),
            &cfg(),
        );
        let crate::setup::SetupOutcome::Setup(id) = outcome else { panic!() };

        let mut trav = ScanlineTraversal::new(scanline_cfg());
        trav.enqueue(id);

        let stamps = drain(&mut trav, &mut pool, 64);
        // bbox is (0,0)-(3,3): a 4x4 area covered by 2x2 stamp steps -> 4 stamps.
        assert_eq!(stamps.len(), 4);
        assert_eq!(pool.live_count(), 0);
        let mut positions: Vec<(i32, i32)> = stamps.iter().map(|s| (s.fragments[0].x, s.fragments[0].y)).collect();
        positions.sort();
        assert_eq!(positions, vec![(0, 0), (0, 2), (2, 0), (2, 2)]);
    }

    #[test]
    fn empty_queue_reports_ready_with_no_stamp() {
        let mut pool = SetupTrianglePool::new(4);
        let mut trav = ScanlineTraversal::new(scanline_cfg());
        let (status, stamp) = trav.advance(&mut pool);
        assert_eq!(status, StageStatus::Ready);
        assert!(stamp.is_none());
    }

    #[test]
    fn large_triangle_crossing_several_scan_tiles_covers_full_bbox() {
        let mut big_cfg = cfg();
        big_cfg.viewport = BoundingBox { xmin: 0, ymin: 0, xmax: 31, ymax: 31 };
        let mut pool = SetupTrianglePool::new(4);
        let outcome = setup_triangle(
            &mut pool,
            Vertex::from_position(0.0, 0.0, 0.5, 1.0),
            Vertex::from_position(20.0, 0.0, 0.5, 1.0),
            Vertex::from_position(0.0, 20.0, 0.5, 1.0),
            &big_cfg,
        );
        let crate::setup::SetupOutcome::Setup(id) = outcome else { panic!() };
        let bbox = pool.get(id).unwrap().bbox;

        let mut trav = ScanlineTraversal::new(scanline_cfg());
        trav.enqueue(id);
        let stamps = drain(&mut trav, &mut pool, 4096);

        assert!(!stamps.is_empty());
        assert_eq!(pool.live_count(), 0);
        for s in &stamps {
            let (x, y) = (s.fragments[0].x, s.fragments[0].y);
            assert!(x >= bbox.xmin && x <= bbox.xmax && y >= bbox.ymin && y <= bbox.ymax);
        }
        // Every stamp position covering the interior corner should have been
        // visited exactly once (no duplicate scan-tile processing).
        let mut seen = std::collections::HashSet::new();
        for s in &stamps {
            assert!(seen.insert((s.fragments[0].x, s.fragments[0].y)), "stamp position emitted twice");
        }
    }
}
