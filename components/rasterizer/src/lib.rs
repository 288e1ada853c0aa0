//! Triangle setup, tile traversal, and fragment interpolation: the
//! rasterizer core sitting between the streamer and the early-Z/HZ stage.
//!
//! Vertices arrive in ordered triples off a [`Signal`], are set up into
//! edge/Z-plane equations and pushed through the configured traversal
//! strategy, and leave as fragment stamps for the downstream Hierarchical-Z
//! stage to consume.

pub mod config;
pub mod interpolator;
pub mod setup;
pub mod stamp;
pub mod traversal;
pub mod vertex;

use rsim_core::{Cycle, Signal, Stage, StageStatus};

use config::RasterizerConfig;
use interpolator::FragmentInterpolator;
use setup::{setup_triangle, SetupOutcome, SetupTrianglePool};
use stamp::Stamp;
use traversal::recursive::RecursiveTraversal;
use traversal::scanline::ScanlineTraversal;
use traversal::{Traversal, TraversalMode};
use vertex::Vertex;

enum TraversalImpl {
    Scanline(ScanlineTraversal),
    Recursive(RecursiveTraversal),
}

impl Traversal for TraversalImpl {
    fn advance(&mut self, pool: &mut SetupTrianglePool) -> (StageStatus, Option<Stamp>) {
        match self {
            TraversalImpl::Scanline(t) => t.advance(pool),
            TraversalImpl::Recursive(t) => t.advance(pool),
        }
    }

    fn enqueue(&mut self, triangle_id: usize) {
        match self {
            TraversalImpl::Scanline(t) => t.enqueue(triangle_id),
            TraversalImpl::Recursive(t) => t.enqueue(triangle_id),
        }
    }

    fn reset(&mut self) {
        match self {
            TraversalImpl::Scanline(t) => t.reset(),
            TraversalImpl::Recursive(t) => t.reset(),
        }
    }
}

/// The rasterizer front-end: triangle setup plus whichever traversal mode
/// is configured, exposed as a single [`Stage`].
pub struct RasterizerStage {
    cfg: RasterizerConfig,
    pool: SetupTrianglePool,
    traversal: TraversalImpl,
    interpolator: FragmentInterpolator,
    status: StageStatus,
}

impl RasterizerStage {
    pub fn new(cfg: RasterizerConfig) -> Self {
        let traversal = match cfg.traversal_mode {
            TraversalMode::Scanline => TraversalImpl::Scanline(ScanlineTraversal::new(cfg.scanline)),
            TraversalMode::Recursive => TraversalImpl::Recursive(RecursiveTraversal::new(cfg.recursive)),
        };
        Self {
            interpolator: FragmentInterpolator::new(cfg.interpolator),
            pool: SetupTrianglePool::new(cfg.triangle_pool_capacity),
            traversal,
            cfg,
            status: StageStatus::Ready,
        }
    }

    /// Set up one triangle and, if accepted, enqueue it for traversal.
    /// Returns the outcome so the caller (orchestrator or test) can tell a
    /// culled triangle apart from a pool-exhaustion backoff.
    pub fn submit_triangle(&mut self, v1: Vertex, v2: Vertex, v3: Vertex) -> SetupOutcome {
        let outcome = setup_triangle(&mut self.pool, v1, v2, v3, &self.cfg.setup);
        if let SetupOutcome::Setup(id) = outcome {
            self.traversal.enqueue(id);
        }
        outcome
    }

    /// Drain ready fragment stamps from `raw_in` (untested fragment
    /// positions from the traversal walker) into `stamps_out`, running
    /// each fragment through the interpolator along the way.
    pub fn advance_traversal(&mut self, stamps_out: &mut Signal<Stamp>) {
        let (status, raw_stamp) = self.traversal.advance(&mut self.pool);
        self.status = status;
        let Some(raw_stamp) = raw_stamp else { return };

        let Some(tri) = self.pool.get(raw_stamp.triangle_id) else {
            return;
        };

        let mut fragments = raw_stamp.fragments;
        let mut culled = raw_stamp.culled;
        for (i, frag) in fragments.iter_mut().enumerate() {
            let interpolated = self.interpolator.interpolate(
                tri,
                frag.x,
                frag.y,
                self.cfg.subpixel,
                self.cfg.d3d9_pixel_coordinates,
                self.cfg.setup.d3d9_rasterization_rules,
            );
            culled[i] = !interpolated.inside;
            *frag = interpolated;
        }

        let _ = stamps_out.write(Stamp {
            fragments,
            culled,
            triangle_id: raw_stamp.triangle_id,
        });
    }

    pub fn pool(&self) -> &SetupTrianglePool {
        &self.pool
    }
}

impl Stage for RasterizerStage {
    fn advance(&mut self, _cycle: Cycle) {
        // Orchestrator drives traversal output through `advance_traversal`
        // directly, since it needs a handle on the downstream `Signal` to
        // write into; this no-op keeps `RasterizerStage` a valid `Stage`
        // for status/reset bookkeeping.
    }

    fn status(&self) -> StageStatus {
        self.status
    }

    fn reset(&mut self) {
        self.pool.reset();
        self.traversal.reset();
        self.status = StageStatus::Ready;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submitting_and_draining_a_triangle_yields_inside_fragments() {
        let mut cfg = RasterizerConfig::defaults();
        cfg.setup.viewport = setup::BoundingBox { xmin: 0, ymin: 0, xmax: 7, ymax: 7 };
        cfg.setup.cull_mode = rsim_registers::CullMode::None;
        let mut stage = RasterizerStage::new(cfg);

        let outcome = stage.submit_triangle(
            Vertex::from_position(0.0, 0.0, 0.5, 1.0),
            Vertex::from_position(4.0, 0.0, 0.5, 1.0),
            Vertex::from_position(0.0, 4.0, 0.5, 1.0),
        );
        assert!(matches!(outcome, SetupOutcome::Setup(_)));

        let mut out: Signal<Stamp> = Signal::new(4, 0);
        let mut saw_inside = false;
        for _ in 0..16 {
            stage.advance_traversal(&mut out);
            if out.visible().iter().any(|s| s.fragments.iter().any(|f| f.inside)) {
                saw_inside = true;
            }
            out.advance_cycle();
        }
        assert!(saw_inside);
        assert_eq!(stage.pool().live_count(), 0);
    }

    #[test]
    fn reset_clears_pool_and_traversal_queue() {
        let cfg = RasterizerConfig::defaults();
        let mut stage = RasterizerStage::new(cfg);
        stage.submit_triangle(
            Vertex::from_position(0.0, 0.0, 0.5, 1.0),
            Vertex::from_position(4.0, 0.0, 0.5, 1.0),
            Vertex::from_position(0.0, 4.0, 0.5, 1.0),
        );
        Stage::reset(&mut stage);
        assert_eq!(stage.pool().live_count(), 0);
        assert_eq!(stage.status(), StageStatus::Ready);
    }
}
