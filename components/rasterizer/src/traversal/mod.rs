//! Tile traversal strategies walking a setup triangle's bounding box and
//! emitting stamps (spec §4.3, §4.4).
//!
//! Grounded on `original_source/arch/funcmodel/Rasterizer/cmTraversal.h`,
//! which offers exactly these two interchangeable strategies behind one
//! interface.

pub mod recursive;
pub mod scanline;

use rsim_core::StageStatus;

use crate::setup::SetupTrianglePool;
use crate::stamp::Stamp;

/// Which traversal strategy a [`crate::config::RasterizerConfig`] selects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraversalMode {
    Scanline,
    Recursive,
}

/// Common traversal entry point, implemented by both strategies so the
/// owning rasterizer stage can stay strategy-agnostic.
pub trait Traversal {
    /// Advance traversal by one cycle, consuming from `pool` the next
    /// triangle(s) awaiting rasterization and producing at most one stamp.
    ///
    /// Returns `Ready` with a stamp when one was produced this cycle,
    /// `Ready` with `None` when the traversal queue is empty, or `Busy`
    /// while a triangle is still being walked (spec §4.3: one
    /// edge/Z-equation evaluation group per cycle).
    fn advance(&mut self, pool: &mut SetupTrianglePool) -> (StageStatus, Option<Stamp>);

    /// Enqueue a freshly set-up triangle id for traversal.
    fn enqueue(&mut self, triangle_id: usize);

    fn reset(&mut self);
}
