//! Aggregate construction-time configuration for the rasterizer stage,
//! assembled from register writes (spec §6).

use crate::interpolator::InterpolatorConfig;
use crate::setup::SetupConfig;
use crate::traversal::recursive::RecursiveConfig;
use crate::traversal::scanline::ScanlineConfig;
use crate::traversal::TraversalMode;
use fixedpt::SubpixelFormat;

#[derive(Clone, Copy, Debug)]
pub struct RasterizerConfig {
    pub setup: SetupConfig,
    pub interpolator: InterpolatorConfig,
    pub traversal_mode: TraversalMode,
    pub scanline: ScanlineConfig,
    pub recursive: RecursiveConfig,
    pub subpixel: SubpixelFormat,
    pub triangle_pool_capacity: usize,
    pub d3d9_pixel_coordinates: bool,
}

impl RasterizerConfig {
    /// A small, conservative default configuration: no MSAA, scanline
    /// traversal, 4-bit subpixel precision. Exercised by tests and by the
    /// CLI when no explicit register stream configures otherwise.
    pub fn defaults() -> Self {
        use crate::setup::BoundingBox;
        use rsim_registers::{CullMode, FaceMode};

        Self {
            setup: SetupConfig {
                face_mode: FaceMode::Ccw,
                cull_mode: CullMode::Back,
                d3d9_rasterization_rules: true,
                d3d9_pixel_coordinates: false,
                viewport: BoundingBox { xmin: 0, ymin: 0, xmax: 639, ymax: 479 },
                scissor: None,
                thin_triangle_bias: None,
            },
            interpolator: InterpolatorConfig::new_no_msaa(),
            traversal_mode: TraversalMode::Scanline,
            scanline: ScanlineConfig {
                gen_tile_width: 2,
                gen_tile_height: 2,
                scan_tile_width: 16,
                scan_tile_height: 16,
                over_tile_scan_x: 2,
                over_tile_scan_y: 2,
            },
            recursive: RecursiveConfig { root_tile_size: 64 },
            subpixel: SubpixelFormat::new(4),
            triangle_pool_capacity: 16,
            d3d9_pixel_coordinates: false,
        }
    }
}
