//! Construction-time configuration for [`crate::PipelineOrchestrator`] —
//! the parameters that are not registers (spec §6 only covers the
//! *mutable* state; pool capacities, cache sizes, and bus widths are
//! fixed at construction, same as on real hardware).

use rsim_pixel_mapper::PixelMapperConfig;
use rsim_rasterizer::traversal::recursive::RecursiveConfig;
use rsim_rasterizer::traversal::scanline::ScanlineConfig;
use rsim_rasterizer::traversal::TraversalMode;
use rsim_streamer::fetch::DEFAULT_TRANSACTION_SIZE;

#[derive(Clone, Copy, Debug)]
pub struct OrchestratorConfig {
    pub pixel_mapper: PixelMapperConfig,
    pub triangle_pool_capacity: usize,
    pub traversal_mode: TraversalMode,
    pub scanline: ScanlineConfig,
    pub recursive: RecursiveConfig,
    pub subpixel_fractional_bits: u32,

    pub hz_cache_lines: usize,
    pub hz_queue_size: usize,
    pub hz_stamps_per_cycle: usize,
    pub hz_clear_blocks_per_cycle: usize,
    /// HZ block size, in stamps (spec §3: "HZ block ... size is
    /// configured in 'stamps per block'").
    pub hz_block_stamps: (u32, u32),

    pub loader_units: usize,
    pub output_cache_lines: usize,
    pub output_slot_capacity: usize,
    pub fetch_transaction_size: usize,
}

impl OrchestratorConfig {
    /// The spec §6 default test configuration: scan=16x16, over=2x2,
    /// gen=2x2, stamp=2x2 tiling, scanline traversal, one HZ block per
    /// stamp, a small triangle pool, and a single loader unit.
    pub fn defaults(display_width: u32, display_height: u32) -> Self {
        Self {
            pixel_mapper: PixelMapperConfig::defaults(display_width, display_height),
            triangle_pool_capacity: 16,
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
            subpixel_fractional_bits: 4,
            hz_cache_lines: 8,
            hz_queue_size: 16,
            hz_stamps_per_cycle: 1,
            hz_clear_blocks_per_cycle: 4,
            hz_block_stamps: (1, 1),
            loader_units: 2,
            output_cache_lines: 16,
            output_slot_capacity: 16,
            fetch_transaction_size: DEFAULT_TRANSACTION_SIZE,
        }
    }
}
