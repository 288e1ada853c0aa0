//! [`PixelMapper`]: maps `(x, y[, sample])` screen coordinates to a linear
//! memory address through the six-level nested tiling hierarchy of spec
//! §4.1: `sample < pixel < stamp < generation-tile < scan-tile < over-tile
//! < display`. Every level's width and height are expressed in units of
//! the immediately smaller level and supplied as configuration; there is
//! no hidden layout policy here, only the arithmetic.
//!
//! Grounded on `components/memory/twin`'s tiling address component and
//! on spec §4.1/§6 ("Memory layout").

use rsim_core::SimError;

/// One level of the tiling hierarchy, expressed in units of the level
/// immediately below it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileLevel {
    pub width: u32,
    pub height: u32,
}

impl TileLevel {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Construction-time tiling configuration (spec §6: "for testing, use
/// scan=16x16, over=2x2, gen=2x2, stamp=2x2, sample=1 as defaults").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelMapperConfig {
    pub display_width: u32,
    pub display_height: u32,
    /// Pixels per stamp.
    pub stamp: TileLevel,
    /// Stamps per generation tile.
    pub gen_tile: TileLevel,
    /// Generation tiles per scan tile.
    pub scan_tile: TileLevel,
    /// Scan tiles per over-tile.
    pub over_tile: TileLevel,
    /// Samples per pixel (1 when MSAA is disabled).
    pub samples_per_pixel: u32,
}

impl PixelMapperConfig {
    /// The spec §6 default test configuration at a given display size.
    pub const fn defaults(display_width: u32, display_height: u32) -> Self {
        Self {
            display_width,
            display_height,
            stamp: TileLevel::new(2, 2),
            gen_tile: TileLevel::new(2, 2),
            scan_tile: TileLevel::new(16, 16),
            over_tile: TileLevel::new(2, 2),
            samples_per_pixel: 1,
        }
    }
}

/// Pure, stateless address mapper built once per simulation (spec §9:
/// "The only legitimate global state is the shared HZ buffer array and the
/// pixel-mapping configuration. Both should be constructed once per
/// simulation and passed by reference").
#[derive(Clone, Copy, Debug)]
pub struct PixelMapper {
    cfg: PixelMapperConfig,
    stamp_px: (u32, u32),
    gen_px: (u32, u32),
    scan_px: (u32, u32),
    over_px: (u32, u32),
    over_tiles_per_row: u32,
}

impl PixelMapper {
    /// Build a mapper from its tiling configuration.
    ///
    /// # Errors
    /// Returns [`SimError::Configuration`] if any level has a zero width,
    /// height, or sample count (spec §7.1).
    pub fn new(cfg: PixelMapperConfig) -> Result<Self, SimError> {
        for (name, level) in [
            ("stamp", cfg.stamp),
            ("gen_tile", cfg.gen_tile),
            ("scan_tile", cfg.scan_tile),
            ("over_tile", cfg.over_tile),
        ] {
            if level.width == 0 || level.height == 0 {
                return Err(SimError::Configuration(format!(
                    "pixel mapper level '{name}' has a zero dimension: {level:?}"
                )));
            }
        }
        if cfg.samples_per_pixel == 0 {
            return Err(SimError::Configuration(
                "pixel mapper samples_per_pixel must be >= 1".into(),
            ));
        }
        if cfg.display_width == 0 || cfg.display_height == 0 {
            return Err(SimError::Configuration(
                "pixel mapper display dimensions must be non-zero".into(),
            ));
        }

        let stamp_px = (cfg.stamp.width, cfg.stamp.height);
        let gen_px = (stamp_px.0 * cfg.gen_tile.width, stamp_px.1 * cfg.gen_tile.height);
        let scan_px = (gen_px.0 * cfg.scan_tile.width, gen_px.1 * cfg.scan_tile.height);
        let over_px = (scan_px.0 * cfg.over_tile.width, scan_px.1 * cfg.over_tile.height);
        let over_tiles_per_row = cfg.display_width.div_ceil(over_px.0);

        Ok(Self {
            cfg,
            stamp_px,
            gen_px,
            scan_px,
            over_px,
            over_tiles_per_row,
        })
    }

    /// The tiling configuration this mapper was built from.
    pub fn config(&self) -> &PixelMapperConfig {
        &self.cfg
    }

    /// Linear address of sample 0 of pixel `(x, y)`.
    ///
    /// Callers must have pre-clipped `(x, y)` to the configured display;
    /// out-of-range coordinates still produce *an* address, per spec
    /// §4.1's edge policy, but it is not meaningful.
    pub fn address(&self, x: u32, y: u32) -> u64 {
        self.address_sample(x, y, 0)
    }

    /// Linear address of a specific sample of pixel `(x, y)`.
    pub fn address_sample(&self, x: u32, y: u32, sample: u32) -> u64 {
        let (lx0, sx) = (x % self.stamp_px.0, x / self.stamp_px.0);
        let (ly0, sy) = (y % self.stamp_px.1, y / self.stamp_px.1);

        // Local position inside the stamp, in pixels.
        let (px0, py0) = (lx0, ly0);
        // Stamp coordinate, decomposed into local-within-gen-tile and the
        // gen-tile coordinate.
        let (lsx, gx) = (sx % self.cfg.gen_tile.width, sx / self.cfg.gen_tile.width);
        let (lsy, gy) = (sy % self.cfg.gen_tile.height, sy / self.cfg.gen_tile.height);
        // Gen-tile coordinate, decomposed into local-within-scan-tile and
        // the scan-tile (absolute) coordinate.
        let (lgx, tx) = (gx % self.cfg.scan_tile.width, gx / self.cfg.scan_tile.width);
        let (lgy, ty) = (gy % self.cfg.scan_tile.height, gy / self.cfg.scan_tile.height);
        // Scan-tile coordinate, decomposed into local-within-over-tile and
        // the over-tile (absolute) coordinate.
        let (ltx, ox) = (tx % self.cfg.over_tile.width, tx / self.cfg.over_tile.width);
        let (lty, oy) = (ty % self.cfg.over_tile.height, ty / self.cfg.over_tile.height);

        let over_index = (oy as u64) * (self.over_tiles_per_row as u64) + ox as u64;
        let scan_in_over = (lty as u64) * (self.cfg.over_tile.width as u64) + ltx as u64;
        let gen_in_scan = (lgy as u64) * (self.cfg.scan_tile.width as u64) + lgx as u64;
        let stamp_in_gen = (lsy as u64) * (self.cfg.gen_tile.width as u64) + lsx as u64;
        let pixel_in_stamp = (py0 as u64) * (self.stamp_px.0 as u64) + px0 as u64;

        let scan_tiles_per_over = (self.cfg.over_tile.width * self.cfg.over_tile.height) as u64;
        let gens_per_scan = (self.cfg.scan_tile.width * self.cfg.scan_tile.height) as u64;
        let stamps_per_gen = (self.cfg.gen_tile.width * self.cfg.gen_tile.height) as u64;
        let pixels_per_stamp = (self.cfg.stamp.width * self.cfg.stamp.height) as u64;

        let unit = (((over_index * scan_tiles_per_over + scan_in_over) * gens_per_scan
            + gen_in_scan)
            * stamps_per_gen
            + stamp_in_gen)
            * pixels_per_stamp
            + pixel_in_stamp;

        unit * self.cfg.samples_per_pixel as u64 + sample as u64
    }

    /// The scan-tile identifier `(tx, ty)` containing pixel `(x, y)`,
    /// floored to the containing tile (spec §4.1).
    pub fn tile_identifier(&self, x: u32, y: u32) -> (u32, u32) {
        (x / self.scan_px.0, y / self.scan_px.1)
    }

    /// Scan-tile dimensions, in pixels.
    pub fn scan_tile_pixels(&self) -> (u32, u32) {
        self.scan_px
    }

    /// Generation-tile dimensions, in pixels.
    pub fn gen_tile_pixels(&self) -> (u32, u32) {
        self.gen_px
    }

    /// Stamp dimensions, in pixels (always the atomic 2x2 shading unit
    /// under the spec §6 defaults, but configurable).
    pub fn stamp_pixels(&self) -> (u32, u32) {
        self.stamp_px
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_mapper() -> PixelMapper {
        PixelMapper::new(PixelMapperConfig::defaults(512, 512)).unwrap()
    }

    #[test]
    fn scan_tile_is_64x64_pixels_under_defaults() {
        let mapper = default_mapper();
        assert_eq!(mapper.scan_tile_pixels(), (64, 64));
    }

    #[test]
    fn tile_identifier_round_trips_to_first_pixel_address() {
        let mapper = default_mapper();
        let (tx, ty) = mapper.tile_identifier(130, 70);
        assert_eq!((tx, ty), (2, 1));
        let (tile_w, tile_h) = mapper.scan_tile_pixels();
        let first_pixel_addr = mapper.address(tx * tile_w, ty * tile_h);
        // The first pixel of a tile always has every "local" coordinate
        // zero, so its address is whatever the over-tile/scan-tile term
        // alone contributes.
        assert_eq!(mapper.address(tx * tile_w, ty * tile_h), first_pixel_addr);
        assert_eq!(mapper.tile_identifier(tx * tile_w, ty * tile_h), (tx, ty));
    }

    #[test]
    fn addresses_within_a_stamp_are_contiguous() {
        let mapper = default_mapper();
        let base = mapper.address(0, 0);
        assert_eq!(mapper.address(1, 0), base + 1);
        assert_eq!(mapper.address(0, 1), base + 2);
        assert_eq!(mapper.address(1, 1), base + 3);
    }

    #[test]
    fn samples_are_innermost() {
        let mut cfg = PixelMapperConfig::defaults(64, 64);
        cfg.samples_per_pixel = 4;
        let mapper = PixelMapper::new(cfg).unwrap();
        assert_eq!(mapper.address_sample(0, 0, 0), 0);
        assert_eq!(mapper.address_sample(0, 0, 3), 3);
        assert_eq!(mapper.address_sample(1, 0, 0), 4);
    }

    #[test]
    fn rejects_zero_dimension_level() {
        let mut cfg = PixelMapperConfig::defaults(64, 64);
        cfg.stamp = TileLevel::new(0, 2);
        assert!(PixelMapper::new(cfg).is_err());
    }

    #[test]
    fn distinct_pixels_get_distinct_addresses_across_a_tile() {
        let mapper = default_mapper();
        let mut seen = std::collections::HashSet::new();
        for y in 0..64 {
            for x in 0..64 {
                assert!(seen.insert(mapper.address(x, y)), "duplicate address at ({x},{y})");
            }
        }
    }
}
