//! [`PipelineOrchestrator`]: the top-level per-cycle state machine that
//! fans commands and register writes to the streamer, rasterizer, and
//! early-Z stages, and advances them in the fixed leaf-first order spec
//! §4.8/§5 requires.
//!
//! Grounded on `integration/gs-twin`: one struct owning every component
//! crate, a tiny top-level state machine, and a register file translated
//! into each component's construction-time configuration.

pub mod assembler;
pub mod config;
pub mod register_file;

use std::collections::{HashMap, VecDeque};

use log::warn;

use rsim_core::{Cycle, SimError, Signal};
use rsim_early_z::{HZConfig, HZStage};
use rsim_pixel_mapper::PixelMapper;
use rsim_rasterizer::config::RasterizerConfig;
use rsim_rasterizer::setup::SetupOutcome;
use rsim_rasterizer::stamp::Stamp;
use rsim_rasterizer::vertex::Vertex;
use rsim_rasterizer::RasterizerStage;
use rsim_registers::Command;
use rsim_streamer::config::StreamerConfig;
use rsim_streamer::fetch::FetchConfig;
use rsim_streamer::StreamerStage;

pub use assembler::PrimitiveAssembler;
pub use config::OrchestratorConfig;
pub use register_file::RegisterFile;

/// Top-level cycle state (spec §4.8): `RESET -> READY -> DRAWING -> END
/// -> READY`, plus the `CLEAR` sub-machine for fast `CLEAR_Z` passes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Reset,
    Ready,
    Drawing,
    End,
    Clear,
}

/// The two exit signals a test driver may poll (spec §6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitSignal {
    RastEnd,
    RastReset,
}

/// Per-cycle stamp bandwidth of the internal rasterizer -> HZ link; a
/// construction detail, not a register (spec §5: every inter-stage link
/// is a fixed-bandwidth, fixed-latency [`Signal`]).
const STAMP_SIGNAL_BANDWIDTH: usize = 8;

/// Owns every stage and drives them in leaf-first order (spec §4.8,
/// §9 "Cooperative scheduling"). The setup-triangle pool, streamer
/// pipeline, and interpolator are rebuilt fresh at the start of each
/// `DRAW` from the current [`RegisterFile`] snapshot; the HZ buffer and
/// cache persist across draws, exactly like real hardware, until an
/// explicit `CLEAR_Z_STENCIL`.
pub struct PipelineOrchestrator {
    cfg: OrchestratorConfig,
    pixel_mapper: PixelMapper,
    registers: RegisterFile,
    memory: HashMap<u32, Vec<u8>>,

    state: PipelineState,
    cycle: Cycle,
    exit_signals: VecDeque<ExitSignal>,

    hz: HZStage,
    streamer: Option<StreamerStage>,
    rasterizer: Option<RasterizerStage>,
    assembler: PrimitiveAssembler,
    pending_triangles: VecDeque<[Vertex; 3]>,
    stamp_signal: Signal<Stamp>,

    output: Vec<Stamp>,
    blocks_per_row: u32,
}

impl PipelineOrchestrator {
    /// Builds a fresh orchestrator. Fails only on illegal construction
    /// parameters (spec §7.1): a malformed pixel-mapper tiling
    /// configuration.
    pub fn new(cfg: OrchestratorConfig) -> Result<Self, SimError> {
        let pixel_mapper = PixelMapper::new(cfg.pixel_mapper)?;
        let (stamp_w, stamp_h) = pixel_mapper.stamp_pixels();
        let block_w = (stamp_w * cfg.hz_block_stamps.0).max(1);
        let block_h = (stamp_h * cfg.hz_block_stamps.1).max(1);
        let blocks_per_row = cfg.pixel_mapper.display_width.div_ceil(block_w);
        let blocks_per_col = cfg.pixel_mapper.display_height.div_ceil(block_h);
        let block_count = (blocks_per_row * blocks_per_col).max(1) as usize;

        let registers = RegisterFile::default();
        let hz = HZStage::new(HZConfig {
            stamps_per_cycle: cfg.hz_stamps_per_cycle,
            queue_size: cfg.hz_queue_size,
            cache_lines: cfg.hz_cache_lines,
            block_count,
            clear_value: registers.z_buffer_clear,
            clear_blocks_per_cycle: cfg.hz_clear_blocks_per_cycle,
            depth_func: registers.depth_function,
            hierarchical_z_enabled: registers.hierarchical_z,
        });

        Ok(Self {
            cfg,
            pixel_mapper,
            registers,
            memory: HashMap::new(),
            state: PipelineState::Ready,
            cycle: 0,
            exit_signals: VecDeque::new(),
            hz,
            streamer: None,
            rasterizer: None,
            assembler: PrimitiveAssembler::new(rsim_registers::Primitive::Triangles),
            pending_triangles: VecDeque::new(),
            stamp_signal: Signal::new(STAMP_SIGNAL_BANDWIDTH, 0),
            output: Vec::new(),
            blocks_per_row,
        })
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn cycle(&self) -> Cycle {
        self.cycle
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    pub fn pixel_mapper(&self) -> &PixelMapper {
        &self.pixel_mapper
    }

    /// Binds a flat byte buffer to an opaque memory address (spec
    /// GLOSSARY "Memory descriptor"), as if the out-of-scope GAL/HAL
    /// allocator had placed it there. `STREAM_ADDRESS`/`INDEX_STREAM`
    /// registers name addresses bound this way.
    pub fn bind_memory(&mut self, address: u32, bytes: Vec<u8>) {
        self.memory.insert(address, bytes);
    }

    /// Drains the exit signals raised since the last call (spec §6:
    /// `RAST_END` on `DRAW` completion, `RAST_RESET` on `RESET`
    /// completion).
    pub fn take_exit_signals(&mut self) -> Vec<ExitSignal> {
        self.exit_signals.drain(..).collect()
    }

    /// Drains the fragment stamps the HZ stage has released downstream
    /// since the last call. In the full pipeline these feed the
    /// fragment-shading and blend stages (out of scope, spec §1); here
    /// they're the simulator's final observable output.
    pub fn take_output(&mut self) -> Vec<Stamp> {
        std::mem::take(&mut self.output)
    }

    /// Submits one command from the front-end's command stream (spec §6,
    /// §7.2): processed immediately rather than queued, since the
    /// command port is only read while `READY`.
    pub fn submit_command(&mut self, command: Command) -> Result<(), SimError> {
        match command {
            Command::Reset => {
                self.full_reset();
                self.exit_signals.push_back(ExitSignal::RastReset);
                Ok(())
            }
            Command::Draw => {
                self.require_ready("DRAW")?;
                self.begin_draw();
                Ok(())
            }
            Command::End => {
                self.require_state(PipelineState::Drawing, "END")?;
                self.state = PipelineState::End;
                Ok(())
            }
            Command::ClearColor { .. } => {
                // Color-buffer clears belong entirely to the out-of-scope
                // frame-buffer/GAL layer (spec §1); acknowledged as a
                // no-op so a command stream built for the full GPU still
                // replays cleanly.
                Ok(())
            }
            Command::ClearZStencil { z, stencil: _ } => {
                self.require_ready("CLEAR_Z_STENCIL")?;
                self.begin_clear(z);
                Ok(())
            }
            Command::RegWrite { reg_id, subreg, payload } => {
                self.require_ready("REG_WRITE")?;
                self.registers.apply(reg_id, subreg, payload)
            }
            // Every other command names an out-of-scope GAL/HAL
            // operation (spec §1); acknowledged without touching core
            // state.
            _ => Ok(()),
        }
    }

    fn require_ready(&self, what: &str) -> Result<(), SimError> {
        self.require_state(PipelineState::Ready, what)
    }

    fn require_state(&self, expected: PipelineState, what: &str) -> Result<(), SimError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SimError::Protocol(format!("{what} issued while orchestrator is {:?}", self.state)))
        }
    }

    fn full_reset(&mut self) {
        self.registers = RegisterFile::default();
        self.hz.reset();
        self.streamer = None;
        self.rasterizer = None;
        self.assembler.reset(rsim_registers::Primitive::Triangles);
        self.pending_triangles.clear();
        self.stamp_signal = Signal::new(STAMP_SIGNAL_BANDWIDTH, 0);
        self.output.clear();
        self.state = PipelineState::Ready;
    }

    /// Resolves the current register state into fresh streamer and
    /// rasterizer stages and transitions to `DRAWING`, or silently drops
    /// the draw and stays `READY` if the configured primitive isn't one
    /// this core rasterizes (spec §7.5, §9 Open Question).
    fn begin_draw(&mut self) {
        self.assembler.reset(self.registers.primitive);
        if !self.assembler.is_supported() {
            return;
        }

        self.hz.set_depth_policy(self.registers.depth_function, self.registers.hierarchical_z);

        let index_addr = self.registers.index_stream_address().unwrap_or(0);
        let index_memory = self.memory.get(&index_addr).cloned().unwrap_or_default();
        let stream_memory: Vec<Vec<u8>> = self
            .registers
            .stream_addresses()
            .iter()
            .map(|addr| self.memory.get(addr).cloned().unwrap_or_default())
            .collect();

        let streamer_cfg = StreamerConfig {
            fetch: FetchConfig {
                transaction_size: self.cfg.fetch_transaction_size,
                index_stride: self.registers.index_element_width(),
                stream_start: self.registers.stream_start as usize,
                stream_count: self.registers.stream_count as usize,
                instances: self.registers.stream_instances.max(1) as usize,
            },
            streams: self.registers.streamer_streams(),
            bindings: self.registers.loader_bindings(),
            loader_units: self.cfg.loader_units,
            output_cache_lines: self.cfg.output_cache_lines,
            output_slot_capacity: self.cfg.output_slot_capacity,
        };
        self.streamer = Some(StreamerStage::new(streamer_cfg, index_memory, stream_memory));

        let mut rasterizer_cfg = RasterizerConfig::defaults();
        rasterizer_cfg.setup = self.registers.setup_config();
        rasterizer_cfg.interpolator = self.registers.interpolator_config();
        rasterizer_cfg.traversal_mode = self.cfg.traversal_mode;
        rasterizer_cfg.scanline = self.cfg.scanline;
        rasterizer_cfg.recursive = self.cfg.recursive;
        rasterizer_cfg.subpixel = fixedpt::SubpixelFormat::new(self.cfg.subpixel_fractional_bits);
        rasterizer_cfg.triangle_pool_capacity = self.cfg.triangle_pool_capacity;
        rasterizer_cfg.d3d9_pixel_coordinates = self.registers.d3d9_pixel_coordinates;
        self.rasterizer = Some(RasterizerStage::new(rasterizer_cfg));

        self.pending_triangles.clear();
        self.hz.begin_draw();
        self.state = PipelineState::Drawing;
    }

    /// Starts the `CLEAR_Z` path (spec §4.6, scenario 5). With the scissor
    /// disabled, a full-buffer fast clear runs for `clearCycles` ticks.
    /// With the scissor enabled, the reference behavior is to replay a
    /// quad draw through the default vertex/fragment programs instead —
    /// those programs, and the color/blend path they exercise, are out of
    /// scope for this core (spec §1), so both paths are approximated the
    /// same way: the whole HZ buffer and cache become invalid over the
    /// full-buffer clear cycle count, since neither path leaves any part
    /// of the buffer in a known-valid state.
    fn begin_clear(&mut self, z: f32) {
        let pixel_count = (self.pixel_mapper.config().display_width * self.pixel_mapper.config().display_height) as usize;
        let (stamp_w, stamp_h) = self.pixel_mapper.stamp_pixels();
        let stamp_fragments = (stamp_w * stamp_h) as usize;
        let block_stamps = (self.cfg.hz_block_stamps.0 * self.cfg.hz_block_stamps.1) as usize;

        self.registers.z_buffer_clear = quantize_clear_depth(z, self.registers.z_buffer_bits);
        self.hz.begin_clear(pixel_count.max(1), stamp_fragments.max(1), block_stamps.max(1));
        self.state = PipelineState::Clear;
    }

    /// Computes the single HZ block address a stamp's top-left fragment
    /// falls in (spec §3: "size is configured in stamps per block").
    fn hz_block_for(&self, x: i32, y: i32) -> usize {
        let (stamp_w, stamp_h) = self.pixel_mapper.stamp_pixels();
        let block_w = (stamp_w * self.cfg.hz_block_stamps.0).max(1);
        let block_h = (stamp_h * self.cfg.hz_block_stamps.1).max(1);
        let bx = x.max(0) as u32 / block_w;
        let by = y.max(0) as u32 / block_h;
        (by * self.blocks_per_row + bx) as usize
    }

    /// Advances every stage exactly once, in leaf-first order (spec
    /// §4.8, §9): streamer, then rasterizer setup/traversal, then the HZ
    /// stage, mirroring the triangle-level flow of spec §2.
    pub fn advance(&mut self) {
        self.cycle += 1;
        match self.state {
            PipelineState::Ready | PipelineState::Reset => {}
            PipelineState::Drawing => self.advance_drawing(),
            PipelineState::Clear => self.advance_clear(),
            PipelineState::End => self.advance_end(),
        }
    }

    fn advance_drawing(&mut self) {
        if let Some(streamer) = &mut self.streamer {
            for committed in streamer.advance_pipeline() {
                for triangle in self.assembler.push(committed.vertex) {
                    self.pending_triangles.push_back(triangle);
                }
            }
        }

        while let Some(&triangle) = self.pending_triangles.front() {
            let Some(rasterizer) = &mut self.rasterizer else { break };
            match rasterizer.submit_triangle(triangle[0], triangle[1], triangle[2]) {
                SetupOutcome::Setup(_) | SetupOutcome::Culled => {
                    self.pending_triangles.pop_front();
                }
                SetupOutcome::PoolFull => break,
            }
        }

        if let Some(rasterizer) = &mut self.rasterizer {
            rasterizer.advance_traversal(&mut self.stamp_signal);
        }
        for stamp in self.stamp_signal.advance_cycle() {
            let block = self.hz_block_for(stamp.fragments[0].x, stamp.fragments[0].y);
            if !self.hz.try_enqueue(stamp, vec![block]) {
                warn!("HZ stage queue full; dropping a stamp rather than stalling traversal");
            }
        }

        for stamp in self.hz.advance() {
            if self.registers.hierarchical_z {
                for (fragment, culled) in stamp.fragments.iter().zip(stamp.culled.iter()) {
                    if !*culled {
                        let block = self.hz_block_for(fragment.x, fragment.y);
                        self.hz.apply_zstencil_write(block, fragment.z);
                    }
                }
            }
            self.output.push(stamp);
        }

        let streamer_done = self.streamer.as_ref().is_some_and(StreamerStage::last_marker_fired);
        let rasterizer_idle = self.rasterizer.as_ref().is_none_or(|r| r.pool().live_count() == 0);
        if streamer_done && rasterizer_idle && self.pending_triangles.is_empty() && self.hz.is_idle() {
            self.hz.begin_end();
            self.state = PipelineState::End;
        }
    }

    fn advance_clear(&mut self) {
        self.hz.advance();
        if self.hz.state() == rsim_early_z::HZStageState::Ready {
            self.state = PipelineState::Ready;
        }
    }

    fn advance_end(&mut self) {
        self.hz.end_to_ready();
        self.exit_signals.push_back(ExitSignal::RastEnd);
        self.state = PipelineState::Ready;
    }
}

/// Quantizes a `CLEAR_Z_STENCIL` float depth to the configured integer
/// depth-buffer precision (spec §4.5, §6 `Z_BUFFER_CLEAR:u24`).
fn quantize_clear_depth(z: f32, depth_bits: u32) -> u32 {
    let max_value = (1u64 << depth_bits) - 1;
    (z.clamp(0.0, 1.0) as f64 * max_value as f64).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsim_registers::{Primitive, RegisterId, RegisterPayload};

    fn triangle_index_buffer() -> Vec<u8> {
        [0u16, 1, 2].iter().flat_map(|i| i.to_le_bytes()).collect()
    }

    fn position_stream() -> Vec<u8> {
        let positions = [(0.0f32, 0.0f32), (4.0, 0.0), (0.0, 4.0)];
        let mut bytes = Vec::new();
        for (x, y) in positions {
            for v in [x, y, 0.5f32, 1.0f32] {
                bytes.extend_from_slice(&v.to_le_bytes());
            }
        }
        bytes
    }

    fn configure_single_triangle_draw(orch: &mut PipelineOrchestrator) {
        orch.bind_memory(0x1000, triangle_index_buffer());
        orch.bind_memory(0x2000, position_stream());

        let writes = [
            (RegisterId::ViewportIniX, None, RegisterPayload::Int(0)),
            (RegisterId::ViewportIniY, None, RegisterPayload::Int(0)),
            (RegisterId::ViewportWidth, None, RegisterPayload::UInt(8)),
            (RegisterId::ViewportHeight, None, RegisterPayload::UInt(8)),
            (RegisterId::Culling, None, RegisterPayload::CullMode(rsim_registers::CullMode::None)),
            (RegisterId::IndexMode, None, RegisterPayload::Bool(true)),
            (RegisterId::IndexStream, None, RegisterPayload::UInt(0)),
            (RegisterId::StreamAddress, Some(0), RegisterPayload::Address(0x1000)),
            (
                RegisterId::StreamData,
                Some(0),
                RegisterPayload::StreamData(rsim_registers::StreamDataType::Uint16),
            ),
            (RegisterId::StreamAddress, Some(1), RegisterPayload::Address(0x2000)),
            (RegisterId::StreamStride, Some(1), RegisterPayload::UInt(16)),
            (
                RegisterId::StreamData,
                Some(1),
                RegisterPayload::StreamData(rsim_registers::StreamDataType::Float32),
            ),
            (
                RegisterId::VertexAttributeMap,
                Some(0),
                RegisterPayload::AttributeBinding(rsim_registers::AttributeBinding::Stream(1)),
            ),
            (RegisterId::StreamStart, None, RegisterPayload::UInt(0)),
            (RegisterId::StreamCount, None, RegisterPayload::UInt(3)),
            (RegisterId::StreamInstances, None, RegisterPayload::UInt(1)),
            (RegisterId::Primitive, None, RegisterPayload::Primitive(Primitive::Triangles)),
        ];
        for (reg, subreg, payload) in writes {
            orch.submit_command(Command::RegWrite { reg_id: reg, subreg, payload }).unwrap();
        }
    }

    #[test]
    fn reg_write_while_drawing_is_a_protocol_error() {
        let mut orch = PipelineOrchestrator::new(OrchestratorConfig::defaults(8, 8)).unwrap();
        configure_single_triangle_draw(&mut orch);
        orch.submit_command(Command::Draw).unwrap();
        let err = orch.submit_command(Command::RegWrite {
            reg_id: RegisterId::DepthTest,
            subreg: None,
            payload: RegisterPayload::Bool(true),
        });
        assert!(matches!(err, Err(SimError::Protocol(_))));
    }

    #[test]
    fn draw_runs_to_completion_and_emits_rast_end() {
        let mut orch = PipelineOrchestrator::new(OrchestratorConfig::defaults(8, 8)).unwrap();
        configure_single_triangle_draw(&mut orch);
        orch.submit_command(Command::Draw).unwrap();
        assert_eq!(orch.state(), PipelineState::Drawing);

        let mut saw_end = false;
        for _ in 0..200 {
            orch.advance();
            for signal in orch.take_exit_signals() {
                if signal == ExitSignal::RastEnd {
                    saw_end = true;
                }
            }
            if saw_end {
                break;
            }
        }
        assert!(saw_end, "draw never reached END within the cycle budget");
        assert_eq!(orch.state(), PipelineState::Ready);

        let fragments_inside = orch
            .take_output()
            .iter()
            .flat_map(|s| s.fragments.iter().zip(s.culled.iter()))
            .filter(|(f, culled)| f.inside && !**culled)
            .count();
        assert!(fragments_inside > 0);
    }

    #[test]
    fn reset_is_idempotent() {
        let mut orch = PipelineOrchestrator::new(OrchestratorConfig::defaults(8, 8)).unwrap();
        orch.submit_command(Command::Reset).unwrap();
        let after_first = orch.registers().viewport;
        orch.submit_command(Command::Reset).unwrap();
        assert_eq!(orch.registers().viewport, after_first);
        assert_eq!(orch.state(), PipelineState::Ready);
    }

    #[test]
    fn unsupported_primitive_is_dropped_and_stays_ready() {
        let mut orch = PipelineOrchestrator::new(OrchestratorConfig::defaults(8, 8)).unwrap();
        orch.submit_command(Command::RegWrite {
            reg_id: RegisterId::Primitive,
            subreg: None,
            payload: RegisterPayload::Primitive(Primitive::Points),
        })
        .unwrap();
        orch.submit_command(Command::Draw).unwrap();
        assert_eq!(orch.state(), PipelineState::Ready);
    }
}
