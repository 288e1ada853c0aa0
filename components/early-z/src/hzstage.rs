//! [`HZStage`]: the early hierarchical-Z aggregation stage sitting
//! between tile traversal and the fragment interpolator (spec §4.6).

use rsim_core::StageStatus;
use rsim_registers::CompareFunc;
use rsim_rasterizer::stamp::Stamp;

use crate::hzbuffer::HZBuffer;
use crate::hzcache::{HZCache, InsertResult, SearchResult};

/// Largest number of HZ blocks a single stamp may straddle (typically hit
/// under MSAA, where samples scatter across more than one block).
pub const MAX_STAMP_BLOCKS: usize = 4;

/// Stage-level cycle state, mirroring the orchestrator's own state names
/// (spec §4.6, §4.8) since the HZ stage runs its own clear sub-machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HZStageState {
    Reset,
    Ready,
    Drawing,
    End,
    Clear,
    ClearEnd,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EntryState {
    Reading,
    Testing,
    Sending,
}

struct QueueEntry {
    stamp: Stamp,
    blocks: Vec<usize>,
    slots: Vec<Option<usize>>,
    stamp_min_z: u32,
    culled: bool,
    state: EntryState,
}

#[derive(Clone, Copy, Debug)]
pub struct HZConfig {
    pub stamps_per_cycle: usize,
    pub queue_size: usize,
    pub cache_lines: usize,
    pub block_count: usize,
    pub clear_value: u32,
    /// HZ blocks cleared per cycle during a fast `CLEAR_Z` (spec §4.6).
    pub clear_blocks_per_cycle: usize,
    pub depth_func: CompareFunc,
    pub hierarchical_z_enabled: bool,
}

/// Whether a stamp with min depth `stamp_z` could still pass a fragment
/// already recorded at `block_z`, under `func` (spec §4.3). `Equal` is
/// accelerated conservatively as `stamp_z <= block_z`, same as `Lequal`.
fn hz_would_pass(func: CompareFunc, stamp_z: u32, block_z: u32) -> bool {
    match func {
        CompareFunc::Less => stamp_z < block_z,
        CompareFunc::Lequal | CompareFunc::Equal => stamp_z <= block_z,
        _ => true,
    }
}

fn min_covered_z(stamp: &Stamp) -> u32 {
    stamp
        .fragments
        .iter()
        .zip(stamp.culled.iter())
        .filter(|(_, culled)| !**culled)
        .map(|(f, _)| f.z)
        .min()
        .unwrap_or(u32::MAX)
}

pub struct HZStage {
    cfg: HZConfig,
    buffer: HZBuffer,
    cache: HZCache,
    queue: Vec<QueueEntry>,
    state: HZStageState,
    clear_countdown: u32,
    culled_count: u64,
}

impl HZStage {
    pub fn new(cfg: HZConfig) -> Self {
        Self {
            buffer: HZBuffer::new(cfg.block_count, cfg.clear_value),
            cache: HZCache::new(cfg.cache_lines),
            queue: Vec::new(),
            state: HZStageState::Ready,
            clear_countdown: 0,
            culled_count: 0,
            cfg,
        }
    }

    pub fn culled_count(&self) -> u64 {
        self.culled_count
    }

    pub fn state(&self) -> HZStageState {
        self.state
    }

    /// Backpressure to traversal: ready iff free queue entries exceed
    /// `2 * stampsCycle` (spec §4.6).
    pub fn status(&self) -> StageStatus {
        let free = self.cfg.queue_size.saturating_sub(self.queue.len());
        if free > 2 * self.cfg.stamps_per_cycle {
            StageStatus::Ready
        } else {
            StageStatus::Busy
        }
    }

    pub fn begin_draw(&mut self) {
        self.state = HZStageState::Drawing;
    }

    pub fn begin_end(&mut self) {
        self.state = HZStageState::End;
    }

    /// True once the queue has fully drained (spec §4.8: the
    /// orchestrator waits for "all queues free" before leaving
    /// `DRAWING`).
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns to `Ready` once the orchestrator has observed `END`'s
    /// drain condition; a thin wrapper so the orchestrator doesn't reach
    /// into this stage's state field directly.
    pub fn end_to_ready(&mut self) {
        self.state = HZStageState::Ready;
    }

    /// Applies a `DEPTH_FUNCTION`/`HIERARCHICALZ` register change without
    /// disturbing the buffer or cache contents, which persist across
    /// draws until an explicit `CLEAR_Z` (spec §4.6).
    pub fn set_depth_policy(&mut self, depth_func: CompareFunc, hierarchical_z_enabled: bool) {
        self.cfg.depth_func = depth_func;
        self.cfg.hierarchical_z_enabled = hierarchical_z_enabled;
    }

    /// Starts a fast whole-buffer clear, returning to `Ready` once
    /// `clearCycles = ceil(pixels / (stampFragments*blockStamps*clearBlocksCycle))`
    /// cycles have elapsed (spec §4.6).
    pub fn begin_clear(&mut self, pixel_count: usize, stamp_fragments: usize, block_stamps: usize) {
        let denom = (stamp_fragments * block_stamps * self.cfg.clear_blocks_per_cycle.max(1)).max(1);
        self.clear_countdown = ((pixel_count + denom - 1) / denom) as u32;
        self.state = HZStageState::Clear;
    }

    /// Records a Z-Stencil update as a max-update to the backing buffer
    /// (spec §4.6 step 1).
    pub fn apply_zstencil_write(&mut self, block: usize, z: u32) {
        self.buffer.write_max(block, z);
    }

    /// Enqueue one stamp plus its covering block addresses. Fails (and
    /// leaves the stage untouched) if the queue has no free entry;
    /// callers are expected to check [`HZStage::status`] first and hold
    /// back at most `stampsCycle` submissions per cycle (spec §4.6 step
    /// 3).
    pub fn try_enqueue(&mut self, stamp: Stamp, blocks: Vec<usize>) -> bool {
        if self.queue.len() >= self.cfg.queue_size {
            return false;
        }
        let stamp_min_z = min_covered_z(&stamp);
        let slot_count = blocks.len();
        self.queue.push(QueueEntry {
            stamp,
            blocks,
            slots: vec![None; slot_count],
            stamp_min_z,
            culled: false,
            state: EntryState::Reading,
        });
        true
    }

    /// Runs one cycle's worth of cache service, compare, and FIFO drain
    /// (spec §4.6 steps 2, 4-6). Returns the stamps ready for the
    /// downstream interpolator this cycle; culled stamps are dropped from
    /// the returned list but still freed their queue slot.
    pub fn advance(&mut self) -> Vec<Stamp> {
        if self.state == HZStageState::Clear {
            self.clear_countdown = self.clear_countdown.saturating_sub(1);
            if self.clear_countdown == 0 {
                self.buffer.clear();
                self.cache.invalidate_all();
                self.state = HZStageState::Ready;
            }
            return Vec::new();
        }

        if !self.cfg.hierarchical_z_enabled {
            return self.queue.drain(..).map(|e| e.stamp).collect();
        }

        // Step 2/4: the HZ buffer's single shared bus services exactly
        // one cache miss resolution this cycle.
        let mut bus_used = false;
        for entry in self.queue.iter_mut().filter(|e| e.state == EntryState::Reading) {
            if bus_used {
                break;
            }
            let Some(unresolved) = entry.slots.iter().position(|s| s.is_none()) else {
                continue;
            };
            let key = entry.blocks[unresolved];
            match self.cache.search(key) {
                SearchResult::Hit(slot) => {
                    entry.slots[unresolved] = Some(slot);
                }
                SearchResult::Miss => {
                    if let InsertResult::Inserted(slot) = self.cache.insert(key, &self.buffer) {
                        self.cache.complete_read(slot);
                        entry.slots[unresolved] = Some(slot);
                        bus_used = true;
                    }
                }
            }
        }

        for entry in self.queue.iter_mut().filter(|e| e.state == EntryState::Reading) {
            if entry.slots.iter().all(Option::is_some) {
                entry.state = EntryState::Testing;
            }
        }

        // Step 5: test entries whose lines have all returned data.
        for entry in self.queue.iter_mut().filter(|e| e.state == EntryState::Testing) {
            let all_ready = entry
                .slots
                .iter()
                .all(|s| s.is_some_and(|slot| self.cache.is_ready(slot)));
            if !all_ready {
                continue;
            }
            let block_z = entry
                .slots
                .iter()
                .map(|s| self.cache.z_value(s.expect("resolved above")))
                .max()
                .unwrap_or(self.cfg.clear_value);
            entry.culled = self.cfg.depth_func.is_hz_accelerated()
                && !hz_would_pass(self.cfg.depth_func, entry.stamp_min_z, block_z);
            for slot in entry.slots.iter().flatten() {
                self.cache.consume(*slot);
            }
            entry.state = EntryState::Sending;
        }

        // Step 6: drain sending entries in FIFO order.
        let mut drained = Vec::new();
        let mut remaining = Vec::with_capacity(self.queue.len());
        for entry in self.queue.drain(..) {
            if entry.state == EntryState::Sending {
                if entry.culled {
                    self.culled_count += 1;
                } else {
                    drained.push(entry.stamp);
                }
            } else {
                remaining.push(entry);
            }
        }
        self.queue = remaining;
        drained
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.cache.invalidate_all();
        self.queue.clear();
        self.state = HZStageState::Ready;
        self.clear_countdown = 0;
        self.culled_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsim_rasterizer::stamp::Fragment;

    fn cfg() -> HZConfig {
        HZConfig {
            stamps_per_cycle: 1,
            queue_size: 8,
            cache_lines: 4,
            block_count: 16,
            clear_value: quantize(1.0),
            clear_blocks_per_cycle: 4,
            depth_func: CompareFunc::Less,
            hierarchical_z_enabled: true,
        }
    }

    fn quantize(normalized: f64) -> u32 {
        (normalized * ((1u64 << 24) - 1) as f64).round() as u32
    }

    fn stamp_at_z(z: u32) -> Stamp {
        let frag = Fragment {
            x: 0,
            y: 0,
            z,
            barycentric: [0.0; 3],
            inside: true,
            attributes: [[0.0; 4]; rsim_registers::MAX_VERTEX_ATTRIBUTES],
            coverage: 1,
            sample_z: [z; rsim_rasterizer::stamp::MAX_SAMPLES],
            triangle_id: 0,
        };
        Stamp {
            fragments: [frag.clone(), frag.clone(), frag.clone(), frag],
            culled: [false; 4],
            triangle_id: 0,
        }
    }

    fn drain_until_nonempty(stage: &mut HZStage, max_cycles: u32) -> Vec<Stamp> {
        for _ in 0..max_cycles {
            let out = stage.advance();
            if !out.is_empty() || stage.culled_count() > 0 {
                return out;
            }
        }
        Vec::new()
    }

    #[test]
    fn front_stamp_passes_then_back_stamp_is_culled_after_update() {
        let mut stage = HZStage::new(cfg());
        stage.begin_draw();

        stage.try_enqueue(stamp_at_z(quantize(0.2)), vec![0]);
        let _ = drain_until_nonempty(&mut stage, 8);
        stage.apply_zstencil_write(0, quantize(0.2));

        stage.try_enqueue(stamp_at_z(quantize(0.8)), vec![0]);
        let _ = drain_until_nonempty(&mut stage, 8);
        assert_eq!(stage.culled_count(), 1);
    }

    #[test]
    fn status_goes_busy_when_queue_is_nearly_full() {
        let mut cfg = cfg();
        cfg.queue_size = 4;
        cfg.stamps_per_cycle = 1;
        let mut stage = HZStage::new(cfg);
        assert_eq!(stage.status(), StageStatus::Ready);
        stage.try_enqueue(stamp_at_z(0), vec![0]);
        stage.try_enqueue(stamp_at_z(0), vec![0]);
        stage.try_enqueue(stamp_at_z(0), vec![0]);
        assert_eq!(stage.status(), StageStatus::Busy);
    }

    #[test]
    fn reset_clears_queue_and_counters() {
        let mut stage = HZStage::new(cfg());
        stage.try_enqueue(stamp_at_z(0), vec![0]);
        stage.reset();
        assert_eq!(stage.culled_count(), 0);
        assert_eq!(stage.status(), StageStatus::Ready);
    }
}
