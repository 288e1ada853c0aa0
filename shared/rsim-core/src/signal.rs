use std::collections::VecDeque;

/// A fixed-latency, fixed-bandwidth per-cycle channel between two stages
/// (spec §5): "a signal has `(items-per-cycle, latency-in-cycles)`; writes
/// enqueue into a per-cycle slot, reads at cycle `c` return writes from
/// cycle `c−latency`."
///
/// The writer calls [`Signal::write`] any number of times during a cycle
/// (up to `items_per_cycle`); the reader calls [`Signal::advance_cycle`]
/// once per cycle, after all of that cycle's writes, to both retire the
/// items now visible and open the next cycle's write window.
pub struct Signal<T> {
    items_per_cycle: usize,
    latency: u64,
    /// `window[0]` is the slot currently open for writes (`latency` cycles
    /// in the future relative to what's visible); `window.back()` is the
    /// slot visible to readers right now.
    window: VecDeque<Vec<T>>,
}

impl<T> Signal<T> {
    /// Build a signal with the given per-cycle bandwidth and latency.
    ///
    /// A `latency` of zero means writes from the current cycle are visible
    /// to reads in the same cycle (combinational); non-zero latency holds
    /// writes for that many cycles before [`Signal::visible`] exposes them.
    pub fn new(items_per_cycle: usize, latency: u64) -> Self {
        let mut window = VecDeque::with_capacity(latency as usize + 1);
        for _ in 0..=latency {
            window.push_back(Vec::new());
        }
        Self {
            items_per_cycle,
            latency,
            window,
        }
    }

    /// Per-cycle bandwidth of this signal.
    pub fn items_per_cycle(&self) -> usize {
        self.items_per_cycle
    }

    /// Configured latency, in cycles.
    pub fn latency(&self) -> u64 {
        self.latency
    }

    /// Write one item into this cycle's slot. Returns the item back on
    /// failure if the per-cycle bandwidth is already exhausted.
    pub fn write(&mut self, item: T) -> Result<(), T> {
        let slot = self.window.front_mut().expect("window is never empty");
        if slot.len() >= self.items_per_cycle {
            return Err(item);
        }
        slot.push(item);
        Ok(())
    }

    /// Remaining write capacity in this cycle's slot.
    pub fn remaining_capacity(&self) -> usize {
        let used = self.window.front().map_or(0, Vec::len);
        self.items_per_cycle.saturating_sub(used)
    }

    /// Items currently visible to a reader (written `latency` cycles ago).
    /// Does not advance the window; callers may inspect repeatedly within
    /// the same cycle.
    pub fn visible(&self) -> &[T] {
        self.window.back().expect("window is never empty")
    }

    /// Retire the currently visible slot and open a fresh write window for
    /// the next cycle. Must be called exactly once per simulator cycle.
    pub fn advance_cycle(&mut self) -> Vec<T> {
        let retired = self.window.pop_back().expect("window is never empty");
        self.window.push_front(Vec::new());
        retired
    }
}
