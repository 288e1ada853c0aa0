//! [`OutputCache`]: de-duplicates indices so a previously assembled
//! vertex is reused rather than re-fetched and re-shaded (spec §4.7).

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Key {
    /// Which fetch pass (instance) wrote this entry; a stale entry from a
    /// prior instance is never treated as a hit.
    writer: u32,
    index: u32,
}

#[derive(Clone, Copy, Debug)]
struct Line {
    key: Option<Key>,
    output_slot: usize,
}

/// Outcome of [`OutputCache::lookup_or_allocate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheOutcome {
    /// The index was already assembled; its output slot can be reused.
    Hit(usize),
    /// A fresh slot was allocated; the caller must load and commit it.
    Miss(usize),
    /// No output-memory slot is currently free.
    Full,
}

/// A `(last-writer, stored-vertex-index) -> output-slot` mapping of fixed
/// line count, backed by a separate fixed-capacity slot allocator.
pub struct OutputCache {
    lines: Vec<Line>,
    next_victim: usize,
    free_slots: Vec<usize>,
}

impl OutputCache {
    pub fn new(line_count: usize, slot_capacity: usize) -> Self {
        Self {
            lines: vec![Line { key: None, output_slot: 0 }; line_count],
            next_victim: 0,
            free_slots: (0..slot_capacity).rev().collect(),
        }
    }

    pub fn free_slot_count(&self) -> usize {
        self.free_slots.len()
    }

    /// Looks up `(writer, index)`. On a hit, returns the existing slot. On
    /// a miss, allocates a fresh output slot and a cache line for it
    /// (evicting the next line in round-robin order if all lines are
    /// occupied).
    pub fn lookup_or_allocate(&mut self, writer: u32, index: u32) -> CacheOutcome {
        let key = Key { writer, index };
        if let Some(line) = self.lines.iter().find(|l| l.key == Some(key)) {
            return CacheOutcome::Hit(line.output_slot);
        }

        let Some(slot) = self.free_slots.pop() else {
            log::debug!("output cache has no free slot; caller retries next cycle");
            return CacheOutcome::Full;
        };

        let victim = self
            .lines
            .iter()
            .position(|l| l.key.is_none())
            .unwrap_or_else(|| {
                let v = self.next_victim;
                self.next_victim = (self.next_victim + 1) % self.lines.len().max(1);
                v
            });
        self.lines[victim] = Line { key: Some(key), output_slot: slot };
        CacheOutcome::Miss(slot)
    }

    /// Releases `slot` back to the free pool and invalidates whichever
    /// cache line still points at it.
    pub fn deallocate(&mut self, slot: usize) {
        for line in &mut self.lines {
            if line.output_slot == slot && line.key.is_some() {
                line.key = None;
            }
        }
        self.free_slots.push(slot);
    }

    pub fn reset(&mut self, slot_capacity: usize) {
        for line in &mut self.lines {
            line.key = None;
        }
        self.next_victim = 0;
        self.free_slots = (0..slot_capacity).rev().collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_index_is_a_hit_on_the_same_slot() {
        let mut cache = OutputCache::new(4, 8);
        let CacheOutcome::Miss(slot) = cache.lookup_or_allocate(0, 5) else { panic!() };
        assert_eq!(cache.lookup_or_allocate(0, 5), CacheOutcome::Hit(slot));
    }

    #[test]
    fn different_writer_is_not_a_hit_even_for_the_same_index() {
        let mut cache = OutputCache::new(4, 8);
        let CacheOutcome::Miss(_) = cache.lookup_or_allocate(0, 5) else { panic!() };
        assert!(matches!(cache.lookup_or_allocate(1, 5), CacheOutcome::Miss(_)));
    }

    #[test]
    fn deallocating_a_slot_frees_it_for_reuse() {
        let mut cache = OutputCache::new(1, 1);
        let CacheOutcome::Miss(slot) = cache.lookup_or_allocate(0, 0) else { panic!() };
        assert_eq!(cache.lookup_or_allocate(0, 1), CacheOutcome::Full);
        cache.deallocate(slot);
        assert!(matches!(cache.lookup_or_allocate(0, 1), CacheOutcome::Miss(_)));
    }
}
