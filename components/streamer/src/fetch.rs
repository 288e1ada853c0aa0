//! [`StreamerFetch`]: pulls vertex indices from memory through
//! fixed-size, alignment-padded transactions (spec §4.7).
//!
//! Grounded on `original_source/arch/funcmodel/StreamController/cmStreamerFetch.cpp`
//! for the transaction-alignment and per-instance restart behavior.

/// Typical GPU index-fetch transaction granularity.
pub const DEFAULT_TRANSACTION_SIZE: usize = 32;

#[derive(Clone, Copy, Debug)]
pub struct FetchConfig {
    pub transaction_size: usize,
    /// Bytes per index: 2 for 16-bit, 4 for 32-bit.
    pub index_stride: usize,
    /// Byte offset of the first index within the index buffer.
    pub stream_start: usize,
    /// Indices fetched per instance.
    pub stream_count: usize,
    pub instances: usize,
}

/// What [`StreamerFetch::advance`] produced this cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Indices decoded from this cycle's transaction, in stream order.
    Indices(Vec<u32>),
    /// The current instance's indices are exhausted; fetch restarts from
    /// the beginning of the index buffer for the next instance.
    InstanceBoundary,
    /// Every instance has been fetched (spec §4.7's `lastMarker`).
    Done,
}

pub struct StreamerFetch {
    cfg: FetchConfig,
    current_instance: usize,
    next_index_in_instance: usize,
    bytes_requested: usize,
    done: bool,
}

impl StreamerFetch {
    pub fn new(cfg: FetchConfig) -> Self {
        Self {
            cfg,
            current_instance: 0,
            next_index_in_instance: 0,
            bytes_requested: 0,
            done: false,
        }
    }

    pub fn bytes_requested(&self) -> usize {
        self.bytes_requested
    }

    pub fn current_instance(&self) -> usize {
        self.current_instance
    }

    /// Fetches and decodes one transaction's worth of indices. Each call
    /// models one cycle's memory-bus access.
    pub fn advance(&mut self, memory: &[u8]) -> FetchOutcome {
        if self.done {
            return FetchOutcome::Done;
        }

        if self.next_index_in_instance >= self.cfg.stream_count {
            self.current_instance += 1;
            self.next_index_in_instance = 0;
            if self.current_instance >= self.cfg.instances {
                self.done = true;
                return FetchOutcome::Done;
            }
            return FetchOutcome::InstanceBoundary;
        }

        let index_byte_offset = self.cfg.stream_start + self.next_index_in_instance * self.cfg.index_stride;
        let aligned_start = (index_byte_offset / self.cfg.transaction_size) * self.cfg.transaction_size;
        let transaction_end = aligned_start + self.cfg.transaction_size;
        self.bytes_requested += self.cfg.transaction_size;

        let mut indices = Vec::new();
        let mut offset = index_byte_offset;
        while offset + self.cfg.index_stride <= transaction_end && self.next_index_in_instance < self.cfg.stream_count {
            let bytes = &memory[offset..offset + self.cfg.index_stride];
            let value = match self.cfg.index_stride {
                2 => u16::from_le_bytes([bytes[0], bytes[1]]) as u32,
                4 => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
                other => panic!("unsupported index stride: {other}"),
            };
            indices.push(value);
            offset += self.cfg.index_stride;
            self.next_index_in_instance += 1;
        }

        FetchOutcome::Indices(indices)
    }

    pub fn reset(&mut self) {
        self.current_instance = 0;
        self.next_index_in_instance = 0;
        self.bytes_requested = 0;
        self.done = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_buffer(indices: &[u16]) -> Vec<u8> {
        indices.iter().flat_map(|i| i.to_le_bytes()).collect()
    }

    #[test]
    fn fetches_all_indices_across_two_instances() {
        let memory = index_buffer(&[0, 1, 2, 2, 1, 3]);
        let cfg = FetchConfig {
            transaction_size: DEFAULT_TRANSACTION_SIZE,
            index_stride: 2,
            stream_start: 0,
            stream_count: 6,
            instances: 2,
        };
        let mut fetch = StreamerFetch::new(cfg);

        let mut total_indices = 0;
        let mut instance_boundaries = 0;
        loop {
            match fetch.advance(&memory) {
                FetchOutcome::Indices(v) => total_indices += v.len(),
                FetchOutcome::InstanceBoundary => instance_boundaries += 1,
                FetchOutcome::Done => break,
            }
        }
        assert_eq!(total_indices, 12);
        assert_eq!(instance_boundaries, 1);
        assert_eq!(fetch.current_instance(), 2);
    }

    #[test]
    fn transaction_alignment_skips_padding_without_counting_it_as_an_index() {
        let memory = index_buffer(&[7, 8, 9, 10]);
        let cfg = FetchConfig {
            transaction_size: 4,
            index_stride: 2,
            stream_start: 2,
            stream_count: 3,
            instances: 1,
        };
        let mut fetch = StreamerFetch::new(cfg);
        let mut collected = Vec::new();
        loop {
            match fetch.advance(&memory) {
                FetchOutcome::Indices(v) => collected.extend(v),
                FetchOutcome::Done => break,
                FetchOutcome::InstanceBoundary => {}
            }
        }
        assert_eq!(collected, vec![8, 9, 10]);
    }
}
