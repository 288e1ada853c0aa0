//! Construction-time configuration for the streamer pipeline (spec §6).

use rsim_registers::MAX_VERTEX_ATTRIBUTES;

use crate::fetch::FetchConfig;
use crate::loader::{AttributeBinding, StreamDescriptor};

#[derive(Clone, Debug)]
pub struct StreamerConfig {
    pub fetch: FetchConfig,
    pub streams: Vec<StreamDescriptor>,
    pub bindings: [AttributeBinding; MAX_VERTEX_ATTRIBUTES],
    pub loader_units: usize,
    pub output_cache_lines: usize,
    pub output_slot_capacity: usize,
}
