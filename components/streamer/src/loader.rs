//! Loader units: fetch one vertex's worth of attributes from every
//! enabled stream and assemble the shader input record (spec §4.7, §6
//! "Vertex attribute binary formats").

use rsim_registers::{StreamDataType, MAX_VERTEX_ATTRIBUTES};
use rsim_rasterizer::vertex::Vertex;

/// Per-stream layout, set by `STREAM_STRIDE`/`STREAM_DATA`/`STREAM_FREQUENCY`
/// register writes.
#[derive(Clone, Copy, Debug)]
pub struct StreamDescriptor {
    pub data_type: StreamDataType,
    /// Number of vector lanes to read (1-4); unread lanes stay `0.0`
    /// except lane 3, which defaults to `1.0` (homogeneous `w`).
    pub components: u32,
    pub stride: u32,
    pub offset: u32,
    /// Instancing divisor: `0` or `1` means per-vertex; `N>1` advances the
    /// element index once per `N` instances.
    pub frequency: u32,
    /// D3D9 BGRA color streams swap bytes 0 and 2 on load (spec §6).
    pub bgra_swap: bool,
}

/// Per-attribute binding: which stream (if any) feeds it, and the default
/// value used when unmapped.
#[derive(Clone, Copy, Debug)]
pub struct AttributeBinding {
    pub stream: Option<usize>,
    pub default_value: [f32; 4],
}

impl AttributeBinding {
    pub const INACTIVE: Self = Self {
        stream: None,
        default_value: [0.0, 0.0, 0.0, 1.0],
    };
}

/// One vertex-loading unit. Stateless beyond its id; round-robin
/// assignment lives in [`LoaderPool`].
pub struct Loader {
    id: usize,
}

impl Loader {
    pub fn id(&self) -> usize {
        self.id
    }

    /// Assembles one vertex's attribute set from `streams`' backing
    /// memory, per `bindings`.
    pub fn load_vertex(
        &self,
        index: u32,
        instance: u32,
        streams: &[StreamDescriptor],
        bindings: &[AttributeBinding; MAX_VERTEX_ATTRIBUTES],
        stream_memory: &[&[u8]],
    ) -> Vertex {
        let mut vertex = Vertex::ZERO;
        for (attr, binding) in bindings.iter().enumerate() {
            let Some(stream_id) = binding.stream else {
                vertex.attrs[attr] = binding.default_value;
                continue;
            };
            let desc = &streams[stream_id];
            let element_index = if desc.frequency > 1 { instance / desc.frequency } else { index };
            let base = desc.offset as usize + element_index as usize * desc.stride as usize;
            let width = desc.data_type.byte_width() as usize;

            let mut value = [0.0f32, 0.0, 0.0, 1.0];
            for c in 0..(desc.components as usize).min(4) {
                let start = base + c * width;
                let bytes = &stream_memory[stream_id][start..start + width];
                value[c] = if desc.data_type.is_raw_integer() {
                    desc.data_type.decode_to_i32(bytes) as f32
                } else {
                    desc.data_type.decode_to_f32(bytes)
                };
            }
            if desc.bgra_swap {
                value.swap(0, 2);
            }
            vertex.attrs[attr] = value;
        }
        vertex
    }
}

/// A fixed set of loader units bound to shaders in round-robin order
/// (spec §4.7: "each loader is bound to a disjoint subset of shaders in
/// round-robin").
pub struct LoaderPool {
    units: Vec<Loader>,
    next: usize,
}

impl LoaderPool {
    pub fn new(unit_count: usize) -> Self {
        Self {
            units: (0..unit_count).map(|id| Loader { id }).collect(),
            next: 0,
        }
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Assigns the next index's load to a loader unit, round-robin.
    pub fn assign(&mut self) -> &Loader {
        let id = self.next;
        self.next = (self.next + 1) % self.units.len().max(1);
        &self.units[id]
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(data_type: StreamDataType, components: u32) -> StreamDescriptor {
        StreamDescriptor {
            data_type,
            components,
            stride: data_type.byte_width() * components,
            offset: 0,
            frequency: 0,
            bgra_swap: false,
        }
    }

    #[test]
    fn loads_float32_position_stream() {
        let pool = LoaderPool::new(1);
        let loader = &pool.units[0];

        let mut memory = Vec::new();
        for v in [0.0f32, 1.0, 2.0, 1.0, 10.0, 11.0, 12.0, 1.0] {
            memory.extend_from_slice(&v.to_le_bytes());
        }

        let streams = [descriptor(StreamDataType::Float32, 4)];
        let mut bindings = [AttributeBinding::INACTIVE; MAX_VERTEX_ATTRIBUTES];
        bindings[0] = AttributeBinding { stream: Some(0), default_value: [0.0; 4] };

        let vertex = loader.load_vertex(1, 0, &streams, &bindings, &[&memory]);
        assert_eq!(vertex.attrs[0], [10.0, 11.0, 12.0, 1.0]);
    }

    #[test]
    fn bgra_swap_exchanges_red_and_blue_lanes() {
        let pool = LoaderPool::new(1);
        let loader = &pool.units[0];
        let memory = [10u8, 20, 30, 255];
        let mut streams = [descriptor(StreamDataType::Unorm8, 4)];
        streams[0].bgra_swap = true;
        let mut bindings = [AttributeBinding::INACTIVE; MAX_VERTEX_ATTRIBUTES];
        bindings[1] = AttributeBinding { stream: Some(0), default_value: [0.0; 4] };

        let vertex = loader.load_vertex(0, 0, &streams, &bindings, &[&memory]);
        assert!((vertex.attrs[1][0] - 30.0 / 255.0).abs() < 1e-6);
        assert!((vertex.attrs[1][2] - 10.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn loader_pool_round_robins() {
        let mut pool = LoaderPool::new(2);
        assert_eq!(pool.assign().id(), 0);
        assert_eq!(pool.assign().id(), 1);
        assert_eq!(pool.assign().id(), 0);
    }
}
