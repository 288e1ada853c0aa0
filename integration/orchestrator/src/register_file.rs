//! [`RegisterFile`]: the mutable register state a `REG_WRITE` command
//! mutates (spec §6), and the translation from that state into each
//! stage's construction-time configuration.

use rsim_core::SimError;
use rsim_rasterizer::interpolator::{InterpolationMode, InterpolatorConfig, ProvokingVertex};
use rsim_rasterizer::setup::{BoundingBox, SetupConfig};
use rsim_registers::{
    AttributeBinding as RegAttributeBinding, CullMode, FaceMode, Primitive, RegisterId, RegisterPayload, StreamDataType,
    MAX_VERTEX_ATTRIBUTES,
};
use rsim_streamer::loader::{AttributeBinding as LoaderAttributeBinding, StreamDescriptor};

const MAX_STREAMS: usize = 16;

#[derive(Clone, Copy, Debug)]
struct StreamState {
    address: u32,
    stride: u32,
    data_type: StreamDataType,
    elements: u32,
    frequency: u32,
    d3d9_color: bool,
}

impl Default for StreamState {
    fn default() -> Self {
        Self {
            address: 0,
            stride: 0,
            data_type: StreamDataType::Float32,
            elements: 0,
            frequency: 0,
            d3d9_color: false,
        }
    }
}

/// Every register this core's stages consume, grouped as in spec §6.
/// Defaults match common fixed-function reset values: depth test off,
/// culling off, CCW front faces, linear interpolation everywhere.
pub struct RegisterFile {
    pub viewport: BoundingBox,
    pub scissor_test: bool,
    pub scissor: BoundingBox,
    pub depth_test: bool,
    pub depth_function: rsim_registers::CompareFunc,
    pub depth_range_near: f32,
    pub depth_range_far: f32,
    pub z_buffer_clear: u32,
    pub z_buffer_bits: u32,
    pub culling: CullMode,
    pub face_mode: FaceMode,
    pub d3d9_rasterization_rules: bool,
    pub d3d9_pixel_coordinates: bool,
    pub hierarchical_z: bool,
    pub multisampling: bool,
    pub msaa_samples: u32,
    pub interpolation_linear: [bool; MAX_VERTEX_ATTRIBUTES],
    pub fragment_input_attributes: [bool; MAX_VERTEX_ATTRIBUTES],
    pub vertex_attribute_map: [RegAttributeBinding; MAX_VERTEX_ATTRIBUTES],
    pub vertex_attribute_default: [[f32; 4]; MAX_VERTEX_ATTRIBUTES],
    streams: [StreamState; MAX_STREAMS],
    pub index_mode: bool,
    pub index_stream: u32,
    pub stream_start: u32,
    pub stream_count: u32,
    pub stream_instances: u32,
    pub primitive: Primitive,
    pub display_x_res: u32,
    pub display_y_res: u32,
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self {
            viewport: BoundingBox { xmin: 0, ymin: 0, xmax: 0, ymax: 0 },
            scissor_test: false,
            scissor: BoundingBox { xmin: 0, ymin: 0, xmax: 0, ymax: 0 },
            depth_test: false,
            depth_function: rsim_registers::CompareFunc::Less,
            depth_range_near: 0.0,
            depth_range_far: 1.0,
            z_buffer_clear: (1u32 << 24) - 1,
            z_buffer_bits: 24,
            culling: CullMode::None,
            face_mode: FaceMode::Ccw,
            d3d9_rasterization_rules: false,
            d3d9_pixel_coordinates: false,
            hierarchical_z: false,
            multisampling: false,
            msaa_samples: 4,
            interpolation_linear: [true; MAX_VERTEX_ATTRIBUTES],
            fragment_input_attributes: [false; MAX_VERTEX_ATTRIBUTES],
            vertex_attribute_map: [RegAttributeBinding::Inactive; MAX_VERTEX_ATTRIBUTES],
            vertex_attribute_default: [[0.0, 0.0, 0.0, 1.0]; MAX_VERTEX_ATTRIBUTES],
            streams: [StreamState::default(); MAX_STREAMS],
            index_mode: false,
            index_stream: 0,
            stream_start: 0,
            stream_count: 0,
            stream_instances: 1,
            primitive: Primitive::Triangles,
            display_x_res: 0,
            display_y_res: 0,
        }
    }
}

impl RegisterFile {
    /// Applies one `REG_WRITE`'s payload, type-checking it against the
    /// register id's expected tag (spec §7.4: a mismatch is an
    /// inconsistent-binding error).
    pub fn apply(&mut self, reg_id: RegisterId, subreg: Option<u32>, payload: RegisterPayload) -> Result<(), SimError> {
        macro_rules! expect {
            ($accessor:ident) => {
                payload
                    .$accessor()
                    .ok_or_else(|| SimError::InconsistentBinding(format!("{reg_id:?}: unexpected payload tag {payload:?}")))?
            };
        }

        match reg_id {
            RegisterId::ViewportIniX => self.viewport.xmin = expect!(as_int),
            RegisterId::ViewportIniY => self.viewport.ymin = expect!(as_int),
            RegisterId::ViewportWidth => self.viewport.xmax = self.viewport.xmin + expect!(as_uint) as i32 - 1,
            RegisterId::ViewportHeight => self.viewport.ymax = self.viewport.ymin + expect!(as_uint) as i32 - 1,

            RegisterId::ScissorTest => self.scissor_test = expect!(as_bool),
            RegisterId::ScissorIniX => self.scissor.xmin = expect!(as_int),
            RegisterId::ScissorIniY => self.scissor.ymin = expect!(as_int),
            RegisterId::ScissorWidth => self.scissor.xmax = self.scissor.xmin + expect!(as_uint) as i32 - 1,
            RegisterId::ScissorHeight => self.scissor.ymax = self.scissor.ymin + expect!(as_uint) as i32 - 1,

            RegisterId::DepthTest => self.depth_test = expect!(as_bool),
            RegisterId::DepthFunction => self.depth_function = expect!(as_compare_fn),
            RegisterId::DepthRangeNear => self.depth_range_near = expect!(as_float),
            RegisterId::DepthRangeFar => self.depth_range_far = expect!(as_float),
            RegisterId::ZBufferClear => self.z_buffer_clear = expect!(as_uint),
            RegisterId::ZBufferBitPrecision => self.z_buffer_bits = expect!(as_uint),

            RegisterId::Culling => self.culling = expect!(as_cull_mode),
            RegisterId::FaceMode => self.face_mode = expect!(as_face_mode),
            RegisterId::D3d9RasterizationRules => self.d3d9_rasterization_rules = expect!(as_bool),
            RegisterId::D3d9PixelCoordinates => self.d3d9_pixel_coordinates = expect!(as_bool),
            RegisterId::HierarchicalZ => self.hierarchical_z = expect!(as_bool),
            RegisterId::Multisampling => self.multisampling = expect!(as_bool),
            RegisterId::MsaaSamples => self.msaa_samples = expect!(as_uint),
            RegisterId::Primitive => self.primitive = expect!(as_primitive),

            RegisterId::Interpolation => {
                self.interpolation_linear[subreg_index(reg_id, subreg)?] = expect!(as_bool);
            }
            RegisterId::FragmentInputAttributes => {
                self.fragment_input_attributes[subreg_index(reg_id, subreg)?] = expect!(as_bool);
            }
            RegisterId::VertexAttributeMap => {
                self.vertex_attribute_map[subreg_index(reg_id, subreg)?] = expect!(as_attribute_binding);
            }
            RegisterId::VertexAttributeDefaultValue => {
                self.vertex_attribute_default[subreg_index(reg_id, subreg)?] = expect!(as_vec4);
            }

            RegisterId::StreamAddress => self.stream_mut(subreg)?.address = expect!(as_address),
            RegisterId::StreamStride => self.stream_mut(subreg)?.stride = expect!(as_uint),
            RegisterId::StreamData => self.stream_mut(subreg)?.data_type = expect!(as_stream_data),
            RegisterId::StreamElements => self.stream_mut(subreg)?.elements = expect!(as_uint),
            RegisterId::StreamFrequency => self.stream_mut(subreg)?.frequency = expect!(as_uint),
            RegisterId::D3d9ColorStream => self.stream_mut(subreg)?.d3d9_color = expect!(as_bool),

            RegisterId::IndexMode => self.index_mode = expect!(as_bool),
            RegisterId::IndexStream => self.index_stream = expect!(as_uint),
            RegisterId::StreamStart => self.stream_start = expect!(as_uint),
            RegisterId::StreamCount => self.stream_count = expect!(as_uint),
            RegisterId::StreamInstances => self.stream_instances = expect!(as_uint),

            RegisterId::DisplayXRes => self.display_x_res = expect!(as_uint),
            RegisterId::DisplayYRes => self.display_y_res = expect!(as_uint),

            // Registers that belong entirely to the out-of-scope GAL/HAL
            // driver layer (spec §1) or to the stencil path, which this
            // core does not implement, are accepted and ignored.
            _ => {}
        }
        Ok(())
    }

    fn stream_mut(&mut self, subreg: Option<u32>) -> Result<&mut StreamState, SimError> {
        let idx = subreg.ok_or_else(|| SimError::InconsistentBinding("stream register missing subreg".into()))? as usize;
        self.streams
            .get_mut(idx)
            .ok_or_else(|| SimError::InconsistentBinding(format!("illegal stream buffer id {idx}")))
    }

    pub fn setup_config(&self) -> SetupConfig {
        SetupConfig {
            face_mode: self.face_mode,
            cull_mode: self.culling,
            d3d9_rasterization_rules: self.d3d9_rasterization_rules,
            d3d9_pixel_coordinates: self.d3d9_pixel_coordinates,
            viewport: self.viewport,
            scissor: if self.scissor_test { Some(self.scissor) } else { None },
            thin_triangle_bias: None,
        }
    }

    pub fn interpolator_config(&self) -> InterpolatorConfig {
        let modes = std::array::from_fn(|i| {
            if self.interpolation_linear[i] {
                InterpolationMode::Linear
            } else {
                InterpolationMode::Flat
            }
        });
        InterpolatorConfig {
            modes,
            provoking_vertex: ProvokingVertex::Third,
            near_depth: self.depth_range_near,
            far_depth: self.depth_range_far,
            depth_bits: self.z_buffer_bits,
            msaa_samples: if self.multisampling { Some(self.msaa_samples) } else { None },
        }
    }

    pub fn streamer_streams(&self) -> Vec<StreamDescriptor> {
        self.streams
            .iter()
            .map(|s| StreamDescriptor {
                data_type: s.data_type,
                components: 4,
                stride: s.stride,
                offset: 0,
                frequency: s.frequency,
                bgra_swap: s.d3d9_color,
            })
            .collect()
    }

    pub fn loader_bindings(&self) -> [LoaderAttributeBinding; MAX_VERTEX_ATTRIBUTES] {
        std::array::from_fn(|i| match self.vertex_attribute_map[i] {
            RegAttributeBinding::Inactive => LoaderAttributeBinding {
                stream: None,
                default_value: self.vertex_attribute_default[i],
            },
            RegAttributeBinding::Stream(s) => LoaderAttributeBinding {
                stream: Some(s as usize),
                default_value: self.vertex_attribute_default[i],
            },
        })
    }

    /// The memory address bound to stream `id` via `STREAM_ADDRESS[id]`,
    /// or `None` if `id` is out of range (spec §7.4: illegal stream
    /// buffer id).
    pub fn stream_address(&self, id: usize) -> Option<u32> {
        self.streams.get(id).map(|s| s.address)
    }

    /// The address of the currently bound `INDEX_STREAM`.
    pub fn index_stream_address(&self) -> Option<u32> {
        self.stream_address(self.index_stream as usize)
    }

    /// Byte width of one index element, taken from the index stream's
    /// `STREAM_DATA` tag (spec §4.7: 2 for 16-bit, 4 for 32-bit indices).
    pub fn index_element_width(&self) -> usize {
        self.streams
            .get(self.index_stream as usize)
            .map(|s| s.data_type.byte_width() as usize)
            .unwrap_or(2)
    }

    /// Addresses of every configured stream, in stream-id order, for bulk
    /// binding lookup at `DRAW` time.
    pub fn stream_addresses(&self) -> [u32; MAX_STREAMS] {
        std::array::from_fn(|i| self.streams[i].address)
    }
}

fn subreg_index(reg_id: RegisterId, subreg: Option<u32>) -> Result<usize, SimError> {
    subreg
        .map(|s| s as usize)
        .ok_or_else(|| SimError::InconsistentBinding(format!("{reg_id:?} requires a subreg")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_width_is_relative_to_origin() {
        let mut regs = RegisterFile::default();
        regs.apply(RegisterId::ViewportIniX, None, RegisterPayload::Int(2)).unwrap();
        regs.apply(RegisterId::ViewportWidth, None, RegisterPayload::UInt(8)).unwrap();
        assert_eq!(regs.viewport.xmin, 2);
        assert_eq!(regs.viewport.xmax, 9);
    }

    #[test]
    fn mismatched_payload_tag_is_inconsistent_binding() {
        let mut regs = RegisterFile::default();
        let err = regs.apply(RegisterId::DepthTest, None, RegisterPayload::UInt(1));
        assert!(matches!(err, Err(SimError::InconsistentBinding(_))));
    }

    #[test]
    fn stream_register_without_subreg_is_rejected() {
        let mut regs = RegisterFile::default();
        let err = regs.apply(RegisterId::StreamStride, None, RegisterPayload::UInt(16));
        assert!(matches!(err, Err(SimError::InconsistentBinding(_))));
    }
}
