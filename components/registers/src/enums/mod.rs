mod compare_func;
mod cull_mode;
mod face_mode;
mod primitive;
mod stencil_op;
mod stream_data_type;
mod tex_format;

pub use compare_func::CompareFunc;
pub use cull_mode::CullMode;
pub use face_mode::FaceMode;
pub use primitive::Primitive;
pub use stencil_op::StencilOp;
pub use stream_data_type::StreamDataType;
pub use tex_format::TexFormat;
