//! SPIR-V for the built-in shaders, compiled from `shaders/` by the build script.

use std::sync::Arc;

use vkframe_rhi::device::Device;
use vkframe_rhi::shader::{Shader, ShaderStage};
use vkframe_rhi::{RhiError, RhiResult};

pub const QUAD_VERT_SPV: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/quad.vert.spv"));
pub const QUAD_FRAG_SPV: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/quad.frag.spv"));

/// Creates a shader module from embedded SPIR-V bytes.
pub fn load(device: Arc<Device>, bytes: &[u8], stage: ShaderStage) -> RhiResult<Shader> {
    let words = vkframe_resources::spirv::from_bytes(bytes)
        .map_err(|e| RhiError::ShaderError(format!("{} shader: {}", stage, e)))?;
    Shader::from_spirv_words(device, &words, stage, "main")
}
