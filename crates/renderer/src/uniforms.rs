//! Per-slot uniform buffers and the descriptor sets that bind them.

use std::sync::Arc;

use ash::vk;
use tracing::debug;
use vkframe_rhi::buffer::{Buffer, BufferUsage};
use vkframe_rhi::descriptor::{self, DescriptorPool, DescriptorSetLayout, DescriptorWriter};
use vkframe_rhi::device::Device;
use vkframe_rhi::texture::Texture;
use vkframe_rhi::{RhiError, RhiResult};

use crate::ubo::TransformUbo;

pub const TRANSFORM_BINDING: u32 = 0;
pub const TEXTURE_BINDING: u32 = 1;
pub const SAMPLER_BINDING: u32 = 2;

/// Layout of descriptor set 0 used by the quad shaders.
pub fn bindings() -> [vk::DescriptorSetLayoutBinding<'static>; 3] {
    [
        descriptor::uniform_buffer(TRANSFORM_BINDING, vk::ShaderStageFlags::VERTEX),
        descriptor::sampled_image(TEXTURE_BINDING, vk::ShaderStageFlags::FRAGMENT),
        descriptor::sampler(SAMPLER_BINDING, vk::ShaderStageFlags::FRAGMENT),
    ]
}

/// One host-visible [`TransformUbo`] buffer and one descriptor set per frame slot.
///
/// Slot `i`'s buffer is only written after slot `i`'s fence was waited on,
/// so the GPU never reads a buffer while the CPU writes it.
pub struct FrameUniforms {
    // Sets are freed with the pool.
    sets: Vec<vk::DescriptorSet>,
    buffers: Vec<Buffer>,
    pool: DescriptorPool,
    layout: DescriptorSetLayout,
}

impl FrameUniforms {
    /// Creates the buffers and sets and points every set at `texture`.
    pub fn new(device: Arc<Device>, frames_in_flight: usize, texture: &Texture) -> RhiResult<Self> {
        let bindings = bindings();
        let layout = DescriptorSetLayout::new(device.clone(), &bindings)?;
        let pool = DescriptorPool::for_bindings(device.clone(), &bindings, frames_in_flight as u32)?;

        let layouts = vec![layout.handle(); frames_in_flight];
        let sets = pool.allocate(&layouts)?;

        let buffers = (0..frames_in_flight)
            .map(|_| {
                Buffer::new_with_data(
                    device.clone(),
                    BufferUsage::Uniform,
                    bytemuck::bytes_of(&TransformUbo::default()),
                )
            })
            .collect::<RhiResult<Vec<_>>>()?;

        for (set, buffer) in sets.iter().zip(&buffers) {
            DescriptorWriter::new(*set)
                .uniform_buffer(TRANSFORM_BINDING, buffer.handle(), TransformUbo::SIZE as vk::DeviceSize)
                .sampled_image(TEXTURE_BINDING, texture.view())
                .sampler(SAMPLER_BINDING, texture.sampler())
                .write(&device);
        }

        debug!("Created uniforms for {} frame slots", frames_in_flight);

        Ok(Self {
            sets,
            buffers,
            pool,
            layout,
        })
    }

    #[inline]
    pub fn layout(&self) -> &DescriptorSetLayout {
        &self.layout
    }

    pub fn set(&self, slot: usize) -> RhiResult<vk::DescriptorSet> {
        self.sets
            .get(slot)
            .copied()
            .ok_or_else(|| slot_out_of_range(slot, self.sets.len()))
    }

    /// Copies `ubo` into slot `slot`'s buffer.
    pub fn write(&self, slot: usize, ubo: &TransformUbo) -> RhiResult<()> {
        let buffer = self
            .buffers
            .get(slot)
            .ok_or_else(|| slot_out_of_range(slot, self.buffers.len()))?;
        buffer.write_data(0, bytemuck::bytes_of(ubo))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    #[inline]
    pub fn pool(&self) -> &DescriptorPool {
        &self.pool
    }
}

fn slot_out_of_range(slot: usize, len: usize) -> RhiError {
    RhiError::InvalidHandle(format!("frame slot {} out of range ({} slots)", slot, len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bindings_match_shader_interface() {
        let bindings = bindings();

        assert_eq!(bindings[0].binding, 0);
        assert_eq!(bindings[0].descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(bindings[0].stage_flags, vk::ShaderStageFlags::VERTEX);

        assert_eq!(bindings[1].binding, 1);
        assert_eq!(bindings[1].descriptor_type, vk::DescriptorType::SAMPLED_IMAGE);
        assert_eq!(bindings[1].stage_flags, vk::ShaderStageFlags::FRAGMENT);

        assert_eq!(bindings[2].binding, 2);
        assert_eq!(bindings[2].descriptor_type, vk::DescriptorType::SAMPLER);
        assert_eq!(bindings[2].stage_flags, vk::ShaderStageFlags::FRAGMENT);
    }

    #[test]
    fn test_pool_holds_one_of_each_per_slot() {
        let sizes = descriptor::pool_sizes(&bindings(), 2);

        assert_eq!(sizes.len(), 3);
        assert!(sizes.iter().all(|s| s.descriptor_count == 2));
    }
}
