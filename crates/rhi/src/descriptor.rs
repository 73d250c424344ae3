//! Descriptor set layouts, pools and writes.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use vkframe_rhi::device::Device;
//! use vkframe_rhi::descriptor::{self, DescriptorPool, DescriptorSetLayout};
//!
//! # fn example(device: Arc<Device>) -> vkframe_rhi::RhiResult<()> {
//! let bindings = [descriptor::uniform_buffer(0, vk::ShaderStageFlags::VERTEX)];
//! let layout = DescriptorSetLayout::new(device.clone(), &bindings)?;
//!
//! let pool = DescriptorPool::for_bindings(device, &bindings, 2)?;
//! let sets = pool.allocate(&[layout.handle(); 2])?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Descriptor set layout wrapper.
pub struct DescriptorSetLayout {
    device: Arc<Device>,
    layout: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    pub fn new(
        device: Arc<Device>,
        bindings: &[vk::DescriptorSetLayoutBinding<'_>],
    ) -> RhiResult<Self> {
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(bindings);

        // SAFETY: the device is alive and create_info borrows `bindings`.
        let layout = unsafe {
            device
                .handle()
                .create_descriptor_set_layout(&create_info, None)?
        };

        debug!(
            "Created descriptor set layout with {} binding(s)",
            bindings.len()
        );

        Ok(Self { device, layout })
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        // SAFETY: no pipeline layout or allocation is created from it afterwards.
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Descriptor pool. Sets allocated from it are freed when it is destroyed.
pub struct DescriptorPool {
    device: Arc<Device>,
    pool: vk::DescriptorPool,
    max_sets: u32,
}

impl DescriptorPool {
    pub fn new(
        device: Arc<Device>,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> RhiResult<Self> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(pool_sizes);

        // SAFETY: the device is alive and create_info borrows `pool_sizes`.
        let pool = unsafe { device.handle().create_descriptor_pool(&create_info, None)? };

        debug!(
            "Created descriptor pool: max_sets={}, pool_sizes={}",
            max_sets,
            pool_sizes.len()
        );

        Ok(Self {
            device,
            pool,
            max_sets,
        })
    }

    /// Creates a pool sized for exactly `set_count` sets of the given layout.
    pub fn for_bindings(
        device: Arc<Device>,
        bindings: &[vk::DescriptorSetLayoutBinding<'_>],
        set_count: u32,
    ) -> RhiResult<Self> {
        Self::new(device, set_count, &pool_sizes(bindings, set_count))
    }

    /// Allocates one set per entry of `layouts`.
    pub fn allocate(
        &self,
        layouts: &[vk::DescriptorSetLayout],
    ) -> RhiResult<Vec<vk::DescriptorSet>> {
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(layouts);

        // SAFETY: the pool and layouts belong to this device.
        let sets = unsafe { self.device.handle().allocate_descriptor_sets(&alloc_info)? };

        debug!("Allocated {} descriptor set(s)", sets.len());

        Ok(sets)
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }

    #[inline]
    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        // SAFETY: the owner guarantees no pending work uses sets from this pool.
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_pool(self.pool, None);
        }
        debug!("Destroyed descriptor pool");
    }
}

/// Pool sizes needed for `set_count` sets with the given bindings, one entry per descriptor type.
pub fn pool_sizes(
    bindings: &[vk::DescriptorSetLayoutBinding<'_>],
    set_count: u32,
) -> Vec<vk::DescriptorPoolSize> {
    let mut sizes: Vec<vk::DescriptorPoolSize> = Vec::new();
    for binding in bindings {
        let count = binding.descriptor_count * set_count;
        match sizes.iter_mut().find(|s| s.ty == binding.descriptor_type) {
            Some(size) => size.descriptor_count += count,
            None => sizes.push(
                vk::DescriptorPoolSize::default()
                    .ty(binding.descriptor_type)
                    .descriptor_count(count),
            ),
        }
    }
    sizes
}

fn binding(
    index: u32,
    ty: vk::DescriptorType,
    stage_flags: vk::ShaderStageFlags,
) -> vk::DescriptorSetLayoutBinding<'static> {
    vk::DescriptorSetLayoutBinding::default()
        .binding(index)
        .descriptor_type(ty)
        .descriptor_count(1)
        .stage_flags(stage_flags)
}

#[inline]
pub fn uniform_buffer(
    index: u32,
    stage_flags: vk::ShaderStageFlags,
) -> vk::DescriptorSetLayoutBinding<'static> {
    binding(index, vk::DescriptorType::UNIFORM_BUFFER, stage_flags)
}

#[inline]
pub fn sampled_image(
    index: u32,
    stage_flags: vk::ShaderStageFlags,
) -> vk::DescriptorSetLayoutBinding<'static> {
    binding(index, vk::DescriptorType::SAMPLED_IMAGE, stage_flags)
}

#[inline]
pub fn sampler(
    index: u32,
    stage_flags: vk::ShaderStageFlags,
) -> vk::DescriptorSetLayoutBinding<'static> {
    binding(index, vk::DescriptorType::SAMPLER, stage_flags)
}

/// Accumulates descriptor writes for one set and applies them in a single call.
pub struct DescriptorWriter {
    set: vk::DescriptorSet,
    buffers: Vec<(u32, vk::DescriptorBufferInfo)>,
    images: Vec<(u32, vk::DescriptorType, vk::DescriptorImageInfo)>,
}

impl DescriptorWriter {
    pub fn new(set: vk::DescriptorSet) -> Self {
        Self {
            set,
            buffers: Vec::new(),
            images: Vec::new(),
        }
    }

    pub fn uniform_buffer(mut self, binding: u32, buffer: vk::Buffer, range: vk::DeviceSize) -> Self {
        self.buffers.push((
            binding,
            vk::DescriptorBufferInfo::default()
                .buffer(buffer)
                .offset(0)
                .range(range),
        ));
        self
    }

    pub fn sampled_image(mut self, binding: u32, view: vk::ImageView) -> Self {
        self.images.push((
            binding,
            vk::DescriptorType::SAMPLED_IMAGE,
            vk::DescriptorImageInfo::default()
                .image_view(view)
                .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
        ));
        self
    }

    pub fn sampler(mut self, binding: u32, sampler: vk::Sampler) -> Self {
        self.images.push((
            binding,
            vk::DescriptorType::SAMPLER,
            vk::DescriptorImageInfo::default().sampler(sampler),
        ));
        self
    }

    pub fn write(self, device: &Device) {
        let buffer_writes = self.buffers.iter().map(|(binding, info)| {
            vk::WriteDescriptorSet::default()
                .dst_set(self.set)
                .dst_binding(*binding)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(std::slice::from_ref(info))
        });
        let image_writes = self.images.iter().map(|(binding, ty, info)| {
            vk::WriteDescriptorSet::default()
                .dst_set(self.set)
                .dst_binding(*binding)
                .descriptor_type(*ty)
                .image_info(std::slice::from_ref(info))
        });
        let writes: Vec<vk::WriteDescriptorSet<'_>> = buffer_writes.chain(image_writes).collect();

        // SAFETY: every referenced buffer, view and sampler is alive and the set is not in use.
        unsafe { device.handle().update_descriptor_sets(&writes, &[]) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_helpers() {
        let ubo = uniform_buffer(0, vk::ShaderStageFlags::VERTEX);
        assert_eq!(ubo.binding, 0);
        assert_eq!(ubo.descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(ubo.descriptor_count, 1);
        assert_eq!(ubo.stage_flags, vk::ShaderStageFlags::VERTEX);

        let image = sampled_image(1, vk::ShaderStageFlags::FRAGMENT);
        assert_eq!(image.descriptor_type, vk::DescriptorType::SAMPLED_IMAGE);

        let smp = sampler(2, vk::ShaderStageFlags::FRAGMENT);
        assert_eq!(smp.descriptor_type, vk::DescriptorType::SAMPLER);
    }

    #[test]
    fn test_pool_sizes_scale_with_set_count() {
        let bindings = [
            uniform_buffer(0, vk::ShaderStageFlags::VERTEX),
            sampled_image(1, vk::ShaderStageFlags::FRAGMENT),
            sampler(2, vk::ShaderStageFlags::FRAGMENT),
        ];
        let sizes = pool_sizes(&bindings, 2);

        assert_eq!(sizes.len(), 3);
        assert!(sizes.iter().all(|s| s.descriptor_count == 2));
    }

    #[test]
    fn test_pool_sizes_merge_same_type() {
        let bindings = [
            uniform_buffer(0, vk::ShaderStageFlags::VERTEX),
            uniform_buffer(1, vk::ShaderStageFlags::FRAGMENT),
        ];
        let sizes = pool_sizes(&bindings, 3);

        assert_eq!(sizes.len(), 1);
        assert_eq!(sizes[0].ty, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(sizes[0].descriptor_count, 6);
    }
}
