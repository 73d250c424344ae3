//! GPU buffer management.
//!
//! Buffers are backed by gpu-allocator. Host-visible buffers (uniform,
//! staging) are written through their persistent mapping; device-local
//! vertex and index buffers are filled through a staging copy on a
//! [`TransferContext`].
//!
//! # Example
//!
//! ```no_run
//! use vkframe_rhi::buffer::{Buffer, BufferUsage};
//! use vkframe_rhi::transfer::TransferContext;
//!
//! # fn example(transfer: &TransferContext) -> vkframe_rhi::RhiResult<()> {
//! let indices: [u16; 6] = [0, 1, 2, 2, 3, 0];
//! let index_buffer =
//!     Buffer::new_device_local(transfer, BufferUsage::Index, bytemuck::cast_slice(&indices))?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, error};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::transfer::TransferContext;

/// Intended use of a buffer, which fixes its usage flags and memory location.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    Vertex,
    Index,
    Uniform,
    Staging,
}

impl BufferUsage {
    pub fn to_vk_usage(self) -> vk::BufferUsageFlags {
        match self {
            BufferUsage::Vertex => {
                vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Index => {
                vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
            BufferUsage::Staging => vk::BufferUsageFlags::TRANSFER_SRC,
        }
    }

    pub fn memory_location(self) -> MemoryLocation {
        match self {
            BufferUsage::Vertex | BufferUsage::Index => MemoryLocation::GpuOnly,
            BufferUsage::Uniform | BufferUsage::Staging => MemoryLocation::CpuToGpu,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BufferUsage::Vertex => "vertex",
            BufferUsage::Index => "index",
            BufferUsage::Uniform => "uniform",
            BufferUsage::Staging => "staging",
        }
    }
}

/// GPU buffer with allocator-managed memory.
pub struct Buffer {
    device: Arc<Device>,
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: vk::DeviceSize,
    usage: BufferUsage,
}

impl Buffer {
    /// Creates an uninitialized buffer of `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if `size` is zero or buffer or memory allocation fails.
    pub fn new(device: Arc<Device>, usage: BufferUsage, size: vk::DeviceSize) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::InvalidHandle(
                "Buffer size must be greater than 0".to_string(),
            ));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage.to_vk_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        // SAFETY: the device is alive and buffer_info is valid.
        let buffer = unsafe { device.handle().create_buffer(&buffer_info, None)? };

        // From here on `Drop` cleans up the handle if a later step fails.
        let mut this = Self {
            device,
            buffer,
            allocation: None,
            size,
            usage,
        };

        // SAFETY: buffer was created from this device.
        let requirements = unsafe { this.device.handle().get_buffer_memory_requirements(buffer) };

        let allocation = this.device.allocator()?.allocate(&AllocationCreateDesc {
            name: usage.name(),
            requirements,
            location: usage.memory_location(),
            linear: true,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        })?;

        // SAFETY: the allocation satisfies the buffer's requirements and is unbound.
        let bound = unsafe {
            this.device
                .handle()
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
        };
        this.allocation = Some(allocation);
        bound?;

        debug!("Created {} buffer: {} bytes", usage.name(), size);

        Ok(this)
    }

    /// Creates a host-visible buffer holding `data`.
    pub fn new_with_data(device: Arc<Device>, usage: BufferUsage, data: &[u8]) -> RhiResult<Self> {
        let buffer = Self::new(device, usage, data.len() as vk::DeviceSize)?;
        buffer.write_data(0, data)?;
        Ok(buffer)
    }

    /// Creates a device-local buffer and fills it with `data` through a staging copy.
    pub fn new_device_local(
        transfer: &TransferContext,
        usage: BufferUsage,
        data: &[u8],
    ) -> RhiResult<Self> {
        let device = transfer.device().clone();
        let staging = Self::new_with_data(device.clone(), BufferUsage::Staging, data)?;
        let buffer = Self::new(device, usage, data.len() as vk::DeviceSize)?;

        let region = vk::BufferCopy::default().size(buffer.size);
        transfer.immediate_submit(|cmd| {
            cmd.copy_buffer(staging.handle(), buffer.handle(), &[region]);
            Ok(())
        })?;

        Ok(buffer)
    }

    /// Writes `data` at `offset` through the persistent mapping.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is not host-visible or the write would
    /// run past its end.
    pub fn write_data(&self, offset: vk::DeviceSize, data: &[u8]) -> RhiResult<()> {
        if data.is_empty() {
            return Ok(());
        }

        let end = offset + data.len() as vk::DeviceSize;
        if end > self.size {
            return Err(RhiError::InvalidHandle(format!(
                "Write exceeds buffer size: offset {} + data {} > buffer {}",
                offset,
                data.len(),
                self.size
            )));
        }

        let allocation = self.allocation.as_ref().ok_or_else(|| {
            RhiError::InvalidHandle("Buffer allocation is not available".to_string())
        })?;

        let mapped_ptr = allocation
            .mapped_ptr()
            .ok_or_else(|| RhiError::InvalidHandle("Buffer memory is not mapped".to_string()))?;

        // SAFETY: the range was bounds-checked against the mapped allocation above.
        unsafe {
            let dst = mapped_ptr.as_ptr().cast::<u8>().add(offset as usize);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
        }

        Ok(())
    }

    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            match self.device.allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        error!("Failed to free buffer allocation: {:?}", e);
                    }
                }
                Err(e) => error!("Leaking buffer allocation: {}", e),
            }
        }

        // SAFETY: the owner guarantees no pending work uses the buffer.
        unsafe {
            self.device.handle().destroy_buffer(self.buffer, None);
        }

        debug!("Destroyed {} buffer", self.usage.name());
    }
}
