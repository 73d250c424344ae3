//! 2D images backed by gpu-allocator, and the layout transitions used by the renderer.
//!
//! [`ImageTransition::between`] is the single table of supported layout
//! changes. Upload code and the per-frame recorder both go through it, so an
//! unsupported pair is an error instead of a silently wrong barrier.

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, error};

use crate::command::CommandBuffer;
use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::sync::IMAGE_AVAILABLE_WAIT_STAGE;

/// Access masks and pipeline stages for one layout change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageTransition {
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
}

impl ImageTransition {
    /// Looks up the barrier parameters for `old -> new`.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidHandle`] for a pair the renderer never performs.
    pub fn between(old: vk::ImageLayout, new: vk::ImageLayout) -> RhiResult<Self> {
        use vk::ImageLayout as L;

        let (src_access, dst_access, src_stage, dst_stage) = match (old, new) {
            // Texture upload
            (L::UNDEFINED, L::TRANSFER_DST_OPTIMAL) => (
                vk::AccessFlags::empty(),
                vk::AccessFlags::TRANSFER_WRITE,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::TRANSFER,
            ),
            (L::TRANSFER_DST_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => (
                vk::AccessFlags::TRANSFER_WRITE,
                vk::AccessFlags::SHADER_READ,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
            ),
            // Swapchain image around a frame. The source stage is the
            // acquire semaphore's wait stage, otherwise the transition may
            // run while the presentation engine still reads the image.
            (L::UNDEFINED, L::COLOR_ATTACHMENT_OPTIMAL) => (
                vk::AccessFlags::empty(),
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                IMAGE_AVAILABLE_WAIT_STAGE,
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            ),
            (L::COLOR_ATTACHMENT_OPTIMAL, L::PRESENT_SRC_KHR) => (
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                vk::AccessFlags::empty(),
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                vk::PipelineStageFlags::BOTTOM_OF_PIPE,
            ),
            _ => {
                return Err(RhiError::InvalidHandle(format!(
                    "Unsupported layout transition: {:?} -> {:?}",
                    old, new
                )));
            }
        };

        Ok(Self {
            old_layout: old,
            new_layout: new,
            src_access,
            dst_access,
            src_stage,
            dst_stage,
        })
    }

    /// Barrier over the first mip level and layer of a color image.
    pub fn barrier(&self, image: vk::Image) -> vk::ImageMemoryBarrier<'static> {
        vk::ImageMemoryBarrier::default()
            .old_layout(self.old_layout)
            .new_layout(self.new_layout)
            .src_access_mask(self.src_access)
            .dst_access_mask(self.dst_access)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(color_subresource_range())
    }

    /// Records the barrier into `cmd`.
    pub fn record(&self, cmd: &CommandBuffer, image: vk::Image) {
        cmd.pipeline_barrier(self.src_stage, self.dst_stage, &[self.barrier(image)]);
    }
}

/// Single mip, single layer, color aspect.
pub fn color_subresource_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

/// Parameters for [`Image::new`].
#[derive(Clone, Copy, Debug)]
pub struct ImageDesc<'a> {
    pub name: &'a str,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub usage: vk::ImageUsageFlags,
}

/// Device-local 2D color image with a single view.
pub struct Image {
    device: Arc<Device>,
    image: vk::Image,
    view: vk::ImageView,
    allocation: Option<Allocation>,
    format: vk::Format,
    extent: vk::Extent2D,
}

impl Image {
    /// Creates the image, binds dedicated memory and creates its view.
    /// Contents are undefined until uploaded.
    pub fn new(device: Arc<Device>, desc: &ImageDesc<'_>) -> RhiResult<Self> {
        if desc.extent.width == 0 || desc.extent.height == 0 {
            return Err(RhiError::InvalidHandle(format!(
                "Image '{}' has zero extent",
                desc.name
            )));
        }

        let create_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(desc.format)
            .extent(vk::Extent3D {
                width: desc.extent.width,
                height: desc.extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(desc.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        // SAFETY: the device is alive and create_info is valid.
        let image = unsafe { device.handle().create_image(&create_info, None)? };

        // From here on `Drop` cleans up whatever has been created.
        let mut this = Self {
            device,
            image,
            view: vk::ImageView::null(),
            allocation: None,
            format: desc.format,
            extent: desc.extent,
        };

        // SAFETY: image was created from this device.
        let requirements = unsafe { this.device.handle().get_image_memory_requirements(image) };

        let allocation = this.device.allocator()?.allocate(&AllocationCreateDesc {
            name: desc.name,
            requirements,
            location: MemoryLocation::GpuOnly,
            linear: false,
            allocation_scheme: AllocationScheme::DedicatedImage(image),
        })?;

        // SAFETY: the allocation satisfies the image's requirements and is unbound.
        let bound = unsafe {
            this.device
                .handle()
                .bind_image_memory(image, allocation.memory(), allocation.offset())
        };
        this.allocation = Some(allocation);
        bound?;

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(desc.format)
            .subresource_range(color_subresource_range());

        // SAFETY: the image has memory bound and the format matches.
        this.view = unsafe { this.device.handle().create_image_view(&view_info, None)? };

        debug!(
            "Created image '{}': {}x{} {:?}",
            desc.name, desc.extent.width, desc.extent.height, desc.format
        );

        Ok(this)
    }

    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        // SAFETY: the owner guarantees no pending work reads the image.
        unsafe {
            if self.view != vk::ImageView::null() {
                self.device.handle().destroy_image_view(self.view, None);
            }
        }

        if let Some(allocation) = self.allocation.take() {
            match self.device.allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        error!("Failed to free image allocation: {:?}", e);
                    }
                }
                Err(e) => error!("Leaking image allocation: {}", e),
            }
        }

        // SAFETY: view and memory are released above.
        unsafe {
            self.device.handle().destroy_image(self.image, None);
        }
        debug!("Destroyed image");
    }
}
