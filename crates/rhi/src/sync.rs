//! Synchronization primitives and the Frame Synchronization Set.
//!
//! - [`Semaphore`] orders GPU work against other GPU work and presentation.
//! - [`Fence`] lets the CPU wait for submitted work.
//! - [`FrameSync`] is one frame slot's triple: image-available and
//!   render-finished semaphores plus an in-flight fence.
//! - [`FrameSyncSet`] holds one [`FrameSync`] per frame slot.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vkframe_rhi::device::Device;
//! use vkframe_rhi::sync::FrameSyncSet;
//!
//! # fn example(device: Arc<Device>) -> vkframe_rhi::RhiResult<()> {
//! let sync = FrameSyncSet::new(device, 2)?;
//! let slot = sync.slot(0);
//!
//! // The fence starts signaled, so the first wait returns immediately.
//! slot.in_flight_fence().wait(u64::MAX)?;
//! slot.in_flight_fence().reset()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::frame::check_frames_in_flight;

/// Stage at which a frame's submission waits on its image-available semaphore.
///
/// The first barrier on an acquired swapchain image must use this as its
/// source stage so the layout transition chains after the semaphore wait.
pub const IMAGE_AVAILABLE_WAIT_STAGE: vk::PipelineStageFlags =
    vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;

/// Vulkan semaphore wrapper, created unsignaled.
pub struct Semaphore {
    device: Arc<Device>,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();

        // SAFETY: the device is alive and create_info is valid.
        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };

        Ok(Self { device, semaphore })
    }

    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        // SAFETY: the owner guarantees no pending submission references the semaphore.
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Vulkan fence wrapper.
pub struct Fence {
    device: Arc<Device>,
    fence: vk::Fence,
}

impl Fence {
    /// Creates a fence, optionally already signaled so the first wait does not block.
    pub fn new(device: Arc<Device>, signaled: bool) -> RhiResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::default().flags(flags);

        // SAFETY: the device is alive and create_info is valid.
        let fence = unsafe { device.handle().create_fence(&create_info, None)? };

        Ok(Self { device, fence })
    }

    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Waits until the fence is signaled.
    ///
    /// # Errors
    ///
    /// Expiry of `timeout_ns` and device loss are reported as
    /// [`RhiError::DeviceLost`]; other failures as [`RhiError::VulkanError`].
    pub fn wait(&self, timeout_ns: u64) -> RhiResult<()> {
        let fences = [self.fence];
        // SAFETY: the fence belongs to this device.
        unsafe {
            self.device
                .handle()
                .wait_for_fences(&fences, true, timeout_ns)
                .map_err(|e| RhiError::from_wait(e, "fence wait"))
        }
    }

    /// Returns the fence to the unsignaled state. It must not be pending on a queue.
    pub fn reset(&self) -> RhiResult<()> {
        let fences = [self.fence];
        // SAFETY: the caller waited on the fence, so no queue operation holds it.
        unsafe { self.device.handle().reset_fences(&fences)? };
        Ok(())
    }

    /// Non-blocking status query.
    ///
    /// # Errors
    ///
    /// Device loss is reported as [`RhiError::DeviceLost`], as in [`Fence::wait`].
    pub fn is_signaled(&self) -> RhiResult<bool> {
        // SAFETY: status query on a fence of this device.
        unsafe {
            self.device
                .handle()
                .get_fence_status(self.fence)
                .map_err(|e| RhiError::from_wait(e, "fence status"))
        }
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        // SAFETY: the owner guarantees the fence is not pending.
        unsafe {
            self.device.handle().destroy_fence(self.fence, None);
        }
    }
}

/// Synchronization objects for one frame slot.
pub struct FrameSync {
    image_available: Semaphore,
    render_finished: Semaphore,
    in_flight: Fence,
}

impl FrameSync {
    /// Creates both semaphores and a signaled fence. On failure the objects
    /// already created are dropped.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        Ok(Self {
            image_available: Semaphore::new(device.clone())?,
            render_finished: Semaphore::new(device.clone())?,
            in_flight: Fence::new(device, true)?,
        })
    }

    #[inline]
    pub fn image_available(&self) -> vk::Semaphore {
        self.image_available.handle()
    }

    #[inline]
    pub fn render_finished(&self) -> vk::Semaphore {
        self.render_finished.handle()
    }

    #[inline]
    pub fn in_flight_fence(&self) -> &Fence {
        &self.in_flight
    }
}

/// Frame Synchronization Set: one [`FrameSync`] per frame slot.
///
/// The primitives at index `i` are only ever used with the command buffer of
/// slot `i`. The slot index itself is advanced by the frame driver.
pub struct FrameSyncSet {
    device: Arc<Device>,
    slots: Vec<FrameSync>,
}

impl FrameSyncSet {
    pub fn new(device: Arc<Device>, frames_in_flight: usize) -> RhiResult<Self> {
        check_frames_in_flight(frames_in_flight)?;

        let slots = (0..frames_in_flight)
            .map(|_| FrameSync::new(device.clone()))
            .collect::<RhiResult<Vec<_>>>()?;

        debug!("Created synchronization objects for {} frame slots", slots.len());

        Ok(Self { device, slots })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Primitives of slot `index`. Panics if `index >= len()`, which is a driver bug.
    #[inline]
    pub fn slot(&self, index: usize) -> &FrameSync {
        &self.slots[index]
    }

    /// Replaces slot `index` with fresh primitives, fence signaled.
    ///
    /// Used after a failed submit or present left the slot's fence unsignaled
    /// or a semaphore with a pending signal. The device must be idle.
    pub fn rebuild_slot(&mut self, index: usize) -> RhiResult<()> {
        let fresh = FrameSync::new(self.device.clone())?;
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = fresh;
            debug!("Rebuilt synchronization objects for frame slot {}", index);
            Ok(())
        } else {
            Err(RhiError::InvalidHandle(format!(
                "frame slot {} out of range ({} slots)",
                index,
                self.slots.len()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_types_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Semaphore>();
        assert_send_sync::<Fence>();
        assert_send_sync::<FrameSyncSet>();
    }
}
