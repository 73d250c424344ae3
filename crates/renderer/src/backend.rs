//! [`FrameBackend`] over real Vulkan objects.

use ash::vk;
use tracing::{debug, warn};
use vkframe_platform::FramebufferSource;
use vkframe_rhi::device::Device;
use vkframe_rhi::frame::FrameResources;
use vkframe_rhi::swapchain::Swapchain;
use vkframe_rhi::{RhiError, RhiResult};

use crate::frame_driver::{AcquireOutcome, FrameBackend, PresentOutcome, RecreateOutcome};
use crate::recorder::{FrameRecorder, FrameTarget};
use crate::recreate::wait_for_drawable_extent;

/// Classifies the result of `vkAcquireNextImageKHR`.
///
/// Out-of-date is a recoverable outcome; device loss and an expired wait are
/// fatal; anything else is an ordinary error.
pub fn acquire_outcome(result: Result<(u32, bool), vk::Result>) -> RhiResult<AcquireOutcome> {
    match result {
        Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired {
            image_index,
            suboptimal,
        }),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
        Err(e) => Err(RhiError::from_wait(e, "image acquire")),
    }
}

/// Classifies the result of `vkQueuePresentKHR`, where `Ok(true)` is suboptimal.
pub fn present_outcome(result: Result<bool, vk::Result>) -> RhiResult<PresentOutcome> {
    match result {
        Ok(false) => Ok(PresentOutcome::Presented),
        Ok(true) => Ok(PresentOutcome::Suboptimal),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
        Err(e) => Err(RhiError::from_wait(e, "present")),
    }
}

/// Borrows the renderer's frame objects for the duration of one frame.
pub struct VulkanFrameBackend<'a, W: ?Sized, R: ?Sized> {
    pub device: &'a Device,
    pub swapchain: &'a mut Swapchain,
    pub frames: &'a mut FrameResources,
    pub recorder: &'a mut R,
    pub window: &'a mut W,
    /// Bound for fence and acquire waits, in nanoseconds.
    pub timeout_ns: u64,
}

impl<W, R> FrameBackend for VulkanFrameBackend<'_, W, R>
where
    W: FramebufferSource + ?Sized,
    R: FrameRecorder + ?Sized,
{
    fn wait_for_slot(&mut self, slot: usize) -> RhiResult<()> {
        self.frames.sync().slot(slot).in_flight_fence().wait(self.timeout_ns)
    }

    fn acquire(&mut self, slot: usize) -> RhiResult<AcquireOutcome> {
        let semaphore = self.frames.sync().slot(slot).image_available();
        acquire_outcome(self.swapchain.acquire_next_image(semaphore, self.timeout_ns))
    }

    fn reset_slot_fence(&mut self, slot: usize) -> RhiResult<()> {
        self.frames.sync().slot(slot).in_flight_fence().reset()
    }

    fn record(&mut self, slot: usize, image_index: u32) -> RhiResult<()> {
        let index = image_index as usize;
        let (image, view) = self
            .swapchain
            .image(index)
            .zip(self.swapchain.image_view(index))
            .ok_or_else(|| {
                RhiError::InvalidHandle(format!("swapchain image {} out of range", image_index))
            })?;

        let target = FrameTarget {
            slot,
            image_index,
            image,
            view,
            extent: self.swapchain.extent(),
        };

        let cmd = self.frames.commands().buffer(slot);
        cmd.reset()?;
        cmd.begin()?;
        self.recorder.record(&cmd, &target)?;
        cmd.end()
    }

    fn submit(&mut self, slot: usize) -> RhiResult<()> {
        self.frames.submit(slot)
    }

    fn present(&mut self, slot: usize, image_index: u32) -> RhiResult<PresentOutcome> {
        let semaphore = self.frames.sync().slot(slot).render_finished();
        present_outcome(
            self.swapchain
                .present(self.device.queue(), image_index, semaphore),
        )
    }

    fn recreate_swapchain(&mut self) -> RhiResult<RecreateOutcome> {
        let Some((width, height)) = wait_for_drawable_extent(self.window) else {
            return Ok(RecreateOutcome::Cancelled);
        };

        self.device.wait_idle()?;
        self.swapchain.recreate(width, height)?;
        self.recorder.on_swapchain_recreated(self.swapchain)?;

        let extent = self.swapchain.extent();
        debug!("Swapchain recreated at {}x{}", extent.width, extent.height);
        Ok(RecreateOutcome::Recreated)
    }

    fn rebuild_slot(&mut self, slot: usize) -> RhiResult<()> {
        warn!("Rebuilding synchronization objects of frame slot {}", slot);
        self.frames.sync_mut().rebuild_slot(slot)
    }

    fn wait_idle(&mut self) -> RhiResult<()> {
        self.device.wait_idle()
    }
}
