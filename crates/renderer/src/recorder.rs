//! The render collaborator seam between the frame driver and what gets drawn.

use ash::vk;
use vkframe_rhi::RhiResult;
use vkframe_rhi::command::CommandBuffer;
use vkframe_rhi::swapchain::Swapchain;

/// The swapchain image a frame renders into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameTarget {
    /// Frame slot whose command buffer, fence and semaphores are in use.
    pub slot: usize,
    pub image_index: u32,
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub extent: vk::Extent2D,
}

impl FrameTarget {
    pub fn aspect_ratio(&self) -> f32 {
        if self.extent.height == 0 {
            1.0
        } else {
            self.extent.width as f32 / self.extent.height as f32
        }
    }
}

/// Encodes one frame into an already begun command buffer.
///
/// Implementations must leave `target.image` in `PRESENT_SRC_KHR`.
pub trait FrameRecorder {
    fn record(&mut self, cmd: &CommandBuffer, target: &FrameTarget) -> RhiResult<()>;

    /// Called after the swapchain was rebuilt and before the next frame is recorded.
    fn on_swapchain_recreated(&mut self, _swapchain: &Swapchain) -> RhiResult<()> {
        Ok(())
    }
}
