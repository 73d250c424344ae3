//! Per-slot frame resources: the Frame Synchronization Set and the Command
//! Recording Pool, created, rebuilt and submitted together.
//!
//! Both halves always have the same number of slots. The frame driver takes
//! its slot count from [`FrameResources::len`].

use std::sync::Arc;

use ash::vk;
use tracing::info;

use crate::command::FrameCommandPool;
use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::sync::{FrameSyncSet, IMAGE_AVAILABLE_WAIT_STAGE};

/// Rejects a slot count of zero. Shared by every type that is sized by it.
pub fn check_frames_in_flight(frames_in_flight: usize) -> RhiResult<()> {
    if frames_in_flight == 0 {
        return Err(RhiError::InitializationFailed(
            "frames in flight must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Fields drop in declaration order: command buffers before the primitives they signal.
pub struct FrameResources {
    device: Arc<Device>,
    commands: FrameCommandPool,
    sync: FrameSyncSet,
}

impl FrameResources {
    pub fn new(device: Arc<Device>, frames_in_flight: usize) -> RhiResult<Self> {
        let sync = FrameSyncSet::new(device.clone(), frames_in_flight)?;
        let commands =
            FrameCommandPool::new(device.clone(), device.queue_family_index(), frames_in_flight)?;
        Ok(Self {
            device,
            commands,
            sync,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sync.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sync.is_empty()
    }

    #[inline]
    pub fn sync(&self) -> &FrameSyncSet {
        &self.sync
    }

    #[inline]
    pub fn sync_mut(&mut self) -> &mut FrameSyncSet {
        &mut self.sync
    }

    #[inline]
    pub fn commands(&self) -> &FrameCommandPool {
        &self.commands
    }

    /// Destroys both halves and creates them again with the same slot count.
    ///
    /// Waits for the device to go idle first. The new objects are built before
    /// the old ones are released, so a failure leaves `self` untouched.
    pub fn rebuild(&mut self) -> RhiResult<()> {
        self.device.wait_idle()?;

        let frames = self.len();
        let sync = FrameSyncSet::new(self.device.clone(), frames)?;
        let commands =
            FrameCommandPool::new(self.device.clone(), self.device.queue_family_index(), frames)?;

        self.commands = commands;
        self.sync = sync;

        info!("Rebuilt frame resources for {} slots", frames);
        Ok(())
    }

    /// Submits slot `slot`'s command buffer.
    ///
    /// Waits on the slot's image-available semaphore at
    /// [`IMAGE_AVAILABLE_WAIT_STAGE`], signals its render-finished semaphore
    /// and its in-flight fence. The fence must have been reset.
    pub fn submit(&self, slot: usize) -> RhiResult<()> {
        if slot >= self.len() {
            return Err(RhiError::InvalidHandle(format!(
                "frame slot {} out of range ({} slots)",
                slot,
                self.len()
            )));
        }

        let sync = self.sync.slot(slot);
        let wait_semaphores = [sync.image_available()];
        let wait_stages = [IMAGE_AVAILABLE_WAIT_STAGE];
        let signal_semaphores = [sync.render_finished()];
        let command_buffers = [self.commands.buffer(slot).handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        // SAFETY: the buffer is recorded, the image-available semaphore has a
        // pending signal, and the fence was reset after its wait.
        unsafe {
            self.device
                .submit(&[submit_info], sync.in_flight_fence().handle())
        }
    }
}
