//! One-shot command submission for uploads.
//!
//! [`TransferContext`] bundles the device, a transient command pool, a command
//! buffer and a fence. Upload helpers receive it explicitly instead of
//! re-deriving queue and pool handles.

use std::sync::Arc;
use std::time::Duration;

use ash::vk;
use tracing::debug;

use crate::command::{CommandBuffer, CommandPool};
use crate::device::Device;
use crate::error::RhiResult;
use crate::sync::Fence;

pub struct TransferContext {
    command_buffer: vk::CommandBuffer,
    fence: Fence,
    pool: CommandPool,
    timeout: Duration,
}

impl TransferContext {
    /// `timeout` bounds each wait for an upload to finish; expiry is device loss.
    pub fn new(device: Arc<Device>, timeout: Duration) -> RhiResult<Self> {
        let pool = CommandPool::new_transient(device.clone(), device.queue_family_index())?;
        let command_buffer = pool.allocate_command_buffer()?;
        let fence = Fence::new(device, false)?;

        debug!("Transfer context created");

        Ok(Self {
            command_buffer,
            fence,
            pool,
            timeout,
        })
    }

    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        self.pool.device()
    }

    /// Records `record` into a fresh command buffer, submits it and blocks until it completes.
    pub fn immediate_submit<F>(&self, record: F) -> RhiResult<()>
    where
        F: FnOnce(&CommandBuffer) -> RhiResult<()>,
    {
        let cmd = CommandBuffer::from_handle(self.device().clone(), self.command_buffer);

        cmd.reset()?;
        cmd.begin()?;
        record(&cmd)?;
        cmd.end()?;

        let command_buffers = [self.command_buffer];
        let submit = vk::SubmitInfo::default().command_buffers(&command_buffers);

        // SAFETY: the buffer is fully recorded and the fence is unsignaled.
        unsafe { self.device().submit(&[submit], self.fence.handle())? };

        self.fence
            .wait(self.timeout.as_nanos().min(u64::MAX as u128) as u64)?;
        self.fence.reset()?;

        Ok(())
    }
}
