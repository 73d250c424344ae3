//! Frame Driver: the per-frame wait/acquire/record/submit/present protocol.
//!
//! The driver owns the only free-standing mutable state of the frame loop,
//! the frame slot index and the swapchain invalidation flag. Everything that
//! touches Vulkan goes through a [`FrameBackend`], which keeps the protocol
//! testable without a GPU.
//!
//! One call to [`FrameDriver::draw_frame`] runs these steps for the current
//! slot `i`:
//!
//! 1. wait for slot `i`'s in-flight fence
//! 2. acquire an image, signaling slot `i`'s image-available semaphore
//! 3. reset slot `i`'s fence
//! 4. record slot `i`'s command buffer
//! 5. submit it, signaling the render-finished semaphore and the fence
//! 6. present, recreating the swapchain if it went stale or a resize is pending
//! 7. advance `i` to `(i + 1) % F`
//!
//! An out-of-date acquire recreates the swapchain and returns before step 3,
//! so the next call waits on the same, still signaled, fence.

use tracing::{debug, error, warn};
use vkframe_rhi::frame::check_frames_in_flight;
use vkframe_rhi::{RhiError, RhiResult};

/// Result of asking the presentation engine for an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired { image_index: u32, suboptimal: bool },
    OutOfDate,
}

/// Result of queueing an image for presentation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

/// Result of a swapchain recreation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecreateOutcome {
    Recreated,
    /// The window was closed while waiting for a drawable extent.
    Cancelled,
}

/// What happened during one [`FrameDriver::draw_frame`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    /// The frame was submitted and queued for presentation.
    Presented,
    /// Acquire reported the swapchain out of date; it was recreated and nothing was submitted.
    SkippedOutOfDate,
    /// A non-fatal failure dropped the frame. The slot index did not advance.
    Abandoned,
    /// The window closed during a swapchain recreation.
    Closed,
}

/// GPU-facing half of the frame protocol, one method per step.
///
/// Every `slot` argument is in `0..frames_in_flight`.
pub trait FrameBackend {
    /// Blocks on the slot's in-flight fence. Expiry is [`RhiError::DeviceLost`].
    fn wait_for_slot(&mut self, slot: usize) -> RhiResult<()>;

    /// Acquires the next image, signaling the slot's image-available semaphore.
    fn acquire(&mut self, slot: usize) -> RhiResult<AcquireOutcome>;

    fn reset_slot_fence(&mut self, slot: usize) -> RhiResult<()>;

    /// Resets and re-records the slot's command buffer for `image_index`.
    fn record(&mut self, slot: usize, image_index: u32) -> RhiResult<()>;

    /// Submits the slot's command buffer, signaling its render-finished
    /// semaphore and its fence.
    fn submit(&mut self, slot: usize) -> RhiResult<()>;

    /// Presents `image_index` after the slot's render-finished semaphore.
    fn present(&mut self, slot: usize, image_index: u32) -> RhiResult<PresentOutcome>;

    /// Waits for a drawable extent, idles the device and rebuilds the swapchain.
    fn recreate_swapchain(&mut self) -> RhiResult<RecreateOutcome>;

    /// Replaces the slot's fence and semaphores with fresh ones, fence signaled.
    fn rebuild_slot(&mut self, slot: usize) -> RhiResult<()>;

    fn wait_idle(&mut self) -> RhiResult<()>;
}

/// Frame slot index plus swapchain invalidation flag.
#[derive(Debug)]
pub struct FrameDriver {
    frames_in_flight: usize,
    current_frame: usize,
    resize_pending: bool,
}

impl FrameDriver {
    /// Creates a driver cycling through `frames_in_flight` slots.
    ///
    /// Pass the slot count of the frame resources the backend uses, so the
    /// two always agree.
    ///
    /// # Errors
    ///
    /// Rejects zero slots, like every other frame-resource constructor.
    pub fn new(frames_in_flight: usize) -> RhiResult<Self> {
        check_frames_in_flight(frames_in_flight)?;
        Ok(Self {
            frames_in_flight,
            current_frame: 0,
            resize_pending: false,
        })
    }

    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    #[inline]
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    #[inline]
    pub fn resize_pending(&self) -> bool {
        self.resize_pending
    }

    /// Raises the invalidation flag. It is consumed by the next present.
    pub fn notify_resized(&mut self) {
        self.resize_pending = true;
    }

    /// Starts over at slot 0, as after a fresh initialization.
    pub fn reset(&mut self) {
        self.current_frame = 0;
    }

    /// Runs one iteration of the frame protocol.
    ///
    /// # Errors
    ///
    /// Only fatal conditions are returned: device loss, an expired wait, or a
    /// failed swapchain recreation. Everything else abandons the frame.
    pub fn draw_frame<B: FrameBackend + ?Sized>(&mut self, backend: &mut B) -> RhiResult<FrameStatus> {
        let slot = self.current_frame;

        backend.wait_for_slot(slot)?;

        let (image_index, acquire_suboptimal) = match backend.acquire(slot) {
            Ok(AcquireOutcome::Acquired {
                image_index,
                suboptimal,
            }) => (image_index, suboptimal),
            Ok(AcquireOutcome::OutOfDate) => {
                debug!("Swapchain out of date on acquire, recreating");
                return match backend.recreate_swapchain()? {
                    RecreateOutcome::Recreated => Ok(FrameStatus::SkippedOutOfDate),
                    RecreateOutcome::Cancelled => Ok(FrameStatus::Closed),
                };
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                // Nothing was consumed yet: the fence is still signaled and the
                // semaphore was not signaled.
                warn!("Image acquire failed on slot {}, abandoning frame: {}", slot, e);
                return Ok(FrameStatus::Abandoned);
            }
        };

        if let Err(e) = backend.reset_slot_fence(slot) {
            return self.abandon(backend, slot, "fence reset", e);
        }
        if let Err(e) = backend.record(slot, image_index) {
            return self.abandon(backend, slot, "command recording", e);
        }
        if let Err(e) = backend.submit(slot) {
            return self.abandon(backend, slot, "queue submit", e);
        }

        let present_stale = match backend.present(slot, image_index) {
            Ok(PresentOutcome::Presented) => false,
            Ok(PresentOutcome::Suboptimal) | Ok(PresentOutcome::OutOfDate) => true,
            Err(e) => return self.abandon(backend, slot, "present", e),
        };

        let mut status = FrameStatus::Presented;
        if present_stale || acquire_suboptimal || self.resize_pending {
            debug!(
                "Recreating swapchain after present (stale: {}, suboptimal acquire: {}, resized: {})",
                present_stale, acquire_suboptimal, self.resize_pending
            );
            self.resize_pending = false;
            if backend.recreate_swapchain()? == RecreateOutcome::Cancelled {
                status = FrameStatus::Closed;
            }
        }

        self.current_frame = (slot + 1) % self.frames_in_flight;
        Ok(status)
    }

    /// Drops a frame that failed after its fence was reset.
    ///
    /// The slot's fence may now never signal and its semaphores may hold a
    /// pending signal, so the slot is rebuilt once the device is idle. The
    /// acquired image can only be released by a new swapchain, so the
    /// invalidation flag is raised as well.
    fn abandon<B: FrameBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        slot: usize,
        step: &str,
        err: RhiError,
    ) -> RhiResult<FrameStatus> {
        if err.is_fatal() {
            return Err(err);
        }
        error!("{} failed on slot {}, abandoning frame: {}", step, slot, err);

        backend.wait_idle()?;
        backend.rebuild_slot(slot)?;
        self.resize_pending = true;
        Ok(FrameStatus::Abandoned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use vkframe_rhi::vk;

    #[derive(Clone, Debug, PartialEq, Eq)]
    enum Call {
        Wait(usize),
        Acquire(usize),
        ResetFence(usize),
        Record(usize, u32),
        Submit(usize),
        Present(usize, u32),
        Recreate,
        RebuildSlot(usize),
        WaitIdle,
    }

    /// Per-slot fence and semaphore identities, bumped on rebuild.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    struct SlotHandles {
        fence: u64,
        image_available: u64,
        render_finished: u64,
    }

    struct MockBackend {
        calls: Vec<Call>,
        acquire_script: VecDeque<RhiResult<AcquireOutcome>>,
        present_script: VecDeque<RhiResult<PresentOutcome>>,
        submit_script: VecDeque<RhiResult<()>>,
        wait_script: VecDeque<RhiResult<()>>,
        recreate_script: VecDeque<RecreateOutcome>,
        fence_signaled: Vec<bool>,
        handles: Vec<SlotHandles>,
        used_handles: Vec<(usize, SlotHandles)>,
        next_handle: u64,
        next_image: u32,
        image_count: u32,
    }

    impl MockBackend {
        fn new(frames: usize) -> Self {
            let mut backend = Self {
                calls: Vec::new(),
                acquire_script: VecDeque::new(),
                present_script: VecDeque::new(),
                submit_script: VecDeque::new(),
                wait_script: VecDeque::new(),
                recreate_script: VecDeque::new(),
                fence_signaled: vec![true; frames],
                handles: Vec::new(),
                used_handles: Vec::new(),
                next_handle: 1,
                next_image: 0,
                image_count: 3,
            };
            backend.handles = (0..frames).map(|_| backend.fresh_handles()).collect();
            backend
        }

        fn fresh_handles(&mut self) -> SlotHandles {
            let base = self.next_handle;
            self.next_handle += 3;
            SlotHandles {
                fence: base,
                image_available: base + 1,
                render_finished: base + 2,
            }
        }

        fn submitted(&self) -> usize {
            self.calls
                .iter()
                .filter(|c| matches!(c, Call::Submit(_)))
                .count()
        }

        fn recreations(&self) -> usize {
            self.calls.iter().filter(|c| **c == Call::Recreate).count()
        }
    }

    impl FrameBackend for MockBackend {
        fn wait_for_slot(&mut self, slot: usize) -> RhiResult<()> {
            self.calls.push(Call::Wait(slot));
            if let Some(result) = self.wait_script.pop_front() {
                return result;
            }
            assert!(self.fence_signaled[slot], "waited on an unsignaled fence");
            Ok(())
        }

        fn acquire(&mut self, slot: usize) -> RhiResult<AcquireOutcome> {
            self.calls.push(Call::Acquire(slot));
            if let Some(result) = self.acquire_script.pop_front() {
                return result;
            }
            let image_index = self.next_image;
            self.next_image = (self.next_image + 1) % self.image_count;
            Ok(AcquireOutcome::Acquired {
                image_index,
                suboptimal: false,
            })
        }

        fn reset_slot_fence(&mut self, slot: usize) -> RhiResult<()> {
            self.calls.push(Call::ResetFence(slot));
            assert!(self.fence_signaled[slot], "reset a fence that was not waited on");
            self.fence_signaled[slot] = false;
            Ok(())
        }

        fn record(&mut self, slot: usize, image_index: u32) -> RhiResult<()> {
            self.calls.push(Call::Record(slot, image_index));
            assert!(!self.fence_signaled[slot]);
            Ok(())
        }

        fn submit(&mut self, slot: usize) -> RhiResult<()> {
            self.calls.push(Call::Submit(slot));
            if let Some(result) = self.submit_script.pop_front() {
                return result;
            }
            self.used_handles.push((slot, self.handles[slot]));
            // Work completes immediately.
            self.fence_signaled[slot] = true;
            Ok(())
        }

        fn present(&mut self, slot: usize, image_index: u32) -> RhiResult<PresentOutcome> {
            self.calls.push(Call::Present(slot, image_index));
            self.present_script
                .pop_front()
                .unwrap_or(Ok(PresentOutcome::Presented))
        }

        fn recreate_swapchain(&mut self) -> RhiResult<RecreateOutcome> {
            self.calls.push(Call::Recreate);
            Ok(self
                .recreate_script
                .pop_front()
                .unwrap_or(RecreateOutcome::Recreated))
        }

        fn rebuild_slot(&mut self, slot: usize) -> RhiResult<()> {
            self.calls.push(Call::RebuildSlot(slot));
            self.handles[slot] = self.fresh_handles();
            self.fence_signaled[slot] = true;
            Ok(())
        }

        fn wait_idle(&mut self) -> RhiResult<()> {
            self.calls.push(Call::WaitIdle);
            Ok(())
        }
    }

    #[test]
    fn test_successful_frame_runs_steps_in_order() {
        let mut driver = FrameDriver::new(2).unwrap();
        let mut backend = MockBackend::new(2);

        let status = driver.draw_frame(&mut backend).unwrap();

        assert_eq!(status, FrameStatus::Presented);
        assert_eq!(
            backend.calls,
            vec![
                Call::Wait(0),
                Call::Acquire(0),
                Call::ResetFence(0),
                Call::Record(0, 0),
                Call::Submit(0),
                Call::Present(0, 0),
            ]
        );
        assert_eq!(driver.current_frame(), 1);
    }

    #[test]
    fn test_slot_index_wraps_after_frames_in_flight() {
        let frames = 3;
        let mut driver = FrameDriver::new(frames).unwrap();
        let mut backend = MockBackend::new(frames);

        let mut seen = Vec::new();
        for _ in 0..=frames {
            seen.push(driver.current_frame());
            assert_eq!(driver.draw_frame(&mut backend).unwrap(), FrameStatus::Presented);
        }

        assert_eq!(seen, vec![0, 1, 2, 0]);
        // After F+1 frames the index equals its value after the first frame.
        assert_eq!(driver.current_frame(), 1);
    }

    #[test]
    fn test_out_of_date_acquire_recreates_without_advancing() {
        let mut driver = FrameDriver::new(2).unwrap();
        let mut backend = MockBackend::new(2);
        backend
            .acquire_script
            .push_back(Ok(AcquireOutcome::OutOfDate));

        let status = driver.draw_frame(&mut backend).unwrap();

        assert_eq!(status, FrameStatus::SkippedOutOfDate);
        assert_eq!(driver.current_frame(), 0);
        assert_eq!(backend.submitted(), 0);
        assert_eq!(
            backend.calls,
            vec![Call::Wait(0), Call::Acquire(0), Call::Recreate]
        );
        // The fence was never reset, so the retry does not block.
        assert!(backend.fence_signaled[0]);

        assert_eq!(driver.draw_frame(&mut backend).unwrap(), FrameStatus::Presented);
        assert_eq!(driver.current_frame(), 1);
    }

    #[test]
    fn test_suboptimal_present_recreates_without_resize_flag() {
        let mut driver = FrameDriver::new(2).unwrap();
        let mut backend = MockBackend::new(2);
        backend
            .present_script
            .push_back(Ok(PresentOutcome::Suboptimal));

        let status = driver.draw_frame(&mut backend).unwrap();

        assert_eq!(status, FrameStatus::Presented);
        assert_eq!(backend.recreations(), 1);
        assert!(!driver.resize_pending());
        // Recreation after present does not hold back the slot index.
        assert_eq!(driver.current_frame(), 1);
    }

    #[test]
    fn test_out_of_date_present_recreates() {
        let mut driver = FrameDriver::new(2).unwrap();
        let mut backend = MockBackend::new(2);
        backend
            .present_script
            .push_back(Ok(PresentOutcome::OutOfDate));

        driver.draw_frame(&mut backend).unwrap();

        assert_eq!(backend.recreations(), 1);
        assert_eq!(driver.current_frame(), 1);
    }

    #[test]
    fn test_suboptimal_acquire_recreates_after_present() {
        let mut driver = FrameDriver::new(2).unwrap();
        let mut backend = MockBackend::new(2);
        backend.acquire_script.push_back(Ok(AcquireOutcome::Acquired {
            image_index: 1,
            suboptimal: true,
        }));

        driver.draw_frame(&mut backend).unwrap();

        assert_eq!(backend.calls.last(), Some(&Call::Recreate));
        assert_eq!(backend.calls[5], Call::Present(0, 1));
    }

    #[test]
    fn test_resize_flag_is_consumed_by_present() {
        let mut driver = FrameDriver::new(2).unwrap();
        let mut backend = MockBackend::new(2);
        driver.notify_resized();

        driver.draw_frame(&mut backend).unwrap();
        assert_eq!(backend.recreations(), 1);
        assert!(!driver.resize_pending());

        driver.draw_frame(&mut backend).unwrap();
        assert_eq!(backend.recreations(), 1);
    }

    #[test]
    fn test_same_slot_reuses_same_handles() {
        let mut driver = FrameDriver::new(2).unwrap();
        let mut backend = MockBackend::new(2);

        for _ in 0..4 {
            driver.draw_frame(&mut backend).unwrap();
        }

        let slot0: Vec<_> = backend
            .used_handles
            .iter()
            .filter(|(slot, _)| *slot == 0)
            .map(|(_, handles)| *handles)
            .collect();
        assert_eq!(slot0.len(), 2);
        assert_eq!(slot0[0], slot0[1]);

        let slot1 = backend
            .used_handles
            .iter()
            .find(|(slot, _)| *slot == 1)
            .map(|(_, handles)| *handles);
        assert_ne!(slot1, Some(slot0[0]));
    }

    #[test]
    fn test_failed_acquire_abandons_without_advancing() {
        let mut driver = FrameDriver::new(2).unwrap();
        let mut backend = MockBackend::new(2);
        backend
            .acquire_script
            .push_back(Err(RhiError::VulkanError(vk::Result::ERROR_SURFACE_LOST_KHR)));

        let status = driver.draw_frame(&mut backend).unwrap();

        assert_eq!(status, FrameStatus::Abandoned);
        assert_eq!(driver.current_frame(), 0);
        assert_eq!(backend.submitted(), 0);
        assert!(!backend.calls.contains(&Call::ResetFence(0)));
        assert!(!backend.calls.iter().any(|c| matches!(c, Call::Present(..))));
        assert!(backend.fence_signaled[0]);
    }

    #[test]
    fn test_failed_submit_rebuilds_slot() {
        let mut driver = FrameDriver::new(2).unwrap();
        let mut backend = MockBackend::new(2);
        let before = backend.handles[0];
        backend
            .submit_script
            .push_back(Err(RhiError::VulkanError(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY)));

        let status = driver.draw_frame(&mut backend).unwrap();

        assert_eq!(status, FrameStatus::Abandoned);
        assert_eq!(driver.current_frame(), 0);
        assert!(!backend.calls.iter().any(|c| matches!(c, Call::Present(..))));
        let tail = &backend.calls[backend.calls.len() - 2..];
        assert_eq!(tail, &[Call::WaitIdle, Call::RebuildSlot(0)]);
        assert_ne!(backend.handles[0], before);
        assert!(driver.resize_pending());

        // The rebuilt fence is signaled, so the retry neither deadlocks nor fails.
        assert_eq!(driver.draw_frame(&mut backend).unwrap(), FrameStatus::Presented);
        assert_eq!(driver.current_frame(), 1);
    }

    #[test]
    fn test_failed_present_rebuilds_slot() {
        let mut driver = FrameDriver::new(2).unwrap();
        let mut backend = MockBackend::new(2);
        backend
            .present_script
            .push_back(Err(RhiError::VulkanError(vk::Result::ERROR_SURFACE_LOST_KHR)));

        let status = driver.draw_frame(&mut backend).unwrap();

        assert_eq!(status, FrameStatus::Abandoned);
        assert_eq!(driver.current_frame(), 0);
        assert_eq!(backend.calls.last(), Some(&Call::RebuildSlot(0)));
    }

    #[test]
    fn test_fence_timeout_is_fatal() {
        let mut driver = FrameDriver::new(2).unwrap();
        let mut backend = MockBackend::new(2);
        backend
            .wait_script
            .push_back(Err(RhiError::from_wait(vk::Result::TIMEOUT, "fence wait")));

        let result = driver.draw_frame(&mut backend);

        assert!(matches!(result, Err(RhiError::DeviceLost(_))));
        assert_eq!(backend.calls, vec![Call::Wait(0)]);
    }

    #[test]
    fn test_device_lost_on_present_is_fatal() {
        let mut driver = FrameDriver::new(2).unwrap();
        let mut backend = MockBackend::new(2);
        backend
            .present_script
            .push_back(Err(RhiError::VulkanError(vk::Result::ERROR_DEVICE_LOST)));

        assert!(driver.draw_frame(&mut backend).is_err());
        assert!(!backend.calls.contains(&Call::RebuildSlot(0)));
    }

    #[test]
    fn test_cancelled_recreation_reports_closed() {
        let mut driver = FrameDriver::new(2).unwrap();
        let mut backend = MockBackend::new(2);
        backend
            .acquire_script
            .push_back(Ok(AcquireOutcome::OutOfDate));
        backend.recreate_script.push_back(RecreateOutcome::Cancelled);

        assert_eq!(driver.draw_frame(&mut backend).unwrap(), FrameStatus::Closed);
        assert_eq!(driver.current_frame(), 0);
    }

    #[test]
    fn test_reset_after_rebuild_behaves_like_fresh_driver() {
        let mut driver = FrameDriver::new(2).unwrap();
        let mut backend = MockBackend::new(2);
        driver.draw_frame(&mut backend).unwrap();
        assert_eq!(driver.current_frame(), 1);

        // Fresh frame resources, as after Renderer::rebuild_frame_resources.
        let mut rebuilt = MockBackend::new(2);
        driver.reset();
        driver.draw_frame(&mut rebuilt).unwrap();

        let mut fresh_driver = FrameDriver::new(2).unwrap();
        let mut fresh = MockBackend::new(2);
        fresh_driver.draw_frame(&mut fresh).unwrap();

        assert_eq!(rebuilt.calls, fresh.calls);
        assert_eq!(driver.current_frame(), fresh_driver.current_frame());
    }

    #[test]
    fn test_zero_frames_in_flight_is_rejected() {
        assert!(matches!(
            FrameDriver::new(0),
            Err(RhiError::InitializationFailed(_))
        ));
        assert_eq!(FrameDriver::new(1).unwrap().frames_in_flight(), 1);
    }
}
