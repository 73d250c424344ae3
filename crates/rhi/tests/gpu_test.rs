//! Tests against a real Vulkan device.
//!
//! Each test skips with a message when no Vulkan loader or 1.3 adapter is
//! available, so the suite stays green on machines without a GPU.

use std::sync::Arc;
use std::time::Duration;

use ash::vk;
use vkframe_rhi::buffer::{Buffer, BufferUsage};
use vkframe_rhi::command::FrameCommandPool;
use vkframe_rhi::device::Device;
use vkframe_rhi::frame::FrameResources;
use vkframe_rhi::instance::Instance;
use vkframe_rhi::physical_device::{AdapterInfo, pick_queue_family};
use vkframe_rhi::sync::FrameSyncSet;
use vkframe_rhi::texture::Texture;
use vkframe_rhi::transfer::TransferContext;

const TIMEOUT_NS: u64 = 1_000_000_000;

/// Instance and device without a surface. Dropped device-first.
struct Headless {
    device: Arc<Device>,
    _instance: Instance,
}

fn headless() -> Option<Headless> {
    let instance = match Instance::new(c"vkframe-test", false, &[]) {
        Ok(instance) => instance,
        Err(e) => {
            eprintln!("skipping: no Vulkan instance ({})", e);
            return None;
        }
    };

    // SAFETY: enumeration and property queries on a live instance.
    let adapter = unsafe {
        let raw = instance.handle();
        raw.enumerate_physical_devices().ok()?.into_iter().find_map(|physical_device| {
            let properties = raw.get_physical_device_properties(physical_device);
            let version = (
                vk::api_version_major(properties.api_version),
                vk::api_version_minor(properties.api_version),
            );
            if version < (1, 3) {
                return None;
            }
            let families = raw.get_physical_device_queue_family_properties(physical_device);
            let queue_family_index = pick_queue_family(&families, |_| true)?;
            Some(AdapterInfo {
                physical_device,
                properties,
                memory_properties: raw.get_physical_device_memory_properties(physical_device),
                queue_family_index,
            })
        })
    };

    let Some(adapter) = adapter else {
        eprintln!("skipping: no Vulkan 1.3 adapter");
        return None;
    };

    match Device::new(&instance, &adapter) {
        Ok(device) => Some(Headless {
            device,
            _instance: instance,
        }),
        Err(e) => {
            eprintln!("skipping: device creation failed ({})", e);
            None
        }
    }
}

#[test]
fn test_fresh_fences_are_signaled() {
    let Some(gpu) = headless() else { return };
    let sync = FrameSyncSet::new(gpu.device.clone(), 2).unwrap();

    for slot in 0..sync.len() {
        let fence = sync.slot(slot).in_flight_fence();
        assert!(fence.is_signaled().unwrap());
        fence.wait(TIMEOUT_NS).unwrap();
    }
}

#[test]
fn test_reset_fence_wait_times_out_as_device_lost() {
    let Some(gpu) = headless() else { return };
    let sync = FrameSyncSet::new(gpu.device.clone(), 1).unwrap();
    let fence = sync.slot(0).in_flight_fence();

    fence.reset().unwrap();
    let err = fence.wait(1_000).unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn test_rebuild_slot_restores_signaled_fence() {
    let Some(gpu) = headless() else { return };
    let mut sync = FrameSyncSet::new(gpu.device.clone(), 2).unwrap();

    sync.slot(1).in_flight_fence().reset().unwrap();
    assert!(!sync.slot(1).in_flight_fence().is_signaled().unwrap());
    let untouched = sync.slot(0).render_finished();

    sync.rebuild_slot(1).unwrap();

    assert!(sync.slot(1).in_flight_fence().is_signaled().unwrap());
    assert_eq!(sync.slot(0).render_finished(), untouched);
    assert!(sync.rebuild_slot(2).is_err());
}

#[test]
fn test_frame_command_pool_has_one_buffer_per_slot() {
    let Some(gpu) = headless() else { return };
    let pool =
        FrameCommandPool::new(gpu.device.clone(), gpu.device.queue_family_index(), 3).unwrap();

    assert_eq!(pool.len(), 3);
    let cmd = pool.buffer(2);
    cmd.reset().unwrap();
    cmd.begin().unwrap();
    cmd.end().unwrap();
}

#[test]
fn test_uploads_complete() {
    let Some(gpu) = headless() else { return };
    let transfer = TransferContext::new(gpu.device.clone(), Duration::from_secs(5)).unwrap();

    let indices: [u16; 6] = [0, 1, 2, 2, 3, 0];
    let buffer =
        Buffer::new_device_local(&transfer, BufferUsage::Index, bytemuck::cast_slice(&indices))
            .unwrap();
    assert_eq!(buffer.size(), 12);

    let pixels = vec![255u8; 4 * 4 * 4];
    let texture = Texture::from_rgba8(&transfer, "test", 4, 4, &pixels).unwrap();
    assert_eq!(texture.extent(), vk::Extent2D { width: 4, height: 4 });
    assert_ne!(texture.view(), vk::ImageView::null());
}

/// Signals `semaphore` from the queue, as a completed acquire would.
fn signal(device: &Device, semaphore: vk::Semaphore) {
    let semaphores = [semaphore];
    let info = vk::SubmitInfo::default().signal_semaphores(&semaphores);
    // SAFETY: the semaphore is unsignaled and has no other pending operation.
    unsafe { device.submit(&[info], vk::Fence::null()).unwrap() };
}

/// Waits on `semaphore` from the queue, as present would, and idles the device.
fn consume(device: &Device, semaphore: vk::Semaphore) {
    let semaphores = [semaphore];
    let stages = [vk::PipelineStageFlags::ALL_COMMANDS];
    let info = vk::SubmitInfo::default()
        .wait_semaphores(&semaphores)
        .wait_dst_stage_mask(&stages);
    // SAFETY: the semaphore has a pending signal from the frame submission.
    unsafe { device.submit(&[info], vk::Fence::null()).unwrap() };
    device.wait_idle().unwrap();
}

/// One wait/reset/record/submit cycle on `slot`, then waits for the GPU.
fn run_cycle(device: &Device, frames: &FrameResources, slot: usize) {
    let sync = frames.sync().slot(slot);
    sync.in_flight_fence().wait(TIMEOUT_NS).unwrap();
    signal(device, sync.image_available());
    sync.in_flight_fence().reset().unwrap();

    let cmd = frames.commands().buffer(slot);
    cmd.reset().unwrap();
    cmd.begin().unwrap();
    cmd.end().unwrap();

    frames.submit(slot).unwrap();
    sync.in_flight_fence().wait(TIMEOUT_NS).unwrap();
    assert!(sync.in_flight_fence().is_signaled().unwrap());
    consume(device, sync.render_finished());
}

#[test]
fn test_frame_resources_survive_destroy_and_rebuild() {
    let Some(gpu) = headless() else { return };

    let first = FrameResources::new(gpu.device.clone(), 2).unwrap();
    for slot in 0..first.len() {
        run_cycle(&gpu.device, &first, slot);
    }
    drop(first);

    let mut frames = FrameResources::new(gpu.device.clone(), 2).unwrap();
    run_cycle(&gpu.device, &frames, 0);

    frames.rebuild().unwrap();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames.commands().len(), 2);
    for slot in 0..frames.len() {
        assert!(frames.sync().slot(slot).in_flight_fence().is_signaled().unwrap());
    }

    // Same cycle as on freshly created resources, twice around the ring.
    for slot in [0, 1, 0, 1] {
        run_cycle(&gpu.device, &frames, slot);
    }
    frames.rebuild().unwrap();
}

#[test]
fn test_frame_resources_reject_out_of_range_slot_and_zero_slots() {
    let Some(gpu) = headless() else { return };
    let frames = FrameResources::new(gpu.device.clone(), 1).unwrap();
    assert!(frames.submit(1).is_err());
    assert!(FrameResources::new(gpu.device.clone(), 0).is_err());
}
