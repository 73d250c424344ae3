//! Device Context: the logical device, its single queue and the memory allocator.
//!
//! # Example
//!
//! ```no_run
//! use vkframe_rhi::device::Device;
//! use vkframe_rhi::instance::Instance;
//! use vkframe_rhi::physical_device::select_adapter;
//! use ash::vk;
//!
//! let instance = Instance::new(c"demo", false, &[]).expect("Failed to create instance");
//! let surface: vk::SurfaceKHR = vk::SurfaceKHR::null(); // placeholder
//! let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());
//!
//! let adapter = select_adapter(instance.handle(), surface, &surface_loader)
//!     .expect("No suitable GPU found");
//! let device = Device::new(&instance, &adapter).expect("Failed to create logical device");
//! let _queue = device.queue();
//! ```

use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex, MutexGuard};

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use tracing::{debug, error, info};

use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;
use crate::physical_device::AdapterInfo;

/// Required device extensions.
const DEVICE_EXTENSIONS: &[&std::ffi::CStr] = &[ash::khr::swapchain::NAME];

/// Vulkan logical device wrapper.
///
/// Handles (device, queue, queue family index) are fixed after creation.
/// Shared through `Arc`; every resource created from it holds a clone, so it
/// is destroyed only after its last dependent.
pub struct Device {
    device: ash::Device,
    adapter: AdapterInfo,
    /// Dropped by hand before `destroy_device`.
    allocator: ManuallyDrop<Mutex<Allocator>>,
    queue: vk::Queue,
    sampler_anisotropy: bool,
}

impl Device {
    /// Creates the logical device with one queue from the adapter's chosen family,
    /// the swapchain extension, the Vulkan 1.3 dynamic rendering and
    /// synchronization2 features, and sampler anisotropy when supported.
    ///
    /// # Errors
    ///
    /// Returns an error if device creation or allocator initialization fails.
    pub fn new(instance: &Instance, adapter: &AdapterInfo) -> RhiResult<Arc<Self>> {
        let queue_priorities = [1.0f32];
        let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(adapter.queue_family_index)
            .queue_priorities(&queue_priorities)];

        let mut features_1_3 = vk::PhysicalDeviceVulkan13Features::default()
            .dynamic_rendering(true)
            .synchronization2(true);

        // SAFETY: the physical device belongs to this instance.
        let supported = unsafe {
            instance
                .handle()
                .get_physical_device_features(adapter.physical_device)
        };
        let sampler_anisotropy = supported.sampler_anisotropy == vk::TRUE;
        let features = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(sampler_anisotropy);

        let extension_names: Vec<*const std::ffi::c_char> =
            DEVICE_EXTENSIONS.iter().map(|ext| ext.as_ptr()).collect();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features)
            .push_next(&mut features_1_3);

        // SAFETY: the physical device belongs to this instance and create_info
        // borrows locals that outlive the call.
        let device = unsafe {
            instance
                .handle()
                .create_device(adapter.physical_device, &create_info, None)?
        };

        info!(
            "Logical device created with {} extension(s)",
            DEVICE_EXTENSIONS.len()
        );

        // SAFETY: exactly one queue was requested from this family.
        let queue = unsafe { device.get_device_queue(adapter.queue_family_index, 0) };
        debug!("Queue retrieved from family {}", adapter.queue_family_index);

        let allocator = match Allocator::new(&AllocatorCreateDesc {
            instance: instance.handle().clone(),
            device: device.clone(),
            physical_device: adapter.physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        }) {
            Ok(allocator) => allocator,
            Err(e) => {
                // SAFETY: nothing has been created from the device yet.
                unsafe { device.destroy_device(None) };
                return Err(e.into());
            }
        };

        info!("GPU memory allocator initialized");

        Ok(Arc::new(Self {
            device,
            adapter: adapter.clone(),
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            queue,
            sampler_anisotropy,
        }))
    }

    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.adapter.physical_device
    }

    #[inline]
    pub fn adapter(&self) -> &AdapterInfo {
        &self.adapter
    }

    /// The graphics/transfer/present queue.
    #[inline]
    pub fn queue(&self) -> vk::Queue {
        self.queue
    }

    #[inline]
    pub fn queue_family_index(&self) -> u32 {
        self.adapter.queue_family_index
    }

    /// Highest anisotropy samplers may use, or `None` if the feature is off.
    pub fn max_sampler_anisotropy(&self) -> Option<f32> {
        self.sampler_anisotropy
            .then_some(self.adapter.properties.limits.max_sampler_anisotropy)
    }

    /// Locks the memory allocator.
    pub fn allocator(&self) -> RhiResult<MutexGuard<'_, Allocator>> {
        self.allocator
            .lock()
            .map_err(|_| RhiError::InvalidHandle("allocator mutex poisoned".to_string()))
    }

    /// Blocks until all submitted work has completed.
    pub fn wait_idle(&self) -> RhiResult<()> {
        // SAFETY: the device is alive for the lifetime of self.
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }

    /// Submits work to the queue, signaling `fence` on completion.
    ///
    /// # Safety
    ///
    /// Command buffers must be fully recorded, semaphores referenced by the
    /// submits must be in the correct state, and `fence` must be unsignaled
    /// and not pending.
    pub unsafe fn submit(&self, submits: &[vk::SubmitInfo<'_>], fence: vk::Fence) -> RhiResult<()> {
        unsafe { self.device.queue_submit(self.queue, submits, fence)? };
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        // SAFETY: this is the last reference to the device. The allocator must
        // release its memory blocks before the device is destroyed.
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                error!("Failed to wait for device idle during drop: {:?}", e);
            }
            ManuallyDrop::drop(&mut self.allocator);
            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

// SAFETY: ash::Device and the handles are plain dispatchable values, and the
// allocator is only reached through its Mutex.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_extensions_defined() {
        assert_eq!(DEVICE_EXTENSIONS, &[ash::khr::swapchain::NAME]);
    }

    #[test]
    fn test_device_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Device>();
    }
}
