//! Adapter (physical GPU) selection.
//!
//! An adapter qualifies when it supports Vulkan 1.3, the swapchain extension,
//! and has one queue family that can do graphics, transfer and presentation
//! to the window surface. Among qualifying adapters, discrete GPUs win.

use std::ffi::CStr;

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::{RhiError, RhiResult};

/// The adapter chosen for rendering and the single queue family used for all work.
#[derive(Clone)]
pub struct AdapterInfo {
    pub physical_device: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Family supporting graphics, transfer and presentation.
    pub queue_family_index: u32,
}

impl AdapterInfo {
    pub fn device_name(&self) -> &str {
        self.properties
            .device_name_as_c_str()
            .ok()
            .and_then(|name| name.to_str().ok())
            .unwrap_or("Unknown Device")
    }

    pub fn device_type_name(&self) -> &'static str {
        match self.properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
            vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
            vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
            vk::PhysicalDeviceType::CPU => "CPU",
            _ => "Other",
        }
    }

    pub fn api_version(&self) -> (u32, u32, u32) {
        let version = self.properties.api_version;
        (
            vk::api_version_major(version),
            vk::api_version_minor(version),
            vk::api_version_patch(version),
        )
    }

    /// Total device-local memory in bytes.
    pub fn device_local_memory(&self) -> u64 {
        self.memory_properties
            .memory_heaps
            .iter()
            .take(self.memory_properties.memory_heap_count as usize)
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size)
            .sum()
    }
}

impl std::fmt::Debug for AdapterInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (major, minor, patch) = self.api_version();
        f.debug_struct("AdapterInfo")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field("api_version", &format!("{}.{}.{}", major, minor, patch))
            .field("queue_family_index", &self.queue_family_index)
            .finish()
    }
}

/// Selects the most suitable adapter that can present to `surface`.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableGpu`] if no adapter qualifies.
pub fn select_adapter(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> RhiResult<AdapterInfo> {
    // SAFETY: enumeration on a live instance.
    let devices = unsafe { instance.enumerate_physical_devices()? };

    if devices.is_empty() {
        warn!("No Vulkan-capable GPUs found");
        return Err(RhiError::NoSuitableGpu);
    }

    info!("Found {} GPU(s)", devices.len());

    let selected = devices
        .into_iter()
        .filter_map(|device| check_adapter(instance, device, surface, surface_loader))
        .map(|info| {
            let score = rate_device_type(info.properties.device_type);
            debug!(
                "GPU '{}' ({}) - Score: {}",
                info.device_name(),
                info.device_type_name(),
                score
            );
            (info, score)
        })
        .max_by_key(|(_, score)| *score)
        .map(|(info, _)| info)
        .ok_or_else(|| {
            warn!("No suitable GPU found with required capabilities");
            RhiError::NoSuitableGpu
        })?;

    let (major, minor, patch) = selected.api_version();
    info!(
        "Selected GPU: '{}' ({}) - Vulkan {}.{}.{}, {} MiB device-local, queue family {}",
        selected.device_name(),
        selected.device_type_name(),
        major,
        minor,
        patch,
        selected.device_local_memory() / (1024 * 1024),
        selected.queue_family_index
    );

    Ok(selected)
}

fn check_adapter(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Option<AdapterInfo> {
    // SAFETY: device was enumerated from this instance.
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };
    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };

    let name = properties
        .device_name_as_c_str()
        .map(CStr::to_string_lossy)
        .unwrap_or_default();

    if !supports_api_1_3(properties.api_version) {
        debug!(
            "GPU '{}' skipped: Vulkan 1.3 not supported (version: {}.{})",
            name,
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version)
        );
        return None;
    }

    if !supports_swapchain(instance, device) {
        debug!("GPU '{}' skipped: VK_KHR_swapchain not supported", name);
        return None;
    }

    let queue_family_index = pick_queue_family(&families, |index| {
        // SAFETY: index is a valid family of device and surface belongs to this instance.
        unsafe {
            surface_loader
                .get_physical_device_surface_support(device, index, surface)
                .unwrap_or(false)
        }
    });

    let Some(queue_family_index) = queue_family_index else {
        debug!(
            "GPU '{}' skipped: no queue family with graphics, transfer and present",
            name
        );
        return None;
    };

    Some(AdapterInfo {
        physical_device: device,
        properties,
        memory_properties,
        queue_family_index,
    })
}

fn supports_swapchain(instance: &ash::Instance, device: vk::PhysicalDevice) -> bool {
    // SAFETY: device was enumerated from this instance.
    let Ok(extensions) = (unsafe { instance.enumerate_device_extension_properties(device) }) else {
        return false;
    };
    extensions.iter().any(|ext| {
        ext.extension_name_as_c_str()
            .is_ok_and(|name| name == ash::khr::swapchain::NAME)
    })
}

fn supports_api_1_3(api_version: u32) -> bool {
    let major = vk::api_version_major(api_version);
    let minor = vk::api_version_minor(api_version);
    major > 1 || (major == 1 && minor >= 3)
}

/// First queue family that supports graphics, transfer and presentation.
///
/// Graphics implies transfer capability, but some drivers only report it on
/// the flags they set, so both are checked.
pub fn pick_queue_family(
    families: &[vk::QueueFamilyProperties],
    supports_present: impl Fn(u32) -> bool,
) -> Option<u32> {
    families
        .iter()
        .enumerate()
        .filter(|(_, family)| family.queue_count > 0)
        .filter(|(_, family)| {
            family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
                && (family.queue_flags.contains(vk::QueueFlags::TRANSFER)
                    || family.queue_flags.contains(vk::QueueFlags::COMPUTE))
        })
        .map(|(index, _)| index as u32)
        .find(|&index| supports_present(index))
}

fn rate_device_type(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 10,
        vk::PhysicalDeviceType::CPU => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags, count: u32) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: count,
            ..Default::default()
        }
    }

    #[test]
    fn test_picks_first_family_with_graphics_and_present() {
        let families = [
            family(vk::QueueFlags::TRANSFER, 2),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER, 16),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER, 1),
        ];
        assert_eq!(pick_queue_family(&families, |_| true), Some(1));
    }

    #[test]
    fn test_skips_family_that_cannot_present() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER, 1),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER, 1),
        ];
        assert_eq!(pick_queue_family(&families, |index| index == 1), Some(1));
    }

    #[test]
    fn test_no_family_when_graphics_and_present_are_split() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER, 1),
            family(vk::QueueFlags::TRANSFER, 1),
        ];
        assert_eq!(pick_queue_family(&families, |index| index == 1), None);
    }

    #[test]
    fn test_empty_family_is_ignored() {
        let families = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER, 0)];
        assert_eq!(pick_queue_family(&families, |_| true), None);
    }

    #[test]
    fn test_api_version_gate() {
        assert!(supports_api_1_3(vk::API_VERSION_1_3));
        assert!(supports_api_1_3(vk::make_api_version(0, 1, 4, 0)));
        assert!(!supports_api_1_3(vk::API_VERSION_1_2));
    }

    #[test]
    fn test_device_local_memory_counts_only_reported_local_heaps() {
        let mut memory_properties = vk::PhysicalDeviceMemoryProperties {
            memory_heap_count: 2,
            ..Default::default()
        };
        memory_properties.memory_heaps[0] = vk::MemoryHeap {
            size: 256 << 20,
            flags: vk::MemoryHeapFlags::DEVICE_LOCAL,
        };
        memory_properties.memory_heaps[1] = vk::MemoryHeap {
            size: 1 << 30,
            flags: vk::MemoryHeapFlags::empty(),
        };
        // Beyond memory_heap_count, must be ignored.
        memory_properties.memory_heaps[2] = vk::MemoryHeap {
            size: 4 << 30,
            flags: vk::MemoryHeapFlags::DEVICE_LOCAL,
        };

        let adapter = AdapterInfo {
            physical_device: vk::PhysicalDevice::null(),
            properties: vk::PhysicalDeviceProperties::default(),
            memory_properties,
            queue_family_index: 0,
        };
        assert_eq!(adapter.device_local_memory(), 256 << 20);
    }

    #[test]
    fn test_discrete_gpu_preferred() {
        assert!(
            rate_device_type(vk::PhysicalDeviceType::DISCRETE_GPU)
                > rate_device_type(vk::PhysicalDeviceType::INTEGRATED_GPU)
        );
        assert!(
            rate_device_type(vk::PhysicalDeviceType::INTEGRATED_GPU)
                > rate_device_type(vk::PhysicalDeviceType::CPU)
        );
    }
}
