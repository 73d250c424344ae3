//! Presentation Surface: the swapchain bound to a window surface.
//!
//! Negotiation (format, present mode, extent, image count) is split into pure
//! functions over [`SwapchainSupportDetails`] so the policy can be exercised
//! without a GPU. [`Swapchain`] owns the swapchain handle and one image view
//! per presentable image; the platform surface itself is owned by the caller
//! and must outlive the swapchain.
//!
//! # Example
//!
//! ```no_run
//! # fn demo(
//! #     instance: &vkframe_rhi::instance::Instance,
//! #     device: std::sync::Arc<vkframe_rhi::device::Device>,
//! #     surface: ash::vk::SurfaceKHR,
//! #     image_available: ash::vk::Semaphore,
//! # ) -> vkframe_rhi::RhiResult<()> {
//! use vkframe_rhi::swapchain::{Swapchain, SwapchainConfig};
//!
//! let mut swapchain = Swapchain::new(instance, device, surface, 800, 600, SwapchainConfig::default())?;
//! let (image_index, _suboptimal) = swapchain.acquire_next_image(image_available, u64::MAX)?;
//! // ... record and submit, then present ...
//! swapchain.recreate(1024, 768)?;
//! # let _ = image_index;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;

/// Requested swapchain parameters.
#[derive(Debug, Clone, Copy)]
pub struct SwapchainConfig {
    /// Number of presentable images to request.
    pub image_count: u32,
    /// Present mode to use when supported. FIFO is the fallback.
    pub preferred_present_mode: vk::PresentModeKHR,
}

impl Default for SwapchainConfig {
    fn default() -> Self {
        Self {
            image_count: 3,
            preferred_present_mode: vk::PresentModeKHR::MAILBOX,
        }
    }
}

/// What the surface supports for swapchain creation on one adapter.
#[derive(Debug, Clone)]
pub struct SwapchainSupportDetails {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    pub fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> RhiResult<Self> {
        // SAFETY: the surface and physical device come from the same instance as the loader.
        let (capabilities, formats, present_modes) = unsafe {
            (
                surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?,
                surface_loader.get_physical_device_surface_formats(physical_device, surface)?,
                surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?,
            )
        };

        debug!(
            "Swapchain support: {} formats, {} present modes, image count: {}-{}",
            formats.len(),
            present_modes.len(),
            capabilities.min_image_count,
            if capabilities.max_image_count == 0 {
                "unlimited".to_string()
            } else {
                capabilities.max_image_count.to_string()
            }
        );

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }
}

/// The outcome of negotiating a [`SwapchainConfig`] against [`SwapchainSupportDetails`].
#[derive(Debug, Clone, Copy)]
pub struct SwapchainPlan {
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub composite_alpha: vk::CompositeAlphaFlagsKHR,
}

/// Resolves every creation parameter, or fails before any handle is created.
///
/// # Errors
///
/// [`RhiError::InitializationFailed`] when no format or present mode is
/// available, the extent resolves to zero, or the requested image count
/// exceeds the surface maximum.
pub fn negotiate(
    support: &SwapchainSupportDetails,
    config: &SwapchainConfig,
    width: u32,
    height: u32,
) -> RhiResult<SwapchainPlan> {
    let surface_format = choose_surface_format(&support.formats)?;
    let present_mode = choose_present_mode(&support.present_modes, config.preferred_present_mode)?;
    let extent = choose_extent(&support.capabilities, width, height)?;
    let image_count = choose_image_count(&support.capabilities, config.image_count)?;

    Ok(SwapchainPlan {
        surface_format,
        present_mode,
        extent,
        image_count,
        pre_transform: support.capabilities.current_transform,
        composite_alpha: choose_composite_alpha(support.capabilities.supported_composite_alpha),
    })
}

/// Prefers B8G8R8A8_SRGB with SRGB_NONLINEAR, otherwise the first reported format.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> RhiResult<vk::SurfaceFormatKHR> {
    let preferred = formats.iter().find(|f| {
        f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });

    if let Some(&format) = preferred {
        return Ok(format);
    }

    let first = formats.first().copied().ok_or_else(|| {
        RhiError::InitializationFailed("surface reports no supported formats".to_string())
    })?;
    warn!("Using first available surface format: {:?}", first.format);
    Ok(first)
}

/// Uses `preferred` when supported, otherwise FIFO.
pub fn choose_present_mode(
    present_modes: &[vk::PresentModeKHR],
    preferred: vk::PresentModeKHR,
) -> RhiResult<vk::PresentModeKHR> {
    if present_modes.contains(&preferred) {
        return Ok(preferred);
    }
    if present_modes.contains(&vk::PresentModeKHR::FIFO) {
        debug!("{:?} unavailable, falling back to FIFO", preferred);
        return Ok(vk::PresentModeKHR::FIFO);
    }
    Err(RhiError::InitializationFailed(format!(
        "no usable present mode among {:?}",
        present_modes
    )))
}

/// The surface's fixed extent, or the requested size clamped to its limits when
/// the surface reports the `u32::MAX` sentinel. A zero result is an error.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    width: u32,
    height: u32,
) -> RhiResult<vk::Extent2D> {
    let extent = if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    };

    if extent.width == 0 || extent.height == 0 {
        return Err(RhiError::InitializationFailed(format!(
            "surface extent is {}x{}",
            extent.width, extent.height
        )));
    }

    Ok(extent)
}

/// Raises `requested` to the surface minimum. Exceeding a nonzero maximum is an error.
pub fn choose_image_count(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    requested: u32,
) -> RhiResult<u32> {
    if capabilities.max_image_count > 0 && requested > capabilities.max_image_count {
        return Err(RhiError::InitializationFailed(format!(
            "requested {} swapchain images but the surface allows at most {}",
            requested, capabilities.max_image_count
        )));
    }
    Ok(requested.max(capabilities.min_image_count))
}

fn choose_composite_alpha(supported: vk::CompositeAlphaFlagsKHR) -> vk::CompositeAlphaFlagsKHR {
    [
        vk::CompositeAlphaFlagsKHR::OPAQUE,
        vk::CompositeAlphaFlagsKHR::INHERIT,
        vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
    ]
    .into_iter()
    .find(|&mode| supported.contains(mode))
    .unwrap_or(vk::CompositeAlphaFlagsKHR::OPAQUE)
}

/// Vulkan swapchain wrapper.
///
/// Not thread-safe; the frame loop is its only user.
pub struct Swapchain {
    device: Arc<Device>,
    swapchain_loader: ash::khr::swapchain::Device,
    surface_loader: ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    config: SwapchainConfig,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::Format,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
}

impl Swapchain {
    /// Creates a swapchain for `surface` at the requested size.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InitializationFailed`] when negotiation fails and a
    /// Vulkan error when a handle cannot be created. Nothing is leaked on failure.
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
        config: SwapchainConfig,
    ) -> RhiResult<Self> {
        let swapchain_loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());
        let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());

        let mut swapchain = Self {
            device,
            swapchain_loader,
            surface_loader,
            surface,
            config,
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
            image_views: Vec::new(),
            format: vk::Format::UNDEFINED,
            extent: vk::Extent2D::default(),
            present_mode: vk::PresentModeKHR::FIFO,
        };
        swapchain.build(width, height)?;
        Ok(swapchain)
    }

    /// Rebuilds the swapchain at a new size, handing the old handle to the driver.
    ///
    /// The queue must be idle: no submitted work may still reference the old images.
    pub fn recreate(&mut self, width: u32, height: u32) -> RhiResult<()> {
        info!("Recreating swapchain: {}x{}", width, height);
        self.destroy_image_views();
        self.build(width, height)
    }

    fn build(&mut self, width: u32, height: u32) -> RhiResult<()> {
        let support = SwapchainSupportDetails::query(
            self.device.physical_device(),
            self.surface,
            &self.surface_loader,
        )?;
        let plan = negotiate(&support, &self.config, width, height)?;

        info!(
            "Creating swapchain: {}x{}, format {:?}, present mode {:?}, {} images",
            plan.extent.width,
            plan.extent.height,
            plan.surface_format.format,
            plan.present_mode,
            plan.image_count
        );

        let old_swapchain = self.swapchain;
        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(plan.image_count)
            .image_format(plan.surface_format.format)
            .image_color_space(plan.surface_format.color_space)
            .image_extent(plan.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_SRC)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(plan.pre_transform)
            .composite_alpha(plan.composite_alpha)
            .present_mode(plan.present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        // SAFETY: the surface is alive and the old swapchain, if any, is not in use.
        let swapchain = unsafe { self.swapchain_loader.create_swapchain(&create_info, None)? };

        if old_swapchain != vk::SwapchainKHR::null() {
            // SAFETY: the old swapchain is retired by the create call and the queue is idle.
            unsafe { self.swapchain_loader.destroy_swapchain(old_swapchain, None) };
        }
        self.swapchain = swapchain;
        self.images.clear();

        // SAFETY: the swapchain was just created from this loader.
        self.images = unsafe { self.swapchain_loader.get_swapchain_images(swapchain)? };
        self.image_views =
            create_image_views(&self.device, &self.images, plan.surface_format.format)?;
        self.format = plan.surface_format.format;
        self.extent = plan.extent;
        self.present_mode = plan.present_mode;

        info!("Swapchain created with {} images", self.images.len());
        Ok(())
    }

    /// Acquires the next presentable image, signaling `semaphore` once it is ready.
    ///
    /// Returns `(image_index, suboptimal)`. Out-of-date, timeout and device loss
    /// come back as the raw `vk::Result` for the caller to classify.
    pub fn acquire_next_image(
        &self,
        semaphore: vk::Semaphore,
        timeout_ns: u64,
    ) -> Result<(u32, bool), vk::Result> {
        // SAFETY: the swapchain and semaphore are valid and the semaphore is unsignaled.
        unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                timeout_ns,
                semaphore,
                vk::Fence::null(),
            )
        }
    }

    /// Queues `image_index` for presentation after `wait_semaphore` signals.
    ///
    /// Returns `true` when the swapchain is suboptimal.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<bool, vk::Result> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        // SAFETY: the image was acquired from this swapchain and the arrays outlive the call.
        unsafe { self.swapchain_loader.queue_present(queue, &present_info) }
    }

    #[inline]
    pub fn handle(&self) -> &vk::SwapchainKHR {
        &self.swapchain
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    #[inline]
    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    pub fn image(&self, index: usize) -> Option<vk::Image> {
        self.images.get(index).copied()
    }

    pub fn image_view(&self, index: usize) -> Option<vk::ImageView> {
        self.image_views.get(index).copied()
    }

    fn destroy_image_views(&mut self) {
        for image_view in self.image_views.drain(..) {
            // SAFETY: the view was created from this device and is no longer in use.
            unsafe { self.device.handle().destroy_image_view(image_view, None) };
        }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.destroy_image_views();

        if self.swapchain != vk::SwapchainKHR::null() {
            // SAFETY: the owner waited for the device to go idle before dropping.
            unsafe {
                self.swapchain_loader
                    .destroy_swapchain(self.swapchain, None);
            }

            info!(
                "Swapchain destroyed (was {}x{}, {} images)",
                self.extent.width,
                self.extent.height,
                self.images.len()
            );
        }
    }
}

/// One 2D color view per image. Views created before a failure are destroyed.
fn create_image_views(
    device: &Device,
    images: &[vk::Image],
    format: vk::Format,
) -> RhiResult<Vec<vk::ImageView>> {
    let mut image_views = Vec::with_capacity(images.len());

    for (i, &image) in images.iter().enumerate() {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping::default())
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .level_count(1)
                    .layer_count(1),
            );

        // SAFETY: the image belongs to a live swapchain of this device.
        match unsafe { device.handle().create_image_view(&create_info, None) } {
            Ok(view) => image_views.push(view),
            Err(e) => {
                for view in image_views {
                    // SAFETY: created above and never handed out.
                    unsafe { device.handle().destroy_image_view(view, None) };
                }
                return Err(RhiError::SwapchainError(format!(
                    "Failed to create image view {}: {:?}",
                    i, e
                )));
            }
        }
    }

    debug!("Created {} image views", image_views.len());
    Ok(image_views)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capabilities(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            supported_composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            ..Default::default()
        }
    }

    fn support(min: u32, max: u32) -> SwapchainSupportDetails {
        SwapchainSupportDetails {
            capabilities: capabilities(min, max),
            formats: vec![
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_UNORM,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_SRGB,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
            ],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        }
    }

    fn config(image_count: u32) -> SwapchainConfig {
        SwapchainConfig {
            image_count,
            ..Default::default()
        }
    }

    #[test]
    fn test_requested_count_within_bounds_is_used() {
        let plan = negotiate(&support(2, 3), &config(3), 800, 600).unwrap();
        assert_eq!(plan.image_count, 3);
    }

    #[test]
    fn test_requested_count_above_max_fails() {
        let err = negotiate(&support(2, 3), &config(4), 800, 600).unwrap_err();
        assert!(matches!(err, RhiError::InitializationFailed(_)));
    }

    #[test]
    fn test_requested_count_below_min_is_raised() {
        assert_eq!(choose_image_count(&capabilities(2, 8), 1).unwrap(), 2);
    }

    #[test]
    fn test_zero_max_means_unbounded() {
        assert_eq!(choose_image_count(&capabilities(2, 0), 6).unwrap(), 6);
    }

    #[test]
    fn test_repeated_negotiation_is_stable() {
        let support = support(2, 3);
        let first = negotiate(&support, &config(3), 1024, 768).unwrap();
        let second = negotiate(&support, &config(3), 1024, 768).unwrap();

        assert_eq!(first.surface_format.format, second.surface_format.format);
        assert_eq!(first.image_count, second.image_count);
        assert_eq!(first.extent.width, second.extent.width);
        assert_eq!(first.extent.height, second.extent.height);
    }

    #[test]
    fn test_choose_surface_format_prefers_srgb() {
        let format = choose_surface_format(&support(2, 3).formats).unwrap();
        assert_eq!(format.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(format.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn test_choose_surface_format_falls_back_to_first() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        assert_eq!(
            choose_surface_format(&formats).unwrap().format,
            vk::Format::R8G8B8A8_UNORM
        );
    }

    #[test]
    fn test_no_formats_fails() {
        assert!(matches!(
            choose_surface_format(&[]),
            Err(RhiError::InitializationFailed(_))
        ));
    }

    #[test]
    fn test_choose_present_mode() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(
            choose_present_mode(&modes, vk::PresentModeKHR::MAILBOX).unwrap(),
            vk::PresentModeKHR::MAILBOX
        );

        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(
            choose_present_mode(&modes, vk::PresentModeKHR::MAILBOX).unwrap(),
            vk::PresentModeKHR::FIFO
        );

        assert!(choose_present_mode(&[], vk::PresentModeKHR::MAILBOX).is_err());
    }

    #[test]
    fn test_choose_extent_uses_current() {
        let mut caps = capabilities(2, 3);
        caps.current_extent = vk::Extent2D {
            width: 1920,
            height: 1080,
        };

        let extent = choose_extent(&caps, 800, 600).unwrap();
        assert_eq!((extent.width, extent.height), (1920, 1080));
    }

    #[test]
    fn test_choose_extent_clamps_sentinel_request() {
        let mut caps = capabilities(2, 3);
        caps.min_image_extent = vk::Extent2D {
            width: 100,
            height: 100,
        };
        caps.max_image_extent = vk::Extent2D {
            width: 2000,
            height: 2000,
        };

        let extent = choose_extent(&caps, 3000, 50).unwrap();
        assert_eq!((extent.width, extent.height), (2000, 100));

        let extent = choose_extent(&caps, 800, 600).unwrap();
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn test_zero_extent_is_rejected() {
        let mut caps = capabilities(2, 3);
        caps.current_extent = vk::Extent2D {
            width: 0,
            height: 0,
        };
        assert!(matches!(
            choose_extent(&caps, 800, 600),
            Err(RhiError::InitializationFailed(_))
        ));
    }

    #[test]
    fn test_composite_alpha_prefers_opaque() {
        let supported =
            vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED | vk::CompositeAlphaFlagsKHR::OPAQUE;
        assert_eq!(
            choose_composite_alpha(supported),
            vk::CompositeAlphaFlagsKHR::OPAQUE
        );
        assert_eq!(
            choose_composite_alpha(vk::CompositeAlphaFlagsKHR::INHERIT),
            vk::CompositeAlphaFlagsKHR::INHERIT
        );
    }
}
