//! Main renderer orchestration.
//!
//! This module provides the [`Renderer`] struct that owns every Vulkan object
//! of the application and drives one frame per [`Renderer::draw_frame`] call.

use std::mem::ManuallyDrop;
use std::sync::Arc;

use ash::vk;
use glam::Mat4;
use tracing::{error, info};

use vkframe_core::{AppConfig, PresentModePreference};
use vkframe_platform::{FramebufferSource, InputState, Surface, Window};
use vkframe_resources::ImageData;
use vkframe_rhi::device::Device;
use vkframe_rhi::frame::FrameResources;
use vkframe_rhi::instance::Instance;
use vkframe_rhi::physical_device::select_adapter;
use vkframe_rhi::swapchain::{Swapchain, SwapchainConfig};
use vkframe_rhi::transfer::TransferContext;
use vkframe_rhi::{RhiError, RhiResult};
use vkframe_scene::{Camera, CameraController};

use crate::backend::VulkanFrameBackend;
use crate::frame_driver::{FrameDriver, FrameStatus};
use crate::quad_pass::TexturedQuadPass;
use crate::ubo::TransformUbo;

pub fn present_mode(preference: PresentModePreference) -> vk::PresentModeKHR {
    match preference {
        PresentModePreference::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentModePreference::Fifo => vk::PresentModeKHR::FIFO,
    }
}

/// Saturating conversion of a wait bound to Vulkan nanoseconds.
pub fn timeout_ns(timeout: std::time::Duration) -> u64 {
    u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX)
}

/// Owns the Vulkan objects and runs the frame loop body.
///
/// # Resource Destruction Order
///
/// Vulkan objects are destroyed in reverse creation order:
/// 1. Wait for all GPU work to complete
/// 2. Destroy the quad pass (pipeline, uniforms, mesh, texture)
/// 3. Destroy the frame resources (command recording pool, then synchronization set)
/// 4. Destroy the swapchain
/// 5. Destroy the surface
/// 6. Destroy the transfer context
/// 7. Destroy the device
/// 8. Destroy the instance
///
/// ManuallyDrop is used to ensure correct destruction order.
pub struct Renderer {
    instance: ManuallyDrop<Instance>,
    device: ManuallyDrop<Arc<Device>>,
    transfer: ManuallyDrop<TransferContext>,
    surface: ManuallyDrop<Surface>,
    swapchain: ManuallyDrop<Swapchain>,
    frames: ManuallyDrop<FrameResources>,
    quad_pass: ManuallyDrop<TexturedQuadPass>,

    driver: FrameDriver,
    /// Bound for fence and acquire waits, in nanoseconds.
    timeout_ns: u64,

    camera: Camera,
    controller: CameraController,
}

impl Renderer {
    /// Creates every Vulkan object for `window` and uploads `texture`.
    ///
    /// # Errors
    ///
    /// Returns an error if any Vulkan object cannot be created. Objects
    /// already created are released before returning.
    pub fn new(window: &Window, config: &AppConfig, texture: &ImageData) -> RhiResult<Self> {
        let (width, height) = window.framebuffer_size();
        if width == 0 || height == 0 {
            return Err(RhiError::InitializationFailed(
                "window has no drawable area".to_string(),
            ));
        }

        let render = &config.render;
        info!(
            "Initializing Vulkan renderer ({}x{}, {} frames in flight)",
            width, height, render.frames_in_flight
        );

        let surface_extensions = window
            .required_extensions()
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;
        let instance = Instance::new(c"vkframe", render.validation, &surface_extensions)?;

        let surface = window
            .create_surface(instance.entry(), instance.handle())
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;

        let adapter = select_adapter(instance.handle(), surface.handle(), surface.loader())?;
        let device = Device::new(&instance, &adapter)?;
        let transfer = TransferContext::new(device.clone(), render.fence_timeout())?;

        let swapchain = Swapchain::new(
            &instance,
            device.clone(),
            surface.handle(),
            width,
            height,
            SwapchainConfig {
                image_count: render.buffer_count,
                preferred_present_mode: present_mode(render.present_mode),
            },
        )?;

        let frames = FrameResources::new(device.clone(), render.frames_in_flight)?;
        let driver = FrameDriver::new(frames.len())?;

        let quad_pass = TexturedQuadPass::new(
            &transfer,
            texture,
            swapchain.format(),
            frames.len(),
            render.clear_color,
        )?;

        info!(
            "Renderer initialized: {} swapchain images, {} frames in flight",
            swapchain.image_count(),
            frames.len()
        );

        let mut renderer = Self {
            instance: ManuallyDrop::new(instance),
            device: ManuallyDrop::new(device),
            transfer: ManuallyDrop::new(transfer),
            surface: ManuallyDrop::new(surface),
            swapchain: ManuallyDrop::new(swapchain),
            frames: ManuallyDrop::new(frames),
            quad_pass: ManuallyDrop::new(quad_pass),
            driver,
            timeout_ns: timeout_ns(render.fence_timeout()),
            camera: Camera::default(),
            controller: CameraController::default(),
        };
        renderer.refresh_transform();
        Ok(renderer)
    }

    /// Runs one wait/acquire/record/submit/present cycle.
    ///
    /// `window` is consulted only when the swapchain has to be recreated.
    ///
    /// # Errors
    ///
    /// Only fatal errors are returned (device loss, an expired wait, a failed
    /// swapchain recreation). The frame loop should stop on any of them.
    pub fn draw_frame<W: FramebufferSource + ?Sized>(&mut self, window: &mut W) -> RhiResult<FrameStatus> {
        let mut backend = VulkanFrameBackend {
            device: &self.device,
            swapchain: &mut self.swapchain,
            frames: &mut self.frames,
            recorder: &mut *self.quad_pass,
            window,
            timeout_ns: self.timeout_ns,
        };

        let status = self.driver.draw_frame(&mut backend);
        if let Err(e) = &status {
            error!("Frame loop stopped: {}", e);
        }
        status
    }

    /// Raises the swapchain invalidation flag after a window resize.
    pub fn notify_resized(&mut self) {
        self.driver.notify_resized();
    }

    /// Applies one frame of input to the camera and refreshes the quad transform.
    pub fn update(&mut self, input: &InputState, delta_time: f32) {
        self.controller.update(&mut self.camera, input, delta_time);
        self.refresh_transform();
    }

    /// Destroys and recreates the frame synchronization set and the command
    /// recording pool, then restarts at slot 0.
    pub fn rebuild_frame_resources(&mut self) -> RhiResult<()> {
        self.frames.rebuild()?;
        self.driver.reset();
        Ok(())
    }

    fn refresh_transform(&mut self) {
        let extent = self.swapchain.extent();
        let aspect = if extent.height == 0 {
            1.0
        } else {
            extent.width as f32 / extent.height as f32
        };
        self.quad_pass
            .set_transform(TransformUbo::from_camera(Mat4::IDENTITY, &self.camera, aspect));
    }

    /// Index of the frame slot the next [`Renderer::draw_frame`] will use.
    #[inline]
    pub fn current_frame(&self) -> usize {
        self.driver.current_frame()
    }

    #[inline]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Returns the swapchain extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    /// Returns the swapchain format.
    pub fn format(&self) -> vk::Format {
        self.swapchain.format()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        // Wait for all GPU work to complete before destroying resources
        if let Err(e) = self.device.wait_idle() {
            error!(
                "Failed to wait for device idle during renderer drop: {:?}",
                e
            );
        }

        // SAFETY: each field is dropped exactly once, after everything that
        // depends on it, and never used again.
        unsafe {
            ManuallyDrop::drop(&mut self.quad_pass);
            ManuallyDrop::drop(&mut self.frames);
            ManuallyDrop::drop(&mut self.swapchain);
            ManuallyDrop::drop(&mut self.surface);
            ManuallyDrop::drop(&mut self.transfer);
            ManuallyDrop::drop(&mut self.device);
            ManuallyDrop::drop(&mut self.instance);
        }

        info!("Renderer destroyed");
    }
}
