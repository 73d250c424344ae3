//! Winit window plus the Vulkan surface created from it.

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle};
use std::ffi::CStr;
use std::sync::Arc;
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window as WinitWindow, WindowAttributes};

use vkframe_core::{Error, Result};

/// RAII wrapper for a Vulkan surface.
///
/// The surface is destroyed when this struct is dropped, so it must be dropped
/// after every swapchain built on it and before the instance.
pub struct Surface {
    handle: vk::SurfaceKHR,
    loader: ash::khr::surface::Instance,
}

impl Surface {
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// Surface extension loader, used to query capabilities, formats and present modes.
    #[inline]
    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.loader
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        // SAFETY: the handle was created by ash_window::create_surface from the same
        // instance as the loader, and this is the only place it is destroyed.
        unsafe {
            self.loader.destroy_surface(self.handle, None);
        }
        tracing::debug!("Vulkan surface destroyed");
    }
}

/// A window wrapper exposing the framebuffer size and the raw handles needed for surface creation.
pub struct Window {
    window: Arc<WinitWindow>,
}

impl Window {
    pub fn new(event_loop: &ActiveEventLoop, width: u32, height: u32, title: &str) -> Result<Self> {
        let attrs = WindowAttributes::default()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(width, height))
            .with_resizable(true);

        let window = event_loop
            .create_window(attrs)
            .map_err(|e| Error::Window(e.to_string()))?;

        tracing::info!("Window created: {}x{}", width, height);

        Ok(Self {
            window: Arc::new(window),
        })
    }

    /// Current framebuffer size in physical pixels. Either dimension is zero while minimized.
    pub fn framebuffer_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    fn raw_display_handle(&self) -> Result<RawDisplayHandle> {
        self.window
            .display_handle()
            .map(|handle| handle.as_raw())
            .map_err(|e| Error::Window(format!("Failed to get display handle: {}", e)))
    }

    /// Instance extensions required to create a surface for this window.
    pub fn required_extensions(&self) -> Result<Vec<&'static CStr>> {
        required_extensions(self.raw_display_handle()?)
    }

    /// Create a Vulkan surface for this window. `instance` must outlive the returned [`Surface`].
    pub fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> Result<Surface> {
        let display_handle = self.raw_display_handle()?;
        let window_handle = self
            .window
            .window_handle()
            .map_err(|e| Error::Window(format!("Failed to get window handle: {}", e)))?;

        // SAFETY: entry and instance are valid, and both raw handles come from a live
        // winit window. The surface is destroyed in Surface::drop.
        let handle = unsafe {
            ash_window::create_surface(entry, instance, display_handle, window_handle.as_raw(), None)
                .map_err(|e| Error::Surface(format!("Failed to create Vulkan surface: {}", e)))?
        };

        let loader = ash::khr::surface::Instance::new(entry, instance);

        tracing::info!("Vulkan surface created");

        Ok(Surface { handle, loader })
    }
}

/// Instance extensions needed to create a surface for `display_handle`.
pub fn required_extensions(display_handle: RawDisplayHandle) -> Result<Vec<&'static CStr>> {
    let extensions = ash_window::enumerate_required_extensions(display_handle)
        .map_err(|e| Error::Surface(format!("Failed to enumerate required extensions: {}", e)))?;

    let names: Vec<&'static CStr> = extensions
        .iter()
        // SAFETY: ash_window returns pointers to static, null-terminated extension names.
        .map(|&ext| unsafe { CStr::from_ptr(ext) })
        .collect();

    tracing::debug!("Required Vulkan surface extensions: {:?}", names);

    Ok(names)
}
