//! The view of the window that the renderer needs while the event loop is owned elsewhere.

/// Supplies the framebuffer extent and close state, and can block for new window events.
///
/// Swapchain recreation uses this to wait out a minimized window without
/// losing track of close requests.
pub trait FramebufferSource {
    /// Current framebuffer size in physical pixels.
    fn framebuffer_size(&self) -> (u32, u32);

    /// Whether the user asked to close the window.
    fn close_requested(&self) -> bool;

    /// Block until at least one window event has been processed.
    fn wait_events(&mut self);
}
