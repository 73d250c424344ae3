//! Minimized-window handling for swapchain recreation.

use tracing::debug;
use vkframe_platform::FramebufferSource;

/// Blocks until the window has a drawable (non-zero) framebuffer extent.
///
/// Returns `None` if the window was closed while waiting. A zero extent is
/// never returned, so a swapchain is never built for a minimized window.
pub fn wait_for_drawable_extent<S: FramebufferSource + ?Sized>(source: &mut S) -> Option<(u32, u32)> {
    let mut logged = false;
    loop {
        let (width, height) = source.framebuffer_size();
        if width > 0 && height > 0 {
            return Some((width, height));
        }
        if source.close_requested() {
            debug!("Window closed while minimized");
            return None;
        }
        if !logged {
            debug!("Framebuffer is {}x{}, waiting for the window to be restored", width, height);
            logged = true;
        }
        source.wait_events();
    }
}
