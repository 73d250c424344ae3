//! Platform layer for vkframe.
//!
//! This crate provides:
//! - Window creation via winit and the RAII Vulkan surface built from it
//! - Input state collected from window events
//! - [`FramebufferSource`], the renderer's view of the window during swapchain recreation

mod input;
mod source;
mod window;

pub use input::{InputState, KeyCode, MouseButton};
pub use source::FramebufferSource;
pub use window::{Surface, Window, required_extensions};

// Re-export winit types that users might need
pub use winit::event::WindowEvent;
pub use winit::event_loop::{ActiveEventLoop, EventLoop};
