//! Frame loop and rendering.
//!
//! This crate orchestrates the rendering process:
//! - The frame driver protocol and its Vulkan backend
//! - Swapchain recreation, including the minimized-window wait
//! - The textured quad render pass
//! - The [`Renderer`] that owns every Vulkan object

pub mod backend;
pub mod frame_driver;
pub mod mesh;
pub mod quad_pass;
pub mod recorder;
pub mod recreate;
pub mod renderer;
pub mod shaders;
pub mod ubo;
pub mod uniforms;

pub use frame_driver::{FrameBackend, FrameDriver, FrameStatus};
pub use recorder::{FrameRecorder, FrameTarget};
pub use renderer::Renderer;
pub use ubo::TransformUbo;
