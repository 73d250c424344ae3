//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! This crate provides a safe abstraction over Vulkan using the `ash` crate.
//! It handles:
//! - Instance, adapter and device creation
//! - Swapchain negotiation and recreation
//! - Command buffer recording and one-shot uploads
//! - Buffer, image, sampler and texture management
//! - Descriptor sets and pipeline creation
//! - Per-slot synchronization primitives and frame resources

mod error;

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod frame;
pub mod image;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod sampler;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod texture;
pub mod transfer;
pub mod vertex;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;
