//! Uniform buffer object definitions for shaders.
//!
//! These structures must match the GLSL uniform block layouts exactly.
//! All structures use `#[repr(C)]` for predictable memory layout and implement
//! `Pod` and `Zeroable` for safe byte casting.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use vkframe_scene::Camera;

/// Transform uniform buffer data.
///
/// This structure matches the GLSL `Transform` block (set 0, binding 0).
///
/// # Memory Layout
///
/// - Offset 0: model matrix (64 bytes)
/// - Offset 64: view matrix (64 bytes)
/// - Offset 128: projection matrix (64 bytes)
/// - Total size: 192 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct TransformUbo {
    /// Model matrix (object to world space).
    pub model: Mat4,
    /// View matrix (world to view space).
    pub view: Mat4,
    /// Projection matrix (view to clip space), Y already flipped for Vulkan.
    pub proj: Mat4,
}

impl Default for TransformUbo {
    fn default() -> Self {
        Self {
            model: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
        }
    }
}

impl TransformUbo {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn new(model: Mat4, view: Mat4, proj: Mat4) -> Self {
        Self { model, view, proj }
    }

    /// Transform of an object at `model` seen through `camera`.
    pub fn from_camera(model: Mat4, camera: &Camera, aspect: f32) -> Self {
        Self {
            model,
            view: camera.view_matrix(),
            proj: camera.projection_matrix(aspect),
        }
    }
}
