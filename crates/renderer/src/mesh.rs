//! Indexed meshes in device-local memory.

use ash::vk;
use glam::{Vec2, Vec3};
use tracing::debug;
use vkframe_rhi::buffer::{Buffer, BufferUsage};
use vkframe_rhi::command::CommandBuffer;
use vkframe_rhi::transfer::TransferContext;
use vkframe_rhi::vertex::Vertex;
use vkframe_rhi::{RhiError, RhiResult};

/// A unit quad centered on the origin, one color per corner.
pub const QUAD_VERTICES: [Vertex; 4] = [
    Vertex::new(Vec2::new(-0.5, -0.5), Vec3::new(1.0, 0.0, 0.0), Vec2::new(1.0, 0.0)),
    Vertex::new(Vec2::new(0.5, -0.5), Vec3::new(0.0, 1.0, 0.0), Vec2::new(0.0, 0.0)),
    Vertex::new(Vec2::new(0.5, 0.5), Vec3::new(0.0, 0.0, 1.0), Vec2::new(0.0, 1.0)),
    Vertex::new(Vec2::new(-0.5, 0.5), Vec3::new(1.0, 1.0, 1.0), Vec2::new(1.0, 1.0)),
];

/// Two counter-clockwise triangles covering [`QUAD_VERTICES`].
pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];

/// Vertex and index buffers for one indexed draw.
pub struct Mesh {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    index_count: u32,
}

impl Mesh {
    /// Uploads `vertices` and `indices` through staging buffers. Blocks until done.
    pub fn upload(transfer: &TransferContext, vertices: &[Vertex], indices: &[u16]) -> RhiResult<Self> {
        if vertices.is_empty() || indices.is_empty() {
            return Err(RhiError::InvalidHandle("Mesh needs vertices and indices".to_string()));
        }
        if let Some(bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(RhiError::InvalidHandle(format!(
                "Index {} out of range for {} vertices",
                bad,
                vertices.len()
            )));
        }

        let vertex_buffer =
            Buffer::new_device_local(transfer, BufferUsage::Vertex, bytemuck::cast_slice(vertices))?;
        let index_buffer =
            Buffer::new_device_local(transfer, BufferUsage::Index, bytemuck::cast_slice(indices))?;

        debug!(
            "Uploaded mesh: {} vertices, {} indices",
            vertices.len(),
            indices.len()
        );

        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
        })
    }

    pub fn quad(transfer: &TransferContext) -> RhiResult<Self> {
        Self::upload(transfer, &QUAD_VERTICES, &QUAD_INDICES)
    }

    #[inline]
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Binds both buffers and records one indexed draw.
    pub fn draw(&self, cmd: &CommandBuffer) {
        cmd.bind_vertex_buffers(0, &[self.vertex_buffer.handle()], &[0]);
        cmd.bind_index_buffer(self.index_buffer.handle(), 0, vk::IndexType::UINT16);
        cmd.draw_indexed(self.index_count, 1, 0, 0, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_area(a: Vec2, b: Vec2, c: Vec2) -> f32 {
        (b - a).perp_dot(c - a)
    }

    #[test]
    fn test_quad_indices_in_range() {
        assert!(QUAD_INDICES.iter().all(|&i| (i as usize) < QUAD_VERTICES.len()));
    }

    #[test]
    fn test_quad_triangles_share_winding() {
        let p = |i: u16| QUAD_VERTICES[i as usize].position;
        let first = signed_area(p(QUAD_INDICES[0]), p(QUAD_INDICES[1]), p(QUAD_INDICES[2]));
        let second = signed_area(p(QUAD_INDICES[3]), p(QUAD_INDICES[4]), p(QUAD_INDICES[5]));

        assert!(first > 0.0);
        assert!(second > 0.0);
    }

    #[test]
    fn test_quad_covers_unit_square() {
        let area: f32 = QUAD_INDICES
            .chunks(3)
            .map(|t| {
                let p = |i: u16| QUAD_VERTICES[i as usize].position;
                signed_area(p(t[0]), p(t[1]), p(t[2])) / 2.0
            })
            .sum();
        assert!((area - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_quad_byte_sizes() {
        assert_eq!(bytemuck::cast_slice::<Vertex, u8>(&QUAD_VERTICES).len(), 4 * 28);
        assert_eq!(bytemuck::cast_slice::<u16, u8>(&QUAD_INDICES).len(), 12);
    }
}
