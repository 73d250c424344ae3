//! Sampled 2D textures uploaded from RGBA8 pixels.

use ash::vk;
use tracing::info;

use crate::buffer::{Buffer, BufferUsage};
use crate::error::{RhiError, RhiResult};
use crate::image::{Image, ImageDesc, ImageTransition};
use crate::sampler::{Sampler, SamplerDesc};
use crate::transfer::TransferContext;

/// Format of every texture created here.
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

/// Checks that `pixels` holds exactly `width * height` RGBA8 texels.
pub fn validate_rgba8(width: u32, height: u32, pixels: &[u8]) -> RhiResult<()> {
    let expected = width as u64 * height as u64 * 4;
    if width == 0 || height == 0 || pixels.len() as u64 != expected {
        return Err(RhiError::InvalidHandle(format!(
            "Texture data for {}x{} must be {} bytes, got {}",
            width,
            height,
            expected,
            pixels.len()
        )));
    }
    Ok(())
}

/// A shader-readable image and the sampler used to read it.
pub struct Texture {
    image: Image,
    sampler: Sampler,
}

impl Texture {
    /// Uploads `pixels` through a staging buffer and leaves the image in
    /// `SHADER_READ_ONLY_OPTIMAL`. Blocks until the copy completes.
    pub fn from_rgba8(
        transfer: &TransferContext,
        name: &str,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> RhiResult<Self> {
        validate_rgba8(width, height, pixels)?;

        let device = transfer.device().clone();
        let staging = Buffer::new_with_data(device.clone(), BufferUsage::Staging, pixels)?;

        let extent = vk::Extent2D { width, height };
        let image = Image::new(
            device.clone(),
            &ImageDesc {
                name,
                format: TEXTURE_FORMAT,
                extent,
                usage: vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST,
            },
        )?;

        let to_transfer = ImageTransition::between(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )?;
        let to_shader_read = ImageTransition::between(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )?;

        let region = vk::BufferImageCopy::default()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_offset(vk::Offset3D::default())
            .image_extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            });

        transfer.immediate_submit(|cmd| {
            to_transfer.record(cmd, image.handle());
            cmd.copy_buffer_to_image(
                staging.handle(),
                image.handle(),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
            to_shader_read.record(cmd, image.handle());
            Ok(())
        })?;

        let sampler = Sampler::new(device, &SamplerDesc::default())?;

        info!("Texture '{}' uploaded: {}x{}", name, width, height);

        Ok(Self { image, sampler })
    }

    #[inline]
    pub fn image(&self) -> &Image {
        &self.image
    }

    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.image.view()
    }

    #[inline]
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler.handle()
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.image.extent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rgba8_accepts_exact_size() {
        assert!(validate_rgba8(2, 3, &[0u8; 24]).is_ok());
    }

    #[test]
    fn test_validate_rgba8_rejects_short_data() {
        assert!(validate_rgba8(2, 2, &[0u8; 15]).is_err());
    }

    #[test]
    fn test_validate_rgba8_rejects_zero_extent() {
        assert!(validate_rgba8(0, 4, &[]).is_err());
    }
}
