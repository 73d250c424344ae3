//! Texture sampler.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Filtering and addressing for a [`Sampler`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SamplerDesc {
    pub filter: vk::Filter,
    pub address_mode: vk::SamplerAddressMode,
    /// Clamped to the device limit; ignored when the device lacks anisotropy.
    pub max_anisotropy: Option<f32>,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            filter: vk::Filter::LINEAR,
            address_mode: vk::SamplerAddressMode::REPEAT,
            max_anisotropy: Some(16.0),
        }
    }
}

impl SamplerDesc {
    /// Anisotropy actually used given the device limit, if any.
    pub fn effective_anisotropy(&self, device_limit: Option<f32>) -> Option<f32> {
        match (self.max_anisotropy, device_limit) {
            (Some(requested), Some(limit)) => Some(requested.clamp(1.0, limit)),
            _ => None,
        }
    }

    fn create_info(&self, device_limit: Option<f32>) -> vk::SamplerCreateInfo<'static> {
        let anisotropy = self.effective_anisotropy(device_limit);

        vk::SamplerCreateInfo::default()
            .mag_filter(self.filter)
            .min_filter(self.filter)
            .address_mode_u(self.address_mode)
            .address_mode_v(self.address_mode)
            .address_mode_w(self.address_mode)
            .anisotropy_enable(anisotropy.is_some())
            .max_anisotropy(anisotropy.unwrap_or(1.0))
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(0.0)
    }
}

pub struct Sampler {
    device: Arc<Device>,
    sampler: vk::Sampler,
}

impl Sampler {
    pub fn new(device: Arc<Device>, desc: &SamplerDesc) -> RhiResult<Self> {
        let create_info = desc.create_info(device.max_sampler_anisotropy());

        // SAFETY: anisotropy is only enabled when the device feature is on.
        let sampler = unsafe { device.handle().create_sampler(&create_info, None)? };

        debug!(
            "Created sampler: {:?}/{:?}, anisotropy {}",
            desc.filter, desc.address_mode, create_info.max_anisotropy
        );

        Ok(Self { device, sampler })
    }

    #[inline]
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        // SAFETY: no pending work samples through it.
        unsafe {
            self.device.handle().destroy_sampler(self.sampler, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_desc() {
        let desc = SamplerDesc::default();
        assert_eq!(desc.filter, vk::Filter::LINEAR);
        assert_eq!(desc.address_mode, vk::SamplerAddressMode::REPEAT);
    }

    #[test]
    fn test_anisotropy_clamped_to_device_limit() {
        let desc = SamplerDesc::default();
        assert_eq!(desc.effective_anisotropy(Some(8.0)), Some(8.0));
        assert_eq!(desc.effective_anisotropy(Some(16.0)), Some(16.0));
    }

    #[test]
    fn test_anisotropy_disabled_without_feature() {
        let desc = SamplerDesc::default();
        assert_eq!(desc.effective_anisotropy(None), None);

        let info = desc.create_info(None);
        assert_eq!(info.anisotropy_enable, vk::FALSE);
        assert_eq!(info.max_anisotropy, 1.0);
    }

    #[test]
    fn test_create_info_addressing() {
        let info = SamplerDesc::default().create_info(Some(4.0));
        assert_eq!(info.address_mode_u, vk::SamplerAddressMode::REPEAT);
        assert_eq!(info.address_mode_v, vk::SamplerAddressMode::REPEAT);
        assert_eq!(info.address_mode_w, vk::SamplerAddressMode::REPEAT);
        assert_eq!(info.anisotropy_enable, vk::TRUE);
        assert_eq!(info.max_anisotropy, 4.0);
    }
}
