//! RHI-specific error types.

use ash::vk;
use thiserror::Error;

/// RHI-specific error type.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] vk::Result),

    /// Failed to load Vulkan
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// GPU allocator error
    #[error("Allocator error: {0}")]
    AllocatorError(#[from] gpu_allocator::AllocationError),

    /// No suitable GPU found
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// A resource could not be created with the requested parameters
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// The device stopped responding or a bounded wait expired
    #[error("Device lost: {0}")]
    DeviceLost(String),

    #[error("Shader error: {0}")]
    ShaderError(String),

    #[error("Surface error: {0}")]
    SurfaceError(String),

    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

impl RhiError {
    /// Whether the error ends the frame loop. Everything else is recoverable per frame.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RhiError::DeviceLost(_) | RhiError::VulkanError(vk::Result::ERROR_DEVICE_LOST)
        )
    }

    /// Map the result of a bounded wait, treating expiry and device loss as fatal.
    pub fn from_wait(result: vk::Result, what: &str) -> Self {
        match result {
            vk::Result::TIMEOUT => RhiError::DeviceLost(format!("{} timed out", what)),
            vk::Result::ERROR_DEVICE_LOST => {
                RhiError::DeviceLost(format!("device lost during {}", what))
            }
            other => RhiError::VulkanError(other),
        }
    }
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_timeout_is_fatal() {
        let err = RhiError::from_wait(vk::Result::TIMEOUT, "fence wait");
        assert!(matches!(err, RhiError::DeviceLost(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_other_wait_errors_are_not_fatal() {
        let err = RhiError::from_wait(vk::Result::ERROR_OUT_OF_HOST_MEMORY, "fence wait");
        assert!(matches!(
            err,
            RhiError::VulkanError(vk::Result::ERROR_OUT_OF_HOST_MEMORY)
        ));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_raw_device_lost_is_fatal() {
        assert!(RhiError::VulkanError(vk::Result::ERROR_DEVICE_LOST).is_fatal());
        assert!(!RhiError::InitializationFailed("x".into()).is_fatal());
    }
}
