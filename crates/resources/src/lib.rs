//! Resource loading.
//!
//! Pure data producers with no GPU dependency:
//! - Image decoding to RGBA8 (plus a generated fallback checkerboard)
//! - SPIR-V bytecode loading

mod error;

pub mod image_data;
pub mod spirv;

pub use error::{ResourceError, ResourceResult};
pub use image_data::ImageData;
