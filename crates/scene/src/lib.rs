//! Camera and camera controller.
//!
//! Input reaches the camera through an explicit [`vkframe_platform::InputState`]
//! passed to [`CameraController::update`] once per frame.

pub mod camera;
pub mod controller;

pub use camera::{Camera, Movement};
pub use controller::CameraController;
