//! Input-driven camera controller.

use vkframe_platform::{InputState, KeyCode, MouseButton};

use crate::camera::{Camera, Movement};

/// Moves and turns a [`Camera`] from the current frame's [`InputState`].
///
/// - WASD moves in the view plane, Q/E moves down/up
/// - Dragging with the right button held turns the view
/// - The vertical scroll wheel zooms
#[derive(Clone, Debug, PartialEq)]
pub struct CameraController {
    /// World units per second.
    pub speed: f32,
    /// Degrees per pixel of mouse movement.
    pub sensitivity: f32,
}

impl Default for CameraController {
    fn default() -> Self {
        Self {
            speed: 2.5,
            sensitivity: 0.1,
        }
    }
}

const BINDINGS: [(KeyCode, Movement); 6] = [
    (KeyCode::KeyW, Movement::Forward),
    (KeyCode::KeyS, Movement::Backward),
    (KeyCode::KeyA, Movement::Left),
    (KeyCode::KeyD, Movement::Right),
    (KeyCode::KeyE, Movement::Up),
    (KeyCode::KeyQ, Movement::Down),
];

impl CameraController {
    pub fn new(speed: f32, sensitivity: f32) -> Self {
        Self { speed, sensitivity }
    }

    /// Applies one frame of input. `dt` is the frame time in seconds.
    pub fn update(&self, camera: &mut Camera, input: &InputState, dt: f32) {
        let distance = self.speed * dt;
        for (key, movement) in BINDINGS {
            if input.is_key_pressed(key) {
                camera.translate(movement, distance);
            }
        }

        if input.is_mouse_pressed(MouseButton::Right) {
            let (dx, dy) = input.mouse_delta();
            // Screen y grows downward.
            camera.rotate(dx * self.sensitivity, -dy * self.sensitivity);
        }

        let (_, scroll) = input.scroll_delta();
        if scroll != 0.0 {
            camera.zoom_by(scroll);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{DEFAULT_ZOOM, PITCH_LIMIT};
    use glam::Vec3;

    const EPS: f32 = 1e-5;

    #[test]
    fn test_forward_key_moves_at_speed() {
        let controller = CameraController::default();
        let mut camera = Camera::default();
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::KeyW);

        controller.update(&mut camera, &input, 0.5);

        // 2.5 units/s * 0.5 s along -Z
        assert!((camera.position - Vec3::new(0.0, 0.0, 1.75)).length() < EPS);
    }

    #[test]
    fn test_opposite_keys_cancel() {
        let controller = CameraController::default();
        let mut camera = Camera::default();
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::KeyA);
        input.on_key_pressed(KeyCode::KeyD);

        controller.update(&mut camera, &input, 1.0);

        assert!((camera.position - Vec3::new(0.0, 0.0, 3.0)).length() < EPS);
    }

    #[test]
    fn test_mouse_look_requires_right_button() {
        let controller = CameraController::default();
        let mut camera = Camera::default();
        let mut input = InputState::new();
        input.on_mouse_moved(0.0, 0.0);
        input.on_mouse_moved(100.0, 0.0);

        controller.update(&mut camera, &input, 0.016);
        assert_eq!(camera.yaw(), -90.0);

        input.on_mouse_pressed(MouseButton::Right);
        controller.update(&mut camera, &input, 0.016);
        // 100 px * 0.1 deg/px
        assert!((camera.yaw() - -80.0).abs() < EPS);
    }

    #[test]
    fn test_mouse_up_pitches_up_and_clamps() {
        let controller = CameraController::default();
        let mut camera = Camera::default();
        let mut input = InputState::new();
        input.on_mouse_pressed(MouseButton::Right);
        input.on_mouse_moved(0.0, 2000.0);
        input.on_mouse_moved(0.0, 0.0);

        controller.update(&mut camera, &input, 0.016);

        assert_eq!(camera.pitch(), PITCH_LIMIT);
    }

    #[test]
    fn test_scroll_zooms_in() {
        let controller = CameraController::default();
        let mut camera = Camera::default();
        let mut input = InputState::new();
        input.on_scroll(0.0, 5.0);

        controller.update(&mut camera, &input, 0.016);

        assert_eq!(camera.zoom(), DEFAULT_ZOOM - 5.0);
    }
}
