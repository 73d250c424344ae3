//! Fly camera described by Euler angles.

use glam::{Mat4, Vec3};

pub const DEFAULT_YAW: f32 = -90.0;
pub const DEFAULT_PITCH: f32 = 0.0;
pub const DEFAULT_ZOOM: f32 = 45.0;

pub const PITCH_LIMIT: f32 = 89.0;
pub const MIN_ZOOM: f32 = 1.0;
pub const MAX_ZOOM: f32 = 45.0;

/// Direction of a keyboard-driven move, relative to the camera.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Movement {
    Forward,
    Backward,
    Left,
    Right,
    Up,
    Down,
}

/// A perspective camera. Angles are in degrees; `zoom` is the vertical field of view.
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub world_up: Vec3,
    yaw: f32,
    pitch: f32,
    zoom: f32,
    front: Vec3,
    right: Vec3,
    up: Vec3,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 0.0, 3.0), DEFAULT_YAW, DEFAULT_PITCH)
    }
}

impl Camera {
    pub fn new(position: Vec3, yaw: f32, pitch: f32) -> Self {
        let mut camera = Self {
            position,
            world_up: Vec3::Y,
            yaw,
            pitch: pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT),
            zoom: DEFAULT_ZOOM,
            front: Vec3::NEG_Z,
            right: Vec3::X,
            up: Vec3::Y,
            near: 0.1,
            far: 100.0,
        };
        camera.update_vectors();
        camera
    }

    #[inline]
    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    #[inline]
    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    #[inline]
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    #[inline]
    pub fn front(&self) -> Vec3 {
        self.front
    }

    #[inline]
    pub fn right(&self) -> Vec3 {
        self.right
    }

    #[inline]
    pub fn up(&self) -> Vec3 {
        self.up
    }

    /// Moves `distance` world units along `direction`.
    pub fn translate(&mut self, direction: Movement, distance: f32) {
        let axis = match direction {
            Movement::Forward => self.front,
            Movement::Backward => -self.front,
            Movement::Right => self.right,
            Movement::Left => -self.right,
            Movement::Up => self.world_up,
            Movement::Down => -self.world_up,
        };
        self.position += axis * distance;
    }

    /// Adds to yaw and pitch (degrees). Pitch is clamped so the view never flips.
    pub fn rotate(&mut self, yaw_delta: f32, pitch_delta: f32) {
        self.yaw += yaw_delta;
        self.pitch = (self.pitch + pitch_delta).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.update_vectors();
    }

    /// Narrows the field of view by `delta` degrees, clamped to `[MIN_ZOOM, MAX_ZOOM]`.
    pub fn zoom_by(&mut self, delta: f32) {
        self.zoom = (self.zoom - delta).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front, self.up)
    }

    /// Perspective projection with the Vulkan Y-flip applied.
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        let mut proj = Mat4::perspective_rh(self.zoom.to_radians(), aspect, self.near, self.far);
        proj.y_axis.y *= -1.0;
        proj
    }

    fn update_vectors(&mut self) {
        let (yaw_sin, yaw_cos) = self.yaw.to_radians().sin_cos();
        let (pitch_sin, pitch_cos) = self.pitch.to_radians().sin_cos();

        self.front = Vec3::new(yaw_cos * pitch_cos, pitch_sin, yaw_sin * pitch_cos).normalize();
        self.right = self.front.cross(self.world_up).normalize();
        self.up = self.right.cross(self.front).normalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    #[test]
    fn test_default_looks_down_negative_z() {
        let camera = Camera::default();
        assert!((camera.front() - Vec3::NEG_Z).length() < EPS);
        assert!((camera.right() - Vec3::X).length() < EPS);
        assert!((camera.up() - Vec3::Y).length() < EPS);
        assert_eq!(camera.position, Vec3::new(0.0, 0.0, 3.0));
    }

    #[test]
    fn test_default_view_matches_look_at_origin() {
        let camera = Camera::default();
        let expected = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 3.0), Vec3::ZERO, Vec3::Y);
        assert!(camera.view_matrix().abs_diff_eq(expected, EPS));
    }

    #[test]
    fn test_pitch_is_clamped() {
        let mut camera = Camera::default();
        camera.rotate(0.0, 120.0);
        assert_eq!(camera.pitch(), PITCH_LIMIT);

        camera.rotate(0.0, -400.0);
        assert_eq!(camera.pitch(), -PITCH_LIMIT);
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut camera = Camera::default();
        camera.zoom_by(100.0);
        assert_eq!(camera.zoom(), MIN_ZOOM);

        camera.zoom_by(-100.0);
        assert_eq!(camera.zoom(), MAX_ZOOM);
    }

    #[test]
    fn test_translate_follows_basis() {
        let mut camera = Camera::default();
        camera.translate(Movement::Forward, 1.0);
        assert!((camera.position - Vec3::new(0.0, 0.0, 2.0)).length() < EPS);

        camera.translate(Movement::Right, 2.0);
        assert!((camera.position - Vec3::new(2.0, 0.0, 2.0)).length() < EPS);

        camera.translate(Movement::Up, 1.0);
        assert!((camera.position - Vec3::new(2.0, 1.0, 2.0)).length() < EPS);
    }

    #[test]
    fn test_yaw_turns_right() {
        let mut camera = Camera::default();
        camera.rotate(90.0, 0.0);
        assert!((camera.front() - Vec3::X).length() < EPS);
    }

    #[test]
    fn test_projection_flips_y() {
        let camera = Camera::default();
        let proj = camera.projection_matrix(4.0 / 3.0);
        let unflipped = Mat4::perspective_rh(DEFAULT_ZOOM.to_radians(), 4.0 / 3.0, 0.1, 100.0);

        assert!(proj.y_axis.y < 0.0);
        assert!((proj.y_axis.y + unflipped.y_axis.y).abs() < EPS);
        assert_eq!(proj.x_axis, unflipped.x_axis);
    }
}
