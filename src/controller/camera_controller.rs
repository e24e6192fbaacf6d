use glam::{Vec2, Vec3};

use crate::model::Camera;

/// Maximum look pitch; slightly less than π/2
const MAX_PITCH: f32 = 1.55;

/// Turns look deltas and movement intent into camera orientation and
/// ground-plane motion.
#[derive(Debug, Clone)]
pub struct CameraController {
    pub walk_speed: f32,
    pub sprint_multiplier: f32,
    pub mouse_sensitivity: f32,
    pub eye_height: f32,
}

impl Default for CameraController {
    fn default() -> Self {
        Self {
            walk_speed: 3.0,
            sprint_multiplier: 1.8,
            mouse_sensitivity: 0.002,
            eye_height: 1.6,
        }
    }
}

impl CameraController {
    /// Apply mouse look delta to camera
    pub fn apply_look(&self, camera: &mut Camera, dx: f32, dy: f32) {
        camera.yaw += dx * self.mouse_sensitivity;
        camera.pitch = (camera.pitch - dy * self.mouse_sensitivity).clamp(-MAX_PITCH, MAX_PITCH);
    }

    /// Horizontal velocity for a movement intent (x = right, y = forward)
    /// relative to the camera heading. Pitch does not tilt the motion.
    pub fn planar_velocity(&self, camera: &Camera, wish: Vec2, sprinting: bool) -> Vec3 {
        if wish == Vec2::ZERO {
            return Vec3::ZERO;
        }
        let forward = Vec3::new(camera.yaw.cos(), 0.0, camera.yaw.sin());
        let right = forward.cross(Vec3::Y);
        let speed = if sprinting { self.walk_speed * self.sprint_multiplier } else { self.walk_speed };
        (right * wish.x + forward * wish.y).normalize_or_zero() * speed
    }

    /// Sync camera from player position (feet on the ground)
    pub fn sync_camera_from_player(&self, camera: &mut Camera, player_pos: Vec3) {
        camera.eye = player_pos + Vec3::new(0.0, self.eye_height, 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> Camera {
        Camera::perspective(75.0, 1.0, 0.1, 100.0)
    }

    #[test]
    fn pitch_is_clamped() {
        let controller = CameraController::default();
        let mut camera = camera();
        controller.apply_look(&mut camera, 0.0, -100_000.0);
        assert_eq!(camera.pitch, MAX_PITCH);
        controller.apply_look(&mut camera, 0.0, 100_000.0);
        assert_eq!(camera.pitch, -MAX_PITCH);
    }

    #[test]
    fn forward_walk_follows_heading_on_ground_plane() {
        let controller = CameraController::default();
        let mut camera = camera();
        camera.pitch = 1.0;
        let velocity = controller.planar_velocity(&camera, Vec2::Y, false);
        assert!(velocity.y.abs() < 1e-6);
        assert!((velocity - Vec3::new(0.0, 0.0, -controller.walk_speed)).length() < 1e-5);

        let sprint = controller.planar_velocity(&camera, Vec2::Y, true);
        assert!((sprint.length() - controller.walk_speed * controller.sprint_multiplier).abs() < 1e-5);
    }

    #[test]
    fn strafe_right_is_positive_x_when_facing_negative_z() {
        let controller = CameraController::default();
        let velocity = controller.planar_velocity(&camera(), Vec2::X, false);
        assert!(velocity.x > 0.0);
        assert!(velocity.z.abs() < 1e-5);
    }
}
