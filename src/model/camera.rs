use std::f32::consts::FRAC_PI_2;

use glam::{Mat4, Vec3};

use super::scene::SpotLight;

/// Slightly less than π/2 to avoid gimbal lock
const PITCH_LIMIT: f32 = 1.5533;

#[derive(Debug, Clone)]
pub struct Camera {
    pub eye: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub up: Vec3,
    pub fov_y: f32,
    pub aspect: f32,
    pub z_near: f32,
    pub z_far: f32,
    projection: Mat4,
    lights: Vec<SpotLight>,
}

impl Camera {
    /// Perspective camera at the origin looking down -Z.
    pub fn perspective(fov_degrees: f32, aspect: f32, z_near: f32, z_far: f32) -> Self {
        let mut camera = Self {
            eye: Vec3::ZERO,
            yaw: -FRAC_PI_2,
            pitch: 0.0,
            up: Vec3::Y,
            fov_y: fov_degrees.to_radians(),
            aspect,
            z_near,
            z_far,
            projection: Mat4::IDENTITY,
            lights: Vec::new(),
        };
        camera.update_projection();
        camera
    }

    pub fn forward(&self) -> Vec3 {
        let cy = self.yaw;
        let cp = self.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        Vec3::new(cy.cos() * cp.cos(), cp.sin(), cy.sin() * cp.cos()).normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(self.up).normalize()
    }

    pub fn target(&self) -> Vec3 { self.eye + self.forward() }

    /// Takes effect on the next `update_projection`.
    pub fn set_aspect(&mut self, width: u32, height: u32) {
        if height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    /// Recompute the cached projection from fov/aspect/near/far.
    pub fn update_projection(&mut self) {
        self.projection = Mat4::perspective_rh(self.fov_y, self.aspect, self.z_near, self.z_far);
    }

    pub fn projection(&self) -> Mat4 { self.projection }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target(), self.up)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection * self.view()
    }

    pub fn set_look_at(&mut self, target: Vec3) {
        let dir = (target - self.eye).normalize();
        self.yaw = dir.z.atan2(dir.x);
        self.pitch = dir.y.asin().clamp(-1.4, 1.4);
    }

    /// Parent a light to the camera; it follows the camera's eye and orientation.
    pub fn attach(&mut self, light: SpotLight) {
        self.lights.push(light);
    }

    pub fn lights(&self) -> &[SpotLight] {
        &self.lights
    }

    // camera-local frame: +X right, +Y up, -Z forward
    pub fn local_to_world_direction(&self, local: Vec3) -> Vec3 {
        let forward = self.forward();
        let right = self.right();
        let up = right.cross(forward);
        (right * local.x + up * local.y - forward * local.z).normalize_or_zero()
    }

    pub fn local_to_world_point(&self, local: Vec3) -> Vec3 {
        let forward = self.forward();
        let right = self.right();
        let up = right.cross(forward);
        self.eye + right * local.x + up * local.y - forward * local.z
    }
}
