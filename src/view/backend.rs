use crate::config::{CameraSettings, FlashlightSettings, LightingSettings, SceneSettings, SurfaceOptions};
use crate::error::BackendError;
use crate::model::{AmbientLight, Camera, FogExp2, Scene, SpotLight};
use glam::Vec3;

/// Output target of a backend, sized in physical pixels.
pub trait RenderSurface {
    fn size(&self) -> (u32, u32);
}

/// Everything the runtime loop needs from a graphics implementation.
///
/// The construction methods default to the plain scene-model builders below;
/// GPU backends override what they need to validate or allocate.
pub trait RenderBackend {
    type Surface: RenderSurface;

    fn create_scene(&mut self, settings: &SceneSettings) -> Result<Scene, BackendError> {
        Ok(build_scene(settings))
    }

    fn create_camera(&mut self, settings: &CameraSettings, aspect: f32) -> Result<Camera, BackendError> {
        build_camera(settings, aspect)
    }

    fn create_surface(&mut self, options: &SurfaceOptions) -> Result<Self::Surface, BackendError>;

    fn create_ambient_light(&mut self, settings: &LightingSettings) -> Result<AmbientLight, BackendError> {
        Ok(build_ambient_light(settings))
    }

    fn create_spot_light(&mut self, settings: &FlashlightSettings) -> Result<SpotLight, BackendError> {
        Ok(build_spot_light(settings))
    }

    fn resize_surface(&mut self, surface: &mut Self::Surface, width: u32, height: u32) -> Result<(), BackendError>;

    fn render(&mut self, surface: &mut Self::Surface, scene: &Scene, camera: &Camera) -> Result<(), BackendError>;
}

pub fn build_scene(settings: &SceneSettings) -> Scene {
    let fog = FogExp2 { color: settings.fog_color, density: settings.fog_density };
    Scene::new(settings.background, Some(fog))
}

/// Fails for a non-finite or non-positive aspect, e.g. a zero-height viewport.
pub fn build_camera(settings: &CameraSettings, aspect: f32) -> Result<Camera, BackendError> {
    if !(aspect.is_finite() && aspect > 0.0) {
        return Err(BackendError::Construction { what: "camera", reason: format!("invalid aspect ratio {aspect}") });
    }
    Ok(Camera::perspective(settings.fov_degrees, aspect, settings.near, settings.far))
}

pub fn build_ambient_light(settings: &LightingSettings) -> AmbientLight {
    AmbientLight { color: settings.ambient_color, intensity: settings.ambient_intensity }
}

/// Spotlight at the parent's origin, aimed along the parent's -Z axis.
pub fn build_spot_light(settings: &FlashlightSettings) -> SpotLight {
    SpotLight {
        color: settings.color,
        intensity: settings.intensity,
        angle: settings.angle,
        distance: settings.distance,
        penumbra: settings.penumbra,
        cast_shadow: settings.cast_shadow,
        position: Vec3::ZERO,
        target: Vec3::NEG_Z,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_rejects_degenerate_aspect() {
        let settings = CameraSettings::default();
        assert!(build_camera(&settings, f32::INFINITY).is_err());
        assert!(build_camera(&settings, 0.0).is_err());
        assert!(build_camera(&settings, 1.5).is_ok());
    }

    #[test]
    fn spot_light_points_down_local_negative_z() {
        let light = build_spot_light(&FlashlightSettings::default());
        assert_eq!(light.direction(), Vec3::NEG_Z);
        assert_eq!(light.position, Vec3::ZERO);
    }
}
