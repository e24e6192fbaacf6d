use std::f32::consts::PI;

use crate::model::Color;

/// What the frame loop does after an update or render error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameFailurePolicy {
    /// Record the error and keep scheduling frames.
    #[default]
    LogAndContinue,
    /// Record the error and stop re-registering the frame callback.
    Halt,
}

#[derive(Debug, Clone)]
pub struct SceneSettings {
    pub background: Color,
    pub fog_color: Color,
    pub fog_density: f32,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            background: Color::BLACK,
            fog_color: Color::BLACK,
            fog_density: 0.08,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    /// Vertical field of view in degrees.
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self { fov_degrees: 75.0, near: 0.1, far: 100.0 }
    }
}

#[derive(Debug, Clone)]
pub struct LightingSettings {
    pub ambient_color: Color,
    pub ambient_intensity: f32,
}

impl Default for LightingSettings {
    fn default() -> Self {
        Self { ambient_color: Color::from_hex(0x404040), ambient_intensity: 0.6 }
    }
}

#[derive(Debug, Clone)]
pub struct FlashlightSettings {
    pub color: Color,
    pub intensity: f32,
    /// Half-angle of the cone in radians.
    pub angle: f32,
    /// Range in world units; light is zero beyond it.
    pub distance: f32,
    /// Fraction of the cone that fades out towards the edge (0..=1).
    pub penumbra: f32,
    pub cast_shadow: bool,
}

impl Default for FlashlightSettings {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            intensity: 2.0,
            angle: PI / 6.0,
            distance: 25.0,
            penumbra: 0.2,
            cast_shadow: true,
        }
    }
}

/// Options for the render surface bound to the page canvas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceOptions {
    pub canvas_id: String,
    pub antialias: bool,
    pub shadow_map: bool,
    pub width: u32,
    pub height: u32,
}

/// Element ids the browser front-end looks up.
#[derive(Debug, Clone)]
pub struct DomIds {
    pub canvas: String,
    pub loading_screen: String,
    pub download_log: String,
    pub log_file_name: String,
}

impl Default for DomIds {
    fn default() -> Self {
        Self {
            canvas: "gameCanvas".to_string(),
            loading_screen: "loadingScreen".to_string(),
            download_log: "downloadLog".to_string(),
            log_file_name: "whispers-log.txt".to_string(),
        }
    }
}

/// Everything the runtime loop needs to build a session.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub scene: SceneSettings,
    pub camera: CameraSettings,
    pub lighting: LightingSettings,
    pub flashlight: FlashlightSettings,
    pub dom: DomIds,
    pub antialias: bool,
    pub shadow_map: bool,
    /// Upper clamp for a frame delta, in seconds.
    pub max_frame_delta: f32,
    pub frame_failure_policy: FrameFailurePolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            scene: SceneSettings::default(),
            camera: CameraSettings::default(),
            lighting: LightingSettings::default(),
            flashlight: FlashlightSettings::default(),
            dom: DomIds::default(),
            antialias: true,
            shadow_map: true,
            max_frame_delta: 0.1,
            frame_failure_policy: FrameFailurePolicy::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn surface_options(&self, width: u32, height: u32) -> SurfaceOptions {
        SurfaceOptions {
            canvas_id: self.dom.canvas.clone(),
            antialias: self.antialias,
            shadow_map: self.shadow_map,
            width,
            height,
        }
    }
}
