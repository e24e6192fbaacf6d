use anyhow::anyhow;
use glam::Vec3;

use crate::controller::camera_controller::CameraController;
use crate::controller::input::{InputProcessor, SharedInput};
use crate::model::{CameraHandle, Scene};

/// First-person movement and camera ownership.
pub trait Player {
    type State;

    /// Called once during initialization, before the level loads.
    fn init(&mut self, camera: CameraHandle) -> anyhow::Result<Self::State>;

    fn update(&mut self, delta: f32, state: &mut Self::State, scene: &mut Scene) -> anyhow::Result<()>;
}

/// Anything with a world position other entities can react to.
pub trait Locatable {
    fn position(&self) -> Vec3;
}

#[derive(Debug, Clone)]
pub struct PlayerSettings {
    /// Feet position at start.
    pub spawn: Vec3,
    /// Half extent of the walkable square around the origin.
    pub bounds: f32,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self { spawn: Vec3::new(0.0, 0.0, 8.0), bounds: 24.0 }
    }
}

#[derive(Debug)]
pub struct PlayerState {
    pub camera: CameraHandle,
    pub position: Vec3,
    pub velocity: Vec3,
}

impl Locatable for PlayerState {
    fn position(&self) -> Vec3 {
        self.position
    }
}

/// Mouse-look and WASD walking driven by a shared `InputState`.
pub struct FirstPersonPlayer {
    input: SharedInput,
    processor: InputProcessor,
    controller: CameraController,
    settings: PlayerSettings,
}

impl FirstPersonPlayer {
    pub fn new(input: SharedInput, settings: PlayerSettings) -> Self {
        Self {
            input,
            processor: InputProcessor::default(),
            controller: CameraController::default(),
            settings,
        }
    }

    pub fn with_processor(mut self, processor: InputProcessor) -> Self {
        self.processor = processor;
        self
    }

    pub fn with_controller(mut self, controller: CameraController) -> Self {
        self.controller = controller;
        self
    }
}

impl Player for FirstPersonPlayer {
    type State = PlayerState;

    fn init(&mut self, camera: CameraHandle) -> anyhow::Result<PlayerState> {
        let position = self.settings.spawn;
        {
            let mut cam = camera.try_borrow_mut().map_err(|_| anyhow!("camera is busy"))?;
            self.controller.sync_camera_from_player(&mut cam, position);
        }
        tracing::debug!(?position, "player placed");
        Ok(PlayerState { camera, position, velocity: Vec3::ZERO })
    }

    fn update(&mut self, delta: f32, state: &mut PlayerState, _scene: &mut Scene) -> anyhow::Result<()> {
        let mut camera = state.camera.try_borrow_mut().map_err(|_| anyhow!("camera is busy"))?;

        // listeners never hold the input across a frame; a busy borrow only skips this frame's input
        let (look, wish, sprinting) = match self.input.try_borrow_mut() {
            Ok(mut input) => (
                input.consume_look(),
                self.processor.wish_direction(&input),
                self.processor.is_sprinting(&input),
            ),
            Err(_) => ((0.0, 0.0), glam::Vec2::ZERO, false),
        };

        self.controller.apply_look(&mut camera, look.0, look.1);
        state.velocity = self.controller.planar_velocity(&camera, wish, sprinting);

        let bounds = self.settings.bounds;
        let next = state.position + state.velocity * delta;
        state.position = Vec3::new(next.x.clamp(-bounds, bounds), next.y, next.z.clamp(-bounds, bounds));
        self.controller.sync_camera_from_player(&mut camera, state.position);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::controller::input::{InputEvent, InputState, KeyBindings};
    use crate::model::{Camera, Color};

    fn setup() -> (FirstPersonPlayer, SharedInput, CameraHandle, Scene) {
        let input = InputState::shared();
        let player = FirstPersonPlayer::new(input.clone(), PlayerSettings::default());
        let camera = Rc::new(RefCell::new(Camera::perspective(75.0, 1.0, 0.1, 100.0)));
        (player, input, camera, Scene::new(Color::BLACK, None))
    }

    #[test]
    fn init_puts_camera_at_eye_height() {
        let (mut player, _, camera, _) = setup();
        let state = player.init(camera.clone()).unwrap();
        assert_eq!(state.position, Vec3::new(0.0, 0.0, 8.0));
        assert_eq!(camera.borrow().eye, Vec3::new(0.0, 1.6, 8.0));
    }

    #[test]
    fn walking_forward_moves_camera_toward_negative_z() {
        let (mut player, input, camera, mut scene) = setup();
        let mut state = player.init(camera.clone()).unwrap();
        input.borrow_mut().process_event(&InputEvent::KeyDown("w".into()));

        player.update(0.5, &mut state, &mut scene).unwrap();
        assert!((state.position.z - 6.5).abs() < 1e-4, "at {:?}", state.position);
        assert!((camera.borrow().eye.z - 6.5).abs() < 1e-4);
    }

    #[test]
    fn idle_player_does_not_move() {
        let (mut player, _, camera, mut scene) = setup();
        let mut state = player.init(camera).unwrap();
        player.update(0.1, &mut state, &mut scene).unwrap();
        assert_eq!(state.position, Vec3::new(0.0, 0.0, 8.0));
        assert_eq!(state.velocity, Vec3::ZERO);
    }

    #[test]
    fn mouse_look_turns_camera() {
        let (mut player, input, camera, mut scene) = setup();
        let mut state = player.init(camera.clone()).unwrap();
        let yaw = camera.borrow().yaw;
        {
            let mut input = input.borrow_mut();
            input.process_event(&InputEvent::PointerLockChanged { locked: true });
            input.process_event(&InputEvent::MouseMove { dx: 100.0, dy: 0.0 });
        }
        player.update(0.016, &mut state, &mut scene).unwrap();
        assert!((camera.borrow().yaw - (yaw + 0.2)).abs() < 1e-5);
    }

    #[test]
    fn player_stays_inside_bounds() {
        let (mut player, input, camera, mut scene) = setup();
        let mut state = player.init(camera).unwrap();
        input.borrow_mut().process_event(&InputEvent::KeyDown("s".into()));
        for _ in 0..200 {
            player.update(0.1, &mut state, &mut scene).unwrap();
        }
        assert_eq!(state.position.z, 24.0);
    }

    #[test]
    fn custom_bindings_and_controller_are_used() {
        let (_, input, camera, mut scene) = setup();
        let bindings = KeyBindings { forward: "i".into(), ..KeyBindings::default() };
        let controller = CameraController { walk_speed: 6.0, eye_height: 1.0, ..CameraController::default() };
        let mut player = FirstPersonPlayer::new(input.clone(), PlayerSettings::default())
            .with_processor(InputProcessor::new(bindings))
            .with_controller(controller);

        let mut state = player.init(camera.clone()).unwrap();
        assert_eq!(camera.borrow().eye.y, 1.0);

        input.borrow_mut().process_event(&InputEvent::KeyDown("w".into()));
        player.update(0.5, &mut state, &mut scene).unwrap();
        assert_eq!(state.position, Vec3::new(0.0, 0.0, 8.0), "w is no longer bound");

        input.borrow_mut().process_event(&InputEvent::KeyDown("i".into()));
        player.update(0.5, &mut state, &mut scene).unwrap();
        assert!((state.position.z - 5.0).abs() < 1e-4, "at {:?}", state.position);
    }

    #[test]
    fn busy_camera_is_an_error() {
        let (mut player, _, camera, mut scene) = setup();
        let mut state = player.init(camera.clone()).unwrap();
        let _held = camera.borrow();
        assert!(player.update(0.1, &mut state, &mut scene).is_err());
    }
}
