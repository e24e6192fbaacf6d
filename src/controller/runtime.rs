use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::config::{FrameFailurePolicy, RuntimeConfig};
use crate::controller::ghost::Ghost;
use crate::controller::level::Level;
use crate::controller::player::Player;
use crate::controller::scheduler::{FrameControl, FrameScheduler};
use crate::error::{BackendError, FrameError, InitError, LifecycleError};
use crate::logging::Logger;
use crate::model::{CameraHandle, Clock, Scene, SceneNode, TimeSource};
use crate::view::{Presentation, RenderBackend, RenderSurface, Viewport};

/// Lifecycle phase of the runtime loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Uninitialized,
    Initializing,
    ReadyIdle,
    Running,
    /// Terminal; initialization did not complete.
    Failed,
}

impl LoopState {
    /// States in which frames are rendered.
    pub fn renders(self) -> bool {
        matches!(self, LoopState::ReadyIdle | LoopState::Running)
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoopState::Uninitialized => "uninitialized",
            LoopState::Initializing => "initializing",
            LoopState::ReadyIdle => "ready-idle",
            LoopState::Running => "running",
            LoopState::Failed => "failed",
        })
    }
}

/// Host services the loop is wired to.
pub struct Platform {
    pub scheduler: Box<dyn FrameScheduler>,
    pub viewport: Box<dyn Viewport>,
    pub presentation: Box<dyn Presentation>,
    pub logger: Rc<dyn Logger>,
    pub time: Rc<dyn TimeSource>,
}

/// Everything that only exists after a successful `initialize()`.
struct Session<S, PS, GS> {
    clock: Clock,
    scene: Scene,
    camera: CameraHandle,
    surface: S,
    player_state: PS,
    ghost_state: GS,
}

/// State touched by the frame callback.
struct LoopCore<B: RenderBackend, P: Player, G: Ghost<P::State>> {
    state: LoopState,
    backend: B,
    player: P,
    ghost: G,
    session: Option<Session<B::Surface, P::State, G::State>>,
    logger: Rc<dyn Logger>,
    policy: FrameFailurePolicy,
    frames: u64,
    last_frame_error: Option<String>,
}

impl<B: RenderBackend, P: Player, G: Ghost<P::State>> LoopCore<B, P, G> {
    fn frame(&mut self) -> FrameControl {
        if !self.state.renders() {
            return FrameControl::Halt;
        }
        let LoopCore { state, backend, player, ghost, session, .. } = self;
        let Some(session) = session.as_mut() else {
            return FrameControl::Halt;
        };

        let delta = session.clock.delta();
        let result = run_frame(*state == LoopState::Running, delta, backend, player, ghost, session);
        self.frames += 1;

        match result {
            Ok(()) => {
                self.last_frame_error = None;
                FrameControl::Continue
            }
            Err(err) => self.frame_failed(err),
        }
    }

    fn frame_failed(&mut self, err: FrameError) -> FrameControl {
        let message = err.to_string();
        // the same failure every frame would flood the session log
        if self.last_frame_error.as_deref() != Some(message.as_str()) {
            self.logger.record_error(&err);
            self.last_frame_error = Some(message);
        }
        match self.policy {
            FrameFailurePolicy::LogAndContinue => FrameControl::Continue,
            FrameFailurePolicy::Halt => {
                tracing::warn!(frame = self.frames, "frame schedule halted after error");
                FrameControl::Halt
            }
        }
    }
}

fn run_frame<B: RenderBackend, P: Player, G: Ghost<P::State>>(
    simulate: bool,
    delta: f32,
    backend: &mut B,
    player: &mut P,
    ghost: &mut G,
    session: &mut Session<B::Surface, P::State, G::State>,
) -> Result<(), FrameError> {
    if simulate {
        player
            .update(delta, &mut session.player_state, &mut session.scene)
            .map_err(FrameError::Player)?;
        ghost
            .update(delta, &mut session.ghost_state, &session.player_state, &mut session.scene)
            .map_err(FrameError::Ghost)?;
    }
    let camera = session.camera.borrow();
    backend
        .render(&mut session.surface, &session.scene, &camera)
        .map_err(FrameError::Render)?;
    Ok(())
}

/// Owns the lifecycle state machine, the session it builds, and the frame
/// schedule that drives it.
///
/// All methods take `&self`: the loop lives behind an `Rc` shared with the
/// page event handlers, and every handler runs to completion on one thread.
pub struct RuntimeLoop<B, P, G, L>
where
    B: RenderBackend + 'static,
    P: Player + 'static,
    G: Ghost<P::State> + 'static,
    L: Level,
{
    config: RuntimeConfig,
    core: Rc<RefCell<LoopCore<B, P, G>>>,
    level: RefCell<Option<L>>,
    scheduler: RefCell<Box<dyn FrameScheduler>>,
    scheduled: Cell<bool>,
    viewport: Box<dyn Viewport>,
    presentation: RefCell<Box<dyn Presentation>>,
    logger: Rc<dyn Logger>,
    time: Rc<dyn TimeSource>,
}

impl<B, P, G, L> RuntimeLoop<B, P, G, L>
where
    B: RenderBackend + 'static,
    P: Player + 'static,
    G: Ghost<P::State> + 'static,
    L: Level,
{
    pub fn new(config: RuntimeConfig, backend: B, player: P, ghost: G, level: L, platform: Platform) -> Self {
        let core = LoopCore {
            state: LoopState::Uninitialized,
            backend,
            player,
            ghost,
            session: None,
            logger: platform.logger.clone(),
            policy: config.frame_failure_policy,
            frames: 0,
            last_frame_error: None,
        };
        Self {
            config,
            core: Rc::new(RefCell::new(core)),
            level: RefCell::new(Some(level)),
            scheduler: RefCell::new(platform.scheduler),
            scheduled: Cell::new(false),
            viewport: platform.viewport,
            presentation: RefCell::new(platform.presentation),
            logger: platform.logger,
            time: platform.time,
        }
    }

    pub fn state(&self) -> LoopState {
        self.core.borrow().state
    }

    /// Frame callbacks that ran an update/render pass.
    pub fn frames(&self) -> u64 {
        self.core.borrow().frames
    }

    pub fn logger(&self) -> Rc<dyn Logger> {
        self.logger.clone()
    }

    pub fn camera(&self) -> Option<CameraHandle> {
        self.core.borrow().session.as_ref().map(|session| session.camera.clone())
    }

    pub fn surface_size(&self) -> Option<(u32, u32)> {
        self.core.borrow().session.as_ref().map(|session| session.surface.size())
    }

    pub fn with_scene<R>(&self, f: impl FnOnce(&Scene) -> R) -> Option<R> {
        self.core.borrow().session.as_ref().map(|session| f(&session.scene))
    }

    /// Build the session and start rendering.
    ///
    /// Failures are recorded on the logger and move the loop to `Failed`;
    /// the error is also returned. Calling this a second time is rejected
    /// without touching the running session.
    pub async fn initialize(&self) -> Result<(), InitError> {
        {
            let mut core = self.core.borrow_mut();
            if core.state != LoopState::Uninitialized {
                let err = LifecycleError { signal: "initialize", state: core.state };
                tracing::warn!(%err, "ignoring repeated initialization");
                return Err(err.into());
            }
            core.state = LoopState::Initializing;
        }
        tracing::info!("initializing");

        match self.build_session().await {
            Ok(session) => {
                {
                    let mut core = self.core.borrow_mut();
                    core.session = Some(session);
                    core.state = LoopState::ReadyIdle;
                }
                // resizes that arrived while the level was loading found no session
                let (width, height) = self.viewport.size();
                if let Err(err) = self.on_resize(width, height) {
                    tracing::warn!(%err, "could not apply the current viewport size");
                }
                self.logger.record("Initialization complete.");
                self.register_frame_schedule();
                Ok(())
            }
            Err(err) => {
                self.core.borrow_mut().state = LoopState::Failed;
                self.logger.record_error(&err);
                Err(err)
            }
        }
    }

    async fn build_session(&self) -> Result<Session<B::Surface, P::State, G::State>, InitError> {
        let clock = Clock::new(self.time.clone(), self.config.max_frame_delta);
        let (width, height) = self.viewport.size();

        let (mut scene, camera, surface, player_state) = {
            let mut core = self.core.borrow_mut();
            let core = &mut *core;

            let mut scene = core.backend.create_scene(&self.config.scene).map_err(InitError::Scene)?;
            let aspect = width as f32 / height as f32;
            let camera = core.backend.create_camera(&self.config.camera, aspect).map_err(InitError::Camera)?;
            let surface = core
                .backend
                .create_surface(&self.config.surface_options(width, height))
                .map_err(InitError::Surface)?;

            let ambient = core.backend.create_ambient_light(&self.config.lighting).map_err(InitError::Lighting)?;
            scene.add(SceneNode::AmbientLight(ambient));

            // flashlight is parented before the camera joins the scene
            let flashlight = core.backend.create_spot_light(&self.config.flashlight).map_err(InitError::Lighting)?;
            let camera: CameraHandle = Rc::new(RefCell::new(camera));
            camera.borrow_mut().attach(flashlight);
            scene.add(SceneNode::Camera(camera.clone()));

            let player_state = core.player.init(camera.clone()).map_err(InitError::Player)?;
            (scene, camera, surface, player_state)
        };

        let mut level = self
            .level
            .borrow_mut()
            .take()
            .ok_or_else(|| InitError::Level(anyhow::anyhow!("level was already consumed")))?;
        level.load(&mut scene).await.map_err(InitError::Level)?;
        tracing::debug!(nodes = scene.len(), "level loaded");

        let ghost_state = self.core.borrow_mut().ghost.spawn(&mut scene).map_err(InitError::Ghost)?;

        Ok(Session { clock, scene, camera, surface, player_state, ghost_state })
    }

    fn register_frame_schedule(&self) {
        if self.scheduled.replace(true) {
            tracing::warn!("frame schedule already registered");
            return;
        }
        let core = Rc::downgrade(&self.core);
        self.scheduler.borrow_mut().schedule(Box::new(move || {
            let Some(core) = core.upgrade() else {
                return FrameControl::Halt;
            };
            let mut core = core.borrow_mut();
            core.frame()
        }));
    }

    /// Leave the idle screen and start simulating. Only valid in `ReadyIdle`.
    pub fn start(&self) -> Result<(), LifecycleError> {
        let state = self.state();
        if state != LoopState::ReadyIdle {
            let err = LifecycleError { signal: "start", state };
            tracing::debug!(%err);
            return Err(err);
        }
        self.presentation.borrow_mut().dismiss_loading_screen();
        self.core.borrow_mut().state = LoopState::Running;
        self.logger.record("Game started.");
        Ok(())
    }

    /// Match camera projection and surface size to the new viewport.
    ///
    /// Ignored until the session exists and for zero-sized viewports.
    pub fn on_resize(&self, width: u32, height: u32) -> Result<(), BackendError> {
        if width == 0 || height == 0 {
            tracing::debug!(width, height, "ignoring degenerate resize");
            return Ok(());
        }
        let mut core = self.core.borrow_mut();
        let LoopCore { backend, session, .. } = &mut *core;
        let Some(session) = session.as_mut() else {
            tracing::debug!(width, height, "resize before the render surface exists");
            return Ok(());
        };

        {
            let mut camera = session.camera.borrow_mut();
            camera.set_aspect(width, height);
            camera.update_projection();
        }

        if session.surface.size() != (width, height) {
            if let Err(err) = backend.resize_surface(&mut session.surface, width, height) {
                self.logger.record_error(&err);
                return Err(err);
            }
            tracing::debug!(width, height, "surface resized");
        }
        Ok(())
    }
}
