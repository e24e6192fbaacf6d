//! Fakes for driving the runtime loop headlessly.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};

use anyhow::anyhow;
use glam::Vec3;

use crate::config::{
    CameraSettings, FlashlightSettings, FrameFailurePolicy, LightingSettings, RuntimeConfig, SceneSettings,
    SurfaceOptions,
};
use crate::controller::ghost::Ghost;
use crate::controller::level::{Level, GHOST_SPAWN_MARKER};
use crate::controller::player::{Locatable, Player};
use crate::controller::runtime::{Platform, RuntimeLoop};
use crate::controller::scheduler::PumpScheduler;
use crate::error::BackendError;
use crate::logging::{LogBuffer, LogLevel};
use crate::model::{AmbientLight, Camera, CameraHandle, Scene, SpotLight, TimeSource};
use crate::view::backend::{build_ambient_light, build_camera, build_scene, build_spot_light};
use crate::view::{Presentation, RenderBackend, RenderSurface, SharedViewport};

/// Time source that only moves when told to.
#[derive(Clone)]
pub struct ManualTime {
    now: Rc<Cell<f64>>,
}

impl ManualTime {
    pub fn new(start: f64) -> Self {
        Self { now: Rc::new(Cell::new(start)) }
    }

    pub fn source(&self) -> Rc<dyn TimeSource> {
        Rc::new(self.clone())
    }

    pub fn advance(&self, seconds: f64) {
        self.now.set(self.now.get() + seconds);
    }

    pub fn set(&self, seconds: f64) {
        self.now.set(seconds);
    }
}

impl TimeSource for ManualTime {
    fn now_seconds(&self) -> f64 {
        self.now.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    CreateScene,
    CreateCamera,
    CreateSurface,
    CreateAmbientLight,
    CreateSpotLight,
    PlayerInit,
    LevelLoad,
    GhostSpawn,
    PlayerUpdate,
    GhostUpdate,
    Render,
}

#[derive(Default)]
struct JournalInner {
    calls: Vec<Call>,
    player_deltas: Vec<f32>,
    surface_options: Vec<SurfaceOptions>,
    resizes: Vec<(u32, u32)>,
}

/// Ordered record of every collaborator call, shared by all fakes.
#[derive(Clone, Default)]
pub struct Journal {
    inner: Rc<RefCell<JournalInner>>,
}

impl Journal {
    pub fn push(&self, call: Call) {
        self.inner.borrow_mut().calls.push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.borrow().calls.clone()
    }

    pub fn clear(&self) {
        self.inner.borrow_mut().calls.clear();
    }

    pub fn player_deltas(&self) -> Vec<f32> {
        self.inner.borrow().player_deltas.clone()
    }

    pub fn surface_options(&self) -> Vec<SurfaceOptions> {
        self.inner.borrow().surface_options.clone()
    }

    pub fn resizes(&self) -> Vec<(u32, u32)> {
        self.inner.borrow().resizes.clone()
    }
}

#[derive(Clone, Default)]
pub struct Failures {
    surface: bool,
    resize: bool,
    render_after: Option<usize>,
    player_init: Option<&'static str>,
    player_update: Option<&'static str>,
    level: Option<&'static str>,
    ghost: Option<&'static str>,
}

pub struct FakeSurface {
    size: (u32, u32),
}

impl RenderSurface for FakeSurface {
    fn size(&self) -> (u32, u32) {
        self.size
    }
}

pub struct RecordingBackend {
    journal: Journal,
    failures: Failures,
    renders: usize,
}

impl RenderBackend for RecordingBackend {
    type Surface = FakeSurface;

    fn create_scene(&mut self, settings: &SceneSettings) -> Result<Scene, BackendError> {
        self.journal.push(Call::CreateScene);
        Ok(build_scene(settings))
    }

    fn create_camera(&mut self, settings: &CameraSettings, aspect: f32) -> Result<Camera, BackendError> {
        self.journal.push(Call::CreateCamera);
        build_camera(settings, aspect)
    }

    fn create_surface(&mut self, options: &SurfaceOptions) -> Result<FakeSurface, BackendError> {
        self.journal.push(Call::CreateSurface);
        self.journal.inner.borrow_mut().surface_options.push(options.clone());
        if self.failures.surface {
            return Err(BackendError::CanvasNotFound(options.canvas_id.clone()));
        }
        Ok(FakeSurface { size: (options.width, options.height) })
    }

    fn create_ambient_light(&mut self, settings: &LightingSettings) -> Result<AmbientLight, BackendError> {
        self.journal.push(Call::CreateAmbientLight);
        Ok(build_ambient_light(settings))
    }

    fn create_spot_light(&mut self, settings: &FlashlightSettings) -> Result<SpotLight, BackendError> {
        self.journal.push(Call::CreateSpotLight);
        Ok(build_spot_light(settings))
    }

    fn resize_surface(&mut self, surface: &mut FakeSurface, width: u32, height: u32) -> Result<(), BackendError> {
        if self.failures.resize {
            return Err(BackendError::Surface("swapchain rejected the new size".into()));
        }
        self.journal.inner.borrow_mut().resizes.push((width, height));
        surface.size = (width, height);
        Ok(())
    }

    fn render(&mut self, _surface: &mut FakeSurface, _scene: &Scene, _camera: &Camera) -> Result<(), BackendError> {
        self.journal.push(Call::Render);
        self.renders += 1;
        match self.failures.render_after {
            Some(limit) if self.renders > limit => Err(BackendError::Frame("device lost".into())),
            _ => Ok(()),
        }
    }
}

pub struct ScriptedPlayerState {
    pub camera: CameraHandle,
}

impl Locatable for ScriptedPlayerState {
    fn position(&self) -> Vec3 {
        self.camera.borrow().eye
    }
}

pub struct ScriptedPlayer {
    journal: Journal,
    fail_init: Option<&'static str>,
    fail_update: Option<&'static str>,
}

impl Player for ScriptedPlayer {
    type State = ScriptedPlayerState;

    fn init(&mut self, camera: CameraHandle) -> anyhow::Result<ScriptedPlayerState> {
        self.journal.push(Call::PlayerInit);
        if let Some(reason) = self.fail_init {
            return Err(anyhow!(reason));
        }
        Ok(ScriptedPlayerState { camera })
    }

    fn update(&mut self, delta: f32, _state: &mut ScriptedPlayerState, _scene: &mut Scene) -> anyhow::Result<()> {
        self.journal.push(Call::PlayerUpdate);
        self.journal.inner.borrow_mut().player_deltas.push(delta);
        match self.fail_update {
            Some(reason) => Err(anyhow!(reason)),
            None => Ok(()),
        }
    }
}

pub struct ScriptedGhost {
    journal: Journal,
    fail_spawn: Option<&'static str>,
}

impl<P> Ghost<P> for ScriptedGhost {
    type State = ();

    fn spawn(&mut self, _scene: &mut Scene) -> anyhow::Result<()> {
        self.journal.push(Call::GhostSpawn);
        match self.fail_spawn {
            Some(reason) => Err(anyhow!(reason)),
            None => Ok(()),
        }
    }

    fn update(&mut self, _delta: f32, _ghost: &mut (), _player: &P, _scene: &mut Scene) -> anyhow::Result<()> {
        self.journal.push(Call::GhostUpdate);
        Ok(())
    }
}

/// Pending on the first poll, ready on the second.
struct YieldOnce(bool);

impl Future for YieldOnce {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.0 {
            return Poll::Ready(());
        }
        self.0 = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

struct NoopWake;

impl Wake for NoopWake {
    fn wake(self: Arc<Self>) {}
}

/// Poll `future` exactly once, for stepping through a suspended `initialize()`.
pub fn poll_once<F: Future>(future: Pin<&mut F>) -> Poll<F::Output> {
    let waker = Waker::from(Arc::new(NoopWake));
    future.poll(&mut Context::from_waker(&waker))
}

pub struct ScriptedLevel {
    journal: Journal,
    fail: Option<&'static str>,
    yield_once: bool,
}

impl Level for ScriptedLevel {
    async fn load(&mut self, scene: &mut Scene) -> anyhow::Result<()> {
        self.journal.push(Call::LevelLoad);
        if self.yield_once {
            YieldOnce(false).await;
        }
        if let Some(reason) = self.fail {
            return Err(anyhow!(reason));
        }
        scene.add_marker(GHOST_SPAWN_MARKER, Vec3::new(0.0, 1.0, -5.0));
        Ok(())
    }
}

struct RecordingPresentation {
    dismissals: Rc<Cell<usize>>,
}

impl Presentation for RecordingPresentation {
    fn dismiss_loading_screen(&mut self) {
        self.dismissals.set(self.dismissals.get() + 1);
    }
}

pub type TestLoop = RuntimeLoop<RecordingBackend, ScriptedPlayer, ScriptedGhost, ScriptedLevel>;

/// A runtime loop wired to fakes, plus handles to observe them.
pub struct Harness {
    pub runtime: TestLoop,
    pub scheduler: PumpScheduler,
    pub journal: Journal,
    pub time: ManualTime,
    pub viewport: SharedViewport,
    pub log: Rc<LogBuffer>,
    dismissals: Rc<Cell<usize>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> HarnessBuilder {
        HarnessBuilder {
            failures: Failures::default(),
            viewport: (800, 600),
            policy: FrameFailurePolicy::default(),
            slow_level: false,
        }
    }

    pub fn presentation_dismissals(&self) -> usize {
        self.dismissals.get()
    }

    fn messages(&self, level: LogLevel) -> Vec<String> {
        self.log.entries().into_iter().filter(|e| e.level == level).map(|e| e.message).collect()
    }

    pub fn log_messages(&self) -> Vec<String> {
        self.messages(LogLevel::Info)
    }

    pub fn log_errors(&self) -> Vec<String> {
        self.messages(LogLevel::Error)
    }
}

pub struct HarnessBuilder {
    failures: Failures,
    viewport: (u32, u32),
    policy: FrameFailurePolicy,
    slow_level: bool,
}

impl HarnessBuilder {
    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = (width, height);
        self
    }

    pub fn policy(mut self, policy: FrameFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn fail_surface(mut self) -> Self {
        self.failures.surface = true;
        self
    }

    pub fn fail_resize(mut self) -> Self {
        self.failures.resize = true;
        self
    }

    /// Renders succeed `frames` times, then fail every frame.
    pub fn fail_render_after(mut self, frames: usize) -> Self {
        self.failures.render_after = Some(frames);
        self
    }

    /// The level suspends once during load before finishing.
    pub fn slow_level(mut self) -> Self {
        self.slow_level = true;
        self
    }

    pub fn fail_player_init(mut self, reason: &'static str) -> Self {
        self.failures.player_init = Some(reason);
        self
    }

    pub fn fail_player_update(mut self, reason: &'static str) -> Self {
        self.failures.player_update = Some(reason);
        self
    }

    pub fn fail_level(mut self, reason: &'static str) -> Self {
        self.failures.level = Some(reason);
        self
    }

    pub fn fail_ghost(mut self, reason: &'static str) -> Self {
        self.failures.ghost = Some(reason);
        self
    }

    pub fn build(self) -> Harness {
        let journal = Journal::default();
        let time = ManualTime::new(100.0);
        let scheduler = PumpScheduler::new();
        let viewport = SharedViewport::new(self.viewport.0, self.viewport.1);
        let log = Rc::new(LogBuffer::new(time.source()));
        let dismissals = Rc::new(Cell::new(0));

        let config = RuntimeConfig { frame_failure_policy: self.policy, ..RuntimeConfig::default() };
        let backend = RecordingBackend { journal: journal.clone(), failures: self.failures.clone(), renders: 0 };
        let player = ScriptedPlayer {
            journal: journal.clone(),
            fail_init: self.failures.player_init,
            fail_update: self.failures.player_update,
        };
        let ghost = ScriptedGhost { journal: journal.clone(), fail_spawn: self.failures.ghost };
        let level = ScriptedLevel { journal: journal.clone(), fail: self.failures.level, yield_once: self.slow_level };
        let platform = Platform {
            scheduler: Box::new(scheduler.clone()),
            viewport: Box::new(viewport.clone()),
            presentation: Box::new(RecordingPresentation { dismissals: dismissals.clone() }),
            logger: log.clone(),
            time: time.source(),
        };

        Harness {
            runtime: RuntimeLoop::new(config, backend, player, ghost, level, platform),
            scheduler,
            journal,
            time,
            viewport,
            log,
            dismissals,
        }
    }
}
