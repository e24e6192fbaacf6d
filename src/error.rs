use thiserror::Error;

use crate::controller::LoopState;

/// Failures reported by a rendering backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("canvas `{0}` not found")]
    CanvasNotFound(String),
    #[error("surface is bound to `{bound}`, not `{requested}`")]
    CanvasMismatch { bound: String, requested: String },
    #[error("no suitable GPU adapter: {0}")]
    Adapter(String),
    #[error("failed to create surface: {0}")]
    Surface(String),
    #[error("failed to create {what}: {reason}")]
    Construction { what: &'static str, reason: String },
    #[error("frame acquisition failed: {0}")]
    Frame(String),
}

/// A signal arrived in a state that does not accept it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("`{signal}` rejected while {state}")]
pub struct LifecycleError {
    pub signal: &'static str,
    pub state: LoopState,
}

/// Anything that stops `initialize()` from reaching the ready state.
#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("scene setup failed: {0}")]
    Scene(#[source] BackendError),
    #[error("camera setup failed: {0}")]
    Camera(#[source] BackendError),
    #[error("render surface setup failed: {0}")]
    Surface(#[source] BackendError),
    #[error("lighting setup failed: {0}")]
    Lighting(#[source] BackendError),
    #[error("player init failed: {0:#}")]
    Player(#[source] anyhow::Error),
    #[error("level load failed: {0:#}")]
    Level(#[source] anyhow::Error),
    #[error("ghost spawn failed: {0:#}")]
    Ghost(#[source] anyhow::Error),
}

impl InitError {
    /// Whether this error moved the loop into `Failed`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InitError::Lifecycle(_))
    }
}

/// Errors raised inside the per-frame update/render path.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("player update failed: {0:#}")]
    Player(#[source] anyhow::Error),
    #[error("ghost update failed: {0:#}")]
    Ghost(#[source] anyhow::Error),
    #[error("render failed: {0}")]
    Render(#[source] BackendError),
}
