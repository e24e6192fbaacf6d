// VIEW: Rendering backends and host presentation
pub mod backend;
pub mod gpu_init;
pub mod mesh;
pub mod platform;
pub mod render;
#[cfg(target_arch = "wasm32")]
pub mod dom;

pub use backend::{RenderBackend, RenderSurface};
pub use gpu_init::GpuContext;
pub use platform::{LogOnlyPresentation, Presentation, SharedViewport, Viewport};
pub use render::{WgpuBackend, WgpuSurface};
