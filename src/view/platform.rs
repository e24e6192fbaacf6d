use std::cell::Cell;
use std::rc::Rc;

/// Current size of the display area in physical pixels.
pub trait Viewport {
    fn size(&self) -> (u32, u32);
}

/// The idle/loading screen shown until the player starts.
pub trait Presentation {
    fn dismiss_loading_screen(&mut self);
}

/// Viewport whose size is pushed in by the host (window resize events).
#[derive(Clone, Debug)]
pub struct SharedViewport {
    size: Rc<Cell<(u32, u32)>>,
}

impl SharedViewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { size: Rc::new(Cell::new((width, height))) }
    }

    pub fn set(&self, width: u32, height: u32) {
        self.size.set((width, height));
    }
}

impl Viewport for SharedViewport {
    fn size(&self) -> (u32, u32) {
        self.size.get()
    }
}

/// For hosts without a loading screen; only logs the transition.
#[derive(Debug, Default)]
pub struct LogOnlyPresentation;

impl Presentation for LogOnlyPresentation {
    fn dismiss_loading_screen(&mut self) {
        tracing::debug!("loading screen dismissed");
    }
}
