use std::cell::RefCell;
use std::rc::Rc;

/// Returned by a frame callback to keep or drop its registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameControl {
    Continue,
    Halt,
}

pub type FrameCallback = Box<dyn FnMut() -> FrameControl>;

/// Source of display-refresh callbacks.
///
/// The scheduler invokes the callback once per refresh for as long as it
/// returns `FrameControl::Continue`.
pub trait FrameScheduler {
    fn schedule(&mut self, callback: FrameCallback);
}

#[derive(Default)]
struct PumpState {
    callback: Option<FrameCallback>,
    registrations: usize,
}

/// Scheduler driven from the outside: each `pump()` is one display refresh.
///
/// Clones share the same registration, so one handle can be given to the
/// runtime loop while the owner of the event loop keeps another.
#[derive(Clone, Default)]
pub struct PumpScheduler {
    inner: Rc<RefCell<PumpState>>,
}

impl PumpScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_scheduled(&self) -> bool {
        self.inner.borrow().callback.is_some()
    }

    /// How many times `schedule` has been called.
    pub fn registrations(&self) -> usize {
        self.inner.borrow().registrations
    }

    /// Run one frame. Returns false when nothing is scheduled.
    pub fn pump(&self) -> bool {
        // taken out so the callback may touch the scheduler without a double borrow
        let Some(mut callback) = self.inner.borrow_mut().callback.take() else {
            return false;
        };
        let control = callback();
        if control == FrameControl::Continue {
            let mut inner = self.inner.borrow_mut();
            if inner.callback.is_none() {
                inner.callback = Some(callback);
            }
        }
        true
    }

    /// Run up to `frames` frames; returns how many ran.
    pub fn pump_n(&self, frames: usize) -> usize {
        (0..frames).take_while(|_| self.pump()).count()
    }
}

impl FrameScheduler for PumpScheduler {
    fn schedule(&mut self, callback: FrameCallback) {
        let mut inner = self.inner.borrow_mut();
        inner.registrations += 1;
        inner.callback = Some(callback);
    }
}
