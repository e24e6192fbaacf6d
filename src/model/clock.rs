use std::rc::Rc;

/// Monotonic seconds since some fixed origin.
pub trait TimeSource {
    fn now_seconds(&self) -> f64;
}

#[cfg(not(target_arch = "wasm32"))]
pub use native::InstantTime;
#[cfg(target_arch = "wasm32")]
pub use web::PerformanceTime;

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::time::Instant;

    use super::TimeSource;

    pub struct InstantTime {
        origin: Instant,
    }

    impl InstantTime {
        pub fn new() -> Self {
            Self { origin: Instant::now() }
        }
    }

    impl Default for InstantTime {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TimeSource for InstantTime {
        fn now_seconds(&self) -> f64 {
            self.origin.elapsed().as_secs_f64()
        }
    }
}

#[cfg(target_arch = "wasm32")]
mod web {
    use web_sys::Performance;

    use super::TimeSource;

    /// `performance.now()`; `std::time::Instant` panics on wasm32.
    pub struct PerformanceTime {
        performance: Performance,
    }

    impl PerformanceTime {
        pub fn new(window: &web_sys::Window) -> Option<Self> {
            window.performance().map(|performance| Self { performance })
        }
    }

    impl TimeSource for PerformanceTime {
        fn now_seconds(&self) -> f64 {
            self.performance.now() / 1000.0
        }
    }
}

/// Frame clock sampled once per frame.
///
/// The first `delta()` measures from construction. Deltas are clamped to
/// `[0, max_delta]`; a non-finite or backwards reading yields 0.
pub struct Clock {
    source: Rc<dyn TimeSource>,
    last: f64,
    max_delta: f32,
}

impl Clock {
    pub fn new(source: Rc<dyn TimeSource>, max_delta: f32) -> Self {
        let last = source.now_seconds();
        Self {
            source,
            last: if last.is_finite() { last } else { 0.0 },
            max_delta: if max_delta.is_finite() { max_delta.max(0.0) } else { f32::MAX },
        }
    }

    pub fn delta(&mut self) -> f32 {
        let now = self.source.now_seconds();
        if !now.is_finite() {
            return 0.0;
        }
        let elapsed = now - self.last;
        self.last = now.max(self.last);
        if elapsed.is_finite() && elapsed > 0.0 {
            (elapsed as f32).min(self.max_delta)
        } else {
            0.0
        }
    }
}
