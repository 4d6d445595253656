use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Snapshot of one stage's counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PixelSourceStats {
    /// Stage name.
    pub name: String,
    /// `fill_region` invocations.
    pub calls: u64,
    /// Pixels produced.
    pub pixels: u64,
    /// Time spent in the stage, excluding upstream pulls.
    pub elapsed: Duration,
}

impl fmt::Display for PixelSourceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: Calls={}, Pixels={}, Time={:.2}ms",
            self.name,
            self.calls,
            self.pixels,
            self.elapsed.as_secs_f64() * 1000.0
        )
    }
}

#[derive(Default)]
struct ProfileState {
    calls: u64,
    pixels: u64,
    elapsed: Duration,
    running_since: Option<Instant>,
}

/// Per-stage instrumentation with a pausable clock.
///
/// A stage's clock runs from [`start`](Self::start) to [`stop`](Self::stop); its upstream link
/// pauses it around every pull so only the stage's own work is counted.
pub struct SourceProfiler {
    name: String,
    state: Mutex<ProfileState>,
}

impl SourceProfiler {
    /// Profiler for a stage called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(ProfileState::default()),
        }
    }

    /// Stage name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn start(&self) {
        self.lock().running_since = Some(Instant::now());
    }

    pub(crate) fn pause(&self) {
        let mut st = self.lock();
        if let Some(since) = st.running_since.take() {
            st.elapsed += since.elapsed();
        }
    }

    pub(crate) fn resume(&self) {
        let mut st = self.lock();
        if st.running_since.is_none() {
            st.running_since = Some(Instant::now());
        }
    }

    pub(crate) fn stop(&self, pixels: u64) {
        let mut st = self.lock();
        if let Some(since) = st.running_since.take() {
            st.elapsed += since.elapsed();
        }
        st.calls += 1;
        st.pixels += pixels;
    }

    /// Current counters.
    pub fn stats(&self) -> PixelSourceStats {
        let st = self.lock();
        PixelSourceStats {
            name: self.name.clone(),
            calls: st.calls,
            pixels: st.pixels,
            elapsed: st.elapsed,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProfileState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for SourceProfiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceProfiler")
            .field("name", &self.name)
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/profiler.rs"]
mod tests;
