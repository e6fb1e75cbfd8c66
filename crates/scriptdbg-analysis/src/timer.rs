//! Thread-backed periodic timer.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;

use crate::clock::{Clock, StopSignal};
use crate::error::AnalysisError;

/// Invokes a callback every `interval` on a dedicated thread until stopped.
pub struct PeriodicTimer {
    name: String,
    stop: StopSignal,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTimer {
    pub fn spawn<C, F>(
        name: impl Into<String>,
        clock: C,
        interval: Duration,
        mut callback: F,
    ) -> Result<Self, AnalysisError>
    where
        C: Clock,
        F: FnMut() + Send + 'static,
    {
        let name = name.into();
        let stop = StopSignal::new();
        let signal = stop.clone();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                while clock.wait(interval, &signal) {
                    callback();
                }
            })
            .map_err(|err| AnalysisError::ThreadSpawn(err.to_string().into()))?;
        debug!(timer = %name, ?interval, "timer started");
        Ok(Self {
            name,
            stop,
            handle: Some(handle),
        })
    }

    /// Stop the timer and wait for an in-flight callback to finish.
    pub fn stop(&mut self) {
        self.stop.raise();
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == thread::current().id() {
                // Stopped from inside the callback; the loop exits on its own.
                return;
            }
            let _ = handle.join();
            debug!(timer = %self.name, "timer stopped");
        }
    }
}

impl std::fmt::Debug for PeriodicTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicTimer")
            .field("name", &self.name)
            .field("stopped", &self.stop.is_raised())
            .finish_non_exhaustive()
    }
}

impl Drop for PeriodicTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
