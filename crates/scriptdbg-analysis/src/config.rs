//! Analysis pipeline settings.

use std::time::Duration;

use smol_str::SmolStr;

use crate::batch::{default_flush_threshold, DEFAULT_TICK_INTERVAL};
use crate::error::AnalysisError;
use crate::function::Verbosity;
use crate::worker::{WorkerOptions, DEFAULT_POLL_INTERVAL, DEFAULT_STOP_TIMEOUT};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisSettings {
    pub enabled: bool,
    pub verbosity: Verbosity,
    /// Debounce tick; a batch flushes once no file was added for this long.
    pub tick_interval: Duration,
    /// Maximum files flushed per tick.
    pub flush_threshold: usize,
    pub poll_interval: Duration,
    /// `None` waits for the worker thread without bound.
    pub stop_timeout: Option<Duration>,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            verbosity: Verbosity::default(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            flush_threshold: default_flush_threshold(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            stop_timeout: Some(DEFAULT_STOP_TIMEOUT),
        }
    }
}

impl AnalysisSettings {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.tick_interval.is_zero() {
            return Err(AnalysisError::InvalidConfig(
                "analysis.tick_interval_ms must be greater than zero".into(),
            ));
        }
        if self.flush_threshold == 0 {
            return Err(AnalysisError::InvalidConfig(
                "analysis.flush_threshold must be greater than zero".into(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(AnalysisError::InvalidConfig(
                "analysis.poll_interval_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn worker_options(&self, name: &SmolStr) -> WorkerOptions {
        WorkerOptions {
            name: name.clone(),
            verbosity: self.verbosity,
            poll_interval: self.poll_interval,
            stop_timeout: self.stop_timeout,
        }
    }
}
