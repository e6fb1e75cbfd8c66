//! Analysis function signatures and the values passed through them.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::entry::AnalysisEntry;
use crate::error::AnalysisError;
use crate::file::FileHandle;

/// How much detail an analysis function should report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    Off,
    #[default]
    Overall,
    Detailed,
    Full,
}

impl Verbosity {
    pub fn parse(text: &str) -> Result<Self, AnalysisError> {
        match text.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "overall" => Ok(Self::Overall),
            "detailed" => Ok(Self::Detailed),
            "full" => Ok(Self::Full),
            _ => Err(AnalysisError::InvalidConfig(
                format!("invalid analysis.verbosity '{text}'").into(),
            )),
        }
    }
}

/// Opaque value handed back unchanged to analysis functions and listeners.
#[derive(Clone, Default)]
pub struct UserData(Option<Arc<dyn Any + Send + Sync>>);

impl UserData {
    #[must_use]
    pub fn none() -> Self {
        Self(None)
    }

    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Some(Arc::new(value)))
    }

    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_deref().and_then(|value| value.downcast_ref())
    }

    #[must_use]
    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }
}

impl fmt::Debug for UserData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => f.write_str("UserData(..)"),
            None => f.write_str("UserData(None)"),
        }
    }
}

/// Cooperative cancellation flag shared with running analysis functions.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once cancellation was requested, for use with `?`.
    pub fn check(&self) -> Result<(), AnalysisError> {
        if self.is_cancelled() {
            Err(AnalysisError::Cancelled)
        } else {
            Ok(())
        }
    }
}

pub type AnalysisOutcome = Result<Vec<AnalysisEntry>, AnalysisError>;

/// Batch analysis over files owned by one plugin.
pub type FilesAnalysisFn =
    Arc<dyn Fn(&[FileHandle], Verbosity, &UserData, &CancelToken) -> AnalysisOutcome + Send + Sync>;

/// One-off analysis of a text snippet.
pub type StringAnalysisFn = Arc<dyn Fn(&str, Verbosity, &UserData) -> AnalysisOutcome + Send + Sync>;

/// Wrap a closure as a [`FilesAnalysisFn`].
pub fn files_analysis_fn<F>(function: F) -> FilesAnalysisFn
where
    F: Fn(&[FileHandle], Verbosity, &UserData, &CancelToken) -> AnalysisOutcome
        + Send
        + Sync
        + 'static,
{
    Arc::new(function)
}

/// Wrap a closure as a [`StringAnalysisFn`].
pub fn string_analysis_fn<F>(function: F) -> StringAnalysisFn
where
    F: Fn(&str, Verbosity, &UserData) -> AnalysisOutcome + Send + Sync + 'static,
{
    Arc::new(function)
}
