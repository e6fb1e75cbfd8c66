//! Analysis pipeline errors.

use smol_str::SmolStr;
use thiserror::Error;

use crate::file::PluginId;

/// Errors raised by analysis functions and the pipeline around them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// An analysis function reported a failure.
    #[error("analysis failed: {0}")]
    Failed(SmolStr),

    /// An analysis function observed the cancel flag and gave up.
    #[error("analysis cancelled")]
    Cancelled,

    /// An analysis function panicked.
    #[error("analysis panicked: {0}")]
    Panicked(SmolStr),

    /// No analysis function is registered for the plugin.
    #[error("no analysis function registered for plugin '{0}'")]
    UnregisteredPlugin(PluginId),

    /// The worker thread could not be spawned.
    #[error("failed to spawn analysis thread: {0}")]
    ThreadSpawn(SmolStr),

    /// Invalid configuration.
    #[error("invalid config: {0}")]
    InvalidConfig(SmolStr),
}

impl AnalysisError {
    /// Convenience constructor for analysis function failures.
    pub fn failed(message: impl Into<SmolStr>) -> Self {
        Self::Failed(message.into())
    }
}
