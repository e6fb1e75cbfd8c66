//! Session errors.

use smol_str::SmolStr;
use thiserror::Error;

use scriptdbg_analysis::AnalysisError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The transport rejected or failed to deliver a message.
    #[error("transport error: {0}")]
    Transport(SmolStr),

    /// A message could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(SmolStr),

    /// Invalid configuration.
    #[error("invalid config: {0}")]
    InvalidConfig(SmolStr),

    /// Configuration file could not be read.
    #[error("io error: {0}")]
    Io(SmolStr),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}
