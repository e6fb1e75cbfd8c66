//! Debug-target session plumbing: breakpoint synchronisation, heartbeat
//! liveness and the wire payloads exchanged with the target.

mod breakpoints;
mod config;
mod error;
mod heartbeat;
mod protocol;
mod session;
mod transport;

pub use breakpoints::{
    check_condition, BreakpointEvent, BreakpointId, BreakpointRecord, BreakpointStore,
    BreakpointSyncPolicy, ChangeKind, MemoryBreakpointStore, SyncReport,
};
pub use config::{DebuggerSettings, CONFIG_FILE_NAME};
pub use error::SessionError;
pub use heartbeat::{
    HeartbeatMonitor, HeartbeatPhase, HeartbeatSettings, TickOutcome, DEFAULT_HEARTBEAT_INTERVAL,
    DEFAULT_HEARTBEAT_TIMEOUT,
};
pub use protocol::{
    BreakpointDetails, BreakpointHitBody, EditAndContinue, Heartbeat, InboundMessage,
    OutboundMessage, OutputBody,
};
pub use session::{ConnectionState, DebugSession, PluginInfo};
pub use transport::{RecordingTransport, Transport};
