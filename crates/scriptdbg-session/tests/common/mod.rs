#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use scriptdbg_analysis::{ManualClock, MemoryFileRegistry};
use scriptdbg_session::{DebugSession, HeartbeatSettings, RecordingTransport};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct Harness {
    pub clock: ManualClock,
    pub registry: Arc<MemoryFileRegistry>,
    pub transport: Arc<RecordingTransport>,
    pub session: DebugSession<ManualClock>,
}

/// Session over in-memory collaborators. The heartbeat timer never fires on
/// its own; tests call `tick` explicitly.
pub fn harness() -> Harness {
    init_tracing();
    let clock = ManualClock::new();
    let registry = Arc::new(MemoryFileRegistry::new("/game/assets"));
    let transport = Arc::new(RecordingTransport::new());
    let settings = HeartbeatSettings {
        interval: Duration::from_secs(3600),
        timeout: Duration::from_secs(5),
        control_connection: true,
        warn_on_timeout: true,
    };
    let session = DebugSession::new(settings, clock.clone(), registry.clone(), transport.clone())
        .expect("session");
    Harness {
        clock,
        registry,
        transport,
        session,
    }
}
