//! Connection liveness monitor.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use scriptdbg_analysis::{Clock, PeriodicTimer, PluginId};

use crate::error::SessionError;
use crate::protocol::{Heartbeat, OutboundMessage};
use crate::transport::Transport;

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(1500);
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(5);

/// Missed windows tolerated before a forced disconnect.
const MAX_MISSES: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatSettings {
    pub interval: Duration,
    pub timeout: Duration,
    /// Force a disconnect once the target stops answering.
    pub control_connection: bool,
    pub warn_on_timeout: bool,
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_HEARTBEAT_INTERVAL,
            timeout: DEFAULT_HEARTBEAT_TIMEOUT,
            control_connection: false,
            warn_on_timeout: true,
        }
    }
}

impl HeartbeatSettings {
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.interval.is_zero() {
            return Err(SessionError::InvalidConfig(
                "heartbeat.interval_ms must be greater than zero".into(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(SessionError::InvalidConfig(
                "heartbeat.timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatPhase {
    Idle,
    Active,
    /// A forced disconnect was issued; waiting for the host to report it.
    Disconnecting,
}

/// Result of one heartbeat tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not active; nothing was sent.
    Idle,
    /// Target answered within the timeout.
    Alive,
    /// Timeout elapsed; `misses` is the updated counter.
    Missed { misses: u32 },
    /// Timeout elapsed for the third window and the connection was dropped.
    Disconnected { misses: u32 },
}

#[derive(Debug)]
struct HeartbeatState {
    phase: HeartbeatPhase,
    misses: u32,
    last_receive: Duration,
    control_connection: bool,
    plugins: Vec<PluginId>,
}

struct Shared<C> {
    settings: HeartbeatSettings,
    clock: C,
    transport: Arc<dyn Transport>,
    state: Mutex<HeartbeatState>,
}

impl<C: Clock> Shared<C> {
    fn tick(&self) -> TickOutcome {
        let plugins = {
            let state = self.state.lock();
            if state.phase != HeartbeatPhase::Active {
                return TickOutcome::Idle;
            }
            state.plugins.clone()
        };

        for plugin in plugins {
            let ping = OutboundMessage::Heartbeat(Heartbeat {
                plugin_id: plugin.clone(),
            });
            if let Err(err) = self.transport.send(ping) {
                debug!(%plugin, %err, "heartbeat send failed");
            }
        }

        let (outcome, elapsed) = {
            let mut state = self.state.lock();
            if state.phase != HeartbeatPhase::Active {
                return TickOutcome::Idle;
            }
            let elapsed = self.clock.now().saturating_sub(state.last_receive);
            if elapsed <= self.settings.timeout {
                return TickOutcome::Alive;
            }
            let disconnect = state.misses >= MAX_MISSES && state.control_connection;
            state.misses += 1;
            let misses = state.misses;
            if disconnect {
                state.phase = HeartbeatPhase::Disconnecting;
                (TickOutcome::Disconnected { misses }, elapsed)
            } else {
                (TickOutcome::Missed { misses }, elapsed)
            }
        };

        if self.settings.warn_on_timeout {
            warn!(?elapsed, timeout = ?self.settings.timeout, "debug target heartbeat timed out");
        }
        if let TickOutcome::Disconnected { misses } = outcome {
            error!(misses, "debug target unresponsive; disconnecting");
            self.transport.disconnect();
        }
        outcome
    }
}

/// Sends periodic pings while connected and drops the connection after three
/// silent windows when `control_connection` is set.
pub struct HeartbeatMonitor<C: Clock + Clone> {
    shared: Arc<Shared<C>>,
    timer: Option<PeriodicTimer>,
}

impl<C: Clock + Clone> HeartbeatMonitor<C> {
    pub fn new(
        settings: HeartbeatSettings,
        clock: C,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, SessionError> {
        settings.validate()?;
        let control_connection = settings.control_connection;
        Ok(Self {
            shared: Arc::new(Shared {
                settings,
                clock,
                transport,
                state: Mutex::new(HeartbeatState {
                    phase: HeartbeatPhase::Idle,
                    misses: 0,
                    last_receive: Duration::ZERO,
                    control_connection,
                    plugins: Vec::new(),
                }),
            }),
            timer: None,
        })
    }

    pub fn settings(&self) -> &HeartbeatSettings {
        &self.shared.settings
    }

    /// Enter Active: reset the counters and start the ping timer.
    pub fn activate(&mut self, plugins: Vec<PluginId>) -> Result<(), SessionError> {
        self.stop_timer();
        {
            let mut state = self.shared.state.lock();
            state.phase = HeartbeatPhase::Active;
            state.misses = 0;
            state.last_receive = self.shared.clock.now();
            state.plugins = plugins;
        }
        let shared = Arc::clone(&self.shared);
        let timer = PeriodicTimer::spawn(
            "scriptdbg-heartbeat",
            self.shared.clock.clone(),
            self.shared.settings.interval,
            move || {
                shared.tick();
            },
        )?;
        self.timer = Some(timer);
        debug!(interval = ?self.shared.settings.interval, "heartbeat active");
        Ok(())
    }

    /// Any inbound traffic proves the target is alive.
    pub fn record_inbound(&self) {
        let mut state = self.shared.state.lock();
        state.misses = 0;
        state.last_receive = self.shared.clock.now();
    }

    /// Run one heartbeat window on the caller's thread.
    pub fn tick(&self) -> TickOutcome {
        self.shared.tick()
    }

    /// Stop the timer and return to Idle.
    pub fn deactivate(&mut self) {
        self.stop_timer();
        let mut state = self.shared.state.lock();
        state.phase = HeartbeatPhase::Idle;
        state.misses = 0;
        state.plugins.clear();
        debug!("heartbeat idle");
    }

    pub fn set_control_connection(&self, enabled: bool) {
        self.shared.state.lock().control_connection = enabled;
    }

    pub fn phase(&self) -> HeartbeatPhase {
        self.shared.state.lock().phase
    }

    pub fn misses(&self) -> u32 {
        self.shared.state.lock().misses
    }

    fn stop_timer(&mut self) {
        if let Some(mut timer) = self.timer.take() {
            timer.stop();
        }
    }
}

impl<C: Clock + Clone> Drop for HeartbeatMonitor<C> {
    fn drop(&mut self) {
        self.stop_timer();
    }
}

impl<C: Clock + Clone> std::fmt::Debug for HeartbeatMonitor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeartbeatMonitor")
            .field("settings", &self.shared.settings)
            .field("state", &*self.shared.state.lock())
            .field("timer", &self.timer)
            .finish()
    }
}
