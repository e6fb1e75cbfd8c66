//! Connection coordinator.

use std::sync::Arc;

use tracing::{debug, info};

use scriptdbg_analysis::{Clock, FileHandle, FileRegistry, PluginId};

use crate::breakpoints::{BreakpointEvent, BreakpointStore, BreakpointSyncPolicy, SyncReport};
use crate::error::SessionError;
use crate::heartbeat::{HeartbeatMonitor, HeartbeatSettings};
use crate::protocol::{EditAndContinue, InboundMessage, OutboundMessage};
use crate::transport::Transport;

/// Language plugin announced by the target when it becomes ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    pub id: PluginId,
    /// Hard breakpoint limit; `None` is unlimited.
    pub max_breakpoints: Option<usize>,
}

impl PluginInfo {
    pub fn new(id: impl Into<PluginId>) -> Self {
        Self {
            id: id.into(),
            max_breakpoints: None,
        }
    }

    #[must_use]
    pub fn with_max_breakpoints(mut self, max: usize) -> Self {
        self.max_breakpoints = Some(max);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Wires the transport, breakpoint policy and heartbeat to connection events.
///
/// Everything except the heartbeat timer runs on the caller's thread.
pub struct DebugSession<C: Clock + Clone> {
    registry: Arc<dyn FileRegistry>,
    transport: Arc<dyn Transport>,
    breakpoints: Arc<BreakpointSyncPolicy>,
    heartbeat: HeartbeatMonitor<C>,
    state: ConnectionState,
    plugins: Vec<PluginId>,
}

impl<C: Clock + Clone> DebugSession<C> {
    pub fn new(
        heartbeat: HeartbeatSettings,
        clock: C,
        registry: Arc<dyn FileRegistry>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, SessionError> {
        let breakpoints = Arc::new(BreakpointSyncPolicy::new(
            registry.asset_root(),
            Arc::clone(&transport),
        ));
        let heartbeat = HeartbeatMonitor::new(heartbeat, clock, Arc::clone(&transport))?;
        Ok(Self {
            registry,
            transport,
            breakpoints,
            heartbeat,
            state: ConnectionState::Disconnected,
            plugins: Vec::new(),
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn plugins(&self) -> &[PluginId] {
        &self.plugins
    }

    pub fn registry(&self) -> &Arc<dyn FileRegistry> {
        &self.registry
    }

    pub fn heartbeat(&self) -> &HeartbeatMonitor<C> {
        &self.heartbeat
    }

    /// Shared so a host store can report removals during capacity eviction.
    pub fn breakpoints(&self) -> &Arc<BreakpointSyncPolicy> {
        &self.breakpoints
    }

    /// Target reported its plugins: apply capacities, start the heartbeat and
    /// push every enabled breakpoint. Also used on reconnect.
    pub fn on_ready(
        &mut self,
        plugins: &[PluginInfo],
        store: &mut dyn BreakpointStore,
    ) -> Result<SyncReport, SessionError> {
        for plugin in plugins {
            match plugin.max_breakpoints {
                Some(max) => self.breakpoints.set_capacity(plugin.id.clone(), max),
                None => self.breakpoints.clear_capacity(&plugin.id),
            }
        }
        self.plugins = plugins.iter().map(|plugin| plugin.id.clone()).collect();
        self.state = ConnectionState::Connected;
        info!(plugins = self.plugins.len(), "debug target ready");
        self.heartbeat.activate(self.plugins.clone())?;
        self.breakpoints.synchronize(store)
    }

    /// Any inbound message counts as a heartbeat answer.
    pub fn on_message(&self, message: &InboundMessage) {
        if !self.is_connected() {
            return;
        }
        self.heartbeat.record_inbound();
        if let InboundMessage::Unknown = message {
            debug!("ignoring unknown inbound message");
        }
    }

    pub fn on_disconnected(&mut self) {
        if !self.is_connected() {
            return;
        }
        self.heartbeat.deactivate();
        self.state = ConnectionState::Disconnected;
        self.plugins.clear();
        info!("debug target disconnected");
    }

    /// Forward a store notification. Nothing is sent while disconnected; the
    /// next `on_ready` resynchronises the full list.
    pub fn on_breakpoint_event(&self, event: &BreakpointEvent) -> Result<bool, SessionError> {
        if !self.is_connected() {
            return Ok(false);
        }
        self.breakpoints.handle_event(event)
    }

    /// Ask the target to reload a saved script. Returns whether a message was
    /// sent.
    pub fn on_file_saved(&self, file: &FileHandle) -> Result<bool, SessionError> {
        if !self.is_connected() || !self.plugins.contains(file.plugin()) {
            return Ok(false);
        }
        let message = OutboundMessage::EditAndContinue(EditAndContinue {
            language_id: file.plugin().clone(),
            relative_path: file.relative_path(self.breakpoints.asset_root()),
        });
        self.transport.send(message)?;
        debug!(file = %file.id(), "edit and continue requested");
        Ok(true)
    }
}

impl<C: Clock + Clone> std::fmt::Debug for DebugSession<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugSession")
            .field("state", &self.state)
            .field("plugins", &self.plugins)
            .field("breakpoints", &self.breakpoints)
            .field("heartbeat", &self.heartbeat)
            .finish_non_exhaustive()
    }
}
