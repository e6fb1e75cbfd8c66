//! Breakpoint model and the policy deciding what reaches the debug target.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use smol_str::SmolStr;
use tracing::{debug, info, warn};

use scriptdbg_analysis::{AnalysisEntry, AnalysisService, Clock, FileHandle, PluginId};

use crate::error::SessionError;
use crate::protocol::{BreakpointDetails, OutboundMessage};
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BreakpointId(pub u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointRecord {
    pub id: BreakpointId,
    pub file: FileHandle,
    pub line: u32,
    pub enabled: bool,
    pub condition: SmolStr,
    pub condition_enabled: bool,
    pub expected_condition_result: bool,
    pub use_function_environment: bool,
}

impl BreakpointRecord {
    /// Enabled breakpoint without a condition.
    pub fn new(id: BreakpointId, file: FileHandle, line: u32) -> Self {
        Self {
            id,
            file,
            line,
            enabled: true,
            condition: SmolStr::default(),
            condition_enabled: false,
            expected_condition_result: true,
            use_function_environment: false,
        }
    }

    pub fn plugin(&self) -> &PluginId {
        self.file.plugin()
    }

    /// Condition text as transmitted: empty unless enabled and non-blank.
    pub fn effective_condition(&self) -> &str {
        if self.condition_enabled && !self.condition.trim().is_empty() {
            self.condition.as_str()
        } else {
            ""
        }
    }
}

/// Which attribute of a breakpoint is changing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Condition,
    LineNumber,
    ConditionEnabled,
    ConditionDisabled,
    ConditionResultTrue,
    ConditionResultFalse,
    UseFunctionEnvironmentTrue,
    UseFunctionEnvironmentFalse,
    Enabled,
    Disabled,
}

impl ChangeKind {
    /// Toggling `enabled` is never transmitted as a change. The store reports
    /// it through `Added`/`Removing` instead, since the target only knows
    /// about enabled breakpoints.
    pub fn is_transmitted(self) -> bool {
        !matches!(self, ChangeKind::Enabled | ChangeKind::Disabled)
    }
}

/// Store notification. `Changing` carries the old state, `Changed` the new.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakpointEvent {
    Added(BreakpointRecord),
    Changing(BreakpointRecord, ChangeKind),
    Changed(BreakpointRecord, ChangeKind),
    Removing(BreakpointRecord),
}

/// Owner of the breakpoint list.
pub trait BreakpointStore {
    /// All breakpoints in store order.
    fn breakpoints(&self) -> Vec<BreakpointRecord>;

    /// Remove on behalf of capacity eviction. Stores that notify observers on
    /// every removal may still raise `Removing`; the policy ignores those
    /// while it is evicting.
    fn remove_silently(&mut self, id: BreakpointId) -> Option<BreakpointRecord>;
}

/// Vec-backed store. Mutators return the events a real store would raise.
#[derive(Debug, Default)]
pub struct MemoryBreakpointStore {
    records: Vec<BreakpointRecord>,
    next_id: u32,
}

impl MemoryBreakpointStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: BreakpointId) -> Option<&BreakpointRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    /// Add an enabled, unconditional breakpoint.
    pub fn add(&mut self, file: FileHandle, line: u32) -> BreakpointEvent {
        self.next_id += 1;
        let record = BreakpointRecord::new(BreakpointId(self.next_id), file, line);
        self.records.push(record.clone());
        BreakpointEvent::Added(record)
    }

    /// Apply `kind` to the breakpoint.
    ///
    /// Returns `Changing` and `Changed`. When the enabled flag flips, a
    /// `Removing` of the old state (disable) or an `Added` of the new state
    /// (enable) is reported as well.
    pub fn change(
        &mut self,
        id: BreakpointId,
        kind: ChangeKind,
        mutate: impl FnOnce(&mut BreakpointRecord),
    ) -> Option<Vec<BreakpointEvent>> {
        let record = self.records.iter_mut().find(|record| record.id == id)?;
        let before = record.clone();
        mutate(record);
        match kind {
            ChangeKind::ConditionEnabled => record.condition_enabled = true,
            ChangeKind::ConditionDisabled => record.condition_enabled = false,
            ChangeKind::ConditionResultTrue => record.expected_condition_result = true,
            ChangeKind::ConditionResultFalse => record.expected_condition_result = false,
            ChangeKind::UseFunctionEnvironmentTrue => record.use_function_environment = true,
            ChangeKind::UseFunctionEnvironmentFalse => record.use_function_environment = false,
            ChangeKind::Enabled => record.enabled = true,
            ChangeKind::Disabled => record.enabled = false,
            ChangeKind::Condition | ChangeKind::LineNumber => {}
        }
        let after = record.clone();
        let mut events = vec![BreakpointEvent::Changing(before.clone(), kind)];
        match (before.enabled, after.enabled) {
            (true, false) => {
                events.push(BreakpointEvent::Removing(before));
                events.push(BreakpointEvent::Changed(after, kind));
            }
            (false, true) => {
                events.push(BreakpointEvent::Changed(after.clone(), kind));
                events.push(BreakpointEvent::Added(after));
            }
            _ => events.push(BreakpointEvent::Changed(after, kind)),
        }
        Some(events)
    }

    pub fn remove(&mut self, id: BreakpointId) -> Option<BreakpointEvent> {
        let index = self.records.iter().position(|record| record.id == id)?;
        Some(BreakpointEvent::Removing(self.records.remove(index)))
    }
}

impl BreakpointStore for MemoryBreakpointStore {
    fn breakpoints(&self) -> Vec<BreakpointRecord> {
        self.records.clone()
    }

    fn remove_silently(&mut self, id: BreakpointId) -> Option<BreakpointRecord> {
        let index = self.records.iter().position(|record| record.id == id)?;
        Some(self.records.remove(index))
    }
}

/// Outcome of a full resynchronisation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub evicted: Vec<BreakpointId>,
    pub sent: usize,
}

/// Decides which breakpoint mutations are transmitted and enforces the
/// per-plugin breakpoint capacity.
///
/// Methods take `&self` so the policy can be shared with a store that
/// reports removals back while [`enforce_capacity`](Self::enforce_capacity)
/// is running.
pub struct BreakpointSyncPolicy {
    asset_root: PathBuf,
    transport: Arc<dyn Transport>,
    capacities: Mutex<IndexMap<PluginId, usize>>,
    evicting: AtomicBool,
}

/// Raises the eviction flag for its lifetime.
struct EvictionGuard<'a>(&'a AtomicBool);

impl<'a> EvictionGuard<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for EvictionGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl BreakpointSyncPolicy {
    pub fn new(asset_root: impl Into<PathBuf>, transport: Arc<dyn Transport>) -> Self {
        Self {
            asset_root: asset_root.into(),
            transport,
            capacities: Mutex::new(IndexMap::new()),
            evicting: AtomicBool::new(false),
        }
    }

    pub fn asset_root(&self) -> &Path {
        &self.asset_root
    }

    /// Limit `plugin` to `max` breakpoints. Plugins without a capacity are
    /// unlimited.
    pub fn set_capacity(&self, plugin: PluginId, max: usize) {
        self.capacities.lock().insert(plugin, max);
    }

    pub fn clear_capacity(&self, plugin: &PluginId) {
        self.capacities.lock().shift_remove(plugin);
    }

    pub fn capacity(&self, plugin: &PluginId) -> Option<usize> {
        self.capacities.lock().get(plugin).copied()
    }

    pub fn is_evicting(&self) -> bool {
        self.evicting.load(Ordering::SeqCst)
    }

    /// Evict over-capacity breakpoints, then transmit every enabled one.
    ///
    /// Run on plugins-ready and on every reconnect. Sending stops at the
    /// first transport failure.
    pub fn synchronize(
        &self,
        store: &mut dyn BreakpointStore,
    ) -> Result<SyncReport, SessionError> {
        let evicted = self.enforce_capacity(store);
        let mut sent = 0;
        for record in store.breakpoints() {
            if record.enabled {
                self.send(OutboundMessage::AddBreakpoint(self.details(&record)))?;
                sent += 1;
            }
        }
        debug!(sent, evicted = evicted.len(), "breakpoints synchronized");
        Ok(SyncReport { evicted, sent })
    }

    /// Remove the tail of each over-capacity plugin's list without emitting
    /// removal messages.
    pub fn enforce_capacity(&self, store: &mut dyn BreakpointStore) -> Vec<BreakpointId> {
        let capacities = self.capacities.lock().clone();
        let mut by_plugin: IndexMap<PluginId, Vec<BreakpointId>> = IndexMap::new();
        for record in store.breakpoints() {
            by_plugin
                .entry(record.plugin().clone())
                .or_default()
                .push(record.id);
        }

        let mut evicted = Vec::new();
        let _guard = EvictionGuard::raise(&self.evicting);
        for (plugin, ids) in &by_plugin {
            let Some(&max) = capacities.get(plugin) else {
                continue;
            };
            if ids.len() <= max {
                continue;
            }
            let excess = ids.len() - max;
            info!(
                %plugin,
                count = ids.len(),
                max,
                excess,
                "breakpoint capacity exceeded; removing newest breakpoints"
            );
            for id in ids.iter().rev().take(excess) {
                if store.remove_silently(*id).is_some() {
                    evicted.push(*id);
                }
            }
        }
        evicted
    }

    /// Transmit whatever `event` requires. Returns whether a message was sent.
    pub fn handle_event(&self, event: &BreakpointEvent) -> Result<bool, SessionError> {
        let message = match event {
            BreakpointEvent::Added(record) if record.enabled => {
                OutboundMessage::AddBreakpoint(self.details(record))
            }
            BreakpointEvent::Changing(record, kind)
                if kind.is_transmitted() && record.enabled =>
            {
                OutboundMessage::RemoveBreakpoint(self.details(record))
            }
            BreakpointEvent::Changed(record, kind) if kind.is_transmitted() && record.enabled => {
                OutboundMessage::AddBreakpoint(self.details(record))
            }
            BreakpointEvent::Removing(record) if record.enabled && !self.is_evicting() => {
                OutboundMessage::RemoveBreakpoint(self.details(record))
            }
            _ => return Ok(false),
        };
        self.send(message)?;
        Ok(true)
    }

    /// Wire payload for `record`.
    pub fn details(&self, record: &BreakpointRecord) -> BreakpointDetails {
        BreakpointDetails {
            language_id: record.plugin().clone(),
            relative_path: record.file.relative_path(&self.asset_root),
            line: record.line,
            condition: record.effective_condition().to_string(),
            expected_result: record.expected_condition_result,
            use_function_env: record.use_function_environment,
        }
    }

    fn send(&self, message: OutboundMessage) -> Result<(), SessionError> {
        self.transport.send(message).map_err(|err| {
            warn!(%err, "failed to send breakpoint update");
            err
        })
    }
}

impl std::fmt::Debug for BreakpointSyncPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakpointSyncPolicy")
            .field("asset_root", &self.asset_root)
            .field("capacities", &self.capacities)
            .field("evicting", &self.is_evicting())
            .finish_non_exhaustive()
    }
}

/// Validate a breakpoint condition with the plugin's string analysis.
///
/// Breakpoints without an effective condition yield no diagnostics.
pub fn check_condition<C: Clock + Clone>(
    service: &AnalysisService<C>,
    record: &BreakpointRecord,
) -> Result<Vec<AnalysisEntry>, SessionError> {
    let condition = record.effective_condition();
    if condition.is_empty() {
        return Ok(Vec::new());
    }
    Ok(service.analyze_string(record.plugin(), condition)?)
}
