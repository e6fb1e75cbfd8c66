//! One analysis pipeline: collector, dispatcher, worker and result delivery.
//!
//! A host typically runs one service per analysis kind (for example a syntax
//! checker and a language parser). Results computed on the worker thread are
//! buffered until the owner calls [`AnalysisService::pump`], so listeners
//! always run on the owner's thread.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use smol_str::SmolStr;
use tracing::{debug, info};

use crate::batch::BatchCollector;
use crate::clock::Clock;
use crate::config::AnalysisSettings;
use crate::dispatch::{AnalysisDispatcher, WorkQueue};
use crate::entry::AnalysisEntry;
use crate::error::AnalysisError;
use crate::events::{ListenerId, Listeners};
use crate::file::{FileHandle, PluginId};
use crate::function::{FilesAnalysisFn, StringAnalysisFn, UserData};
use crate::timer::PeriodicTimer;
use crate::worker::{AnalysisFinished, AnalysisWorker, WorkerState};

/// Project notifications that feed the pipeline.
#[derive(Debug, Clone)]
pub enum ProjectEvent {
    Opened(Vec<FileHandle>),
    FileAdded(FileHandle),
    FileSaved(FileHandle),
    Closed,
}

#[derive(Debug)]
struct Pipeline<C: Clock> {
    collector: BatchCollector<C>,
    dispatcher: AnalysisDispatcher,
}

impl<C: Clock> Pipeline<C> {
    fn tick(&self) -> bool {
        match self.collector.tick() {
            Some(files) => self.dispatcher.enqueue(&files),
            None => false,
        }
    }
}

#[derive(Clone)]
struct StringRegistration {
    function: StringAnalysisFn,
    user_data: UserData,
}

pub struct AnalysisService<C: Clock + Clone> {
    name: SmolStr,
    settings: AnalysisSettings,
    clock: C,
    pipeline: Arc<Pipeline<C>>,
    worker: AnalysisWorker,
    finished: Receiver<AnalysisFinished>,
    listeners: Listeners<AnalysisFinished>,
    string_functions: IndexMap<PluginId, StringRegistration>,
    batch_timer: Option<PeriodicTimer>,
}

impl<C: Clock + Clone> AnalysisService<C> {
    pub fn new(
        name: impl Into<SmolStr>,
        settings: AnalysisSettings,
        clock: C,
    ) -> Result<Self, AnalysisError> {
        settings.validate()?;
        let name = name.into();
        let queue = WorkQueue::new();
        let (results_tx, results_rx) = mpsc::channel();
        let pipeline = Arc::new(Pipeline {
            collector: BatchCollector::new(
                clock.clone(),
                settings.tick_interval,
                settings.flush_threshold,
            ),
            dispatcher: AnalysisDispatcher::new(queue.clone()),
        });
        let worker = AnalysisWorker::new(settings.worker_options(&name), queue, results_tx);
        Ok(Self {
            name,
            settings,
            clock,
            pipeline,
            worker,
            finished: results_rx,
            listeners: Listeners::new(),
            string_functions: IndexMap::new(),
            batch_timer: None,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    pub fn register_files_analysis_function(
        &self,
        plugin: PluginId,
        function: FilesAnalysisFn,
        user_data: UserData,
    ) -> bool {
        self.pipeline
            .dispatcher
            .register_files_analysis_function(plugin, function, user_data)
    }

    /// Register the one-off text analysis for `plugin`; duplicates are ignored.
    pub fn register_string_analysis_function(
        &mut self,
        plugin: PluginId,
        function: StringAnalysisFn,
        user_data: UserData,
    ) -> bool {
        if self.string_functions.contains_key(&plugin) {
            debug!(service = %self.name, %plugin, "string analysis function already registered");
            return false;
        }
        self.string_functions.insert(
            plugin,
            StringRegistration {
                function,
                user_data,
            },
        );
        true
    }

    /// Run the string analysis for `plugin` synchronously on the caller.
    pub fn analyze_string(
        &self,
        plugin: &PluginId,
        text: &str,
    ) -> Result<Vec<AnalysisEntry>, AnalysisError> {
        let registration = self
            .string_functions
            .get(plugin)
            .ok_or_else(|| AnalysisError::UnregisteredPlugin(plugin.clone()))?;
        (registration.function)(text, self.settings.verbosity, &registration.user_data)
    }

    /// Start the worker and the batch timer. No-op while disabled.
    pub fn start(&mut self) -> Result<(), AnalysisError> {
        if !self.settings.enabled {
            debug!(service = %self.name, "analysis disabled; not starting");
            return Ok(());
        }
        self.stop_batch_timer();
        self.worker.start()?;
        let pipeline = Arc::clone(&self.pipeline);
        self.batch_timer = Some(PeriodicTimer::spawn(
            format!("{}-batch", self.name),
            self.clock.clone(),
            self.settings.tick_interval,
            move || {
                pipeline.tick();
            },
        )?);
        info!(service = %self.name, "analysis service started");
        Ok(())
    }

    pub fn stop(&mut self) {
        self.stop_batch_timer();
        self.worker.stop();
    }

    fn stop_batch_timer(&mut self) {
        if let Some(mut timer) = self.batch_timer.take() {
            timer.stop();
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker.state() == WorkerState::Running
    }

    #[must_use]
    pub fn worker_state(&self) -> WorkerState {
        self.worker.state()
    }

    /// Toggle analysis; disabling stops the worker and drops pending work.
    pub fn set_enabled(&mut self, enabled: bool) -> Result<(), AnalysisError> {
        if self.settings.enabled == enabled {
            return Ok(());
        }
        self.settings.enabled = enabled;
        if enabled {
            self.start()
        } else {
            self.stop();
            self.clear();
            Ok(())
        }
    }

    pub fn add_files<I>(&self, files: I)
    where
        I: IntoIterator<Item = FileHandle>,
    {
        if self.settings.enabled {
            self.pipeline.collector.add_files(files);
        }
    }

    pub fn handle_project_event(&self, event: ProjectEvent) {
        match event {
            ProjectEvent::Opened(files) => self.add_files(files),
            ProjectEvent::FileAdded(file) | ProjectEvent::FileSaved(file) => {
                self.add_files(std::iter::once(file));
            }
            ProjectEvent::Closed => self.clear(),
        }
    }

    /// Run one debounce tick on the caller; `true` if a request was queued.
    pub fn tick(&self) -> bool {
        self.pipeline.tick()
    }

    /// Drop pending files and queued requests.
    pub fn clear(&self) {
        self.pipeline.collector.clear();
        self.pipeline.dispatcher.queue().clear();
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pipeline.collector.pending_len()
    }

    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.pipeline.dispatcher.queue().len()
    }

    pub fn subscribe<F>(&mut self, callback: F) -> ListenerId
    where
        F: FnMut(&AnalysisFinished) + Send + 'static,
    {
        self.listeners.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// Deliver every buffered result to the listeners; returns the count.
    pub fn pump(&mut self) -> usize {
        let mut delivered = 0;
        while let Ok(finished) = self.finished.try_recv() {
            self.deliver(&finished);
            delivered += 1;
        }
        delivered
    }

    /// Like [`pump`](Self::pump), but waits up to `timeout` for the first result.
    pub fn pump_timeout(&mut self, timeout: Duration) -> usize {
        match self.finished.recv_timeout(timeout) {
            Ok(finished) => {
                self.deliver(&finished);
                1 + self.pump()
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => 0,
        }
    }

    fn deliver(&mut self, finished: &AnalysisFinished) {
        debug!(
            service = %self.name,
            plugin = %finished.plugin,
            files = finished.results.len(),
            "analysis finished"
        );
        self.listeners.emit(finished);
    }
}

impl<C: Clock + Clone> Drop for AnalysisService<C> {
    fn drop(&mut self) {
        self.stop();
        self.listeners.clear();
    }
}

impl<C: Clock + Clone> std::fmt::Debug for AnalysisService<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisService")
            .field("name", &self.name)
            .field("enabled", &self.settings.enabled)
            .field("worker", &self.worker.state())
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::clock::StdClock;
    use crate::entry::Severity;
    use crate::file::{FileId, FileRegistry, MemoryFileRegistry};
    use crate::function::{files_analysis_fn, string_analysis_fn};

    fn fast_settings() -> AnalysisSettings {
        AnalysisSettings {
            tick_interval: Duration::from_millis(5),
            poll_interval: Duration::from_millis(2),
            ..AnalysisSettings::default()
        }
    }

    #[test]
    fn saved_files_flow_to_listeners() {
        let registry = MemoryFileRegistry::new("/project");
        let script = registry.add("main.lua", "lua");

        let mut service = AnalysisService::new("syntax", fast_settings(), StdClock::new()).unwrap();
        service.register_files_analysis_function(
            "lua".into(),
            files_analysis_fn(|files, _, _, _| {
                Ok(files
                    .iter()
                    .map(|file| AnalysisEntry::error(file, 4, "'end' expected"))
                    .collect())
            }),
            UserData::new("syntax-check"),
        );
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            service.subscribe(move |finished| {
                seen.lock().unwrap().push(finished.results.clone());
            });
        }
        service.start().unwrap();
        service.handle_project_event(ProjectEvent::FileSaved(script.clone()));

        assert_eq!(service.pump_timeout(Duration::from_secs(2)), 1);
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0][&script.id()][0].line, 4);
        drop(seen);
        service.stop();
        assert_eq!(service.worker_state(), WorkerState::Stopped);
    }

    #[test]
    fn disabled_service_ignores_files() {
        let registry = MemoryFileRegistry::new("/project");
        let mut service = AnalysisService::new(
            "parser",
            AnalysisSettings {
                enabled: false,
                ..fast_settings()
            },
            StdClock::new(),
        )
        .unwrap();
        service.start().unwrap();
        assert!(!service.is_running());
        service.add_files(vec![registry.add("a.lua", "lua")]);
        assert_eq!(service.pending_len(), 0);

        service.set_enabled(true).unwrap();
        assert!(service.is_running());
        service.add_files(registry.files());
        assert_eq!(service.pending_len(), 1);
        service.set_enabled(false).unwrap();
        assert_eq!(service.pending_len(), 0);
        assert!(!service.is_running());
    }

    #[test]
    fn close_event_drops_pending_and_queued_work() {
        let mut settings = fast_settings();
        settings.tick_interval = Duration::from_secs(3600);
        let service = AnalysisService::new("syntax", settings, StdClock::new()).unwrap();
        service.register_files_analysis_function(
            "lua".into(),
            files_analysis_fn(|_, _, _, _| Ok(Vec::new())),
            UserData::none(),
        );
        let file = FileHandle::new(FileId(9), "/project/x.lua", "lua".into());
        service.handle_project_event(ProjectEvent::Opened(vec![file]));
        assert_eq!(service.pending_len(), 1);
        service.handle_project_event(ProjectEvent::Closed);
        assert_eq!(service.pending_len(), 0);
        assert_eq!(service.queued_len(), 0);
    }

    #[test]
    fn analyze_string_uses_registered_function() {
        let mut service = AnalysisService::new("syntax", fast_settings(), StdClock::new()).unwrap();
        let lua = PluginId::new("lua");
        assert!(matches!(
            service.analyze_string(&lua, "x > 1"),
            Err(AnalysisError::UnregisteredPlugin(_))
        ));
        service.register_string_analysis_function(
            lua.clone(),
            string_analysis_fn(|text, _, _| {
                if text.trim().is_empty() {
                    Ok(vec![AnalysisEntry::new(
                        PluginId::new("lua"),
                        FileId(0),
                        Severity::Error,
                        1,
                        "empty expression",
                    )])
                } else {
                    Ok(Vec::new())
                }
            }),
            UserData::none(),
        );
        assert!(service.analyze_string(&lua, "x > 1").unwrap().is_empty());
        assert_eq!(service.analyze_string(&lua, "   ").unwrap().len(), 1);
    }
}
