//! Per-plugin request forming and the shared work queue.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::file::{FileHandle, PluginId};
use crate::function::{FilesAnalysisFn, UserData};

/// One unit of work for the analysis worker.
#[derive(Clone)]
pub struct AnalysisRequest {
    pub plugin: PluginId,
    pub files: Vec<FileHandle>,
    pub user_data: UserData,
    pub function: FilesAnalysisFn,
}

impl fmt::Debug for AnalysisRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisRequest")
            .field("plugin", &self.plugin)
            .field("files", &self.files.len())
            .field("user_data", &self.user_data)
            .finish_non_exhaustive()
    }
}

/// FIFO of pending requests shared between enqueuers and the worker thread.
#[derive(Debug, Clone, Default)]
pub struct WorkQueue {
    inner: Arc<Mutex<VecDeque<AnalysisRequest>>>,
}

impl WorkQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, request: AnalysisRequest) {
        self.inner.lock().push_back(request);
    }

    pub fn pop(&self) -> Option<AnalysisRequest> {
        self.inner.lock().pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

#[derive(Clone)]
struct Registration {
    function: FilesAnalysisFn,
    user_data: UserData,
}

/// Splits flushed batches per owning plugin and queues one request each.
pub struct AnalysisDispatcher {
    registrations: RwLock<IndexMap<PluginId, Registration>>,
    queue: WorkQueue,
}

impl AnalysisDispatcher {
    #[must_use]
    pub fn new(queue: WorkQueue) -> Self {
        Self {
            registrations: RwLock::new(IndexMap::new()),
            queue,
        }
    }

    #[must_use]
    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    /// Register the files analysis function for `plugin`.
    ///
    /// Returns `false` (and keeps the existing function) when the plugin is
    /// already registered.
    pub fn register_files_analysis_function(
        &self,
        plugin: PluginId,
        function: FilesAnalysisFn,
        user_data: UserData,
    ) -> bool {
        let mut registrations = self.registrations.write();
        if registrations.contains_key(&plugin) {
            debug!(%plugin, "files analysis function already registered");
            return false;
        }
        registrations.insert(
            plugin,
            Registration {
                function,
                user_data,
            },
        );
        true
    }

    #[must_use]
    pub fn is_registered(&self, plugin: &PluginId) -> bool {
        self.registrations.read().contains_key(plugin)
    }

    /// Queue one request per registered plugin owning any of `files`.
    ///
    /// Returns `true` iff at least one request was queued.
    pub fn enqueue(&self, files: &[FileHandle]) -> bool {
        if files.is_empty() {
            return false;
        }
        let registrations = self.registrations.read();
        let mut queued = false;
        for (plugin, registration) in registrations.iter() {
            let owned: Vec<FileHandle> = files
                .iter()
                .filter(|file| file.plugin() == plugin)
                .cloned()
                .collect();
            if owned.is_empty() {
                continue;
            }
            trace!(%plugin, files = owned.len(), "queueing analysis request");
            self.queue.push(AnalysisRequest {
                plugin: plugin.clone(),
                files: owned,
                user_data: registration.user_data.clone(),
                function: Arc::clone(&registration.function),
            });
            queued = true;
        }
        queued
    }
}

impl fmt::Debug for AnalysisDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisDispatcher")
            .field(
                "plugins",
                &self.registrations.read().keys().collect::<Vec<_>>(),
            )
            .field("queued", &self.queue.len())
            .finish()
    }
}
