//! Dedicated background thread running queued analysis requests.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use smol_str::SmolStr;
use tracing::{debug, error, warn};

use crate::dispatch::{AnalysisRequest, WorkQueue};
use crate::entry::{group_by_file, ResultSet};
use crate::error::AnalysisError;
use crate::file::PluginId;
use crate::function::{CancelToken, UserData, Verbosity};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Results of one analysis pass, delivered to the owning context.
#[derive(Debug, Clone)]
pub struct AnalysisFinished {
    pub plugin: PluginId,
    pub results: ResultSet,
    pub user_data: UserData,
}

/// Worker lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub name: SmolStr,
    pub verbosity: Verbosity,
    pub poll_interval: Duration,
    /// Upper bound on `stop()`; `None` waits for the thread indefinitely.
    pub stop_timeout: Option<Duration>,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            name: SmolStr::new("analysis"),
            verbosity: Verbosity::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            stop_timeout: Some(DEFAULT_STOP_TIMEOUT),
        }
    }
}

#[derive(Debug)]
struct WorkerThread {
    join: JoinHandle<()>,
    exited: mpsc::Receiver<()>,
}

/// Signals thread exit on drop, including unwinding.
struct ExitSignal(Sender<()>);

impl Drop for ExitSignal {
    fn drop(&mut self) {
        let _ = self.0.send(());
    }
}

/// Owner of the single analysis thread for a service.
#[derive(Debug)]
pub struct AnalysisWorker {
    options: WorkerOptions,
    queue: WorkQueue,
    results: Sender<AnalysisFinished>,
    running: Arc<AtomicBool>,
    cancel: CancelToken,
    state: Arc<Mutex<WorkerState>>,
    thread: Option<WorkerThread>,
}

impl AnalysisWorker {
    pub fn new(options: WorkerOptions, queue: WorkQueue, results: Sender<AnalysisFinished>) -> Self {
        Self {
            options,
            queue,
            results,
            running: Arc::new(AtomicBool::new(false)),
            cancel: CancelToken::new(),
            state: Arc::new(Mutex::new(WorkerState::Stopped)),
            thread: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn set_verbosity(&mut self, verbosity: Verbosity) {
        self.options.verbosity = verbosity;
    }

    /// Start the worker thread, stopping a previous one first.
    pub fn start(&mut self) -> Result<(), AnalysisError> {
        if self.thread.is_some() {
            self.stop();
        }
        *self.state.lock() = WorkerState::Starting;
        // Fresh flags per thread: an abandoned thread must never observe the
        // next generation's running flag.
        self.cancel = CancelToken::new();
        self.running = Arc::new(AtomicBool::new(true));

        let (exit_tx, exit_rx) = mpsc::channel();
        let context = WorkerContext {
            queue: self.queue.clone(),
            results: self.results.clone(),
            running: Arc::clone(&self.running),
            cancel: self.cancel.clone(),
            verbosity: self.options.verbosity,
            poll_interval: self.options.poll_interval,
        };
        let builder = thread::Builder::new().name(format!("{}-worker", self.options.name));
        let spawned = builder.spawn(move || {
            let _exit = ExitSignal(exit_tx);
            run_worker_loop(&context);
        });
        let join = match spawned {
            Ok(join) => join,
            Err(err) => {
                self.running.store(false, Ordering::SeqCst);
                *self.state.lock() = WorkerState::Stopped;
                return Err(AnalysisError::ThreadSpawn(err.to_string().into()));
            }
        };
        self.thread = Some(WorkerThread {
            join,
            exited: exit_rx,
        });
        *self.state.lock() = WorkerState::Running;
        debug!(worker = %self.options.name, "analysis worker started");
        Ok(())
    }

    /// Request cooperative shutdown and wait for the thread to exit.
    ///
    /// A thread still busy after the stop timeout is abandoned: it keeps
    /// running detached, but its results are no longer delivered.
    pub fn stop(&mut self) {
        let Some(worker) = self.thread.take() else {
            self.running.store(false, Ordering::SeqCst);
            *self.state.lock() = WorkerState::Stopped;
            return;
        };
        *self.state.lock() = WorkerState::Stopping;
        self.cancel.cancel();
        self.running.store(false, Ordering::SeqCst);

        let exited = match self.options.stop_timeout {
            Some(timeout) => match worker.exited.recv_timeout(timeout) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
                Err(RecvTimeoutError::Timeout) => false,
            },
            None => {
                let _ = worker.exited.recv();
                true
            }
        };
        if exited {
            if worker.join.join().is_err() {
                error!(worker = %self.options.name, "analysis worker panicked");
            }
        } else {
            error!(
                worker = %self.options.name,
                timeout = ?self.options.stop_timeout,
                "analysis worker did not stop in time; abandoning thread"
            );
        }
        *self.state.lock() = WorkerState::Stopped;
        debug!(worker = %self.options.name, "analysis worker stopped");
    }
}

impl Drop for AnalysisWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

struct WorkerContext {
    queue: WorkQueue,
    results: Sender<AnalysisFinished>,
    running: Arc<AtomicBool>,
    cancel: CancelToken,
    verbosity: Verbosity,
    poll_interval: Duration,
}

fn run_worker_loop(context: &WorkerContext) {
    while context.running.load(Ordering::SeqCst) {
        thread::sleep(context.poll_interval);
        let Some(request) = context.queue.pop() else {
            continue;
        };
        let plugin = request.plugin.clone();
        match run_request(&request, context.verbosity, &context.cancel) {
            Ok(results) => {
                if !context.running.load(Ordering::SeqCst) {
                    debug!(%plugin, "discarding analysis results after shutdown");
                    break;
                }
                let finished = AnalysisFinished {
                    plugin,
                    results,
                    user_data: request.user_data,
                };
                if context.results.send(finished).is_err() {
                    debug!("analysis result receiver dropped");
                    break;
                }
            }
            Err(AnalysisError::Cancelled) => {
                debug!(%plugin, "analysis cancelled");
            }
            Err(err) => {
                warn!(%plugin, files = request.files.len(), "analysis pass failed: {err}");
            }
        }
    }
}

fn run_request(
    request: &AnalysisRequest,
    verbosity: Verbosity,
    cancel: &CancelToken,
) -> Result<ResultSet, AnalysisError> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        (request.function)(&request.files, verbosity, &request.user_data, cancel)
    }))
    .map_err(|payload| AnalysisError::Panicked(panic_message(payload.as_ref())))?;
    let entries = outcome?;
    Ok(group_by_file(&request.files, entries))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> SmolStr {
    if let Some(message) = payload.downcast_ref::<&str>() {
        SmolStr::new(message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        SmolStr::new(message)
    } else {
        SmolStr::new("<non-string panic>")
    }
}
